//! Controller subsystem: raw gamepad input and edge detection
//!
//! Implements the front half of the pipeline:
//!
//! 1. [`event_collector`] - gilrs gamepad polling into [`RawInputEvent`]s
//! 2. [`event_source`] - the blocking source abstraction the polling loop reads
//! 3. [`input_state`] - held/hat state tracking and edge detection
//!
//! # Architecture
//!
//! ```text
//! Gamepad ──► Collector ──► RawEventSource ──► InputStateTracker ──► FiredInput
//!             (gilrs)       (blocking poll)     (edge detection)
//! ```

pub mod event_collector;
pub mod event_source;
pub mod input_state;
pub mod input_types;

pub use event_collector::{CollectorError, CollectorSettings, GamepadCollector, GamepadInfo};
pub use event_source::{ChannelSource, RawEventSource};
pub use input_state::{InputState, InputStateTracker};
pub use input_types::{FiredInput, HatDirection, InputId, InputIdParseError, RawInputEvent};
