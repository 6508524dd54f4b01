//! Bound actions and their key sequences.

use crate::controller::InputId;
use crate::mapping::hooks::HookRef;
use crate::mapping::keys::KeyId;
use std::num::NonZeroU32;
use std::time::Duration;

/// Delay between presses when a binding does not set one
pub const DEFAULT_INTER_PRESS_DELAY: Duration = Duration::from_millis(100);

/// One step of a macro
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SequenceStep {
    /// Press and release `key` `repeat` times, separated by the inter-press delay
    KeyPress { key: KeyId, repeat: NonZeroU32 },
    /// Pause without emitting keys
    Wait { duration: Duration },
}

impl SequenceStep {
    pub fn press(key: KeyId) -> Self {
        SequenceStep::KeyPress {
            key,
            repeat: NonZeroU32::MIN,
        }
    }

    /// Returns `None` when `repeat` is zero
    pub fn press_n(key: KeyId, repeat: u32) -> Option<Self> {
        NonZeroU32::new(repeat).map(|repeat| SequenceStep::KeyPress { key, repeat })
    }

    pub fn wait(duration: Duration) -> Self {
        SequenceStep::Wait { duration }
    }
}

/// A binding of one trigger to a macro.
///
/// Immutable once loaded; the executor receives its own handle to the value
/// at trigger time, so replacing the mapping table never affects a sequence
/// that is already playing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionConfig {
    pub trigger: InputId,
    pub modifier: Option<InputId>,
    pub inter_press_delay: Duration,
    pub sequence: Vec<SequenceStep>,
    pub pre_run: Option<HookRef>,
    pub after_run: Option<HookRef>,
}

impl ActionConfig {
    pub fn new(trigger: InputId, sequence: Vec<SequenceStep>) -> Self {
        Self {
            trigger,
            modifier: None,
            inter_press_delay: DEFAULT_INTER_PRESS_DELAY,
            sequence,
            pre_run: None,
            after_run: None,
        }
    }

    pub fn with_modifier(mut self, modifier: InputId) -> Self {
        self.modifier = Some(modifier);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.inter_press_delay = delay;
        self
    }

    pub fn with_pre_run(mut self, hook: HookRef) -> Self {
        self.pre_run = Some(hook);
        self
    }

    pub fn with_after_run(mut self, hook: HookRef) -> Self {
        self.after_run = Some(hook);
        self
    }

    /// Total key presses the sequence will emit
    pub fn press_count(&self) -> u64 {
        self.sequence
            .iter()
            .map(|step| match step {
                SequenceStep::KeyPress { repeat, .. } => u64::from(repeat.get()),
                SequenceStep::Wait { .. } => 0,
            })
            .sum()
    }
}
