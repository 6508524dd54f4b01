//! Gamepad input to keyboard macro engine.
//!
//! Raw gamepad events are turned into edges, resolved against a swappable
//! binding table and played as key sequences on a single-occupancy executor.

pub mod config;
pub mod controller;
pub mod engine;
pub mod executor;
pub mod logging;
pub mod mapping;

pub use engine::{Engine, EngineError, EngineHandle, EngineSettings, EventOutcome, ReloadReport};
