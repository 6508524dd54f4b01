//! Key output sinks.

use crate::mapping::KeyId;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Key output failed for {key}: {reason}")]
pub struct SinkError {
    pub key: KeyId,
    pub reason: String,
}

/// Destination for synthesized key events
pub trait KeyOutputSink: Send + Sync + 'static {
    fn key_down(&self, key: KeyId) -> Result<(), SinkError>;

    fn key_up(&self, key: KeyId) -> Result<(), SinkError>;
}

/// Logs every key event instead of injecting it
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl KeyOutputSink for TracingSink {
    fn key_down(&self, key: KeyId) -> Result<(), SinkError> {
        info!("key down {}", key);
        Ok(())
    }

    fn key_up(&self, key: KeyId) -> Result<(), SinkError> {
        info!("key up   {}", key);
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyEvent {
    Down(KeyId),
    Up(KeyId),
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyEvent::Down(key) => write!(f, "{}-down", key),
            KeyEvent::Up(key) => write!(f, "{}-up", key),
        }
    }
}

/// Records key events with the time they were sent.
///
/// Clones share the same record. Uses tokio's clock so paused-time tests
/// see virtual timestamps.
#[derive(Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<(KeyEvent, Instant)>>>,
    failing: Arc<Mutex<Vec<KeyId>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every event for `key` fail
    pub fn fail_on(&self, key: KeyId) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.push(key);
        }
    }

    pub fn timed_events(&self) -> Vec<(KeyEvent, Instant)> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn events(&self) -> Vec<KeyEvent> {
        self.timed_events().into_iter().map(|(event, _)| event).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }

    fn record(&self, event: KeyEvent, key: KeyId) -> Result<(), SinkError> {
        let failing = self
            .failing
            .lock()
            .map(|failing| failing.contains(&key))
            .unwrap_or(false);
        if failing {
            return Err(SinkError {
                key,
                reason: "rejected by sink".to_string(),
            });
        }

        let mut events = self.events.lock().map_err(|_| SinkError {
            key,
            reason: "event record poisoned".to_string(),
        })?;
        events.push((event, Instant::now()));
        Ok(())
    }
}

impl fmt::Debug for MemorySink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySink")
            .field("events", &self.events())
            .finish()
    }
}

impl KeyOutputSink for MemorySink {
    fn key_down(&self, key: KeyId) -> Result<(), SinkError> {
        self.record(KeyEvent::Down(key), key)
    }

    fn key_up(&self, key: KeyId) -> Result<(), SinkError> {
        self.record(KeyEvent::Up(key), key)
    }
}
