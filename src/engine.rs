//! Engine orchestration: poll → track → resolve → execute
//!
//! The polling path runs synchronously on whatever thread calls
//! [`Engine::run`]; it never waits on key timing because playback happens on
//! the executor's runtime.
//!
//! # Architecture
//!
//! ```text
//! RawEventSource ──► InputStateTracker ──► ActionResolver ──► SequenceExecutor
//!                         (edges)              ▲                 (slot, hooks)
//!                                              │
//!                  EngineHandle::reload ──► MappingHandle (swap)
//! ```

use crate::controller::{
    CollectorError, FiredInput, InputId, InputStateTracker, RawEventSource, RawInputEvent,
};
use crate::executor::{ExecutorError, SequenceExecutor, ShutdownPolicy};
use crate::mapping::{
    ActionResolver, BindingSource, DefaultBindings, HookRegistry, MappingError, MappingHandle,
    MappingTable, Resolution, TomlFileSource,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No input device available: {0}")]
    DeviceUnavailable(String),

    #[error("Input source failed: {0}")]
    SourceError(#[from] CollectorError),

    #[error(transparent)]
    Config(#[from] MappingError),

    #[error("Polling thread error: {0}")]
    ThreadError(String),
}

#[derive(Clone, Debug)]
pub struct EngineSettings {
    /// Upper bound on how long one poll blocks before cancellation is checked
    pub poll_interval: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// What one polling step did with a raw event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventOutcome {
    /// The event changed state but fired nothing
    Untracked,
    Unbound(InputId),
    Suppressed { trigger: InputId, modifier: InputId },
    Accepted(InputId),
    Rejected { trigger: InputId, reason: ExecutorError },
}

/// Summary returned to whoever asked for a reload
#[derive(Debug)]
pub struct ReloadReport {
    pub origin: String,
    pub loaded: usize,
    pub skipped: Vec<MappingError>,
}

/// Cloneable control surface for a running engine
#[derive(Clone)]
pub struct EngineHandle {
    mappings: MappingHandle,
    executor: SequenceExecutor,
    source: Arc<dyn BindingSource>,
    hooks: Arc<HookRegistry>,
    cancel: CancellationToken,
}

impl EngineHandle {
    /// Reloads bindings from the configured source.
    ///
    /// On success the new table replaces the active one; on failure the active
    /// table is left untouched and the error is returned.
    pub fn reload(&self) -> Result<ReloadReport, MappingError> {
        info!("Reloading bindings from {}", self.source.describe());
        let report = match MappingTable::load_with_report(self.source.as_ref(), &self.hooks) {
            Ok(report) => report,
            Err(e) => {
                error!("Reload failed, keeping current bindings: {}", e);
                return Err(e);
            }
        };

        let summary = ReloadReport {
            origin: report.table.origin().to_string(),
            loaded: report.table.len(),
            skipped: report.skipped,
        };
        self.mappings.swap(report.table);
        Ok(summary)
    }

    /// Stops the polling loop and settles the executor per `policy`
    pub async fn shutdown(&self, policy: ShutdownPolicy) {
        info!("Engine shutdown requested");
        self.cancel.cancel();
        self.executor.shutdown(policy).await;
    }

    pub fn current_table(&self) -> Arc<MappingTable> {
        self.mappings.snapshot()
    }

    pub fn is_busy(&self) -> bool {
        self.executor.is_busy()
    }

    pub async fn wait_idle(&self) {
        self.executor.wait_idle().await;
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

pub struct Engine {
    tracker: InputStateTracker,
    handle: EngineHandle,
    settings: EngineSettings,
}

impl Engine {
    /// Creates an engine with `table` active and `source` used for reloads
    pub fn new(
        table: MappingTable,
        source: Arc<dyn BindingSource>,
        hooks: HookRegistry,
        executor: SequenceExecutor,
        settings: EngineSettings,
    ) -> Self {
        info!(
            "Initializing engine with {} binding(s) from {}",
            table.len(),
            table.origin()
        );
        Self {
            tracker: InputStateTracker::new(),
            handle: EngineHandle {
                mappings: MappingHandle::new(table),
                executor,
                source,
                hooks: Arc::new(hooks),
                cancel: CancellationToken::new(),
            },
            settings,
        }
    }

    /// Creates an engine whose initial table is loaded from `source`
    pub fn from_source(
        source: Arc<dyn BindingSource>,
        hooks: HookRegistry,
        executor: SequenceExecutor,
        settings: EngineSettings,
    ) -> Result<Self, EngineError> {
        let table = MappingTable::load(source.as_ref(), &hooks)?;
        Ok(Self::new(table, source, hooks, executor, settings))
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    pub fn tracker(&self) -> &InputStateTracker {
        &self.tracker
    }

    /// One synchronous polling-path step
    pub fn process_event(&mut self, event: &RawInputEvent) -> EventOutcome {
        let Some(fired) = self.tracker.on_raw_event(event) else {
            return EventOutcome::Untracked;
        };
        self.dispatch(fired)
    }

    fn dispatch(&self, fired: FiredInput) -> EventOutcome {
        let trigger = fired.id();
        let table = self.handle.mappings.snapshot();

        match ActionResolver::resolve_detailed(fired, &table, self.tracker.state()) {
            Resolution::Unbound => {
                debug!("{} is not bound", trigger);
                EventOutcome::Unbound(trigger)
            }
            Resolution::Suppressed { modifier } => {
                debug!("{} suppressed, modifier {} not held", trigger, modifier);
                EventOutcome::Suppressed { trigger, modifier }
            }
            Resolution::Matched(action) => {
                info!("{} fired", trigger);
                match self.handle.executor.submit(action) {
                    Ok(()) => EventOutcome::Accepted(trigger),
                    Err(reason) => EventOutcome::Rejected { trigger, reason },
                }
            }
        }
    }

    /// Polls `source` until the engine is cancelled or the source closes
    pub fn run<S: RawEventSource + ?Sized>(&mut self, source: &mut S) -> Result<(), EngineError> {
        info!("Engine polling loop started");
        let cancel = self.handle.cancel.clone();

        while !cancel.is_cancelled() {
            match source.next_event(self.settings.poll_interval) {
                Ok(Some(event)) => {
                    let outcome = self.process_event(&event);
                    debug!("{} -> {:?}", event, outcome);
                }
                Ok(None) => {}
                Err(CollectorError::SourceClosed(reason)) => {
                    warn!("Input source closed: {}", reason);
                    break;
                }
                Err(e) => {
                    error!("Input source failed: {}", e);
                    return Err(e.into());
                }
            }
        }

        info!("Engine polling loop stopped");
        Ok(())
    }
}

/// Loads the initial table from a bindings file.
///
/// Without a file, or when the file cannot be loaded at all, the built-in
/// default bindings are used so the program still starts.
pub fn load_or_default(path: &Path, hooks: &HookRegistry) -> MappingTable {
    if !path.exists() {
        warn!(
            "No configuration at {}, using default bindings",
            path.display()
        );
        return default_table(hooks);
    }

    match MappingTable::load(&TomlFileSource::new(path), hooks) {
        Ok(table) => table,
        Err(e) => {
            warn!("{}; using default bindings", e);
            default_table(hooks)
        }
    }
}

fn default_table(hooks: &HookRegistry) -> MappingTable {
    // the defaults reference no hooks and always validate
    MappingTable::load(&DefaultBindings, hooks).unwrap_or_default()
}
