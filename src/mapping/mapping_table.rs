//! The active trigger → action table and its atomically swappable handle.

use crate::controller::InputId;
use crate::mapping::action::ActionConfig;
use crate::mapping::error::MappingError;
use crate::mapping::hooks::HookRegistry;
use crate::mapping::mapping_config::{build_action, BindingSource, Candidate};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Immutable set of bindings, at most one per trigger
#[derive(Clone, Debug, Default)]
pub struct MappingTable {
    bindings: HashMap<InputId, Arc<ActionConfig>>,
    origin: String,
}

/// Result of a load that tolerated bad entries
#[derive(Debug)]
pub struct LoadReport {
    pub table: MappingTable,
    pub skipped: Vec<MappingError>,
}

impl LoadReport {
    pub fn loaded(&self) -> usize {
        self.table.len()
    }
}

impl MappingTable {
    pub fn empty() -> Self {
        Self::default()
    }

    fn with_origin(origin: impl Into<String>) -> Self {
        Self {
            bindings: HashMap::new(),
            origin: origin.into(),
        }
    }

    /// Adds an action unless its trigger is already bound
    fn insert(&mut self, position: usize, action: ActionConfig) -> Result<(), MappingError> {
        let trigger = action.trigger;
        if self.bindings.contains_key(&trigger) {
            return Err(MappingError::entry(
                position,
                trigger.to_string(),
                "duplicate trigger, the first binding is kept",
            ));
        }
        self.bindings.insert(trigger, Arc::new(action));
        Ok(())
    }

    /// Builds a table from already validated actions.
    ///
    /// Later duplicates of a trigger are returned as skipped entries.
    pub fn from_actions(
        origin: impl Into<String>,
        actions: impl IntoIterator<Item = ActionConfig>,
    ) -> LoadReport {
        let mut table = Self::with_origin(origin);
        let skipped = actions
            .into_iter()
            .enumerate()
            .filter_map(|(index, action)| table.insert(index + 1, action).err())
            .collect();

        LoadReport { table, skipped }
    }

    /// Loads and validates every candidate from `source`.
    ///
    /// Malformed entries are logged and skipped. Only a structural failure of
    /// the source itself is returned as an error.
    pub fn load(source: &dyn BindingSource, hooks: &HookRegistry) -> Result<Self, MappingError> {
        Self::load_with_report(source, hooks).map(|report| report.table)
    }

    pub fn load_with_report(
        source: &dyn BindingSource,
        hooks: &HookRegistry,
    ) -> Result<LoadReport, MappingError> {
        let origin = source.describe();
        debug!("Loading bindings from {}", origin);

        let candidates = source.candidates()?;
        let mut table = Self::with_origin(origin.clone());
        let mut skipped = Vec::new();

        for (index, candidate) in candidates.into_iter().enumerate() {
            let position = index + 1;
            let result = match candidate {
                Candidate::Entry(entry) => build_action(&entry, hooks)
                    .map_err(|reason| MappingError::entry(position, entry.trigger.clone(), reason))
                    .and_then(|action| table.insert(position, action)),
                Candidate::Malformed { trigger, reason } => Err(MappingError::entry(
                    position,
                    trigger.unwrap_or_else(|| "?".to_string()),
                    reason,
                )),
            };
            if let Err(error) = result {
                warn!("{}: {}", origin, error);
                skipped.push(error);
            }
        }

        info!(
            "Loaded {} binding(s) from {} ({} skipped)",
            table.len(),
            origin,
            skipped.len()
        );

        Ok(LoadReport { table, skipped })
    }

    pub fn get(&self, trigger: &InputId) -> Option<&Arc<ActionConfig>> {
        self.bindings.get(trigger)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Where the bindings came from
    pub fn origin(&self) -> &str {
        &self.origin
    }
}

/// Shared reference to the active [`MappingTable`].
///
/// Readers take a snapshot (`Arc`) and resolve against it; `swap` replaces the
/// whole table in one step, so a snapshot is always entirely old or entirely
/// new.
#[derive(Clone, Debug)]
pub struct MappingHandle {
    sender: Arc<watch::Sender<Arc<MappingTable>>>,
}

impl MappingHandle {
    pub fn new(table: MappingTable) -> Self {
        let (sender, _) = watch::channel(Arc::new(table));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn snapshot(&self) -> Arc<MappingTable> {
        self.sender.borrow().clone()
    }

    /// Installs `table` for subsequent resolutions and returns the previous one
    pub fn swap(&self, table: MappingTable) -> Arc<MappingTable> {
        let previous = self.sender.send_replace(Arc::new(table));
        info!(
            "Mapping table replaced ({} -> {} binding(s))",
            previous.len(),
            self.sender.borrow().len()
        );
        previous
    }
}
