//! Error definitions for the mapping module

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating bindings
#[derive(Debug, Error)]
pub enum MappingError {
    /// The configuration file could not be read at all
    #[error("Cannot read configuration {path}: {source}")]
    ConfigUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The source is structurally invalid and nothing could be loaded
    #[error("Cannot parse configuration {origin}: {reason}")]
    ConfigParseError { origin: String, reason: String },

    /// A single binding is malformed and was skipped
    #[error("Binding #{position} ({trigger}) skipped: {reason}")]
    ConfigEntryInvalid {
        position: usize,
        trigger: String,
        reason: String,
    },

    /// Writing a configuration file failed
    #[error("Cannot write configuration {path}: {reason}")]
    ConfigWriteError { path: PathBuf, reason: String },
}

impl MappingError {
    pub(crate) fn entry(position: usize, trigger: impl Into<String>, reason: impl ToString) -> Self {
        MappingError::ConfigEntryInvalid {
            position,
            trigger: trigger.into(),
            reason: reason.to_string(),
        }
    }
}
