//! Mapping subsystem: bindings from fired inputs to key macros.
//!
//! - [`mapping_config`] - TOML binding files and the default bindings
//! - [`mapping_table`] - the validated table and its swappable handle
//! - [`resolver`] - lookup with modifier gating
//! - [`action`], [`keys`], [`hooks`] - what a binding is made of

pub mod action;
pub mod error;
pub mod hooks;
pub mod keys;
pub mod mapping_config;
pub mod mapping_table;
pub mod resolver;

pub use action::{ActionConfig, SequenceStep, DEFAULT_INTER_PRESS_DELAY};
pub use error::MappingError;
pub use hooks::{Hook, HookError, HookRef, HookRegistry, LogHook};
pub use keys::{KeyId, KeyParseError, NamedKey};
pub use mapping_config::{
    default_bindings, write_default_config, BindingEntry, BindingSource, Candidate,
    DefaultBindings, TomlFileSource, TomlTextSource,
};
pub use mapping_table::{LoadReport, MappingHandle, MappingTable};
pub use resolver::{ActionResolver, Resolution};
