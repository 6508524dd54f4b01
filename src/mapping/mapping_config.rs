//! TOML binding files and the built-in default bindings.
//!
//! Parsing happens in two layers. The document must be valid TOML with an
//! array under `binding`, otherwise the whole load fails. Each element is
//! then deserialized on its own, so one malformed entry only costs that
//! entry.

use crate::controller::InputId;
use crate::mapping::action::{ActionConfig, SequenceStep, DEFAULT_INTER_PRESS_DELAY};
use crate::mapping::error::MappingError;
use crate::mapping::hooks::HookRegistry;
use crate::mapping::keys::KeyId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const FILE_HEADER: &str = "\
# joymacro bindings
#
# trigger   BUTTON_<n> or HAT_<i>_<direction> (up, up-right, right, ... up-left)
# modifier  optional BUTTON_<n> that must be held for the binding to fire
# delay     seconds between key presses (default 0.1)
# pre_run / after_run   optional hook names (log_start, log_end)
# sequence  steps: { key = \"x\", presses = 2 } or { wait = 1.5 }
#           keys are single characters or KEY_<NAME> (KEY_SPACE, KEY_F1, ...)

";

/// One `[[binding]]` table as written in the file
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BindingEntry {
    pub trigger: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_run: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_run: Option<String>,
    pub sequence: Vec<StepEntry>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum StepEntry {
    Key(KeyStep),
    Wait(WaitStep),
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct KeyStep {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presses: Option<i64>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct WaitStep {
    pub wait: f64,
}

impl StepEntry {
    pub fn key(key: &str, presses: i64) -> Self {
        StepEntry::Key(KeyStep {
            key: key.to_string(),
            presses: (presses != 1).then_some(presses),
        })
    }

    pub fn wait(seconds: f64) -> Self {
        StepEntry::Wait(WaitStep { wait: seconds })
    }
}

#[derive(Serialize)]
struct BindingDocument<'a> {
    binding: &'a [BindingEntry],
}

/// A binding as produced by a source, before validation
#[derive(Clone, Debug, PartialEq)]
pub enum Candidate {
    Entry(BindingEntry),
    Malformed {
        trigger: Option<String>,
        reason: String,
    },
}

/// Supplies candidate bindings to [`MappingTable::load`](crate::mapping::MappingTable::load)
pub trait BindingSource: Send + Sync {
    /// Human readable origin used in logs and errors
    fn describe(&self) -> String;

    fn candidates(&self) -> Result<Vec<Candidate>, MappingError>;
}

/// Bindings read from a TOML file on every load
#[derive(Clone, Debug)]
pub struct TomlFileSource {
    path: PathBuf,
}

impl TomlFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BindingSource for TomlFileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn candidates(&self) -> Result<Vec<Candidate>, MappingError> {
        debug!("Reading bindings from {}", self.path.display());
        let text = fs::read_to_string(&self.path).map_err(|source| {
            MappingError::ConfigUnreadable {
                path: self.path.clone(),
                source,
            }
        })?;
        parse_document(&self.describe(), &text)
    }
}

/// Bindings held in memory as TOML text
#[derive(Clone, Debug)]
pub struct TomlTextSource {
    origin: String,
    text: String,
}

impl TomlTextSource {
    pub fn new(origin: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            text: text.into(),
        }
    }
}

impl BindingSource for TomlTextSource {
    fn describe(&self) -> String {
        self.origin.clone()
    }

    fn candidates(&self) -> Result<Vec<Candidate>, MappingError> {
        parse_document(&self.origin, &self.text)
    }
}

/// The built-in bindings used when no configuration file exists
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultBindings;

impl BindingSource for DefaultBindings {
    fn describe(&self) -> String {
        "built-in defaults".to_string()
    }

    fn candidates(&self) -> Result<Vec<Candidate>, MappingError> {
        Ok(default_bindings().into_iter().map(Candidate::Entry).collect())
    }
}

/// Splits a TOML document into per-entry candidates
pub fn parse_document(origin: &str, text: &str) -> Result<Vec<Candidate>, MappingError> {
    let document = text.parse::<toml::Table>().map_err(|e| {
        MappingError::ConfigParseError {
            origin: origin.to_string(),
            reason: e.message().to_string(),
        }
    })?;

    for key in document.keys().filter(|key| key.as_str() != "binding") {
        warn!("Ignoring unknown top-level key '{}' in {}", key, origin);
    }

    let items = match document.get("binding") {
        None => {
            warn!("{} contains no [[binding]] entries", origin);
            return Ok(Vec::new());
        }
        Some(toml::Value::Array(items)) => items,
        Some(other) => {
            return Err(MappingError::ConfigParseError {
                origin: origin.to_string(),
                reason: format!(
                    "'binding' must be an array of tables, found {}",
                    other.type_str()
                ),
            })
        }
    };

    let candidates = items
        .iter()
        .map(|item| {
            let trigger = item
                .get("trigger")
                .and_then(|t| t.as_str())
                .map(str::to_string);
            match item.clone().try_into::<BindingEntry>() {
                Ok(entry) => Candidate::Entry(entry),
                Err(e) => Candidate::Malformed {
                    trigger,
                    reason: e.message().to_string(),
                },
            }
        })
        .collect();

    Ok(candidates)
}

fn parse_seconds(what: &str, seconds: f64) -> Result<Duration, String> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(format!("{} must be a non-negative number of seconds, got {}", what, seconds));
    }
    Duration::try_from_secs_f64(seconds).map_err(|e| format!("{} {}: {}", what, seconds, e))
}

/// Validates one entry and resolves its keys and hooks.
///
/// The returned reason is used for the `ConfigEntryInvalid` warning.
pub fn build_action(entry: &BindingEntry, hooks: &HookRegistry) -> Result<ActionConfig, String> {
    let trigger: InputId = entry.trigger.parse().map_err(|e| format!("trigger: {}", e))?;
    if let InputId::Hat { direction, .. } = trigger {
        if direction.is_centered() {
            return Err("a centered hat never fires and cannot be a trigger".to_string());
        }
    }

    let modifier = entry
        .modifier
        .as_deref()
        .map(|text| {
            let modifier: InputId = text.parse().map_err(|e| format!("modifier: {}", e))?;
            if !modifier.is_button() {
                return Err(format!("modifier {} is not a button and can never be held", modifier));
            }
            Ok(modifier)
        })
        .transpose()?;

    let inter_press_delay = match entry.delay {
        Some(seconds) => parse_seconds("delay", seconds)?,
        None => DEFAULT_INTER_PRESS_DELAY,
    };

    let mut sequence = Vec::with_capacity(entry.sequence.len());
    for (index, step) in entry.sequence.iter().enumerate() {
        let step = match step {
            StepEntry::Key(KeyStep { key, presses }) => {
                let key: KeyId = key
                    .parse()
                    .map_err(|e| format!("step {}: {}", index + 1, e))?;
                let presses = presses.unwrap_or(1);
                let count = u32::try_from(presses).map_err(|_| {
                    if presses < 1 {
                        format!("step {}: presses must be at least 1, got {}", index + 1, presses)
                    } else {
                        format!(
                            "step {}: presses must be at most {}, got {}",
                            index + 1,
                            u32::MAX,
                            presses
                        )
                    }
                })?;
                SequenceStep::press_n(key, count).ok_or_else(|| {
                    format!("step {}: presses must be at least 1, got {}", index + 1, presses)
                })?
            }
            StepEntry::Wait(WaitStep { wait }) => {
                SequenceStep::wait(parse_seconds(&format!("step {} wait", index + 1), *wait)?)
            }
        };
        sequence.push(step);
    }

    let resolve_hook = |name: &Option<String>| {
        name.as_deref()
            .map(|name| {
                hooks
                    .get(name)
                    .ok_or_else(|| format!("unknown hook '{}'", name))
            })
            .transpose()
    };

    Ok(ActionConfig {
        trigger,
        modifier,
        inter_press_delay,
        sequence,
        pre_run: resolve_hook(&entry.pre_run)?,
        after_run: resolve_hook(&entry.after_run)?,
    })
}

impl BindingEntry {
    /// Converts a loaded action back into its file form
    pub fn from_action(action: &ActionConfig) -> Self {
        let sequence = action
            .sequence
            .iter()
            .map(|step| match step {
                SequenceStep::KeyPress { key, repeat } => {
                    StepEntry::key(&key.to_string(), i64::from(repeat.get()))
                }
                SequenceStep::Wait { duration } => StepEntry::wait(duration.as_secs_f64()),
            })
            .collect();

        Self {
            trigger: action.trigger.to_string(),
            modifier: action.modifier.map(|m| m.to_string()),
            delay: (action.inter_press_delay != DEFAULT_INTER_PRESS_DELAY)
                .then(|| action.inter_press_delay.as_secs_f64()),
            pre_run: action.pre_run.as_ref().map(|h| h.name().to_string()),
            after_run: action.after_run.as_ref().map(|h| h.name().to_string()),
            sequence,
        }
    }
}

/// Renders entries as a commented TOML document
pub fn render_document(entries: &[BindingEntry]) -> Result<String, toml::ser::Error> {
    let body = toml::to_string_pretty(&BindingDocument { binding: entries })?;
    Ok(format!("{}{}", FILE_HEADER, body))
}

/// Writes the default bindings to `path` unless a file is already there.
///
/// Returns `Ok(false)` when the file exists and was left untouched.
pub fn write_default_config(path: &Path) -> Result<bool, MappingError> {
    if path.exists() {
        info!("{} already exists, leaving it untouched", path.display());
        return Ok(false);
    }

    let write_error = |reason: String| MappingError::ConfigWriteError {
        path: path.to_path_buf(),
        reason,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| write_error(e.to_string()))?;
    }

    let content = render_document(&default_bindings()).map_err(|e| write_error(e.to_string()))?;
    fs::write(path, content).map_err(|e| write_error(e.to_string()))?;

    info!("Default configuration written to {}", path.display());
    Ok(true)
}

/// Pip management macros for the four d-pad directions
pub fn default_bindings() -> Vec<BindingEntry> {
    let binding = |trigger: &str, sequence: Vec<StepEntry>| BindingEntry {
        trigger: trigger.to_string(),
        modifier: None,
        delay: None,
        pre_run: None,
        after_run: None,
        sequence,
    };

    vec![
        // reset, then 4 WEP
        binding(
            "HAT_0_up",
            vec![StepEntry::key("v", 1), StepEntry::key("x", 2)],
        ),
        // reset, then 4 SYS
        binding(
            "HAT_0_down",
            vec![StepEntry::key("v", 1), StepEntry::key("c", 2)],
        ),
        // reset, then 4 ENG / 2 WEP
        binding(
            "HAT_0_left",
            vec![
                StepEntry::key("v", 1),
                StepEntry::key("z", 1),
                StepEntry::key("x", 1),
            ],
        ),
        // reset, then 3 SYS / 3 WEP
        binding(
            "HAT_0_right",
            vec![
                StepEntry::key("v", 1),
                StepEntry::key("c", 1),
                StepEntry::key("x", 1),
            ],
        ),
    ]
}
