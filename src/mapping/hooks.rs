//! Pre/after-run hooks.
//!
//! A hook is a capability object rather than a bare function pointer, so every
//! hook has a name that configuration can refer to and logs can report.

use crate::controller::InputId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Hook '{hook}' failed: {reason}")]
pub struct HookError {
    pub hook: String,
    pub reason: String,
}

/// Zero-argument side effect run around a sequence.
///
/// `trigger` is the input that fired the sequence, for reporting only.
pub trait Hook: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn run(&self, trigger: &InputId) -> Result<(), HookError>;
}

/// Shared hook reference stored in an action.
///
/// Two references are equal when they name the same hook.
#[derive(Clone)]
pub struct HookRef(Arc<dyn Hook>);

impl HookRef {
    pub fn new(hook: impl Hook) -> Self {
        Self(Arc::new(hook))
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn run(&self, trigger: &InputId) -> Result<(), HookError> {
        self.0.run(trigger)
    }
}

impl fmt::Debug for HookRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HookRef({})", self.name())
    }
}

impl PartialEq for HookRef {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for HookRef {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogPhase {
    Start,
    End,
}

/// Logs that the sequence for a trigger started or ended
#[derive(Debug)]
pub struct LogHook {
    name: &'static str,
    phase: LogPhase,
}

impl LogHook {
    pub const START: &'static str = "log_start";
    pub const END: &'static str = "log_end";

    pub fn start() -> Self {
        Self {
            name: Self::START,
            phase: LogPhase::Start,
        }
    }

    pub fn end() -> Self {
        Self {
            name: Self::END,
            phase: LogPhase::End,
        }
    }
}

impl Hook for LogHook {
    fn name(&self) -> &str {
        self.name
    }

    fn run(&self, trigger: &InputId) -> Result<(), HookError> {
        match self.phase {
            LogPhase::Start => info!("Sequence for {} started", trigger),
            LogPhase::End => info!("Sequence for {} ended", trigger),
        }
        Ok(())
    }
}

/// Named hooks available to configuration
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: HashMap<String, HookRef>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `log_start` and `log_end` hooks
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(LogHook::start());
        registry.register(LogHook::end());
        registry
    }

    /// Adds a hook, replacing any hook registered under the same name
    pub fn register(&mut self, hook: impl Hook) {
        let hook = HookRef::new(hook);
        self.hooks.insert(hook.name().to_string(), hook);
    }

    pub fn get(&self, name: &str) -> Option<HookRef> {
        self.hooks.get(name).cloned()
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.hooks.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl Hook for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn run(&self, _trigger: &InputId) -> Result<(), HookError> {
            Err(HookError {
                hook: "failing".to_string(),
                reason: "boom".to_string(),
            })
        }
    }

    #[test]
    fn builtins_are_registered() {
        let registry = HookRegistry::with_builtins();
        assert!(registry.get(LogHook::START).is_some());
        assert!(registry.get(LogHook::END).is_some());
        assert!(registry.get("missing").is_none());
        assert!(registry
            .get(LogHook::START)
            .unwrap()
            .run(&InputId::Button(1))
            .is_ok());
    }

    #[test]
    fn hook_refs_compare_by_name() {
        let a = HookRef::new(LogHook::start());
        let b = HookRef::new(LogHook::start());
        let c = HookRef::new(LogHook::end());
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn custom_hooks_can_be_registered() {
        let mut registry = HookRegistry::new();
        registry.register(Failing);

        let hook = registry.get("failing").unwrap();
        assert_eq!(hook.run(&InputId::Button(2)).unwrap_err().reason, "boom");
    }
}
