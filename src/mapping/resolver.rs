//! Fired input → action lookup with modifier gating.

use crate::controller::{FiredInput, InputId, InputState};
use crate::mapping::action::ActionConfig;
use crate::mapping::mapping_table::MappingTable;
use std::sync::Arc;

/// Why a fired input did or did not produce an action
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Unbound,
    /// Bound, but the modifier was not held
    Suppressed { modifier: InputId },
    Matched(Arc<ActionConfig>),
}

impl Resolution {
    pub fn into_action(self) -> Option<Arc<ActionConfig>> {
        match self {
            Resolution::Matched(action) => Some(action),
            _ => None,
        }
    }
}

/// Stateless resolver; a pure function of fired input, table and input state
#[derive(Clone, Copy, Debug, Default)]
pub struct ActionResolver;

impl ActionResolver {
    pub fn resolve(
        fired: FiredInput,
        table: &MappingTable,
        state: &InputState,
    ) -> Option<Arc<ActionConfig>> {
        Self::resolve_detailed(fired, table, state).into_action()
    }

    pub fn resolve_detailed(fired: FiredInput, table: &MappingTable, state: &InputState) -> Resolution {
        let Some(action) = table.get(&fired.id()) else {
            return Resolution::Unbound;
        };

        match action.modifier {
            Some(modifier) if !state.is_held(&modifier) => Resolution::Suppressed { modifier },
            _ => Resolution::Matched(Arc::clone(action)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{HatDirection, InputStateTracker, RawInputEvent};
    use crate::mapping::action::SequenceStep;
    use crate::mapping::keys::KeyId;

    fn table() -> MappingTable {
        MappingTable::from_actions(
            "test",
            vec![
                ActionConfig::new(
                    InputId::Button(29),
                    vec![SequenceStep::press(KeyId::Char('a'))],
                )
                .with_modifier(InputId::Button(23)),
                ActionConfig::new(
                    InputId::hat(0, HatDirection::Up),
                    vec![SequenceStep::press(KeyId::Char('v'))],
                ),
            ],
        )
        .table
    }

    #[test]
    fn unbound_input_resolves_to_nothing() {
        let tracker = InputStateTracker::new();
        let fired = FiredInput(InputId::Button(99));
        assert_eq!(
            ActionResolver::resolve_detailed(fired, &table(), tracker.state()),
            Resolution::Unbound
        );
        assert!(ActionResolver::resolve(fired, &MappingTable::empty(), tracker.state()).is_none());
    }

    #[test]
    fn modifier_gates_resolution() {
        let table = table();
        let mut tracker = InputStateTracker::new();
        let fired = FiredInput(InputId::Button(29));

        assert_eq!(
            ActionResolver::resolve_detailed(fired, &table, tracker.state()),
            Resolution::Suppressed {
                modifier: InputId::Button(23)
            }
        );

        tracker.on_raw_event(&RawInputEvent::ButtonDown { button: 23 });
        let action = ActionResolver::resolve(fired, &table, tracker.state()).unwrap();
        assert_eq!(action.trigger, InputId::Button(29));

        tracker.on_raw_event(&RawInputEvent::ButtonUp { button: 23 });
        assert!(ActionResolver::resolve(fired, &table, tracker.state()).is_none());
    }

    #[test]
    fn unmodified_binding_always_matches() {
        let tracker = InputStateTracker::new();
        let fired = FiredInput(InputId::hat(0, HatDirection::Up));
        assert!(ActionResolver::resolve(fired, &table(), tracker.state()).is_some());
    }

    #[test]
    fn resolved_action_shares_the_table_entry() {
        let table = table();
        let tracker = InputStateTracker::new();
        let fired = FiredInput(InputId::hat(0, HatDirection::Up));
        let action = ActionResolver::resolve(fired, &table, tracker.state()).unwrap();
        assert!(Arc::ptr_eq(&action, table.get(&fired.id()).unwrap()));
    }
}
