//! Edge detection over raw input events.
//!
//! The tracker owns the only copy of [`InputState`]. It never looks at
//! bindings: it turns raw events into [`FiredInput`] edges and nothing else.

use crate::controller::input_types::{FiredInput, HatDirection, InputId, RawInputEvent};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

/// Which buttons are held and where each hat currently points
#[derive(Clone, Debug, Default)]
pub struct InputState {
    held: HashSet<InputId>,
    hats: HashMap<u8, HatDirection>,
}

impl InputState {
    /// Returns true if `id` is in the held set. Hat ids are never held.
    pub fn is_held(&self, id: &InputId) -> bool {
        self.held.contains(id)
    }

    pub fn held(&self) -> impl Iterator<Item = &InputId> {
        self.held.iter()
    }

    /// Last recorded direction for a hat, centered if never seen
    pub fn hat_direction(&self, hat: u8) -> HatDirection {
        self.hats.get(&hat).copied().unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct InputStateTracker {
    state: InputState,
}

impl InputStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &InputState {
        &self.state
    }

    /// Applies one raw event and reports the edge it produced, if any.
    ///
    /// A button fires on its first down edge only; repeated downs while held
    /// are device auto-repeat. A hat fires once per change to a new
    /// non-centered direction.
    pub fn on_raw_event(&mut self, event: &RawInputEvent) -> Option<FiredInput> {
        match *event {
            RawInputEvent::ButtonDown { button } => {
                let id = InputId::Button(button);
                if self.state.held.insert(id) {
                    debug!("{} pressed", id);
                    Some(FiredInput(id))
                } else {
                    trace!("{} auto-repeat ignored", id);
                    None
                }
            }
            RawInputEvent::ButtonUp { button } => {
                let id = InputId::Button(button);
                if self.state.held.remove(&id) {
                    debug!("{} released", id);
                }
                None
            }
            RawInputEvent::HatMotion { hat, direction } => {
                let previous = self.state.hats.insert(hat, direction).unwrap_or_default();
                if previous == direction {
                    trace!("HAT_{} still {}", hat, direction);
                    return None;
                }
                debug!("HAT_{} moved {} -> {}", hat, previous, direction);
                if direction.is_centered() {
                    None
                } else {
                    Some(FiredInput(InputId::hat(hat, direction)))
                }
            }
            RawInputEvent::DeviceReset => {
                debug!(
                    "Device reset, releasing {} held button(s)",
                    self.state.held().count()
                );
                self.clear();
                None
            }
        }
    }

    /// Forgets all held buttons and hat positions
    pub fn clear(&mut self) {
        self.state = InputState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn down(button: u32) -> RawInputEvent {
        RawInputEvent::ButtonDown { button }
    }

    fn up(button: u32) -> RawInputEvent {
        RawInputEvent::ButtonUp { button }
    }

    fn hat(direction: HatDirection) -> RawInputEvent {
        RawInputEvent::HatMotion { hat: 0, direction }
    }

    #[test]
    fn button_fires_once_until_released() {
        let mut tracker = InputStateTracker::new();

        assert_eq!(
            tracker.on_raw_event(&down(5)),
            Some(FiredInput(InputId::Button(5)))
        );
        assert_eq!(tracker.on_raw_event(&down(5)), None);
        assert!(tracker.state().is_held(&InputId::Button(5)));

        assert_eq!(tracker.on_raw_event(&up(5)), None);
        assert!(!tracker.state().is_held(&InputId::Button(5)));

        assert_eq!(
            tracker.on_raw_event(&down(5)),
            Some(FiredInput(InputId::Button(5)))
        );
    }

    #[test]
    fn release_of_unknown_button_is_harmless() {
        let mut tracker = InputStateTracker::new();
        assert_eq!(tracker.on_raw_event(&up(9)), None);
        assert_eq!(tracker.state().held().count(), 0);
    }

    #[test]
    fn hat_fires_per_distinct_direction() {
        let mut tracker = InputStateTracker::new();

        assert_eq!(
            tracker.on_raw_event(&hat(HatDirection::Up)),
            Some(FiredInput(InputId::hat(0, HatDirection::Up)))
        );
        assert_eq!(tracker.on_raw_event(&hat(HatDirection::Up)), None);
        assert_eq!(
            tracker.on_raw_event(&hat(HatDirection::UpRight)),
            Some(FiredInput(InputId::hat(0, HatDirection::UpRight)))
        );
        assert_eq!(tracker.on_raw_event(&hat(HatDirection::Centered)), None);
        assert_eq!(tracker.state().hat_direction(0), HatDirection::Centered);
        assert_eq!(
            tracker.on_raw_event(&hat(HatDirection::Up)),
            Some(FiredInput(InputId::hat(0, HatDirection::Up)))
        );
    }

    #[test]
    fn hats_are_tracked_independently_and_never_held() {
        let mut tracker = InputStateTracker::new();
        tracker.on_raw_event(&RawInputEvent::HatMotion {
            hat: 1,
            direction: HatDirection::Left,
        });

        assert_eq!(tracker.state().hat_direction(1), HatDirection::Left);
        assert_eq!(tracker.state().hat_direction(0), HatDirection::Centered);
        assert!(!tracker
            .state()
            .is_held(&InputId::hat(1, HatDirection::Left)));
        assert_eq!(
            tracker.on_raw_event(&hat(HatDirection::Left)),
            Some(FiredInput(InputId::hat(0, HatDirection::Left)))
        );
    }

    #[test]
    fn device_reset_releases_buttons_and_centers_hats() {
        let mut tracker = InputStateTracker::new();
        tracker.on_raw_event(&down(23));
        tracker.on_raw_event(&hat(HatDirection::Down));

        assert_eq!(tracker.on_raw_event(&RawInputEvent::DeviceReset), None);
        assert!(!tracker.state().is_held(&InputId::Button(23)));
        assert_eq!(tracker.state().held().count(), 0);
        assert_eq!(tracker.state().hat_direction(0), HatDirection::Centered);

        // the same inputs on the replacement pad fire again
        assert!(tracker.on_raw_event(&down(23)).is_some());
        assert_eq!(
            tracker.on_raw_event(&hat(HatDirection::Down)),
            Some(FiredInput(InputId::hat(0, HatDirection::Down)))
        );
    }
}
