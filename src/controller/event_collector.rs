use crate::controller::event_source::RawEventSource;
use crate::controller::input_types::{HatDirection, RawInputEvent};
use chrono::Local;
use gilrs::{Axis, Button, Event, EventType, Gamepad, GamepadId, Gilrs};
use statum::{machine, state};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Hat index reported for the gamepad's d-pad
pub const DPAD_HAT: u8 = 0;

// Collector settings
#[derive(Clone, Debug, Default)]
pub struct CollectorSettings {
    /// Index into the list of connected gamepads; first pad if unset
    pub gamepad_index: Option<usize>,
}

// Collector errors
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("Failed to initialize collector: {0}")]
    InitializationError(String),

    #[error("No gamepad connected: {0}")]
    NoGamepadError(String),

    #[error("Event source closed: {0}")]
    SourceClosed(String),
}

/// Summary of a connected pad for the event monitor
#[derive(Clone, Debug)]
pub struct GamepadInfo {
    pub index: usize,
    pub id: GamepadId,
    pub name: String,
    pub uuid: [u8; 16],
}

/// Combines d-pad buttons and d-pad axes into one hat position.
///
/// Some platforms report the d-pad as four buttons, others as two axes;
/// both feed the same pair of components.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DpadHat {
    x: i8,
    y: i8,
}

impl DpadHat {
    pub fn direction(&self) -> HatDirection {
        HatDirection::from_axes(self.x, self.y)
    }

    /// Updates from a d-pad button edge. Returns `None` for other buttons.
    pub fn apply_button(&mut self, button: Button, pressed: bool) -> Option<HatDirection> {
        let (axis_x, value) = match button {
            Button::DPadUp => (false, 1),
            Button::DPadDown => (false, -1),
            Button::DPadLeft => (true, -1),
            Button::DPadRight => (true, 1),
            _ => return None,
        };
        let component = if axis_x { &mut self.x } else { &mut self.y };
        if pressed {
            *component = value;
        } else if *component == value {
            *component = 0;
        }
        Some(self.direction())
    }

    /// Updates from a d-pad axis. Returns `None` for other axes.
    pub fn apply_axis(&mut self, axis: Axis, value: f32) -> Option<HatDirection> {
        let component = if value > 0.5 {
            1
        } else if value < -0.5 {
            -1
        } else {
            0
        };
        match axis {
            Axis::DPadX => self.x = component,
            Axis::DPadY => self.y = component,
            _ => return None,
        }
        Some(self.direction())
    }
}

// Collector states
#[state]
#[derive(Debug, Clone)]
pub enum CollectionState {
    Initializing,
    Collecting,
}

#[machine]
#[derive(Debug)]
pub struct GamepadCollector<S: CollectionState> {
    // Gilrs context
    gilrs: Gilrs,

    // Active gamepad
    active_gamepad: Option<GamepadId>,

    // Collector settings
    settings: CollectorSettings,

    // D-pad exposed as hat 0
    dpad: DpadHat,

    // Events seen since the last stats line
    event_count: u64,
}

impl<S: CollectionState> GamepadCollector<S> {
    /// Lists the currently connected gamepads
    pub fn gamepads(&self) -> Vec<GamepadInfo> {
        self.gilrs
            .gamepads()
            .enumerate()
            .map(|(index, (id, gamepad))| GamepadInfo {
                index,
                id,
                name: gamepad.name().to_string(),
                uuid: gamepad.uuid(),
            })
            .collect()
    }
}

impl GamepadCollector<Initializing> {
    pub fn create(settings: Option<CollectorSettings>) -> Result<Self, CollectorError> {
        let settings = settings.unwrap_or_default();
        debug!("Creating gamepad collector with settings: {:?}", settings);

        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(CollectorError::InitializationError(e.to_string()));
            }
        };

        Ok(Self::new(gilrs, None, settings, DpadHat::default(), 0))
    }

    /// Selects the active gamepad and transitions to Collecting.
    ///
    /// Fails when no gamepad is connected or the configured index is out of range.
    pub fn initialize(mut self) -> Result<GamepadCollector<Collecting>, CollectorError> {
        let gamepads: Vec<(GamepadId, Gamepad<'_>)> = self.gilrs.gamepads().collect();

        if gamepads.is_empty() {
            error!("No gamepad connected");
            return Err(CollectorError::NoGamepadError(
                "gilrs reported no connected gamepads".to_string(),
            ));
        }

        info!("Found {} gamepads:", gamepads.len());
        for (idx, (id, gamepad)) in gamepads.iter().enumerate() {
            info!(
                "  [{}] ID: {}, Name: {}, UUID: {:?}",
                idx,
                id,
                gamepad.name(),
                gamepad.uuid()
            );
        }

        let index = self.settings.gamepad_index.unwrap_or(0);
        let Some((id, gamepad)) = gamepads.get(index) else {
            return Err(CollectorError::NoGamepadError(format!(
                "gamepad index {} requested but only {} connected",
                index,
                gamepads.len()
            )));
        };
        let id = *id;
        info!("Selected gamepad: {} ({})", gamepad.name(), id);
        drop(gamepads);

        self.active_gamepad = Some(id);
        Ok(self.transition())
    }
}

impl GamepadCollector<Collecting> {
    fn convert_gilrs_event(&mut self, id: GamepadId, event: EventType) -> Option<RawInputEvent> {
        match event {
            EventType::Connected => {
                if self.active_gamepad.is_none() {
                    info!("Gamepad {} connected, adopting it as active", id);
                    self.active_gamepad = Some(id);
                }
                return None;
            }
            EventType::Disconnected if Some(id) == self.active_gamepad => {
                self.dpad = DpadHat::default();
                self.active_gamepad = self
                    .gilrs
                    .gamepads()
                    .map(|(other, _)| other)
                    .find(|other| *other != id);
                match self.active_gamepad {
                    Some(next) => warn!("Active gamepad {} disconnected, switching to {}", id, next),
                    None => warn!("Active gamepad {} disconnected, waiting for a new one", id),
                }
                return Some(RawInputEvent::DeviceReset);
            }
            _ => {}
        }

        if self.active_gamepad != Some(id) {
            debug!("Skipping event from non-active gamepad: {:?}", id);
            return None;
        }

        let now = Local::now();
        match event {
            EventType::ButtonPressed(button, code) | EventType::ButtonRepeated(button, code) => {
                if let Some(direction) = self.dpad.apply_button(button, true) {
                    return Some(RawInputEvent::HatMotion {
                        hat: DPAD_HAT,
                        direction,
                    });
                }
                let button_id = code.into_u32();
                debug!(
                    "Button pressed: {:?} (code {}) at {}",
                    button,
                    button_id,
                    now.format("%H:%M:%S.%3f")
                );
                Some(RawInputEvent::ButtonDown { button: button_id })
            }
            EventType::ButtonReleased(button, code) => {
                if let Some(direction) = self.dpad.apply_button(button, false) {
                    return Some(RawInputEvent::HatMotion {
                        hat: DPAD_HAT,
                        direction,
                    });
                }
                let button_id = code.into_u32();
                debug!(
                    "Button released: {:?} (code {}) at {}",
                    button,
                    button_id,
                    now.format("%H:%M:%S.%3f")
                );
                Some(RawInputEvent::ButtonUp { button: button_id })
            }
            EventType::AxisChanged(axis, value, _) => {
                self.dpad
                    .apply_axis(axis, value)
                    .map(|direction| RawInputEvent::HatMotion {
                        hat: DPAD_HAT,
                        direction,
                    })
            }
            _ => None,
        }
    }
}

impl RawEventSource for GamepadCollector<Collecting> {
    fn next_event(&mut self, timeout: Duration) -> Result<Option<RawInputEvent>, CollectorError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            let Some(Event { id, event, .. }) = self.gilrs.next_event_blocking(Some(remaining))
            else {
                return Ok(None);
            };

            if let Some(raw_event) = self.convert_gilrs_event(id, event) {
                self.event_count += 1;
                if self.event_count % 500 == 0 {
                    info!("Gamepad collector has delivered {} events", self.event_count);
                }
                return Ok(Some(raw_event));
            }
        }
    }
}
