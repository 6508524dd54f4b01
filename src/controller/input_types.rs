//! Identifiers for physical control edges and the raw events that carry them.
//!
//! The textual forms (`BUTTON_29`, `HAT_0_up-left`) are what configuration
//! files and the event monitor use.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction reported by a hat switch (POV / d-pad)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HatDirection {
    #[default]
    Centered,
    Up,
    UpRight,
    Right,
    DownRight,
    Down,
    DownLeft,
    Left,
    UpLeft,
}

impl HatDirection {
    pub const ALL_ACTIVE: [HatDirection; 8] = [
        HatDirection::Up,
        HatDirection::UpRight,
        HatDirection::Right,
        HatDirection::DownRight,
        HatDirection::Down,
        HatDirection::DownLeft,
        HatDirection::Left,
        HatDirection::UpLeft,
    ];

    /// Converts a hat axis pair into a direction.
    ///
    /// Positive `y` points up. Anything outside the unit grid counts as centered.
    pub fn from_axes(x: i8, y: i8) -> Self {
        match (x, y) {
            (0, 1) => HatDirection::Up,
            (1, 1) => HatDirection::UpRight,
            (1, 0) => HatDirection::Right,
            (1, -1) => HatDirection::DownRight,
            (0, -1) => HatDirection::Down,
            (-1, -1) => HatDirection::DownLeft,
            (-1, 0) => HatDirection::Left,
            (-1, 1) => HatDirection::UpLeft,
            _ => HatDirection::Centered,
        }
    }

    pub fn is_centered(self) -> bool {
        self == HatDirection::Centered
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HatDirection::Centered => "centered",
            HatDirection::Up => "up",
            HatDirection::UpRight => "up-right",
            HatDirection::Right => "right",
            HatDirection::DownRight => "down-right",
            HatDirection::Down => "down",
            HatDirection::DownLeft => "down-left",
            HatDirection::Left => "left",
            HatDirection::UpLeft => "up-left",
        }
    }
}

impl fmt::Display for HatDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HatDirection {
    type Err = InputIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_ascii_lowercase();
        if lowered == "centered" {
            return Ok(HatDirection::Centered);
        }
        HatDirection::ALL_ACTIVE
            .into_iter()
            .find(|direction| direction.as_str() == lowered)
            .ok_or_else(|| InputIdParseError::UnknownDirection(s.to_string()))
    }
}

/// Identifier of a physical control edge
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InputId {
    Button(u32),
    Hat { index: u8, direction: HatDirection },
}

impl InputId {
    pub fn hat(index: u8, direction: HatDirection) -> Self {
        InputId::Hat { index, direction }
    }

    pub fn is_button(&self) -> bool {
        matches!(self, InputId::Button(_))
    }
}

impl fmt::Display for InputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputId::Button(id) => write!(f, "BUTTON_{}", id),
            InputId::Hat { index, direction } => write!(f, "HAT_{}_{}", index, direction),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputIdParseError {
    #[error("unrecognised input id '{0}' (expected BUTTON_<n> or HAT_<i>_<direction>)")]
    Malformed(String),

    #[error("unknown hat direction '{0}'")]
    UnknownDirection(String),
}

impl FromStr for InputId {
    type Err = InputIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let upper = trimmed.to_ascii_uppercase();

        if let Some(number) = upper.strip_prefix("BUTTON_") {
            return number
                .parse::<u32>()
                .map(InputId::Button)
                .map_err(|_| InputIdParseError::Malformed(s.to_string()));
        }

        if upper.starts_with("HAT_") {
            // HAT_<index>_<direction>; the direction itself may contain '-'
            let rest = &trimmed[4..];
            let (index, direction) = rest
                .split_once('_')
                .ok_or_else(|| InputIdParseError::Malformed(s.to_string()))?;
            let index = index
                .parse::<u8>()
                .map_err(|_| InputIdParseError::Malformed(s.to_string()))?;
            let direction = direction.parse::<HatDirection>()?;
            return Ok(InputId::Hat { index, direction });
        }

        Err(InputIdParseError::Malformed(s.to_string()))
    }
}

/// An edge recognised by the tracker as actionable
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FiredInput(pub InputId);

impl FiredInput {
    pub fn id(&self) -> InputId {
        self.0
    }
}

impl fmt::Display for FiredInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Discrete event delivered by a raw input source
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RawInputEvent {
    ButtonDown { button: u32 },
    ButtonUp { button: u32 },
    HatMotion { hat: u8, direction: HatDirection },
    /// The source switched devices; every held button and hat is released
    DeviceReset,
}

impl fmt::Display for RawInputEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawInputEvent::ButtonDown { button } => write!(f, "BUTTON_{} down", button),
            RawInputEvent::ButtonUp { button } => write!(f, "BUTTON_{} up", button),
            RawInputEvent::HatMotion { hat, direction } => write!(f, "HAT_{}_{}", hat, direction),
            RawInputEvent::DeviceReset => f.write_str("device reset"),
        }
    }
}
