//! Output key identifiers.
//!
//! A key is either a single character or a named key written `KEY_<NAME>`.

use std::fmt;
use std::str::FromStr;

macro_rules! named_keys {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// Non-character keys understood by the output sinks
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum NamedKey {
            $($variant,)*
            /// Function key F1..F24
            F(u8),
        }

        impl NamedKey {
            pub fn name(&self) -> String {
                match self {
                    $(NamedKey::$variant => $name.to_string(),)*
                    NamedKey::F(n) => format!("f{}", n),
                }
            }

            fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(NamedKey::$variant),)*
                    _ => name
                        .strip_prefix('f')
                        .and_then(|n| n.parse::<u8>().ok())
                        .filter(|n| (1..=24).contains(n))
                        .map(NamedKey::F),
                }
            }
        }
    };
}

named_keys! {
    Alt => "alt",
    AltL => "alt_l",
    AltR => "alt_r",
    AltGr => "alt_gr",
    Backspace => "backspace",
    CapsLock => "caps_lock",
    Cmd => "cmd",
    Ctrl => "ctrl",
    CtrlL => "ctrl_l",
    CtrlR => "ctrl_r",
    Delete => "delete",
    Down => "down",
    End => "end",
    Enter => "enter",
    Esc => "esc",
    Home => "home",
    Insert => "insert",
    Left => "left",
    Menu => "menu",
    NumLock => "num_lock",
    PageDown => "page_down",
    PageUp => "page_up",
    Pause => "pause",
    PrintScreen => "print_screen",
    Right => "right",
    ScrollLock => "scroll_lock",
    Shift => "shift",
    ShiftL => "shift_l",
    ShiftR => "shift_r",
    Space => "space",
    Tab => "tab",
    Up => "up",
}

/// A key the sequence executor presses
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyId {
    Char(char),
    Named(NamedKey),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyParseError {
    #[error("empty key name")]
    Empty,

    #[error("unknown key '{0}' (use a single character or KEY_<NAME>)")]
    Unknown(String),
}

impl FromStr for KeyId {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(KeyParseError::Empty);
        }

        let mut chars = s.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Ok(KeyId::Char(c));
        }

        if let Some(prefix) = s.get(..4) {
            if prefix.eq_ignore_ascii_case("KEY_") {
                let name = s[4..].to_ascii_lowercase();
                if let Some(named) = NamedKey::from_name(&name) {
                    return Ok(KeyId::Named(named));
                }
            }
        }

        Err(KeyParseError::Unknown(s.to_string()))
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyId::Char(c) => write!(f, "{}", c),
            KeyId::Named(named) => write!(f, "KEY_{}", named.name().to_ascii_uppercase()),
        }
    }
}
