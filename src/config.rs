//! Command-line arguments and program settings.

use crate::executor::ShutdownPolicy;
use clap::Parser;
use std::path::PathBuf;
use tracing::Level;

/// File name of the bindings inside the config directory
pub const BINDINGS_FILE: &str = "bindings.toml";
const APP_DIR: &str = "joymacro";

/// Gamepad to keyboard macro player
#[derive(Parser, Debug)]
#[command(name = "joymacro", version, about = "Plays keyboard macros bound to gamepad inputs")]
pub struct CliArgs {
    /// Bindings file (default: <config dir>/joymacro/bindings.toml)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write the default bindings to the bindings file and exit
    #[arg(long, conflicts_with = "joystick_events")]
    pub create_config: bool,

    /// Print connected gamepads and every input event, without playing macros
    #[arg(long)]
    pub joystick_events: bool,

    /// Index of the gamepad to use (default: first connected)
    #[arg(short, long, value_name = "INDEX")]
    pub gamepad: Option<usize>,

    /// What to do with a playing sequence on exit
    #[arg(long, value_enum, default_value_t = ShutdownPolicy::Drain)]
    pub shutdown: ShutdownPolicy,

    /// Also write logs to this file
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Run,
    CreateConfig,
    MonitorEvents,
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub mode: Mode,
    pub bindings_path: PathBuf,
    pub gamepad_index: Option<usize>,
    pub shutdown: ShutdownPolicy,
    pub log_file: Option<PathBuf>,
    pub log_level: Level,
}

impl CliArgs {
    pub fn into_settings(self) -> Settings {
        let mode = if self.create_config {
            Mode::CreateConfig
        } else if self.joystick_events {
            Mode::MonitorEvents
        } else {
            Mode::Run
        };

        let log_level = match self.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        };

        Settings {
            mode,
            bindings_path: self.config.unwrap_or_else(default_bindings_path),
            gamepad_index: self.gamepad,
            shutdown: self.shutdown,
            log_file: self.log_file,
            log_level,
        }
    }
}

/// `<config dir>/joymacro/bindings.toml`, or the working directory when the
/// platform has no config directory
pub fn default_bindings_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_default()
        .join(BINDINGS_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_run_with_drain() {
        let settings = CliArgs::parse_from(["joymacro"]).into_settings();
        assert_eq!(settings.mode, Mode::Run);
        assert_eq!(settings.shutdown, ShutdownPolicy::Drain);
        assert_eq!(settings.log_level, Level::INFO);
        assert!(settings.bindings_path.ends_with(BINDINGS_FILE));
    }

    #[test]
    fn flags_select_mode_and_options() {
        let settings = CliArgs::parse_from([
            "joymacro",
            "--config",
            "/tmp/pips.toml",
            "--create-config",
            "--shutdown",
            "abort",
            "-vv",
        ])
        .into_settings();
        assert_eq!(settings.mode, Mode::CreateConfig);
        assert_eq!(settings.bindings_path, PathBuf::from("/tmp/pips.toml"));
        assert_eq!(settings.shutdown, ShutdownPolicy::Abort);
        assert_eq!(settings.log_level, Level::TRACE);

        let monitor = CliArgs::parse_from(["joymacro", "--joystick-events", "-g", "1"]).into_settings();
        assert_eq!(monitor.mode, Mode::MonitorEvents);
        assert_eq!(monitor.gamepad_index, Some(1));
    }

    #[test]
    fn create_config_conflicts_with_monitor() {
        assert!(CliArgs::try_parse_from(["joymacro", "--create-config", "--joystick-events"]).is_err());
    }
}
