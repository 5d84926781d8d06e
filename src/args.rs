//! Command-line argument parsing and processing.
//!
//! Handles the `run` and `simulate` commands plus the standard help, version
//! and debug flags. Unknown options fall back to help with an error status.

use crate::common::constants::*;
use crate::surfaces::SurfaceKind;

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Drive a surface on the real clock until a stop signal arrives
    Run {
        debug_enabled: bool,
        surface: Option<SurfaceKind>,
        config_dir: Option<String>,
    },
    /// Play a scripted scenario on a simulated clock
    Simulate {
        debug_enabled: bool,
        surface: Option<SurfaceKind>,
        /// Simulated start, `YYYY-MM-DD HH:MM:SS`; now when absent
        start_time: Option<String>,
        duration_secs: u64,
        script: String,
        multiplier: f64,
        log_to_file: bool,
        config_dir: Option<String>,
    },

    /// Display help information and exit
    ShowHelp,
    /// Display version information and exit
    ShowVersion,
    /// Show help due to unknown or malformed arguments and exit
    ShowHelpDueToError,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

enum Command {
    Run,
    Simulate,
}

impl ParsedArgs {
    /// Parse command-line arguments into a structured result.
    ///
    /// The first element is the program name and is skipped. Help and version
    /// flags take precedence over everything else.
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args_vec: Vec<String> = args
            .into_iter()
            .skip(1)
            .map(|s| s.as_ref().to_string())
            .collect();

        if args_vec
            .iter()
            .any(|arg| arg == "--version" || arg == "-V" || arg == "-v")
        {
            return ParsedArgs {
                action: CliAction::ShowVersion,
            };
        }
        if args_vec
            .iter()
            .any(|arg| arg == "--help" || arg == "-h" || arg == "help")
        {
            return ParsedArgs {
                action: CliAction::ShowHelp,
            };
        }

        let action = Self::parse_action(&args_vec).unwrap_or_else(|message| {
            log_error!("{message}");
            CliAction::ShowHelpDueToError
        });

        ParsedArgs { action }
    }

    fn parse_action(args_vec: &[String]) -> Result<CliAction, String> {
        let mut command: Option<Command> = None;
        let mut debug_enabled = false;
        let mut surface: Option<SurfaceKind> = None;
        let mut config_dir: Option<String> = None;
        let mut start_time: Option<String> = None;
        let mut duration_secs: Option<u64> = None;
        let mut script: Option<String> = None;
        let mut multiplier: Option<f64> = None;
        let mut log_to_file = false;

        let mut iter = args_vec.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "run" | "simulate" | "sim" if command.is_some() => {
                    return Err(format!("Cannot use multiple commands at once: '{arg}'"));
                }
                "run" => command = Some(Command::Run),
                "simulate" | "sim" => command = Some(Command::Simulate),
                "--debug" | "-d" => debug_enabled = true,
                "--surface" | "-s" => {
                    let value = next_value(&mut iter, arg)?;
                    surface = Some(value.parse::<SurfaceKind>()?);
                }
                "--config" | "-c" => config_dir = Some(next_value(&mut iter, arg)?.clone()),
                "--duration" => {
                    let value = next_value(&mut iter, arg)?;
                    let secs = value.parse::<u64>().map_err(|_| {
                        format!("Invalid duration '{value}', expected whole seconds")
                    })?;
                    if secs == 0 {
                        return Err("Duration must be at least one second".to_string());
                    }
                    duration_secs = Some(secs);
                }
                "--start" => start_time = Some(next_value(&mut iter, arg)?.clone()),
                "--script" => script = Some(next_value(&mut iter, arg)?.clone()),
                "--multiplier" | "-m" => {
                    let value = next_value(&mut iter, arg)?;
                    let parsed = value
                        .parse::<f64>()
                        .ok()
                        .filter(|m| m.is_finite() && *m >= 0.0)
                        .ok_or_else(|| {
                            format!("Invalid multiplier '{value}', expected a number >= 0")
                        })?;
                    multiplier = Some(parsed);
                }
                "--log" => log_to_file = true,
                other => return Err(format!("Unknown argument: {other}")),
            }
        }

        let is_simulation = matches!(command, Some(Command::Simulate));
        if !is_simulation
            && (start_time.is_some()
                || duration_secs.is_some()
                || script.is_some()
                || multiplier.is_some()
                || log_to_file)
        {
            return Err("Simulation options only apply to 'simulate'".to_string());
        }

        Ok(if is_simulation {
            CliAction::Simulate {
                debug_enabled,
                surface,
                start_time,
                duration_secs: duration_secs.unwrap_or(DEFAULT_SIMULATION_DURATION_SECS),
                script: script.unwrap_or_else(|| DEFAULT_SIMULATION_SCRIPT.to_string()),
                multiplier: multiplier.unwrap_or(DEFAULT_SIMULATION_MULTIPLIER),
                log_to_file,
                config_dir,
            }
        } else {
            CliAction::Run {
                debug_enabled,
                surface,
                config_dir,
            }
        })
    }

    /// Convenience method to parse from std::env::args()
    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }
}

fn next_value<'a>(
    iter: &mut impl Iterator<Item = &'a String>,
    flag: &str,
) -> Result<&'a String, String> {
    iter.next()
        .filter(|value| !value.starts_with('-'))
        .ok_or_else(|| format!("Missing value for {flag}"))
}

/// Displays version information using custom logging style.
pub fn display_version_info() {
    log_version!();
    log_pipe!();
    println!("┗ {}", env!("CARGO_PKG_DESCRIPTION"));
}

/// Displays custom help message using logger methods.
pub fn display_help() {
    let surfaces: Vec<&str> = SurfaceKind::ALL.iter().map(|k| k.as_str()).collect();

    log_version!();
    log_block_start!(env!("CARGO_PKG_DESCRIPTION"));
    log_block_start!("Usage:");
    log_indented!("ambientr [COMMAND] [OPTIONS]");
    log_block_start!("Commands:");
    log_indented!("run                    Drive a surface on the real clock (default)");
    log_indented!("                       SIGUSR1 toggles ambient, SIGUSR2 toggles visibility");
    log_indented!("simulate, sim          Play a scripted scenario on a simulated clock");
    log_block_start!("Options:");
    log_indented!("-c, --config <dir>     Use custom configuration directory");
    log_indented!("-d, --debug            Enable detailed debug output");
    log_indented!("-h, --help             Print help information");
    log_indented!("-s, --surface <name>   Surface to drive: {}", surfaces.join(", "));
    log_indented!("-V, --version          Print version information");
    log_block_start!("Simulation options:");
    log_indented!("--start <datetime>     Simulated start, \"YYYY-MM-DD HH:MM:SS\" (default now)");
    log_indented!(
        "--duration <secs>      Simulated run length (default {DEFAULT_SIMULATION_DURATION_SECS})"
    );
    log_indented!("--script <events>      Comma separated <secs>:<event> steps");
    log_indented!("                       (default \"{DEFAULT_SIMULATION_SCRIPT}\")");
    log_indented!("                       events: visible, hidden, ambient, interactive,");
    log_indented!("                               steps=<n>, tap, mute, unmute, destroy");
    log_indented!("-m, --multiplier <n>   Clock speed, 0 fast-forwards (default 0)");
    log_indented!("--log                  Write output to ambientr-simulation.log");
    log_end!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliAction {
        ParsedArgs::parse(std::iter::once("ambientr").chain(args.iter().copied())).action
    }

    #[test]
    fn test_parse_no_args() {
        assert_eq!(
            parse(&[]),
            CliAction::Run {
                debug_enabled: false,
                surface: None,
                config_dir: None,
            }
        );
    }

    #[test]
    fn test_parse_run_with_options() {
        assert_eq!(
            parse(&["run", "-d", "--surface", "watch-face", "-c", "/tmp/conf"]),
            CliAction::Run {
                debug_enabled: true,
                surface: Some(SurfaceKind::WatchFace),
                config_dir: Some("/tmp/conf".to_string()),
            }
        );
    }

    #[test]
    fn test_flags_before_command() {
        assert_eq!(
            parse(&["--debug", "run"]),
            CliAction::Run {
                debug_enabled: true,
                surface: None,
                config_dir: None,
            }
        );
    }

    #[test]
    fn test_parse_simulate_defaults() {
        assert_eq!(
            parse(&["simulate"]),
            CliAction::Simulate {
                debug_enabled: false,
                surface: None,
                start_time: None,
                duration_secs: DEFAULT_SIMULATION_DURATION_SECS,
                script: DEFAULT_SIMULATION_SCRIPT.to_string(),
                multiplier: DEFAULT_SIMULATION_MULTIPLIER,
                log_to_file: false,
                config_dir: None,
            }
        );
    }

    #[test]
    fn test_parse_simulate_with_options() {
        assert_eq!(
            parse(&[
                "sim",
                "--surface",
                "step_counter",
                "--start",
                "2025-06-15 08:00:00",
                "--duration",
                "90",
                "--script",
                "0:visible,10:steps=42",
                "-m",
                "10",
                "--log",
            ]),
            CliAction::Simulate {
                debug_enabled: false,
                surface: Some(SurfaceKind::StepCounter),
                start_time: Some("2025-06-15 08:00:00".to_string()),
                duration_secs: 90,
                script: "0:visible,10:steps=42".to_string(),
                multiplier: 10.0,
                log_to_file: true,
                config_dir: None,
            }
        );
    }

    #[test]
    fn test_help_and_version_take_precedence() {
        assert_eq!(parse(&["run", "--help"]), CliAction::ShowHelp);
        assert_eq!(parse(&["-h"]), CliAction::ShowHelp);
        assert_eq!(parse(&["help"]), CliAction::ShowHelp);
        assert_eq!(parse(&["simulate", "-V"]), CliAction::ShowVersion);
        assert_eq!(parse(&["--help", "--version"]), CliAction::ShowVersion);
    }

    #[test]
    fn test_invalid_arguments_show_help() {
        assert_eq!(parse(&["--bogus"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["run", "simulate"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["--surface"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["--surface", "compass"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["--config", "-d"]), CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_simulation_options_require_simulate() {
        assert_eq!(parse(&["--duration", "10"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["run", "-m", "2"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["--log"]), CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_invalid_simulation_values() {
        assert_eq!(parse(&["sim", "--duration", "0"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["sim", "--duration", "1.5"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["sim", "-m", "fast"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["sim", "-m", "NaN"]), CliAction::ShowHelpDueToError);
    }
}
