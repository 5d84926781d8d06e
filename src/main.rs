//! Main application entry point.
//!
//! Parses the command line, loads configuration and hands off to the matching
//! command:
//!
//! 1. Help and version exit early
//! 2. `--config` fixes the configuration directory before anything loads it
//! 3. `run` drives a surface on the real clock until a stop signal
//! 4. `simulate` plays a script on a simulated clock and prints a summary

use anyhow::Result;

use ambientr::args::{self, CliAction, ParsedArgs};
use ambientr::commands;
use ambientr::commands::simulate::SimulationOptions;
use ambientr::common::constants::*;
use ambientr::config::{self, Config};
use ambientr::{log_debug, log_end, log_error_exit, log_pipe, log_version};

fn main() {
    let parsed_args = ParsedArgs::from_env();

    let exit_code = match parsed_args.action {
        CliAction::ShowVersion => {
            args::display_version_info();
            EXIT_SUCCESS
        }
        CliAction::ShowHelp => {
            args::display_help();
            EXIT_SUCCESS
        }
        CliAction::ShowHelpDueToError => {
            args::display_help();
            EXIT_FAILURE
        }
        action => match dispatch(action) {
            Ok(()) => EXIT_SUCCESS,
            Err(e) => {
                log_error_exit!("{e:#}");
                EXIT_FAILURE
            }
        },
    };

    std::process::exit(exit_code);
}

fn dispatch(action: CliAction) -> Result<()> {
    match action {
        CliAction::Run {
            debug_enabled,
            surface,
            config_dir,
        } => {
            config::set_config_dir(config_dir)?;

            log_version!();
            if debug_enabled {
                log_pipe!();
                log_debug!("Debug mode enabled - showing scheduler decisions");
            }

            let config = Config::load()?;
            commands::run::handle_run_command(&config, surface, debug_enabled)?;
            log_end!();
            Ok(())
        }
        CliAction::Simulate {
            debug_enabled,
            surface,
            start_time,
            duration_secs,
            script,
            multiplier,
            log_to_file,
            config_dir,
        } => {
            config::set_config_dir(config_dir)?;
            let config = Config::load()?;

            // The simulate command prints its own header once the clock exists
            let options = SimulationOptions {
                surface,
                start_time,
                duration_secs,
                script,
                multiplier,
                log_to_file,
            };
            commands::simulate::handle_simulate_command(&config, &options, debug_enabled)?;
            Ok(())
        }
        CliAction::ShowHelp | CliAction::ShowHelpDueToError | CliAction::ShowVersion => Ok(()),
    }
}
