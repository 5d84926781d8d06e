//! Implementation of the `simulate` command.
//!
//! Plays a scripted scenario against a surface on a simulated clock. With a
//! multiplier of 0 the clock fast-forwards, so minutes of ambient behaviour run
//! in milliseconds and every refresh lands exactly on its boundary.

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Local, SubsecRound};
use std::sync::Arc;

use crate::config::Config;
use crate::host::script::{Timeline, parse_script};
use crate::host::{Host, HostSettings, RunSummary};
use crate::surfaces::SurfaceKind;
use crate::time_source::{self, SimulatedTimeSource, TimeSource};

/// What to simulate and how fast.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOptions {
    pub surface: Option<SurfaceKind>,
    /// `YYYY-MM-DD HH:MM:SS` in local time; the current second when absent.
    pub start_time: Option<String>,
    pub duration_secs: u64,
    pub script: String,
    pub multiplier: f64,
    pub log_to_file: bool,
}

/// Handle the `simulate` command.
pub fn handle_simulate_command(
    config: &Config,
    options: &SimulationOptions,
    debug_enabled: bool,
) -> Result<RunSummary> {
    // Script errors should surface before anything is initialized
    let steps = parse_script(&options.script).context("Invalid simulation script")?;

    let start = match &options.start_time {
        Some(text) => time_source::parse_datetime(text)
            .map_err(|e| anyhow::anyhow!("Invalid start time: {e}"))?,
        None => Local::now().trunc_subsecs(0),
    };
    let end = i64::try_from(options.duration_secs)
        .ok()
        .and_then(ChronoDuration::try_seconds)
        .and_then(|duration| start.checked_add_signed(duration))
        .context("Duration too long")?;

    let clock = Arc::new(SimulatedTimeSource::new(start, end, options.multiplier));
    let is_fast_forward = clock.is_fast_forward();
    let clock: Arc<dyn TimeSource> = clock;
    time_source::init_time_source(clock.clone());

    let _log_guard = if options.log_to_file {
        let file_name = format!(
            "ambientr-simulation-{}.log",
            Local::now().format("%Y%m%d-%H%M%S")
        );
        println!("Writing simulation output to {file_name}");
        Some(crate::common::logger::Log::start_file_logging(file_name)?)
    } else {
        None
    };

    let surface = options.surface.unwrap_or_else(|| config.surface());

    log_version!();
    config.log_config(surface);

    log_block_start!("Simulation mode");
    log_decorated!(
        "Simulating from {} to {}",
        start.format("%Y-%m-%d %H:%M:%S"),
        end.format("%Y-%m-%d %H:%M:%S")
    );
    if is_fast_forward {
        log_indented!("Time acceleration: fast-forward (instant execution)");
    } else {
        log_indented!(
            "Time acceleration: {}x (will complete in ~{:.1} seconds)",
            options.multiplier,
            options.duration_secs as f64 / options.multiplier
        );
    }
    log_indented!("Script: {} step(s)", steps.len());
    if debug_enabled {
        log_pipe!();
        log_debug!("Simulated time source initialized");
    }

    let settings = HostSettings::from_config(config, surface).with_debug(debug_enabled);
    let mut host = Host::new(&settings, clock.clone())?;

    let start_ms = clock.now_millis();
    let end_ms = options
        .duration_secs
        .checked_mul(1_000)
        .and_then(|duration_ms| start_ms.checked_add(duration_ms))
        .context("Duration too long")?;
    let mut timeline = Timeline::new(start_ms, steps);

    host.run(end_ms, &mut timeline)
        .context("Simulation stopped with an error")?;

    let summary = host.summary();
    super::log_run_summary(&summary, clock.now_millis().saturating_sub(start_ms));
    if !timeline.is_empty() {
        log_warning!("Script steps past the end of the simulation were not played");
    }
    log_end!();

    Ok(summary)
}
