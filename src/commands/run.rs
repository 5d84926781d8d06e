//! Implementation of the `run` command: a surface on the real clock.
//!
//! The surface starts visible and interactive. Signals stand in for the
//! platform's lifecycle callbacks until one of the stop signals arrives.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::config::Config;
use crate::host::{ChannelEvents, Host, HostSettings, RunSummary};
use crate::signals::{SignalState, setup_signal_handler};
use crate::surfaces::SurfaceKind;
use crate::time_source::{self, RealTimeSource, TimeSource};

/// Handle the `run` command. Returns once a shutdown signal is received.
pub fn handle_run_command(
    config: &Config,
    surface: Option<SurfaceKind>,
    debug_enabled: bool,
) -> Result<RunSummary> {
    let clock: Arc<dyn TimeSource> = Arc::new(RealTimeSource);
    time_source::init_time_source(clock.clone());

    let surface = surface.unwrap_or_else(|| config.surface());
    config.log_config(surface);

    let SignalState {
        receiver,
        sender: _sender,
    } = setup_signal_handler(debug_enabled)?;

    let settings = HostSettings::from_config(config, surface).with_debug(debug_enabled);
    let mut host = Host::new(&settings, clock.clone())?;

    log_block_start!("Driving {surface} (pid {})", std::process::id());
    log_indented!("kill -USR1 toggles ambient, kill -USR2 toggles visibility");

    let started_ms = clock.now_millis();
    host.state().set_visible(true);
    host.sync_with_platform()
        .context("Failed to start the surface")?;

    let mut events = ChannelEvents::new(receiver);
    host.run(u64::MAX, &mut events)?;

    log_block_start!("Shutting down");
    let summary = host.summary();
    super::log_run_summary(&summary, clock.now_millis().saturating_sub(started_ms));

    Ok(summary)
}
