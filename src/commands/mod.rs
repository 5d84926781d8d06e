//! Command-line command handlers for ambientr.
//!
//! `run` drives a surface on the real clock, `simulate` plays a scripted scenario
//! on a simulated one. Both end by printing the same run summary.

pub mod run;
pub mod simulate;

use crate::common::utils::format_millis;
use crate::host::RunSummary;
use crate::schedule::ScheduleState;

/// Print the totals of a finished run.
pub fn log_run_summary(summary: &RunSummary, elapsed_ms: u64) {
    log_block_start!("Run summary: {}", summary.surface);
    log_indented!("Elapsed: {}", format_millis(elapsed_ms));
    log_indented!(
        "Refreshes: {} interactive, {} ambient",
        summary.frames.interactive,
        summary.frames.ambient
    );

    let stats = summary.loop_stats;
    log_indented!(
        "Fast timers fired: {} ({} dropped while asleep)",
        stats.fast_timers_fired,
        stats.fast_timers_dropped
    );
    log_indented!("Wake alarms fired: {}", stats.wake_alarms_fired);
    log_indented!("Time ticks: {}", stats.time_ticks);
    if stats.stale_deliveries > 0 {
        log_indented!("Stale deliveries ignored: {}", stats.stale_deliveries);
    }

    let final_state = match summary.final_state {
        Some(ScheduleState::Stopped) => "stopped",
        Some(ScheduleState::RunningInteractive) => "running (interactive)",
        Some(ScheduleState::RunningAmbient) => "running (ambient)",
        None => "destroyed",
    };
    log_indented!("Final state: {final_state}");
}
