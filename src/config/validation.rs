//! Configuration validation.
//!
//! Rejects cadences the platform cannot honour and combinations that make no
//! sense, such as an ambient cadence faster than the interactive one.

use anyhow::Result;

use super::Config;
use crate::common::constants::*;
use crate::surfaces::SurfaceKind;

/// Validate every field present in `config`.
pub fn validate_config(config: &Config) -> Result<()> {
    if let Some(tick_ms) = config.time_tick_interval_ms
        && !(MINIMUM_TIME_TICK_INTERVAL_MS..=MAXIMUM_TIME_TICK_INTERVAL_MS).contains(&tick_ms)
    {
        anyhow::bail!(
            "time_tick_interval_ms ({tick_ms}) must be between {MINIMUM_TIME_TICK_INTERVAL_MS} and {MAXIMUM_TIME_TICK_INTERVAL_MS} milliseconds"
        );
    }

    for kind in SurfaceKind::ALL {
        validate_surface(config, kind)?;
    }

    Ok(())
}

fn validate_surface(config: &Config, kind: SurfaceKind) -> Result<()> {
    let Some(table) = config.surface_config(kind) else {
        return Ok(());
    };

    if let Some(interval_ms) = table.interactive_interval_ms {
        validate_interactive_interval(interval_ms, &format!("[{kind}] interactive_interval_ms"))?;
    }

    if let Some(interval_ms) = table.ambient_interval_ms
        && !(MINIMUM_AMBIENT_INTERVAL_MS..=MAXIMUM_AMBIENT_INTERVAL_MS).contains(&interval_ms)
    {
        anyhow::bail!(
            "[{kind}] ambient_interval_ms ({interval_ms}) must be between {MINIMUM_AMBIENT_INTERVAL_MS} and {MAXIMUM_AMBIENT_INTERVAL_MS} milliseconds"
        );
    }

    if let Some(interval_ms) = table.muted_interval_ms {
        if kind != SurfaceKind::WatchFace {
            anyhow::bail!("[{kind}] muted_interval_ms is only supported by [watch_face]");
        }
        validate_interactive_interval(interval_ms, &format!("[{kind}] muted_interval_ms"))?;
    }

    // Checked on resolved values so a single overridden field is compared against
    // the surface's default for the other
    let resolved = config.surface_settings(kind);
    if resolved.ambient_interval_ms < resolved.interactive_interval_ms {
        anyhow::bail!(
            "[{kind}] ambient_interval_ms ({}) must not be shorter than interactive_interval_ms ({})",
            resolved.ambient_interval_ms,
            resolved.interactive_interval_ms
        );
    }

    Ok(())
}

fn validate_interactive_interval(interval_ms: u64, field: &str) -> Result<()> {
    if !(MINIMUM_INTERACTIVE_INTERVAL_MS..=MAXIMUM_INTERACTIVE_INTERVAL_MS).contains(&interval_ms) {
        anyhow::bail!(
            "{field} ({interval_ms}) must be between {MINIMUM_INTERACTIVE_INTERVAL_MS} and {MAXIMUM_INTERACTIVE_INTERVAL_MS} milliseconds"
        );
    }
    Ok(())
}
