//! Application-wide constants: defaults, validation limits and exit codes.

use crate::surfaces::SurfaceKind;

// # Host Defaults

pub const DEFAULT_SURFACE: SurfaceKind = SurfaceKind::DailyTotal;

/// Period of the platform's coarse tick while ambient (once per minute).
pub const DEFAULT_TIME_TICK_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_SLEEP_IN_AMBIENT: bool = true;

// # Surface Defaults

pub const DEFAULT_INTERACTIVE_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_AMBIENT_INTERVAL_MS: u64 = 20_000;
pub const DEFAULT_AMBIENT_WAKE: bool = true;

pub const DEFAULT_WATCH_FACE_INTERACTIVE_INTERVAL_MS: u64 = 500;
pub const DEFAULT_WATCH_FACE_AMBIENT_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_WATCH_FACE_AMBIENT_WAKE: bool = false;
pub const DEFAULT_WATCH_FACE_MUTED_INTERVAL_MS: u64 = 60_000;

// # Validation Limits

pub const MINIMUM_INTERACTIVE_INTERVAL_MS: u64 = 10;
pub const MAXIMUM_INTERACTIVE_INTERVAL_MS: u64 = 3_600_000;

// Wake alarms below one second are throttled by the platform
pub const MINIMUM_AMBIENT_INTERVAL_MS: u64 = 1_000;
pub const MAXIMUM_AMBIENT_INTERVAL_MS: u64 = 3_600_000;

pub const MINIMUM_TIME_TICK_INTERVAL_MS: u64 = 1_000;
pub const MAXIMUM_TIME_TICK_INTERVAL_MS: u64 = 3_600_000;

// # Simulation

pub const DEFAULT_SIMULATION_DURATION_SECS: u64 = 180;
pub const DEFAULT_SIMULATION_SCRIPT: &str = "0:visible,5:ambient,125:interactive,130:hidden";
/// Multiplier 0 means fast-forward: sleeps complete instantly.
pub const DEFAULT_SIMULATION_MULTIPLIER: f64 = 0.0;

// # Live Run

/// Upper bound on a single wait so shutdown requests are noticed promptly.
pub const MAXIMUM_WAIT_SLICE_MS: u64 = 250;

// # Exit Codes

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

#[cfg(test)]
pub mod test_constants {
    pub const TEST_INTERACTIVE_INTERVAL_MS: u64 = 1_000;
    pub const TEST_AMBIENT_INTERVAL_MS: u64 = 20_000;
    pub const TEST_TIME_TICK_INTERVAL_MS: u64 = 60_000;
}
