//! Configuration system for ambientr.
//!
//! Settings live in `ambientr.toml`, found in `$XDG_CONFIG_HOME/ambientr/` or in
//! the directory passed with `--config`. A commented default file is written on
//! first run.
//!
//! ```toml
//! #[Host]
//! surface = "daily_total"       # Surface to show: "daily_total", "step_counter", "watch_face"
//! time_tick_interval_ms = 60000 # Platform time tick period while ambient (1000-3600000)
//! sleep_in_ambient = true       # Let the processor sleep between ambient wakes
//!
//! [daily_total]
//! interactive_interval_ms = 1000 # Refresh cadence while interactive (10-3600000)
//! ambient_interval_ms = 20000    # Refresh cadence while ambient (1000-3600000)
//! ambient_wake = true            # Arm an exact wake alarm in ambient mode
//!
//! [watch_face]
//! interactive_interval_ms = 500
//! ambient_interval_ms = 60000
//! ambient_wake = false           # Ambient refreshes follow the time tick only
//! muted_interval_ms = 60000      # Interactive cadence while muted
//! ```
//!
//! Every field is optional. Missing fields take the defaults of the surface they
//! belong to, so an empty file is a valid configuration.

pub mod builder;
pub mod loading;
pub mod validation;

use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

use crate::common::constants::*;
use crate::common::utils::format_millis;
use crate::surfaces::SurfaceKind;

pub use builder::create_default_config;
pub use loading::{get_config_path, get_custom_config_dir, load, load_from_path, set_config_dir};

/// Per-surface table, e.g. `[watch_face]`.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SurfaceConfig {
    pub interactive_interval_ms: Option<u64>,
    pub ambient_interval_ms: Option<u64>,
    /// Drive ambient refreshes with an exact wake alarm instead of only the time tick.
    pub ambient_wake: Option<bool>,
    /// Interactive cadence while muted. Only the watch face has a mute mode.
    pub muted_interval_ms: Option<u64>,
}

/// Fully resolved settings for one surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSettings {
    pub interactive_interval_ms: u64,
    pub ambient_interval_ms: u64,
    pub ambient_wake: bool,
    pub muted_interval_ms: Option<u64>,
}

impl SurfaceSettings {
    /// Built-in settings for `kind`.
    pub fn defaults_for(kind: SurfaceKind) -> Self {
        match kind {
            SurfaceKind::DailyTotal | SurfaceKind::StepCounter => Self {
                interactive_interval_ms: DEFAULT_INTERACTIVE_INTERVAL_MS,
                ambient_interval_ms: DEFAULT_AMBIENT_INTERVAL_MS,
                ambient_wake: DEFAULT_AMBIENT_WAKE,
                muted_interval_ms: None,
            },
            SurfaceKind::WatchFace => Self {
                interactive_interval_ms: DEFAULT_WATCH_FACE_INTERACTIVE_INTERVAL_MS,
                ambient_interval_ms: DEFAULT_WATCH_FACE_AMBIENT_INTERVAL_MS,
                ambient_wake: DEFAULT_WATCH_FACE_AMBIENT_WAKE,
                muted_interval_ms: Some(DEFAULT_WATCH_FACE_MUTED_INTERVAL_MS),
            },
        }
    }

    fn overlay(self, config: &SurfaceConfig) -> Self {
        Self {
            interactive_interval_ms: config
                .interactive_interval_ms
                .unwrap_or(self.interactive_interval_ms),
            ambient_interval_ms: config.ambient_interval_ms.unwrap_or(self.ambient_interval_ms),
            ambient_wake: config.ambient_wake.unwrap_or(self.ambient_wake),
            muted_interval_ms: config.muted_interval_ms.or(self.muted_interval_ms),
        }
    }
}

/// Configuration structure for ambientr.
///
/// ## Configuration Categories
///
/// - **Host**: `surface`, `time_tick_interval_ms`, `sleep_in_ambient`
/// - **Surfaces**: one optional table per surface with its cadences and ambient
///   wake policy
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Surface shown when none is given on the command line.
    pub surface: Option<SurfaceKind>,
    /// Period of the platform's coarse tick while ambient.
    pub time_tick_interval_ms: Option<u64>,
    /// Whether the processor sleeps while ambient, dropping fast timers.
    pub sleep_in_ambient: Option<bool>,

    pub daily_total: Option<SurfaceConfig>,
    pub step_counter: Option<SurfaceConfig>,
    pub watch_face: Option<SurfaceConfig>,
}

impl Config {
    pub fn surface(&self) -> SurfaceKind {
        self.surface.unwrap_or(DEFAULT_SURFACE)
    }

    pub fn time_tick_interval_ms(&self) -> u64 {
        self.time_tick_interval_ms
            .unwrap_or(DEFAULT_TIME_TICK_INTERVAL_MS)
    }

    pub fn sleep_in_ambient(&self) -> bool {
        self.sleep_in_ambient.unwrap_or(DEFAULT_SLEEP_IN_AMBIENT)
    }

    /// The table for `kind`, if the file has one.
    pub fn surface_config(&self, kind: SurfaceKind) -> Option<&SurfaceConfig> {
        match kind {
            SurfaceKind::DailyTotal => self.daily_total.as_ref(),
            SurfaceKind::StepCounter => self.step_counter.as_ref(),
            SurfaceKind::WatchFace => self.watch_face.as_ref(),
        }
    }

    fn surface_config_mut(&mut self, kind: SurfaceKind) -> &mut Option<SurfaceConfig> {
        match kind {
            SurfaceKind::DailyTotal => &mut self.daily_total,
            SurfaceKind::StepCounter => &mut self.step_counter,
            SurfaceKind::WatchFace => &mut self.watch_face,
        }
    }

    /// Resolved settings for `kind`, file values over built-in defaults.
    pub fn surface_settings(&self, kind: SurfaceKind) -> SurfaceSettings {
        let defaults = SurfaceSettings::defaults_for(kind);
        match self.surface_config(kind) {
            Some(config) => defaults.overlay(config),
            None => defaults,
        }
    }

    /// Load configuration using the module's load function
    pub fn load() -> Result<Self> {
        load()
    }

    /// Load from path using the module's load_from_path function
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        load_from_path(path)
    }

    /// Get configuration path using the module's get_config_path function
    pub fn get_config_path() -> Result<PathBuf> {
        get_config_path()
    }

    pub fn log_config(&self, active: SurfaceKind) {
        let source = match get_custom_config_dir() {
            Some(_) => "custom configuration",
            None => "default configuration",
        };
        log_block_start!("Loaded {source}");

        let settings = self.surface_settings(active);
        log_indented!("Surface: {active}");
        log_indented!(
            "Interactive: every {}",
            format_millis(settings.interactive_interval_ms)
        );
        if settings.ambient_wake {
            log_indented!(
                "Ambient: every {} (wake alarm)",
                format_millis(settings.ambient_interval_ms)
            );
        } else {
            log_indented!(
                "Ambient: on the {} time tick",
                format_millis(self.time_tick_interval_ms())
            );
        }
        if let Some(muted) = settings.muted_interval_ms {
            log_indented!("Muted: every {}", format_millis(muted));
        }
        log_indented!(
            "Processor sleeps in ambient: {}",
            if self.sleep_in_ambient() { "yes" } else { "no" }
        );
    }
}
