//! # ambientr
//!
//! A dual-mode refresh scheduler for displays that alternate between an
//! interactive mode and a low-power ambient mode.
//!
//! While interactive, a cheap in-process timer drives refreshes. While ambient,
//! an exact wake alarm (or only the platform's coarse time tick) drives them, and
//! the processor may sleep in between. Either way refreshes land on fixed
//! wall-clock boundaries: `delay = interval - (now mod interval)`.
//!
//! ## Architecture
//!
//! - **Scheduler**: `schedule` owns the state machine, `schedule::alignment` the
//!   boundary arithmetic, `schedule::timers` the collaborator traits
//! - **Runtime**: `runtime` is the single-threaded event loop behind both timer
//!   primitives, with processor sleep and time tick modelling
//! - **Surfaces**: `surfaces` holds the demo display collaborators
//! - **Host**: `host` wires a surface, its schedule and the loop together and
//!   turns lifecycle events into scheduler calls
//! - **Infrastructure**: configuration, CLI commands, signal handling, time
//!   sources and the box-drawing logger

// Logger must be first for macro availability
#[macro_use]
pub mod common;

pub mod args;
pub mod commands;
pub mod config;
pub mod host;
pub mod runtime;
pub mod schedule;
pub mod signals;
pub mod surfaces;
pub mod time_source;

pub use schedule::{DisplayMode, RefreshIntervals, RefreshSchedule, ScheduleHandle, ScheduleState};
