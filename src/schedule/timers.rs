//! Collaborator interfaces the scheduler calls out to.
//!
//! The scheduler owns none of the platform facilities it drives. Refreshing the
//! display, reading the display mode and arming timers are all reached through
//! the traits below so the same schedule can run on the event loop in
//! [`crate::runtime`] or against mocks in tests.

use anyhow::Result;
use std::fmt;
use std::time::Duration;

use super::DisplayMode;

/// Stable identity of one schedule's timer and alarm registrations.
///
/// Derived from the surface name with FNV-1a, so a surface recreated after a
/// process restart gets the same token and can cancel an alarm its previous
/// incarnation left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(u64);

impl TimerToken {
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    pub fn for_surface(name: &str) -> Self {
        let hash = name.bytes().fold(Self::FNV_OFFSET_BASIS, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(Self::FNV_PRIME)
        });
        Self(hash)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Which primitive a registration belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WakeKind {
    /// Cheap deferred callback; cannot wake a sleeping processor.
    FastTimer,
    /// Exact wake-capable alarm; fires even from sleep.
    WakeAlarm,
}

impl WakeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WakeKind::FastTimer => "fast timer",
            WakeKind::WakeAlarm => "wake alarm",
        }
    }
}

/// What a refresh target is told about the refresh it is performing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshContext {
    /// Wall-clock time of the refresh in epoch milliseconds.
    pub now_ms: u64,
    pub mode: DisplayMode,
    /// Interval driving the current mode.
    pub interval_ms: u64,
    /// 1-based count of refreshes this schedule has performed.
    pub refresh_count: u64,
}

/// The display/data collaborator: repaints or recomputes what is shown.
///
/// Synchronous, idempotent, with side effects on its own surface only.
pub trait Refresh {
    fn refresh(&mut self, frame: &RefreshContext);
}

/// Answers "is low-power mode active".
#[cfg_attr(test, mockall::automock)]
pub trait ModeSource {
    fn is_ambient(&self) -> Result<bool>;
}

/// Answers "is the surface currently shown".
#[cfg_attr(test, mockall::automock)]
pub trait VisibilitySource {
    fn is_visible(&self) -> Result<bool>;
}

/// One-shot deferred callback on the owning thread.
///
/// May be silently dropped while the processor sleeps. Cancelling a token with
/// nothing scheduled must be a no-op.
#[cfg_attr(test, mockall::automock)]
pub trait FastTimer {
    fn schedule_once(&mut self, delay: Duration, token: TimerToken);
    fn cancel(&mut self, token: TimerToken);
}

/// Exact wake-capable alarm at an absolute wall-clock time.
///
/// Cancelling a token with nothing scheduled must be a no-op.
#[cfg_attr(test, mockall::automock)]
pub trait WakeAlarm {
    fn schedule_exact_wake(&mut self, trigger_at_ms: u64, token: TimerToken);
    fn cancel(&mut self, token: TimerToken);
}
