//! Display surfaces driven by a refresh schedule.
//!
//! Each surface renders its current frame into text lines when refreshed. None
//! of them know anything about timers: cadence, mode switching and alignment all
//! live in [`crate::schedule`], and the surface only sees the
//! [`RefreshContext`] of the refresh it is performing.

pub mod daily_total;
pub mod step_counter;
pub mod watch_face;

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use crate::schedule::DisplayMode;
use crate::schedule::timers::{Refresh, RefreshContext};
use crate::time_source::local_from_millis;
pub use daily_total::DailyTotal;
pub use step_counter::StepCounter;
pub use watch_face::WatchFace;

/// Which surface to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceKind {
    DailyTotal,
    StepCounter,
    WatchFace,
}

impl SurfaceKind {
    pub const ALL: [SurfaceKind; 3] = [
        SurfaceKind::DailyTotal,
        SurfaceKind::StepCounter,
        SurfaceKind::WatchFace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SurfaceKind::DailyTotal => "daily_total",
            SurfaceKind::StepCounter => "step_counter",
            SurfaceKind::WatchFace => "watch_face",
        }
    }
}

impl fmt::Display for SurfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SurfaceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        SurfaceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| {
                let valid: Vec<&str> = SurfaceKind::ALL.iter().map(|k| k.as_str()).collect();
                format!("Unknown surface '{s}'. Valid surfaces: {}", valid.join(", "))
            })
    }
}

/// One rendered frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub at_ms: u64,
    pub mode: DisplayMode,
    pub lines: Vec<String>,
}

/// Refreshes performed, split by mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameCounter {
    pub interactive: u64,
    pub ambient: u64,
}

impl FrameCounter {
    pub fn record(&mut self, mode: DisplayMode) {
        match mode {
            DisplayMode::Interactive => self.interactive += 1,
            DisplayMode::Ambient => self.ambient += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.interactive + self.ambient
    }
}

/// A refresh target the host can inspect.
pub trait Surface: Refresh {
    fn kind(&self) -> SurfaceKind;

    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    fn last_frame(&self) -> Option<&Frame>;

    fn frames(&self) -> FrameCounter;
}

/// `HH:MM:SS` in local time, or a placeholder for an unrepresentable instant.
pub(crate) fn clock_text(at_ms: u64, format: &str) -> String {
    local_from_millis(at_ms)
        .map(|time| time.format(format).to_string())
        .unwrap_or_else(|_| "--:--:--".to_string())
}

pub(crate) fn echo_frame(kind: SurfaceKind, count: u64, frame: &Frame) {
    log_decorated!("{kind} #{count} [{}]", frame.mode);
    for line in &frame.lines {
        log_indented!("{line}");
    }
}

/// Owning handle over whichever surface the host was built with.
#[derive(Clone)]
pub enum SurfaceHandle {
    DailyTotal(Rc<RefCell<DailyTotal>>),
    StepCounter(Rc<RefCell<StepCounter>>),
    WatchFace(Rc<RefCell<WatchFace>>),
}

impl SurfaceHandle {
    pub fn new(kind: SurfaceKind, echo: bool) -> Self {
        match kind {
            SurfaceKind::DailyTotal => {
                SurfaceHandle::DailyTotal(Rc::new(RefCell::new(DailyTotal::new(echo))))
            }
            SurfaceKind::StepCounter => {
                SurfaceHandle::StepCounter(Rc::new(RefCell::new(StepCounter::new(echo))))
            }
            SurfaceKind::WatchFace => {
                SurfaceHandle::WatchFace(Rc::new(RefCell::new(WatchFace::new(echo))))
            }
        }
    }

    /// The strong reference a schedule downgrades to its refresh target.
    pub fn refresh_target(&self) -> Rc<RefCell<dyn Refresh>> {
        match self {
            SurfaceHandle::DailyTotal(surface) => surface.clone(),
            SurfaceHandle::StepCounter(surface) => surface.clone(),
            SurfaceHandle::WatchFace(surface) => surface.clone(),
        }
    }

    fn with_surface<T>(&self, f: impl FnOnce(&dyn Surface) -> T) -> T {
        match self {
            SurfaceHandle::DailyTotal(surface) => f(&*surface.borrow()),
            SurfaceHandle::StepCounter(surface) => f(&*surface.borrow()),
            SurfaceHandle::WatchFace(surface) => f(&*surface.borrow()),
        }
    }

    pub fn kind(&self) -> SurfaceKind {
        self.with_surface(|surface| surface.kind())
    }

    pub fn frames(&self) -> FrameCounter {
        self.with_surface(|surface| surface.frames())
    }

    pub fn last_frame(&self) -> Option<Frame> {
        self.with_surface(|surface| surface.last_frame().cloned())
    }

    /// Store a new step reading. Returns false if this surface shows no steps.
    pub fn record_steps(&self, steps: u32) -> bool {
        match self {
            SurfaceHandle::StepCounter(surface) => {
                surface.borrow_mut().set_steps(steps);
                true
            }
            _ => false,
        }
    }

    /// Advance the watch face's info line. Returns false for other surfaces.
    pub fn tap(&self) -> bool {
        match self {
            SurfaceHandle::WatchFace(surface) => {
                surface.borrow_mut().tap();
                true
            }
            _ => false,
        }
    }

    /// Returns false for surfaces without a mute mode.
    pub fn set_muted(&self, muted: bool) -> bool {
        match self {
            SurfaceHandle::WatchFace(surface) => {
                surface.borrow_mut().set_muted(muted);
                true
            }
            _ => false,
        }
    }
}
