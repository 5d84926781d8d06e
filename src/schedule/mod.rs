//! Dual-mode refresh scheduling.
//!
//! A [`RefreshSchedule`] decides which of two timing mechanisms drives the next
//! refresh of a display surface:
//!
//! - **Interactive**: a [`FastTimer`], cheap enough for sub-second cadences but
//!   unable to wake a sleeping processor.
//! - **Ambient**: a [`WakeAlarm`], exact and wake-capable, used for coarse
//!   cadences while the processor sleeps between refreshes.
//!
//! Every refresh is followed by a reschedule whose trigger lands on the next
//! wall-clock boundary of the active interval (see [`alignment`]). At most one
//! registration is outstanding per schedule: re-arming always cancels first.
//!
//! The schedule holds only a weak reference to the surface it refreshes, and the
//! event loop holds only a [`WeakScheduleHandle`] to the schedule, so a destroyed
//! surface or schedule turns late callbacks into no-ops instead of keeping
//! anything alive.

pub mod alignment;
pub mod timers;

use anyhow::{Context, Result};
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::Duration;

use crate::common::utils::format_millis;
use crate::time_source::TimeSource;
use alignment::delay_until_boundary;
use timers::{
    FastTimer, ModeSource, Refresh, RefreshContext, TimerToken, WakeAlarm, WakeKind,
};

/// Which timing regime is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayMode {
    /// Full-power display, fast cadence.
    Interactive,
    /// Low-power persistent display, coarse cadence, processor may sleep.
    Ambient,
}

impl DisplayMode {
    pub fn from_ambient(ambient: bool) -> Self {
        if ambient {
            DisplayMode::Ambient
        } else {
            DisplayMode::Interactive
        }
    }

    pub fn is_ambient(&self) -> bool {
        matches!(self, DisplayMode::Ambient)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayMode::Interactive => "interactive",
            DisplayMode::Ambient => "ambient",
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Externally visible state of a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleState {
    Stopped,
    RunningInteractive,
    RunningAmbient,
}

/// The two cadences of a schedule and how ambient refreshes are driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshIntervals {
    pub interactive: Duration,
    pub ambient: Duration,
    /// Arm a wake alarm in ambient mode. When false, ambient refreshes come only
    /// from the platform's external tick.
    pub ambient_wake: bool,
}

impl RefreshIntervals {
    pub fn from_millis(interactive_ms: u64, ambient_ms: u64, ambient_wake: bool) -> Self {
        Self {
            interactive: Duration::from_millis(interactive_ms),
            ambient: Duration::from_millis(ambient_ms),
            ambient_wake,
        }
    }

    pub fn for_mode(&self, mode: DisplayMode) -> Duration {
        match mode {
            DisplayMode::Interactive => self.interactive,
            DisplayMode::Ambient => self.ambient,
        }
    }

    pub fn millis_for_mode(&self, mode: DisplayMode) -> u64 {
        self.for_mode(mode).as_millis() as u64
    }
}

impl Default for RefreshIntervals {
    fn default() -> Self {
        use crate::common::constants::*;
        Self::from_millis(
            DEFAULT_INTERACTIVE_INTERVAL_MS,
            DEFAULT_AMBIENT_INTERVAL_MS,
            DEFAULT_AMBIENT_WAKE,
        )
    }
}

/// The single registration a schedule may have outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingWake {
    None,
    FastTimer { due_ms: u64 },
    WakeAlarm { trigger_at_ms: u64 },
}

impl PendingWake {
    pub fn kind(&self) -> Option<WakeKind> {
        match self {
            PendingWake::None => None,
            PendingWake::FastTimer { .. } => Some(WakeKind::FastTimer),
            PendingWake::WakeAlarm { .. } => Some(WakeKind::WakeAlarm),
        }
    }

    pub fn due_ms(&self) -> Option<u64> {
        match *self {
            PendingWake::None => None,
            PendingWake::FastTimer { due_ms } => Some(due_ms),
            PendingWake::WakeAlarm { trigger_at_ms } => Some(trigger_at_ms),
        }
    }
}

/// Dual-mode refresh scheduler for one display surface.
pub struct RefreshSchedule {
    name: String,
    token: TimerToken,
    intervals: RefreshIntervals,
    mode: DisplayMode,
    running: bool,
    pending: PendingWake,
    refresh_count: u64,
    debug_enabled: bool,
    target: Weak<RefCell<dyn Refresh>>,
    fast_timer: Box<dyn FastTimer>,
    wake_alarm: Box<dyn WakeAlarm>,
    mode_source: Box<dyn ModeSource>,
    time_source: Arc<dyn TimeSource>,
}

impl RefreshSchedule {
    /// Start building a schedule for the surface called `name`.
    pub fn builder(name: impl Into<String>) -> RefreshScheduleBuilder {
        RefreshScheduleBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn token(&self) -> TimerToken {
        self.token
    }

    pub fn intervals(&self) -> RefreshIntervals {
        self.intervals
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn pending(&self) -> PendingWake {
        self.pending
    }

    /// When the next refresh is due, if anything is armed.
    pub fn next_trigger_ms(&self) -> Option<u64> {
        self.pending.due_ms()
    }

    pub fn refresh_count(&self) -> u64 {
        self.refresh_count
    }

    pub fn state(&self) -> ScheduleState {
        match (self.running, self.mode) {
            (false, _) => ScheduleState::Stopped,
            (true, DisplayMode::Interactive) => ScheduleState::RunningInteractive,
            (true, DisplayMode::Ambient) => ScheduleState::RunningAmbient,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    // # Lifecycle

    /// The surface became visible: pick up the current mode, refresh, and arm.
    ///
    /// A failing mode query propagates and leaves the schedule untouched.
    pub fn on_became_visible(&mut self) -> Result<()> {
        let ambient = self
            .mode_source
            .is_ambient()
            .with_context(|| format!("Failed to query display mode for {}", self.name))?;

        self.mode = DisplayMode::from_ambient(ambient);
        self.running = true;
        self.refresh_and_reschedule();
        Ok(())
    }

    /// The surface is no longer shown: cancel everything, refresh nothing.
    pub fn on_became_hidden(&mut self) {
        self.teardown();
        self.running = false;
    }

    /// The surface entered or left low-power mode.
    pub fn on_mode_changed(&mut self, new_mode: DisplayMode) {
        match self.mode {
            DisplayMode::Interactive => self.cancel_fast_timer(),
            DisplayMode::Ambient => self.cancel_wake_alarm(),
        }

        self.mode = new_mode;

        if self.running {
            self.refresh_and_reschedule();
        } else if self.debug_enabled {
            log_debug!("{}: mode recorded as {new_mode} while stopped", self.name);
        }
    }

    /// The platform delivered its coarse periodic tick.
    pub fn on_external_wake(&mut self) {
        if !self.running {
            if self.debug_enabled {
                log_debug!("{}: external wake ignored while stopped", self.name);
            }
            return;
        }
        self.refresh_and_reschedule();
    }

    /// A registration fired. Returns whether it led to a refresh.
    ///
    /// Deliveries for registrations this schedule no longer tracks (cancelled,
    /// superseded, or for a stopped schedule) are ignored.
    pub fn on_timer_fired(&mut self, kind: WakeKind) -> bool {
        if !self.running || self.pending.kind() != Some(kind) {
            if self.debug_enabled {
                log_debug!(
                    "{}: stale {} delivery ignored (pending: {:?})",
                    self.name,
                    kind.as_str(),
                    self.pending
                );
            }
            return false;
        }

        // The registration is consumed by firing
        self.pending = PendingWake::None;
        self.refresh_and_reschedule();
        true
    }

    /// Host-initiated refresh, e.g. a new sensor reading. Ignored while stopped.
    pub fn refresh_now(&mut self) {
        if self.running {
            self.refresh_and_reschedule();
        }
    }

    /// Change the interactive cadence (e.g. watch-face mute mode).
    ///
    /// Re-arms the fast timer on the new grid when it is driving refreshes; does
    /// not refresh by itself.
    pub fn set_interactive_interval(&mut self, interval: Duration) {
        if interval == self.intervals.interactive || interval.is_zero() {
            return;
        }
        self.intervals.interactive = interval;

        if self.state() == ScheduleState::RunningInteractive {
            self.reschedule();
        }
    }

    /// Tear down for good: both primitives are cancelled regardless of mode.
    pub fn destroy(&mut self) {
        self.teardown();
        self.running = false;
    }

    // # Core

    /// Refresh the surface, then arm the next boundary-aligned wake.
    pub fn refresh_and_reschedule(&mut self) {
        let Some(target) = self.target.upgrade() else {
            if self.debug_enabled {
                log_debug!("{}: refresh target is gone, stopping", self.name);
            }
            self.destroy();
            return;
        };

        match target.try_borrow_mut() {
            Ok(mut surface) => {
                // Counts refreshes the surface actually saw
                self.refresh_count += 1;
                let frame = RefreshContext {
                    now_ms: self.time_source.now_millis(),
                    mode: self.mode,
                    interval_ms: self.intervals.millis_for_mode(self.mode),
                    refresh_count: self.refresh_count,
                };
                surface.refresh(&frame);
            }
            Err(_) => {
                // Re-entrant refresh from inside the surface's own callback
                if self.debug_enabled {
                    log_debug!("{}: surface busy, refresh skipped", self.name);
                }
            }
        }
        drop(target);

        self.reschedule();
    }

    fn reschedule(&mut self) {
        let now_ms = self.time_source.now_millis();
        let interval_ms = self.intervals.millis_for_mode(self.mode);
        let delay_ms = delay_until_boundary(now_ms, interval_ms);
        let trigger_at_ms = now_ms.saturating_add(delay_ms);

        self.cancel_pending();

        match self.mode {
            DisplayMode::Interactive => {
                self.fast_timer.schedule_once(Duration::from_millis(delay_ms), self.token);
                self.pending = PendingWake::FastTimer {
                    due_ms: trigger_at_ms,
                };
            }
            DisplayMode::Ambient if self.intervals.ambient_wake => {
                self.wake_alarm.schedule_exact_wake(trigger_at_ms, self.token);
                self.pending = PendingWake::WakeAlarm { trigger_at_ms };
            }
            DisplayMode::Ambient => {
                if self.debug_enabled {
                    log_debug!("{}: ambient refreshes follow the platform tick", self.name);
                }
                return;
            }
        }

        if self.debug_enabled {
            log_debug!(
                "{}: next {} refresh at {trigger_at_ms} (in {})",
                self.name,
                self.mode,
                format_millis(delay_ms)
            );
        }
    }

    // # Cancellation

    fn cancel_fast_timer(&mut self) {
        if let PendingWake::FastTimer { .. } = self.pending {
            self.fast_timer.cancel(self.token);
            self.pending = PendingWake::None;
        }
    }

    fn cancel_wake_alarm(&mut self) {
        if let PendingWake::WakeAlarm { .. } = self.pending {
            self.wake_alarm.cancel(self.token);
            self.pending = PendingWake::None;
        }
    }

    fn cancel_pending(&mut self) {
        self.cancel_fast_timer();
        self.cancel_wake_alarm();
    }

    // A registration can outlive our tracking (a dropped fast timer, an alarm
    // armed by a previous process with the same token), so teardown does not
    // trust `pending`.
    fn teardown(&mut self) {
        self.fast_timer.cancel(self.token);
        self.wake_alarm.cancel(self.token);
        self.pending = PendingWake::None;
    }
}

impl Drop for RefreshSchedule {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for RefreshSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshSchedule")
            .field("name", &self.name)
            .field("token", &self.token)
            .field("intervals", &self.intervals)
            .field("mode", &self.mode)
            .field("running", &self.running)
            .field("pending", &self.pending)
            .field("refresh_count", &self.refresh_count)
            .finish_non_exhaustive()
    }
}

/// Builder for [`RefreshSchedule`].
///
/// Every collaborator is required; `build` fails naming the first one missing.
pub struct RefreshScheduleBuilder {
    name: String,
    intervals: RefreshIntervals,
    debug_enabled: bool,
    target: Option<Weak<RefCell<dyn Refresh>>>,
    fast_timer: Option<Box<dyn FastTimer>>,
    wake_alarm: Option<Box<dyn WakeAlarm>>,
    mode_source: Option<Box<dyn ModeSource>>,
    time_source: Option<Arc<dyn TimeSource>>,
}

impl RefreshScheduleBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            intervals: RefreshIntervals::default(),
            debug_enabled: false,
            target: None,
            fast_timer: None,
            wake_alarm: None,
            mode_source: None,
            time_source: None,
        }
    }

    pub fn intervals(mut self, intervals: RefreshIntervals) -> Self {
        self.intervals = intervals;
        self
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug_enabled = enabled;
        self
    }

    /// The surface to refresh. Only a weak reference is kept.
    pub fn target(mut self, target: &Rc<RefCell<dyn Refresh>>) -> Self {
        self.target = Some(Rc::downgrade(target));
        self
    }

    pub fn fast_timer(mut self, timer: impl FastTimer + 'static) -> Self {
        self.fast_timer = Some(Box::new(timer));
        self
    }

    pub fn wake_alarm(mut self, alarm: impl WakeAlarm + 'static) -> Self {
        self.wake_alarm = Some(Box::new(alarm));
        self
    }

    pub fn mode_source(mut self, source: impl ModeSource + 'static) -> Self {
        self.mode_source = Some(Box::new(source));
        self
    }

    pub fn time_source(mut self, source: Arc<dyn TimeSource>) -> Self {
        self.time_source = Some(source);
        self
    }

    pub fn build(self) -> Result<ScheduleHandle> {
        let name = self.name;

        if self.intervals.interactive.is_zero() || self.intervals.ambient.is_zero() {
            anyhow::bail!("Refresh schedule '{name}' needs non-zero intervals");
        }

        let missing = |what: &str| anyhow::anyhow!("Refresh schedule '{name}' is missing a {what}");
        let target = self.target.ok_or_else(|| missing("refresh target"))?;
        let fast_timer = self.fast_timer.ok_or_else(|| missing("fast timer"))?;
        let wake_alarm = self.wake_alarm.ok_or_else(|| missing("wake alarm"))?;
        let mode_source = self.mode_source.ok_or_else(|| missing("mode source"))?;
        let time_source = self.time_source.ok_or_else(|| missing("time source"))?;

        let schedule = RefreshSchedule {
            token: TimerToken::for_surface(&name),
            name,
            intervals: self.intervals,
            mode: DisplayMode::Interactive,
            running: false,
            pending: PendingWake::None,
            refresh_count: 0,
            debug_enabled: self.debug_enabled,
            target,
            fast_timer,
            wake_alarm,
            mode_source,
            time_source,
        };

        Ok(ScheduleHandle(Rc::new(RefCell::new(schedule))))
    }
}

/// Owning handle to a schedule, held by the host surface.
#[derive(Debug, Clone)]
pub struct ScheduleHandle(Rc<RefCell<RefreshSchedule>>);

impl ScheduleHandle {
    pub fn borrow(&self) -> Ref<'_, RefreshSchedule> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, RefreshSchedule> {
        self.0.borrow_mut()
    }

    /// Non-owning handle for timer and alarm callbacks.
    pub fn downgrade(&self) -> WeakScheduleHandle {
        WeakScheduleHandle {
            token: self.borrow().token(),
            inner: Rc::downgrade(&self.0),
        }
    }

    pub fn state(&self) -> ScheduleState {
        self.borrow().state()
    }

    pub fn token(&self) -> TimerToken {
        self.borrow().token()
    }
}

/// Non-owning handle used by callbacks; every call re-resolves the schedule and
/// does nothing if it is gone.
#[derive(Debug, Clone)]
pub struct WeakScheduleHandle {
    token: TimerToken,
    inner: Weak<RefCell<RefreshSchedule>>,
}

impl WeakScheduleHandle {
    pub fn token(&self) -> TimerToken {
        self.token
    }

    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// Current state, or `None` if the schedule was dropped.
    pub fn state(&self) -> Option<ScheduleState> {
        let schedule = self.inner.upgrade()?;
        let state = schedule.try_borrow().ok()?.state();
        Some(state)
    }

    /// Deliver a fired registration. Returns whether a refresh happened.
    pub fn fire(&self, kind: WakeKind) -> bool {
        self.with_schedule(|schedule| schedule.on_timer_fired(kind))
            .unwrap_or(false)
    }

    /// Deliver the platform tick. Returns whether the schedule was reachable.
    pub fn external_wake(&self) -> bool {
        self.with_schedule(RefreshSchedule::on_external_wake)
            .is_some()
    }

    fn with_schedule<T>(&self, f: impl FnOnce(&mut RefreshSchedule) -> T) -> Option<T> {
        let schedule = self.inner.upgrade()?;
        // Busy means we are inside one of its own operations; refresh-then-reschedule
        // must not interleave
        let mut guard = schedule.try_borrow_mut().ok()?;
        Some(f(&mut guard))
    }
}
