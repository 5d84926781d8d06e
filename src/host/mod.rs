//! The host: owns one surface, its refresh schedule and the event loop.
//!
//! Host lifecycle events (shown, hidden, entering or leaving ambient mode, new
//! sensor readings, taps) arrive from a signal channel or a simulation script and
//! are translated here into scheduler operations. The host also decides when the
//! processor is allowed to sleep, which is what makes the interactive fast timer
//! unreliable in ambient mode.

pub mod script;

use anyhow::{Context, Result};
use std::cell::Cell;
use std::collections::VecDeque;
use std::ops::ControlFlow;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use crate::common::utils::format_millis;
use crate::config::Config;
use crate::runtime::{EventLoop, LoopControl, LoopStats};
use crate::schedule::timers::{ModeSource, VisibilitySource};
use crate::schedule::{
    DisplayMode, RefreshIntervals, RefreshSchedule, ScheduleHandle, ScheduleState,
};
use crate::surfaces::{FrameCounter, SurfaceHandle, SurfaceKind};
use crate::time_source::TimeSource;
pub use script::{ScriptStep, Timeline, parse_script};

/// Something that happened to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    Visible,
    Hidden,
    EnterAmbient,
    ExitAmbient,
    ToggleAmbient,
    ToggleVisible,
    /// New cumulative step reading.
    Steps(u32),
    Tap,
    Mute(bool),
    /// Tear the surface down for good.
    Destroy,
    Shutdown,
}

/// Visibility and ambient flags as the platform reports them.
///
/// Cloned into the schedule as its [`ModeSource`]; clones share state.
#[derive(Debug, Clone, Default)]
pub struct HostState {
    visible: Rc<Cell<bool>>,
    ambient: Rc<Cell<bool>>,
}

impl HostState {
    pub fn new(visible: bool, ambient: bool) -> Self {
        Self {
            visible: Rc::new(Cell::new(visible)),
            ambient: Rc::new(Cell::new(ambient)),
        }
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.set(visible);
    }

    pub fn set_ambient(&self, ambient: bool) {
        self.ambient.set(ambient);
    }

    pub fn visible(&self) -> bool {
        self.visible.get()
    }

    pub fn ambient(&self) -> bool {
        self.ambient.get()
    }
}

impl ModeSource for HostState {
    fn is_ambient(&self) -> Result<bool> {
        Ok(self.ambient.get())
    }
}

impl VisibilitySource for HostState {
    fn is_visible(&self) -> Result<bool> {
        Ok(self.visible.get())
    }
}

/// Everything needed to build a [`Host`].
#[derive(Debug, Clone, PartialEq)]
pub struct HostSettings {
    pub surface: SurfaceKind,
    pub intervals: RefreshIntervals,
    /// Interactive interval while muted, for surfaces with a mute mode.
    pub muted_interval: Option<Duration>,
    pub time_tick_interval_ms: u64,
    pub sleep_in_ambient: bool,
    /// Log every rendered frame.
    pub echo_frames: bool,
    pub debug_enabled: bool,
}

impl HostSettings {
    pub fn from_config(config: &Config, surface: SurfaceKind) -> Self {
        let settings = config.surface_settings(surface);
        Self {
            surface,
            intervals: RefreshIntervals::from_millis(
                settings.interactive_interval_ms,
                settings.ambient_interval_ms,
                settings.ambient_wake,
            ),
            muted_interval: settings.muted_interval_ms.map(Duration::from_millis),
            time_tick_interval_ms: config.time_tick_interval_ms(),
            sleep_in_ambient: config.sleep_in_ambient(),
            echo_frames: true,
            debug_enabled: false,
        }
    }

    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug_enabled = enabled;
        self
    }

    pub fn with_echo_frames(mut self, enabled: bool) -> Self {
        self.echo_frames = enabled;
        self
    }
}

/// Where host events come from while the loop runs.
pub trait EventSource {
    /// Absolute time of the next known event, if the source knows it.
    fn next_due_ms(&self) -> Option<u64> {
        None
    }

    /// Wait for at most `timeout`.
    fn wait(&mut self, time_source: &dyn TimeSource, timeout: Duration) {
        time_source.sleep(timeout);
    }

    /// Events ready at `now_ms`, in order.
    fn take_ready(&mut self, now_ms: u64) -> Vec<HostEvent>;
}

impl EventSource for Timeline {
    fn next_due_ms(&self) -> Option<u64> {
        Timeline::next_due_ms(self)
    }

    fn take_ready(&mut self, now_ms: u64) -> Vec<HostEvent> {
        self.take_due(now_ms)
    }
}

/// Events sent from another thread, e.g. the signal handler.
///
/// Waits block on the channel in real time. A disconnected channel reads as a
/// shutdown request.
pub struct ChannelEvents {
    receiver: Receiver<HostEvent>,
    buffered: VecDeque<HostEvent>,
}

impl ChannelEvents {
    pub fn new(receiver: Receiver<HostEvent>) -> Self {
        Self {
            receiver,
            buffered: VecDeque::new(),
        }
    }
}

impl EventSource for ChannelEvents {
    fn wait(&mut self, _time_source: &dyn TimeSource, timeout: Duration) {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => self.buffered.push_back(event),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => self.buffered.push_back(HostEvent::Shutdown),
        }
    }

    fn take_ready(&mut self, _now_ms: u64) -> Vec<HostEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => self.buffered.push_back(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.buffered.push_back(HostEvent::Shutdown);
                    break;
                }
            }
        }
        self.buffered.drain(..).collect()
    }
}

/// Totals reported at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub surface: SurfaceKind,
    pub frames: FrameCounter,
    pub loop_stats: LoopStats,
    /// `None` once the surface was destroyed.
    pub final_state: Option<ScheduleState>,
}

// Host-side state the event loop must not own
struct Session {
    surface: SurfaceHandle,
    schedule: Option<ScheduleHandle>,
    state: HostState,
    interactive_interval: Duration,
    muted_interval: Option<Duration>,
    sleep_in_ambient: bool,
    debug_enabled: bool,
}

impl Session {
    fn apply(&mut self, events: &mut EventLoop, event: HostEvent) -> Result<ControlFlow<()>> {
        if self.debug_enabled {
            log_debug!("Host event: {event:?}");
        }

        let event = match event {
            HostEvent::Shutdown => return Ok(ControlFlow::Break(())),
            HostEvent::ToggleAmbient if self.state.ambient() => HostEvent::ExitAmbient,
            HostEvent::ToggleAmbient => HostEvent::EnterAmbient,
            HostEvent::ToggleVisible if self.state.visible() => HostEvent::Hidden,
            HostEvent::ToggleVisible => HostEvent::Visible,
            other => other,
        };

        let Some(schedule) = self.schedule.clone() else {
            log_warning!("Surface destroyed, ignoring {event:?}");
            return Ok(ControlFlow::Continue(()));
        };

        match event {
            HostEvent::Visible => {
                self.state.set_visible(true);
                schedule.borrow_mut().on_became_visible()?;
                log_block_start!(
                    "Surface visible: {} ({})",
                    self.surface.kind(),
                    schedule.borrow().mode()
                );
                self.log_next_trigger(&schedule);
            }
            HostEvent::Hidden => {
                self.state.set_visible(false);
                schedule.borrow_mut().on_became_hidden();
                log_block_start!("Surface hidden: {}", self.surface.kind());
                log_indented!("All timers cancelled");
            }
            HostEvent::EnterAmbient | HostEvent::ExitAmbient => {
                let ambient = event == HostEvent::EnterAmbient;
                self.state.set_ambient(ambient);
                let mode = DisplayMode::from_ambient(ambient);
                schedule.borrow_mut().on_mode_changed(mode);
                log_block_start!("Entering {mode} mode");
                self.log_next_trigger(&schedule);
            }
            HostEvent::Steps(steps) => {
                if self.surface.record_steps(steps) {
                    schedule.borrow_mut().refresh_now();
                } else {
                    log_warning!("{} does not show steps, reading ignored", self.surface.kind());
                }
            }
            HostEvent::Tap => {
                if self.surface.tap() {
                    schedule.borrow_mut().refresh_now();
                }
            }
            HostEvent::Mute(muted) => {
                if self.surface.set_muted(muted) {
                    let interval = match (muted, self.muted_interval) {
                        (true, Some(interval)) => interval,
                        _ => self.interactive_interval,
                    };
                    schedule.borrow_mut().set_interactive_interval(interval);
                    schedule.borrow_mut().refresh_now();
                    log_block_start!(
                        "{} interactive interval now {}",
                        if muted { "Muted:" } else { "Unmuted:" },
                        format_millis(interval.as_millis() as u64)
                    );
                }
            }
            HostEvent::Destroy => {
                events.unsubscribe(schedule.token());
                schedule.borrow_mut().destroy();
                self.schedule = None;
                log_block_start!("Surface destroyed: {}", self.surface.kind());
            }
            HostEvent::ToggleAmbient | HostEvent::ToggleVisible | HostEvent::Shutdown => {}
        }

        self.update_processor(events);
        Ok(ControlFlow::Continue(()))
    }

    fn update_processor(&self, events: &mut EventLoop) {
        events.set_processor_sleeping(self.sleep_in_ambient && self.state.ambient());
    }

    fn log_next_trigger(&self, schedule: &ScheduleHandle) {
        let schedule = schedule.borrow();
        match schedule.next_trigger_ms() {
            Some(at_ms) => log_indented!(
                "Next refresh at {at_ms} ({} cadence)",
                format_millis(schedule.intervals().millis_for_mode(schedule.mode()))
            ),
            None if schedule.is_running() => {
                log_indented!("Next refresh on the platform time tick")
            }
            None => {}
        }
    }
}

struct Driver<'a, S: EventSource + ?Sized> {
    session: &'a mut Session,
    source: &'a mut S,
}

impl<S: EventSource + ?Sized> LoopControl for Driver<'_, S> {
    fn next_deadline_ms(&self) -> Option<u64> {
        self.source.next_due_ms()
    }

    fn wait(&mut self, time_source: &dyn TimeSource, timeout: Duration) {
        self.source.wait(time_source, timeout);
    }

    fn poll(&mut self, events: &mut EventLoop, now_ms: u64) -> Result<ControlFlow<()>> {
        for event in self.source.take_ready(now_ms) {
            if self.session.apply(events, event)?.is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    }
}

/// One surface with its schedule, wired to an event loop.
pub struct Host {
    events: EventLoop,
    session: Session,
}

impl Host {
    /// Build a hidden, interactive host.
    pub fn new(settings: &HostSettings, time_source: Arc<dyn TimeSource>) -> Result<Self> {
        let mut events = EventLoop::new(time_source.clone(), settings.time_tick_interval_ms)
            .with_debug(settings.debug_enabled);
        let surface = SurfaceHandle::new(settings.surface, settings.echo_frames);
        let state = HostState::new(false, false);

        let schedule = RefreshSchedule::builder(settings.surface.as_str())
            .intervals(settings.intervals)
            .debug(settings.debug_enabled)
            .target(&surface.refresh_target())
            .fast_timer(events.fast_timer())
            .wake_alarm(events.wake_alarm())
            .mode_source(state.clone())
            .time_source(time_source)
            .build()
            .with_context(|| format!("Failed to build the {} schedule", settings.surface))?;
        events.subscribe(&schedule);

        Ok(Self {
            events,
            session: Session {
                surface,
                schedule: Some(schedule),
                state,
                interactive_interval: settings.intervals.interactive,
                muted_interval: settings.muted_interval,
                sleep_in_ambient: settings.sleep_in_ambient,
                debug_enabled: settings.debug_enabled,
            },
        })
    }

    pub fn state(&self) -> &HostState {
        &self.session.state
    }

    pub fn surface(&self) -> &SurfaceHandle {
        &self.session.surface
    }

    pub fn schedule(&self) -> Option<&ScheduleHandle> {
        self.session.schedule.as_ref()
    }

    pub fn events(&self) -> &EventLoop {
        &self.events
    }

    /// Apply one event immediately. `Break` means shutdown was requested.
    pub fn handle_event(&mut self, event: HostEvent) -> Result<ControlFlow<()>> {
        self.session.apply(&mut self.events, event)
    }

    /// Bring the schedule in line with what the platform currently reports.
    pub fn sync_with_platform(&mut self) -> Result<()> {
        let visible = self
            .session
            .state
            .is_visible()
            .context("Failed to query surface visibility")?;
        let ambient = self
            .session
            .state
            .is_ambient()
            .context("Failed to query display mode")?;

        let Some(schedule) = self.session.schedule.clone() else {
            return Ok(());
        };

        let state = schedule.state();
        let event = match (visible, state) {
            (false, ScheduleState::Stopped) => None,
            (false, _) => Some(HostEvent::Hidden),
            (true, ScheduleState::Stopped) => Some(HostEvent::Visible),
            (true, ScheduleState::RunningInteractive) if ambient => Some(HostEvent::EnterAmbient),
            (true, ScheduleState::RunningAmbient) if !ambient => Some(HostEvent::ExitAmbient),
            (true, _) => None,
        };

        if let Some(event) = event {
            self.handle_event(event)?;
        }
        self.session.update_processor(&mut self.events);
        Ok(())
    }

    /// Drive the loop until `deadline_ms`, the clock ends, or a shutdown event.
    pub fn run<S: EventSource + ?Sized>(&mut self, deadline_ms: u64, source: &mut S) -> Result<()> {
        let mut driver = Driver {
            session: &mut self.session,
            source,
        };
        self.events.run_until(deadline_ms, &mut driver)
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            surface: self.session.surface.kind(),
            frames: self.session.surface.frames(),
            loop_stats: self.events.stats(),
            final_state: self.session.schedule.as_ref().map(ScheduleHandle::state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_source::SimulatedTimeSource;

    const TEST_CLOCK_END_MS: u64 = 4_000_000_000_000;

    fn settings(surface: SurfaceKind) -> HostSettings {
        HostSettings::from_config(&Config::default(), surface).with_echo_frames(false)
    }

    fn host_at(start_ms: u64, surface: SurfaceKind) -> (Host, Arc<SimulatedTimeSource>) {
        let clock = Arc::new(
            SimulatedTimeSource::fast_forward_millis(start_ms, TEST_CLOCK_END_MS).unwrap(),
        );
        let host = Host::new(&settings(surface), clock.clone()).unwrap();
        (host, clock)
    }

    #[test]
    fn test_host_starts_hidden_and_stopped() {
        let (host, _clock) = host_at(0, SurfaceKind::DailyTotal);
        assert!(!host.state().visible());
        assert_eq!(host.summary().final_state, Some(ScheduleState::Stopped));
        assert_eq!(host.events().pending_registrations(), 0);
    }

    #[test]
    fn test_toggle_events_resolve_against_current_state() {
        let (mut host, _clock) = host_at(0, SurfaceKind::DailyTotal);

        host.handle_event(HostEvent::ToggleVisible).unwrap();
        assert!(host.state().visible());
        host.handle_event(HostEvent::ToggleAmbient).unwrap();
        assert_eq!(host.summary().final_state, Some(ScheduleState::RunningAmbient));
        assert!(host.events().is_processor_sleeping());

        host.handle_event(HostEvent::ToggleAmbient).unwrap();
        host.handle_event(HostEvent::ToggleVisible).unwrap();
        assert_eq!(host.summary().final_state, Some(ScheduleState::Stopped));
        assert!(!host.events().is_processor_sleeping());
    }

    #[test]
    fn test_steps_reading_refreshes_step_counter_immediately() {
        let (mut host, _clock) = host_at(0, SurfaceKind::StepCounter);
        host.handle_event(HostEvent::Visible).unwrap();
        host.handle_event(HostEvent::Steps(1_234)).unwrap();

        let frame = host.surface().last_frame().unwrap();
        assert_eq!(frame.lines[1], "1234 steps today");
        assert_eq!(host.surface().frames().total(), 2);
        // Still exactly one registration after the extra refresh
        assert_eq!(host.events().pending_registrations(), 1);
    }

    #[test]
    fn test_mute_switches_watch_face_cadence() {
        let (mut host, _clock) = host_at(30_250, SurfaceKind::WatchFace);
        host.handle_event(HostEvent::Visible).unwrap();
        assert_eq!(host.schedule().unwrap().borrow().next_trigger_ms(), Some(30_500));

        host.handle_event(HostEvent::Mute(true)).unwrap();
        assert_eq!(host.schedule().unwrap().borrow().next_trigger_ms(), Some(60_000));

        host.handle_event(HostEvent::Mute(false)).unwrap();
        assert_eq!(host.schedule().unwrap().borrow().next_trigger_ms(), Some(30_500));
    }

    #[test]
    fn test_destroy_cancels_and_ignores_later_events() {
        let (mut host, _clock) = host_at(0, SurfaceKind::DailyTotal);
        host.handle_event(HostEvent::Visible).unwrap();
        host.handle_event(HostEvent::Destroy).unwrap();

        assert_eq!(host.events().pending_registrations(), 0);
        assert!(host.schedule().is_none());

        host.handle_event(HostEvent::Visible).unwrap();
        assert_eq!(host.summary().final_state, None);
        assert_eq!(host.surface().frames().total(), 1);
    }

    #[test]
    fn test_shutdown_breaks() {
        let (mut host, _clock) = host_at(0, SurfaceKind::DailyTotal);
        assert!(host.handle_event(HostEvent::Shutdown).unwrap().is_break());
    }

    #[test]
    fn test_sync_with_platform_follows_reported_state() {
        let (mut host, _clock) = host_at(0, SurfaceKind::DailyTotal);

        host.state().set_visible(true);
        host.sync_with_platform().unwrap();
        assert_eq!(host.summary().final_state, Some(ScheduleState::RunningInteractive));

        host.state().set_ambient(true);
        host.sync_with_platform().unwrap();
        assert_eq!(host.summary().final_state, Some(ScheduleState::RunningAmbient));

        // Nothing changed: no extra refresh
        let frames = host.surface().frames().total();
        host.sync_with_platform().unwrap();
        assert_eq!(host.surface().frames().total(), frames);

        host.state().set_visible(false);
        host.sync_with_platform().unwrap();
        assert_eq!(host.summary().final_state, Some(ScheduleState::Stopped));
    }

    #[test]
    fn test_run_replays_script_on_simulated_clock() {
        let (mut host, clock) = host_at(0, SurfaceKind::DailyTotal);
        let steps = parse_script("0:visible,5:ambient,65:interactive,70:hidden").unwrap();
        let mut timeline = Timeline::new(clock.now_millis(), steps);

        host.run(90_000, &mut timeline).unwrap();

        let summary = host.summary();
        // Interactive: 0s..5s (6 frames), 65s..70s (switch + 66..70 = 6 frames)
        assert_eq!(summary.frames.interactive, 12);
        // Ambient: switch at 5s, alarms at 20s/40s/60s, tick at 60s
        assert_eq!(summary.frames.ambient, 5);
        assert_eq!(summary.final_state, Some(ScheduleState::Stopped));
        assert_eq!(host.events().pending_registrations(), 0);
        assert_eq!(clock.now_millis(), 90_000);
    }

    #[test]
    fn test_channel_source_reads_disconnect_as_shutdown() {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut source = ChannelEvents::new(rx);
        tx.send(HostEvent::Visible).unwrap();
        drop(tx);

        assert_eq!(
            source.take_ready(0),
            vec![HostEvent::Visible, HostEvent::Shutdown]
        );
    }
}
