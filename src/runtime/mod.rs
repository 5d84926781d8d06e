//! Single-threaded event loop providing both timer primitives.
//!
//! The loop owns a [`TimerQueue`] shared with the [`FastTimerHandle`] and
//! [`WakeAlarmHandle`] it hands to schedules, waits on the [`TimeSource`] until
//! the next registration is due, and dispatches it back to the owning schedule
//! through a [`WeakScheduleHandle`].
//!
//! Platform behaviour it reproduces:
//! - While the processor sleeps, due fast timers are dropped without firing.
//!   Wake alarms always fire.
//! - While any subscribed schedule runs in ambient mode, a coarse time tick is
//!   delivered on every tick-interval boundary.

pub mod queue;

use anyhow::Result;
use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use crate::common::constants::MAXIMUM_WAIT_SLICE_MS;
use crate::schedule::alignment::next_boundary;
use crate::schedule::timers::{FastTimer, TimerToken, WakeAlarm, WakeKind};
use crate::schedule::{ScheduleHandle, ScheduleState, WeakScheduleHandle};
use crate::time_source::TimeSource;
pub use queue::{QueuedWake, TimerQueue};

type SharedQueue = Rc<RefCell<TimerQueue>>;

/// [`FastTimer`] backed by the event loop's queue.
pub struct FastTimerHandle {
    queue: SharedQueue,
    time_source: Arc<dyn TimeSource>,
}

impl FastTimer for FastTimerHandle {
    fn schedule_once(&mut self, delay: Duration, token: TimerToken) {
        let due_ms = self
            .time_source
            .now_millis()
            .saturating_add(delay.as_millis() as u64);
        self.queue
            .borrow_mut()
            .push(due_ms, WakeKind::FastTimer, token);
    }

    fn cancel(&mut self, token: TimerToken) {
        self.queue.borrow_mut().cancel(WakeKind::FastTimer, token);
    }
}

/// [`WakeAlarm`] backed by the event loop's queue.
pub struct WakeAlarmHandle {
    queue: SharedQueue,
}

impl WakeAlarm for WakeAlarmHandle {
    fn schedule_exact_wake(&mut self, trigger_at_ms: u64, token: TimerToken) {
        self.queue
            .borrow_mut()
            .push(trigger_at_ms, WakeKind::WakeAlarm, token);
    }

    fn cancel(&mut self, token: TimerToken) {
        self.queue.borrow_mut().cancel(WakeKind::WakeAlarm, token);
    }
}

/// Counters for the simulation summary and debug output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub fast_timers_fired: u64,
    pub wake_alarms_fired: u64,
    /// Fast timers that came due while the processor slept.
    pub fast_timers_dropped: u64,
    pub time_ticks: u64,
    /// Deliveries the target schedule ignored or could not be reached for.
    pub stale_deliveries: u64,
}

/// Hooks the loop calls between waits.
pub trait LoopControl {
    /// Earliest instant the controller itself needs the loop awake, if any.
    fn next_deadline_ms(&self) -> Option<u64> {
        None
    }

    /// Block for at most `timeout`. Returning early is allowed.
    fn wait(&mut self, time_source: &dyn TimeSource, timeout: Duration) {
        time_source.sleep(timeout);
    }

    /// Handle outside input that is ready at `now_ms`.
    fn poll(&mut self, events: &mut EventLoop, now_ms: u64) -> Result<ControlFlow<()>>;
}

pub struct EventLoop {
    queue: SharedQueue,
    time_source: Arc<dyn TimeSource>,
    subscribers: HashMap<TimerToken, WeakScheduleHandle>,
    time_tick_interval_ms: u64,
    // Last instant tick boundaries were accounted for
    tick_anchor_ms: u64,
    processor_sleeping: bool,
    stats: LoopStats,
    debug_enabled: bool,
}

impl EventLoop {
    pub fn new(time_source: Arc<dyn TimeSource>, time_tick_interval_ms: u64) -> Self {
        let tick_anchor_ms = time_source.now_millis();
        Self {
            queue: Rc::new(RefCell::new(TimerQueue::new())),
            time_source,
            subscribers: HashMap::new(),
            time_tick_interval_ms: time_tick_interval_ms.max(1),
            tick_anchor_ms,
            processor_sleeping: false,
            stats: LoopStats::default(),
            debug_enabled: false,
        }
    }

    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug_enabled = enabled;
        self
    }

    pub fn fast_timer(&self) -> FastTimerHandle {
        FastTimerHandle {
            queue: self.queue.clone(),
            time_source: self.time_source.clone(),
        }
    }

    pub fn wake_alarm(&self) -> WakeAlarmHandle {
        WakeAlarmHandle {
            queue: self.queue.clone(),
        }
    }

    pub fn time_source(&self) -> &Arc<dyn TimeSource> {
        &self.time_source
    }

    /// Route registrations carrying this schedule's token back to it.
    pub fn subscribe(&mut self, schedule: &ScheduleHandle) {
        let weak = schedule.downgrade();
        self.subscribers.insert(weak.token(), weak);
    }

    pub fn unsubscribe(&mut self, token: TimerToken) {
        self.subscribers.remove(&token);
    }

    pub fn set_processor_sleeping(&mut self, sleeping: bool) {
        if sleeping != self.processor_sleeping && self.debug_enabled {
            log_debug!(
                "Processor {}",
                if sleeping { "sleeping" } else { "awake" }
            );
        }
        self.processor_sleeping = sleeping;
    }

    pub fn is_processor_sleeping(&self) -> bool {
        self.processor_sleeping
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn pending_registrations(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn outstanding_for(&self, token: TimerToken) -> usize {
        self.queue.borrow().outstanding(token)
    }

    fn ambient_subscribers(&self) -> Vec<WeakScheduleHandle> {
        self.subscribers
            .values()
            .filter(|handle| handle.state() == Some(ScheduleState::RunningAmbient))
            .cloned()
            .collect()
    }

    /// Next tick boundary, if any subscriber is listening for ticks.
    pub fn next_tick_ms(&self) -> Option<u64> {
        let listening = self
            .subscribers
            .values()
            .any(|handle| handle.state() == Some(ScheduleState::RunningAmbient));
        listening.then(|| next_boundary(self.tick_anchor_ms, self.time_tick_interval_ms))
    }

    /// When the loop next has something to do.
    pub fn next_wake_ms(&self) -> Option<u64> {
        let queued = self.queue.borrow().next_due();
        match (queued, self.next_tick_ms()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Fire everything due at or before `now_ms`. Returns the number of refreshes.
    pub fn dispatch_due(&mut self, now_ms: u64) -> usize {
        let mut refreshes = 0;

        loop {
            // The queue borrow must end before dispatch: firing re-arms through it
            let Some(entry) = self.queue.borrow_mut().pop_due(now_ms) else {
                break;
            };

            if entry.kind == WakeKind::FastTimer && self.processor_sleeping {
                self.stats.fast_timers_dropped += 1;
                if self.debug_enabled {
                    log_debug!("Fast timer {} dropped while asleep", entry.token);
                }
                continue;
            }

            let fired = self
                .subscribers
                .get(&entry.token)
                .is_some_and(|handle| handle.fire(entry.kind));

            if fired {
                match entry.kind {
                    WakeKind::FastTimer => self.stats.fast_timers_fired += 1,
                    WakeKind::WakeAlarm => self.stats.wake_alarms_fired += 1,
                }
                refreshes += 1;
            } else {
                self.stats.stale_deliveries += 1;
                if self.debug_enabled {
                    log_debug!("Stale {} for {} ignored", entry.kind.as_str(), entry.token);
                }
            }
        }

        refreshes += self.deliver_time_tick(now_ms);
        self.subscribers.retain(|_, handle| handle.is_alive());
        refreshes
    }

    // Crossed boundaries coalesce into one tick, as a platform catching up after sleep would.
    // A tick landing on the same instant as a subscriber's own wake alarm refreshes it a
    // second time. That is expected: the tick is platform input, not a second registration.
    fn deliver_time_tick(&mut self, now_ms: u64) -> usize {
        let boundary = next_boundary(self.tick_anchor_ms, self.time_tick_interval_ms);
        if now_ms < self.tick_anchor_ms {
            self.tick_anchor_ms = now_ms;
            return 0;
        }
        self.tick_anchor_ms = now_ms;
        if boundary > now_ms {
            return 0;
        }

        let listeners = self.ambient_subscribers();
        if listeners.is_empty() {
            return 0;
        }

        self.stats.time_ticks += 1;
        if self.debug_enabled {
            log_debug!("Time tick at {boundary}");
        }
        listeners
            .iter()
            .filter(|handle| handle.external_wake())
            .count()
    }

    /// Run until `deadline_ms`, the time source ends, or `control` breaks.
    pub fn run_until(&mut self, deadline_ms: u64, control: &mut dyn LoopControl) -> Result<()> {
        loop {
            let now_ms = self.time_source.now_millis();
            self.dispatch_due(now_ms);

            if control.poll(self, now_ms)?.is_break() {
                break;
            }

            let now_ms = self.time_source.now_millis();
            if now_ms >= deadline_ms || self.time_source.is_ended() {
                break;
            }

            let mut target_ms = deadline_ms;
            for candidate in [self.next_wake_ms(), control.next_deadline_ms()]
                .into_iter()
                .flatten()
            {
                target_ms = target_ms.min(candidate);
            }

            let mut wait = Duration::from_millis(target_ms.saturating_sub(now_ms));
            if !self.time_source.is_simulated() {
                wait = wait.min(Duration::from_millis(MAXIMUM_WAIT_SLICE_MS));
            }
            if !wait.is_zero() {
                control.wait(self.time_source.as_ref(), wait);
            }
        }

        // Anything due exactly at the deadline still fires
        let now_ms = self.time_source.now_millis();
        self.dispatch_due(now_ms);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::timers::{ModeSource, Refresh, RefreshContext};
    use crate::schedule::{DisplayMode, RefreshIntervals, RefreshSchedule};
    use crate::time_source::SimulatedTimeSource;
    use std::cell::Cell;

    const TEST_CLOCK_END_MS: u64 = 4_000_000_000_000;

    #[derive(Default)]
    struct Counter {
        frames: Vec<(u64, DisplayMode)>,
    }

    impl Refresh for Counter {
        fn refresh(&mut self, frame: &RefreshContext) {
            self.frames.push((frame.now_ms, frame.mode));
        }
    }

    struct Ambient(Rc<Cell<bool>>);

    impl ModeSource for Ambient {
        fn is_ambient(&self) -> Result<bool> {
            Ok(self.0.get())
        }
    }

    struct Rig {
        clock: Arc<SimulatedTimeSource>,
        events: EventLoop,
        surface: Rc<RefCell<Counter>>,
        ambient: Rc<Cell<bool>>,
        schedule: ScheduleHandle,
    }

    fn rig(start_ms: u64, intervals: RefreshIntervals) -> Rig {
        let clock = Arc::new(
            SimulatedTimeSource::fast_forward_millis(start_ms, TEST_CLOCK_END_MS).unwrap(),
        );
        let mut events = EventLoop::new(clock.clone(), 60_000);
        let surface = Rc::new(RefCell::new(Counter::default()));
        let target: Rc<RefCell<dyn Refresh>> = surface.clone();
        let ambient = Rc::new(Cell::new(false));

        let schedule = RefreshSchedule::builder("daily_total")
            .intervals(intervals)
            .target(&target)
            .fast_timer(events.fast_timer())
            .wake_alarm(events.wake_alarm())
            .mode_source(Ambient(ambient.clone()))
            .time_source(clock.clone())
            .build()
            .unwrap();
        events.subscribe(&schedule);

        Rig {
            clock,
            events,
            surface,
            ambient,
            schedule,
        }
    }

    struct Idle;

    impl LoopControl for Idle {
        fn poll(&mut self, _events: &mut EventLoop, _now_ms: u64) -> Result<ControlFlow<()>> {
            Ok(ControlFlow::Continue(()))
        }
    }

    #[test]
    fn test_interactive_refreshes_land_on_second_boundaries() {
        let mut rig = rig(12_345, RefreshIntervals::from_millis(1_000, 20_000, true));
        rig.schedule.borrow_mut().on_became_visible().unwrap();

        rig.events.run_until(16_000, &mut Idle).unwrap();

        let times: Vec<u64> = rig.surface.borrow().frames.iter().map(|f| f.0).collect();
        assert_eq!(times, vec![12_345, 13_000, 14_000, 15_000, 16_000]);
        assert_eq!(rig.events.outstanding_for(rig.schedule.token()), 1);
        assert_eq!(rig.events.stats().fast_timers_fired, 4);
    }

    #[test]
    fn test_ambient_alarms_fire_while_processor_sleeps() {
        let mut rig = rig(100_001, RefreshIntervals::from_millis(1_000, 20_000, true));
        rig.ambient.set(true);
        rig.schedule.borrow_mut().on_became_visible().unwrap();
        rig.events.set_processor_sleeping(true);

        rig.events.run_until(160_000, &mut Idle).unwrap();

        let times: Vec<u64> = rig.surface.borrow().frames.iter().map(|f| f.0).collect();
        // The 120s tick coincides with the alarm and re-arms the same boundary
        assert_eq!(times[..4], [100_001, 120_000, 120_000, 140_000]);
        assert_eq!(rig.events.stats().fast_timers_dropped, 0);
        assert_eq!(rig.events.outstanding_for(rig.schedule.token()), 1);
    }

    #[test]
    fn test_fast_timer_dropped_while_processor_sleeps() {
        let mut rig = rig(0, RefreshIntervals::from_millis(1_000, 20_000, true));
        rig.schedule.borrow_mut().on_became_visible().unwrap();
        rig.events.set_processor_sleeping(true);

        rig.events.run_until(5_000, &mut Idle).unwrap();

        assert_eq!(rig.surface.borrow().frames.len(), 1);
        assert_eq!(rig.events.stats().fast_timers_dropped, 1);
        assert_eq!(rig.events.pending_registrations(), 0);
        assert_eq!(rig.clock.now_millis(), 5_000);
    }

    #[test]
    fn test_time_tick_only_reaches_ambient_schedules() {
        let mut rig = rig(0, RefreshIntervals::from_millis(500, 60_000, false));
        rig.schedule.borrow_mut().on_became_visible().unwrap();
        assert_eq!(rig.events.next_tick_ms(), None);

        rig.schedule.borrow_mut().on_mode_changed(DisplayMode::Ambient);
        assert_eq!(rig.events.pending_registrations(), 0);
        assert_eq!(rig.events.next_wake_ms(), Some(60_000));

        rig.events.run_until(180_000, &mut Idle).unwrap();

        let ambient_frames = rig
            .surface
            .borrow()
            .frames
            .iter()
            .filter(|f| f.1 == DisplayMode::Ambient)
            .count();
        // Mode switch plus ticks at 60s, 120s and 180s
        assert_eq!(ambient_frames, 4);
        assert_eq!(rig.events.stats().time_ticks, 3);
    }

    #[test]
    fn test_dropped_schedule_turns_deliveries_stale() {
        let mut rig = rig(0, RefreshIntervals::from_millis(1_000, 20_000, true));
        rig.schedule.borrow_mut().on_became_visible().unwrap();
        let token = rig.schedule.token();

        drop(rig.schedule);
        // Registrations left behind under the same token
        rig.events
            .fast_timer()
            .schedule_once(Duration::from_millis(2_000), token);
        rig.events.wake_alarm().schedule_exact_wake(3_000, token);

        rig.events.run_until(4_000, &mut Idle).unwrap();

        assert_eq!(rig.surface.borrow().frames.len(), 1);
        assert_eq!(rig.events.stats().stale_deliveries, 2);
        assert_eq!(rig.events.stats().fast_timers_fired, 0);
    }

    #[test]
    fn test_control_can_stop_the_loop() {
        struct StopAt(u64);

        impl LoopControl for StopAt {
            fn next_deadline_ms(&self) -> Option<u64> {
                Some(self.0)
            }

            fn poll(&mut self, _events: &mut EventLoop, now_ms: u64) -> Result<ControlFlow<()>> {
                Ok(if now_ms >= self.0 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                })
            }
        }

        let mut rig = rig(0, RefreshIntervals::from_millis(1_000, 20_000, true));
        rig.schedule.borrow_mut().on_became_visible().unwrap();

        rig.events.run_until(60_000, &mut StopAt(2_500)).unwrap();

        assert_eq!(rig.clock.now_millis(), 2_500);
        assert_eq!(rig.surface.borrow().frames.len(), 3);
    }
}
