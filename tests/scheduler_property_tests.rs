use ambientr::common::logger::Log;
use ambientr::config::Config;
use ambientr::host::script::Timeline;
use ambientr::host::{Host, HostEvent, HostSettings};
use ambientr::schedule::alignment::next_boundary;
use ambientr::schedule::{PendingWake, RefreshIntervals, ScheduleState};
use ambientr::surfaces::SurfaceKind;
use ambientr::time_source::{SimulatedTimeSource, TimeSource};
use proptest::prelude::*;
use std::sync::Arc;

const CLOCK_END_MS: u64 = 4_000_000_000_000;

fn host_at(start_ms: u64, settings: &HostSettings) -> (Host, Arc<SimulatedTimeSource>) {
    Log::set_enabled(false);
    let clock = Arc::new(SimulatedTimeSource::fast_forward_millis(start_ms, CLOCK_END_MS).unwrap());
    let host = Host::new(settings, clock.clone()).unwrap();
    (host, clock)
}

fn advance(host: &mut Host, clock: &SimulatedTimeSource, millis: u64) {
    let now = clock.now_millis();
    let mut idle = Timeline::new(now, Vec::new());
    host.run(now + millis, &mut idle).unwrap();
}

fn lifecycle_event_strategy() -> impl Strategy<Value = HostEvent> {
    prop_oneof![
        Just(HostEvent::Visible),
        Just(HostEvent::Hidden),
        Just(HostEvent::EnterAmbient),
        Just(HostEvent::ExitAmbient),
        Just(HostEvent::ToggleAmbient),
        Just(HostEvent::ToggleVisible),
        Just(HostEvent::Tap),
        (0u32..50_000).prop_map(HostEvent::Steps),
    ]
}

/// Properties of the schedule as seen through a host on a simulated clock
#[cfg(test)]
mod schedule_invariant_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Interactive refreshes land on every boundary and only there
        #[test]
        fn test_interactive_refreshes_follow_the_grid(
            start_ms in 0u64..1_000_000_000,
            interval_ms in 10u64..5_000,
            boundaries in 1u64..20,
        ) {
            let mut settings =
                HostSettings::from_config(&Config::default(), SurfaceKind::DailyTotal)
                    .with_echo_frames(false);
            settings.intervals = RefreshIntervals::from_millis(interval_ms, 3_600_000, true);
            let (mut host, clock) = host_at(start_ms, &settings);

            host.handle_event(HostEvent::Visible).unwrap();
            let end_ms = start_ms + boundaries * interval_ms;
            advance(&mut host, &clock, end_ms - start_ms);

            // One refresh on becoming visible, then one per boundary in (start, end]
            let expected = 1 + end_ms / interval_ms - start_ms / interval_ms;
            prop_assert_eq!(host.surface().frames().interactive, expected);

            let last = host.surface().last_frame().unwrap();
            if expected > 1 {
                prop_assert_eq!(last.at_ms % interval_ms, 0);
            }

            let schedule = host.schedule().unwrap().borrow();
            prop_assert_eq!(
                schedule.pending(),
                PendingWake::FastTimer { due_ms: next_boundary(end_ms, interval_ms) }
            );
        }

        /// Ambient wake alarms are armed on the ambient grid
        #[test]
        fn test_ambient_alarm_lands_on_boundary(
            start_ms in 0u64..1_000_000_000,
            ambient_secs in 1u64..120,
            elapsed_ms in 0u64..600_000,
        ) {
            let ambient_ms = ambient_secs * 1_000;
            let mut settings =
                HostSettings::from_config(&Config::default(), SurfaceKind::DailyTotal)
                    .with_echo_frames(false);
            settings.intervals = RefreshIntervals::from_millis(1_000, ambient_ms, true);
            let (mut host, clock) = host_at(start_ms, &settings);

            host.handle_event(HostEvent::Visible).unwrap();
            host.handle_event(HostEvent::EnterAmbient).unwrap();
            advance(&mut host, &clock, elapsed_ms);

            let now = clock.now_millis();
            let schedule = host.schedule().unwrap().borrow();
            prop_assert_eq!(
                schedule.pending(),
                PendingWake::WakeAlarm { trigger_at_ms: next_boundary(now, ambient_ms) }
            );
            prop_assert_eq!(host.surface().frames().interactive, 1);
            prop_assert_eq!(host.events().stats().fast_timers_fired, 0);
        }

        /// Whatever the host does, a schedule never holds more than one
        /// registration and that registration always matches its state
        #[test]
        fn test_at_most_one_pending_registration(
            start_ms in 0u64..1_000_000_000,
            steps in prop::collection::vec((lifecycle_event_strategy(), 0u64..45_000), 1..30),
        ) {
            let settings = HostSettings::from_config(&Config::default(), SurfaceKind::DailyTotal)
                .with_echo_frames(false);
            let (mut host, clock) = host_at(start_ms, &settings);

            for (event, pause_ms) in steps {
                host.handle_event(event).unwrap();
                advance(&mut host, &clock, pause_ms);

                let registrations = host.events().pending_registrations();
                prop_assert!(registrations <= 1);

                let schedule = host.schedule().unwrap().borrow();
                let now = clock.now_millis();
                match schedule.state() {
                    ScheduleState::Stopped => {
                        prop_assert_eq!(schedule.pending(), PendingWake::None);
                        prop_assert_eq!(registrations, 0);
                    }
                    ScheduleState::RunningInteractive => {
                        prop_assert_eq!(
                            schedule.pending(),
                            PendingWake::FastTimer { due_ms: next_boundary(now, 1_000) }
                        );
                        prop_assert_eq!(registrations, 1);
                    }
                    ScheduleState::RunningAmbient => {
                        prop_assert_eq!(
                            schedule.pending(),
                            PendingWake::WakeAlarm { trigger_at_ms: next_boundary(now, 20_000) }
                        );
                        prop_assert_eq!(registrations, 1);
                    }
                }
            }

            // Nothing the schedule ignored ever reached it as a live registration
            prop_assert_eq!(host.events().stats().stale_deliveries, 0);
            prop_assert_eq!(host.events().stats().fast_timers_dropped, 0);
        }
    }
}
