//! Time source abstraction for real and simulated wall-clock time.
//!
//! The scheduler reads "now" and the event loop waits exclusively through a
//! [`TimeSource`], so the same code runs against the system clock or against a
//! simulated clock that fast-forwards through waits. The simulated clock is what
//! makes boundary alignment testable with exact millisecond values.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDateTime, TimeZone};
use once_cell::sync::OnceCell;
use std::sync::{Arc, Mutex};
use std::time::{Duration as StdDuration, Instant};

/// Global time source used by the logger's timestamp prefix.
static TIME_SOURCE: OnceCell<Arc<dyn TimeSource>> = OnceCell::new();

/// Trait for abstracting time operations
pub trait TimeSource: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Local>;

    /// Current wall-clock time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64 {
        self.now().timestamp_millis().max(0) as u64
    }

    /// Sleep for the specified duration (or simulate it)
    fn sleep(&self, duration: StdDuration);

    /// Check if this is a simulated time source
    fn is_simulated(&self) -> bool;

    /// Check if simulation has ended (always false for real time)
    fn is_ended(&self) -> bool {
        false
    }
}

/// Real-time implementation that uses actual system time
pub struct RealTimeSource;

impl TimeSource for RealTimeSource {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    fn sleep(&self, duration: StdDuration) {
        std::thread::sleep(duration);
    }

    fn is_simulated(&self) -> bool {
        false
    }
}

/// Simulated time source for tests and time-accelerated runs.
///
/// Two modes:
/// - Fast-forward (multiplier 0.0): every sleep advances the clock instantly by
///   exactly the requested duration.
/// - Linear acceleration: sleeps take `duration / multiplier` of real time and the
///   clock advances smoothly while they run.
///
/// The clock never moves past `end_time`.
pub struct SimulatedTimeSource {
    start_time: DateTime<Local>,
    end_time: DateTime<Local>,
    /// 0.0 selects fast-forward
    time_multiplier: f64,
    /// Simulated time elapsed by completed sleeps
    elapsed: Mutex<StdDuration>,
    /// In-progress accelerated sleep: (real start, simulated length)
    sleep_in_progress: Mutex<Option<(Instant, StdDuration)>>,
}

impl SimulatedTimeSource {
    /// Create a simulated clock running from `start_time` to `end_time`.
    ///
    /// A negative multiplier falls back to one simulated hour per real second.
    pub fn new(start_time: DateTime<Local>, end_time: DateTime<Local>, multiplier: f64) -> Self {
        let time_multiplier = if multiplier == 0.0 {
            0.0
        } else if multiplier < 0.0 {
            3600.0
        } else {
            multiplier
        };

        Self {
            start_time,
            end_time,
            time_multiplier,
            elapsed: Mutex::new(StdDuration::ZERO),
            sleep_in_progress: Mutex::new(None),
        }
    }

    /// Fast-forward clock between two epoch millisecond instants.
    pub fn fast_forward_millis(start_ms: u64, end_ms: u64) -> Result<Self> {
        let start = local_from_millis(start_ms)?;
        let end = local_from_millis(end_ms)?;
        Ok(Self::new(start, end, 0.0))
    }

    pub fn is_fast_forward(&self) -> bool {
        self.time_multiplier == 0.0
    }

    fn current_time(&self) -> DateTime<Local> {
        let mut total = *self.elapsed.lock().unwrap_or_else(|e| e.into_inner());

        if let Some((started, simulated)) = *self
            .sleep_in_progress
            .lock()
            .unwrap_or_else(|e| e.into_inner())
        {
            let progressed = started.elapsed().mul_f64(self.time_multiplier);
            total += progressed.min(simulated);
        }

        let simulated = self.start_time + to_chrono(total);
        simulated.min(self.end_time)
    }

    fn remaining(&self) -> StdDuration {
        (self.end_time - self.current_time())
            .to_std()
            .unwrap_or(StdDuration::ZERO)
    }
}

impl TimeSource for SimulatedTimeSource {
    fn now(&self) -> DateTime<Local> {
        self.current_time()
    }

    fn sleep(&self, duration: StdDuration) {
        let step = duration.min(self.remaining());
        if step.is_zero() {
            return;
        }

        if self.is_fast_forward() {
            *self.elapsed.lock().unwrap_or_else(|e| e.into_inner()) += step;
            std::thread::yield_now();
            return;
        }

        *self
            .sleep_in_progress
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some((Instant::now(), step));

        std::thread::sleep(step.div_f64(self.time_multiplier));

        *self
            .sleep_in_progress
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = None;
        *self.elapsed.lock().unwrap_or_else(|e| e.into_inner()) += step;
    }

    fn is_simulated(&self) -> bool {
        true
    }

    fn is_ended(&self) -> bool {
        self.current_time() >= self.end_time
    }
}

fn to_chrono(duration: StdDuration) -> ChronoDuration {
    ChronoDuration::from_std(duration).unwrap_or_else(|_| ChronoDuration::days(36_500))
}

/// Convert epoch milliseconds to a local timestamp.
pub fn local_from_millis(ms: u64) -> Result<DateTime<Local>> {
    let ms = i64::try_from(ms).context("Timestamp out of range")?;
    DateTime::from_timestamp_millis(ms)
        .map(|utc| utc.with_timezone(&Local))
        .ok_or_else(|| anyhow::anyhow!("Timestamp out of range: {ms}ms"))
}

/// Initialize the global time source (call once at startup)
pub fn init_time_source(source: Arc<dyn TimeSource>) {
    TIME_SOURCE.set(source).ok();
}

/// Check if the time source has been initialized
pub fn is_initialized() -> bool {
    TIME_SOURCE.get().is_some()
}

/// Get the current time from the global time source
pub fn now() -> DateTime<Local> {
    TIME_SOURCE.get_or_init(|| Arc::new(RealTimeSource)).now()
}

/// Check if we're running in simulation mode
pub fn is_simulated() -> bool {
    TIME_SOURCE
        .get_or_init(|| Arc::new(RealTimeSource))
        .is_simulated()
}

/// Parse a datetime string in the format "YYYY-MM-DD HH:MM:SS"
pub fn parse_datetime(s: &str) -> Result<DateTime<Local>, String> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map_err(|e| format!("Invalid datetime format: {e}. Use YYYY-MM-DD HH:MM:SS"))
        .and_then(|naive| {
            Local
                .from_local_datetime(&naive)
                .single()
                .ok_or_else(|| "Ambiguous or invalid local time".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_forward_sleep_advances_exactly() {
        let clock = SimulatedTimeSource::fast_forward_millis(12_345, 200_000).unwrap();
        assert_eq!(clock.now_millis(), 12_345);

        clock.sleep(StdDuration::from_millis(655));
        assert_eq!(clock.now_millis(), 13_000);
    }

    #[test]
    fn test_fast_forward_clamps_at_end() {
        let clock = SimulatedTimeSource::fast_forward_millis(0, 1_000).unwrap();
        clock.sleep(StdDuration::from_secs(5));

        assert_eq!(clock.now_millis(), 1_000);
        assert!(clock.is_ended());

        // Further sleeps are no-ops once the end is reached
        clock.sleep(StdDuration::from_millis(1));
        assert_eq!(clock.now_millis(), 1_000);
    }

    #[test]
    fn test_accelerated_sleep_advances_simulated_time() {
        let clock = SimulatedTimeSource::fast_forward_millis(0, 60_000).unwrap();
        let accelerated = SimulatedTimeSource::new(clock.start_time, clock.end_time, 10_000.0);

        accelerated.sleep(StdDuration::from_secs(10));
        assert_eq!(accelerated.now_millis(), 10_000);
        assert!(!accelerated.is_fast_forward());
    }

    #[test]
    fn test_real_time_source_is_not_simulated() {
        let clock = RealTimeSource;
        assert!(!clock.is_simulated());
        assert!(!clock.is_ended());
        assert!(clock.now_millis() > 0);
    }

    #[test]
    fn test_parse_datetime_rejects_garbage() {
        assert!(parse_datetime("2026-10-18 07:30:00").is_ok());
        assert!(parse_datetime("yesterday").is_err());
    }
}
