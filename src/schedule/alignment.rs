//! Wall-clock bucket alignment.
//!
//! Refreshes are anchored to absolute time boundaries rather than to the time of
//! the previous refresh. Every schedule with the same interval ticks in lock-step,
//! and a late or early callback cannot accumulate drift.

/// Milliseconds from `now_ms` to the next multiple of `interval_ms`.
///
/// Always in `1..=interval_ms`: a time sitting exactly on a boundary waits a full
/// interval instead of firing again immediately. An interval of zero is treated as
/// one millisecond; configuration validation rejects it before it gets here.
pub fn delay_until_boundary(now_ms: u64, interval_ms: u64) -> u64 {
    let interval = interval_ms.max(1);
    interval - (now_ms % interval)
}

/// The next boundary strictly after `now_ms`.
pub fn next_boundary(now_ms: u64, interval_ms: u64) -> u64 {
    now_ms.saturating_add(delay_until_boundary(now_ms, interval_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_interactive_example() {
        assert_eq!(delay_until_boundary(12_345, 1_000), 655);
        assert_eq!(next_boundary(12_345, 1_000), 13_000);
    }

    #[test]
    fn test_ambient_example() {
        assert_eq!(delay_until_boundary(100_001, 20_000), 19_999);
        assert_eq!(next_boundary(100_001, 20_000), 120_000);
    }

    #[test]
    fn test_on_boundary_waits_full_interval() {
        assert_eq!(delay_until_boundary(120_000, 20_000), 20_000);
        assert_eq!(delay_until_boundary(0, 500), 500);
    }

    #[test]
    fn test_zero_interval_does_not_divide_by_zero() {
        assert_eq!(delay_until_boundary(42, 0), 1);
    }

    proptest! {
        #[test]
        fn prop_delay_is_positive_and_bounded(
            now in 0u64..u64::MAX / 2,
            interval in 1u64..10_000_000,
        ) {
            let delay = delay_until_boundary(now, interval);
            prop_assert!(delay > 0);
            prop_assert!(delay <= interval);
        }

        #[test]
        fn prop_trigger_lands_on_boundary(now in 0u64..u64::MAX / 2, interval in 1u64..10_000_000) {
            prop_assert_eq!(next_boundary(now, interval) % interval, 0);
        }
    }
}
