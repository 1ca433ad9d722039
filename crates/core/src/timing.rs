//! Drift-compensation arithmetic for periodic checks.

use std::time::Duration;

/// Realign a schedule after its work consumed more than one period.
///
/// Returns the consumption carried into the next period and the number of
/// whole periods that were skipped. Missed ticks are dropped rather than
/// replayed, so a slow check never produces a burst of catch-up
/// notifications.
///
/// `period` must be non-zero; constructors reject zero periods before any
/// schedule reaches this point.
pub fn realign(consumed: Duration, period: Duration) -> (Duration, u64) {
    let period_nanos = period.as_nanos();
    let consumed_nanos = consumed.as_nanos();
    let missed = (consumed_nanos / period_nanos) as u64;
    let remainder = Duration::from_nanos((consumed_nanos % period_nanos) as u64);
    (remainder, missed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_realign_reports_one_missed_period_at_one_and_a_half() {
        let period = Duration::from_millis(100);
        let (remainder, missed) = realign(Duration::from_millis(150), period);
        assert_eq!(missed, 1);
        assert_eq!(remainder, Duration::from_millis(50));
    }

    #[test]
    fn test_realign_drops_all_whole_periods() {
        let period = Duration::from_millis(20);
        let (remainder, missed) = realign(Duration::from_millis(73), period);
        assert_eq!(missed, 3);
        assert_eq!(remainder, Duration::from_millis(13));
    }

    #[test]
    fn test_realign_exact_multiple_leaves_nothing_consumed() {
        let period = Duration::from_millis(50);
        let (remainder, missed) = realign(Duration::from_millis(100), period);
        assert_eq!(missed, 2);
        assert_eq!(remainder, Duration::ZERO);
    }
}
