use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Source of wall-clock time in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to. Used for simulation and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }

    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Absolute end instant of a countdown. Remaining time is always derived
/// from this, never tracked by decrementing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountdownAnchor {
    pub end_time_millis: i64,
}

impl CountdownAnchor {
    pub fn at(end_time_millis: i64) -> Self {
        Self { end_time_millis }
    }

    pub fn starting_at(now_millis: i64, duration: Duration) -> Self {
        Self {
            end_time_millis: now_millis.saturating_add(duration.as_millis() as i64),
        }
    }

    pub fn from_minutes(now_millis: i64, minutes: u32) -> Self {
        Self::starting_at(now_millis, Duration::from_secs(u64::from(minutes) * 60))
    }

    /// `max(0, floor((end - now) / 1000))`
    pub fn remaining_seconds(&self, now_millis: i64) -> u64 {
        (self.end_time_millis.saturating_sub(now_millis).max(0) / 1000) as u64
    }

    pub fn is_elapsed(&self, now_millis: i64) -> bool {
        self.remaining_seconds(now_millis) == 0
    }
}

/// Coarse presentation band for the remaining time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Relaxed,
    Hurry,
    Critical,
}

impl Urgency {
    pub fn from_remaining(remaining_seconds: u64) -> Self {
        match remaining_seconds {
            s if s > 60 => Urgency::Relaxed,
            20..=60 => Urgency::Hurry,
            _ => Urgency::Critical,
        }
    }
}

/// `MM:SS`, minutes are not wrapped at an hour.
pub fn format_clock(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_anchor_from_minutes() {
        let anchor = CountdownAnchor::from_minutes(1_000, 15);
        assert_eq!(anchor.end_time_millis, 1_000 + 900_000);
        assert_eq!(anchor.remaining_seconds(1_000), 900);
    }

    #[test]
    fn test_remaining_floors_partial_seconds() {
        let anchor = CountdownAnchor::at(10_000);
        assert_eq!(anchor.remaining_seconds(8_001), 1);
        assert_eq!(anchor.remaining_seconds(9_000), 1);
        assert_eq!(anchor.remaining_seconds(9_001), 0);
        assert!(anchor.is_elapsed(9_001));
    }

    #[test]
    fn test_remaining_never_negative() {
        let anchor = CountdownAnchor::at(10_000);
        assert_eq!(anchor.remaining_seconds(50_000), 0);
    }

    #[test]
    fn test_extreme_anchors_saturate() {
        assert_eq!(CountdownAnchor::at(i64::MIN).remaining_seconds(1_700_000_000_000), 0);
        assert!(CountdownAnchor::at(i64::MIN).is_elapsed(i64::MAX));
        assert_eq!(
            CountdownAnchor::at(i64::MAX).remaining_seconds(i64::MIN),
            (i64::MAX / 1000) as u64
        );
        let far = CountdownAnchor::starting_at(i64::MAX - 10, Duration::from_secs(60));
        assert_eq!(far.end_time_millis, i64::MAX);
    }

    #[test]
    fn test_urgency_bands() {
        assert_eq!(Urgency::from_remaining(900), Urgency::Relaxed);
        assert_eq!(Urgency::from_remaining(61), Urgency::Relaxed);
        assert_eq!(Urgency::from_remaining(60), Urgency::Hurry);
        assert_eq!(Urgency::from_remaining(20), Urgency::Hurry);
        assert_eq!(Urgency::from_remaining(19), Urgency::Critical);
        assert_eq!(Urgency::from_remaining(0), Urgency::Critical);
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(900), "15:00");
        assert_eq!(format_clock(65), "01:05");
        assert_eq!(format_clock(0), "00:00");
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(5);
        clock.advance(Duration::from_secs(2));
        assert_eq!(clock.now_millis(), 2_005);
        clock.set(0);
        assert_eq!(clock.now_millis(), 0);
    }

    proptest! {
        #[test]
        fn prop_remaining_is_pure_function_of_anchor(
            end in 0i64..10_000_000,
            now in 0i64..10_000_000,
            skew in 0i64..5_000,
        ) {
            let anchor = CountdownAnchor::at(end);
            let expected = ((end - now).max(0) / 1000) as u64;
            prop_assert_eq!(anchor.remaining_seconds(now), expected);
            prop_assert!(anchor.remaining_seconds(now + skew) <= anchor.remaining_seconds(now));
        }
    }
}
