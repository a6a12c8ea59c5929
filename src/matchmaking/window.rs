use crate::config::MatchmakingConfig;
use crate::scheduler::Tick;

/// Rank-point tolerance as a function of waiting time.
///
/// `width(age) = min(start + step * (age / interval), max)`: it starts at
/// `start`, grows in steps while a request waits, and never passes `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptanceWindow {
    start: i64,
    step: i64,
    interval: Tick,
    max: i64,
}

impl AcceptanceWindow {
    pub fn new(start: i64, step: i64, interval: Tick, max: i64) -> Self {
        Self {
            start,
            step: step.max(0),
            interval: interval.max(1),
            max: max.max(start),
        }
    }

    pub fn from_config(config: &MatchmakingConfig) -> Self {
        Self::new(
            config.window_start,
            config.widen_step,
            config.widen_interval_ticks,
            config.max_window,
        )
    }

    pub fn width(&self, age: Tick) -> i64 {
        let steps = i64::try_from(age / self.interval).unwrap_or(i64::MAX);
        self.start
            .saturating_add(self.step.saturating_mul(steps))
            .min(self.max)
    }

    /// Whether two ranks may be paired given the longer of the two waits.
    pub fn accepts(&self, rank_a: i64, rank_b: i64, longest_age: Tick) -> bool {
        rank_a.abs_diff(rank_b) <= self.width(longest_age).unsigned_abs()
    }

    pub fn max(&self) -> i64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_configured_width() {
        let window = AcceptanceWindow::new(50, 10, 100, 200);
        assert_eq!(window.width(0), 50);
        assert_eq!(window.width(99), 50);
    }

    #[test]
    fn widens_in_steps() {
        let window = AcceptanceWindow::new(50, 10, 100, 200);
        assert_eq!(window.width(100), 60);
        assert_eq!(window.width(250), 70);
    }

    #[test]
    fn never_exceeds_max() {
        let window = AcceptanceWindow::new(50, 10, 100, 200);
        assert_eq!(window.width(1_000_000), 200);
        assert_eq!(window.width(u64::MAX), 200);
    }

    #[test]
    fn width_is_monotonic_in_age() {
        let window = AcceptanceWindow::new(30, 7, 13, 150);
        let mut previous = window.width(0);
        for age in 1..2_000 {
            let current = window.width(age);
            assert!(current >= previous, "window shrank at age {}", age);
            assert!(current <= window.max());
            previous = current;
        }
    }

    #[test]
    fn accepts_uses_absolute_difference() {
        let window = AcceptanceWindow::new(50, 10, 100, 200);
        assert!(window.accepts(1000, 1050, 0));
        assert!(window.accepts(1050, 1000, 0));
        assert!(!window.accepts(1000, 1060, 0));
        assert!(window.accepts(1000, 1060, 100));
    }

    #[test]
    fn from_config_copies_fields() {
        let cfg = MatchmakingConfig::default().with_window(5, 1, 10, 9);
        let window = AcceptanceWindow::from_config(&cfg);
        assert_eq!(window.width(0), 5);
        assert_eq!(window.width(1_000), 9);
    }
}
