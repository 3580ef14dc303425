//! # Fibonacci Backoff
//!
//! Retry delays for transient reconciliation failures. Grows more slowly than
//! exponential backoff: 1m, 1m, 2m, 3m, 5m, 8m, then capped at 10m.

use std::time::Duration;

/// Fibonacci backoff calculator
///
/// Each delay is the sum of the previous two, capped at `max`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min: Duration,
    prev: Duration,
    current: Duration,
    max: Duration,
}

impl Default for FibonacciBackoff {
    /// 1 minute minimum, 10 minutes maximum
    fn default() -> Self {
        Self::new(Duration::from_secs(60), Duration::from_secs(600))
    }
}

impl FibonacciBackoff {
    /// `min` is used for the first two delays, `max` caps the sequence
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            prev: Duration::ZERO,
            current: min,
            max,
        }
    }

    /// Current delay; advances the sequence
    pub fn next_delay(&mut self) -> Duration {
        let result = self.current;
        let next = self.prev + self.current;
        self.prev = self.current;
        self.current = next.min(self.max);
        result
    }

    /// Restart the sequence after a success
    pub fn reset(&mut self) {
        self.prev = Duration::ZERO;
        self.current = self.min;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minutes(n: u64) -> Duration {
        Duration::from_secs(n * 60)
    }

    #[test]
    fn test_fibonacci_backoff_sequence() {
        let mut backoff = FibonacciBackoff::default();

        let delays: Vec<Duration> = (0..7).map(|_| backoff.next_delay()).collect();
        assert_eq!(
            delays,
            vec![minutes(1), minutes(1), minutes(2), minutes(3), minutes(5), minutes(8), minutes(10)]
        );
    }

    #[test]
    fn test_fibonacci_backoff_max_cap() {
        let mut backoff = FibonacciBackoff::default();
        for _ in 0..7 {
            backoff.next_delay();
        }

        // 13m would be next, capped at 10m
        assert_eq!(backoff.next_delay(), minutes(10));
        assert_eq!(backoff.next_delay(), minutes(10));
    }

    #[test]
    fn test_fibonacci_backoff_reset() {
        let mut backoff = FibonacciBackoff::default();
        for _ in 0..4 {
            backoff.next_delay();
        }

        backoff.reset();

        assert_eq!(backoff.next_delay(), minutes(1));
        assert_eq!(backoff.next_delay(), minutes(1));
        assert_eq!(backoff.next_delay(), minutes(2));
    }
}
