//! Error-counting gate in front of the matching service.
//!
//! The breaker is Closed while errors stay below `threshold`. Reaching the
//! threshold opens it for `cooldown`. There is no timer: every
//! [`is_open`](CircuitBreaker::is_open) call checks whether the cooldown has
//! elapsed and closes the breaker before answering.

use std::time::{Duration, Instant};

/// Longest cooldown the breaker honors; longer values are clamped to it.
pub const MAX_COOLDOWN: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    error_count: u32,
    reset_at: Option<Instant>,
}

impl CircuitBreaker {
    /// A threshold of zero is treated as one. The cooldown is capped at
    /// [`MAX_COOLDOWN`].
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown: cooldown.min(MAX_COOLDOWN),
            error_count: 0,
            reset_at: None,
        }
    }

    pub fn is_open(&mut self) -> bool {
        self.is_open_at(Instant::now())
    }

    pub fn is_open_at(&mut self, now: Instant) -> bool {
        match self.reset_at {
            Some(reset_at) if now >= reset_at => {
                self.reset();
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    pub fn record_error(&mut self) {
        self.record_error_at(Instant::now());
    }

    /// Count one failure. Once open, further errors keep counting but never
    /// push `reset_at` out.
    pub fn record_error_at(&mut self, now: Instant) {
        self.error_count = self.error_count.saturating_add(1);
        if self.reset_at.is_none() && self.error_count >= self.threshold {
            let reset_at = now
                .checked_add(self.cooldown)
                .or_else(|| now.checked_add(MAX_COOLDOWN))
                .unwrap_or(now);
            self.reset_at = Some(reset_at);
        }
    }

    /// Force the breaker closed regardless of the cooldown.
    pub fn reset(&mut self) {
        self.error_count = 0;
        self.reset_at = None;
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    pub fn reset_at(&self) -> Option<Instant> {
        self.reset_at
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_at_threshold() {
        let now = Instant::now();
        let mut breaker = CircuitBreaker::new(3, Duration::from_secs(30));

        breaker.record_error_at(now);
        breaker.record_error_at(now);
        assert!(!breaker.is_open_at(now));

        breaker.record_error_at(now);
        assert!(breaker.is_open_at(now));
        assert_eq!(breaker.reset_at(), Some(now + Duration::from_secs(30)));
    }

    #[test]
    fn closes_after_cooldown() {
        let now = Instant::now();
        let mut breaker = CircuitBreaker::new(2, Duration::from_secs(10));
        breaker.record_error_at(now);
        breaker.record_error_at(now);

        assert!(breaker.is_open_at(now + Duration::from_secs(9)));
        assert_eq!(breaker.error_count(), 2);

        assert!(!breaker.is_open_at(now + Duration::from_secs(10)));
        assert_eq!(breaker.error_count(), 0);
        assert!(breaker.reset_at().is_none());
    }

    #[test]
    fn errors_while_open_do_not_extend_cooldown() {
        let now = Instant::now();
        let mut breaker = CircuitBreaker::new(1, Duration::from_secs(10));
        breaker.record_error_at(now);
        let reset_at = breaker.reset_at();

        breaker.record_error_at(now + Duration::from_secs(5));
        breaker.record_error_at(now + Duration::from_secs(6));
        assert_eq!(breaker.error_count(), 3);
        assert_eq!(breaker.reset_at(), reset_at);
        assert!(!breaker.is_open_at(now + Duration::from_secs(11)));
    }

    #[test]
    fn manual_reset_closes_immediately() {
        let now = Instant::now();
        let mut breaker = CircuitBreaker::new(1, Duration::from_secs(3600));
        breaker.record_error_at(now);
        assert!(breaker.is_open_at(now));

        breaker.reset();
        assert!(!breaker.is_open_at(now));
        assert_eq!(breaker.error_count(), 0);
    }

    #[test]
    fn oversized_cooldown_opens_instead_of_overflowing() {
        let now = Instant::now();
        let mut breaker = CircuitBreaker::new(1, Duration::from_secs(u64::MAX));
        assert_eq!(breaker.cooldown(), MAX_COOLDOWN);

        breaker.record_error_at(now);
        assert!(breaker.is_open_at(now));
        assert!(breaker.is_open_at(now + Duration::from_secs(365 * 24 * 60 * 60)));
        assert_eq!(breaker.reset_at(), Some(now + MAX_COOLDOWN));
    }

    #[test]
    fn zero_threshold_behaves_like_one() {
        let mut breaker = CircuitBreaker::new(0, Duration::from_secs(60));
        assert_eq!(breaker.threshold(), 1);
        breaker.record_error();
        assert!(breaker.is_open());
    }
}
