use crate::error::{KariError, KariResult};
use std::time::{Duration, Instant};

/// Fixed-rate sleeper for a control loop
///
/// Each cycle is measured from the end of the previous sleep. When a cycle
/// finishes late the schedule is re-anchored at "now": no catch-up burst.
#[derive(Debug, Clone)]
pub struct Rate {
    period: Duration,
    start: Instant,
    overruns: u64,
}

impl Rate {
    pub fn new(rate_hz: f64) -> KariResult<Self> {
        if !rate_hz.is_finite() || rate_hz <= 0.0 {
            return Err(KariError::config(format!(
                "rate must be a positive number of Hz, got {}",
                rate_hz
            )));
        }
        Ok(Self::from_period(Duration::from_secs_f64(1.0 / rate_hz)))
    }

    pub fn from_period(period: Duration) -> Self {
        Self {
            period,
            start: Instant::now(),
            overruns: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Restart the schedule from now
    pub fn reset(&mut self) {
        self.start = Instant::now();
    }

    /// Sleep out the rest of the current period.
    ///
    /// Returns `false` when the cycle already overran, in which case it
    /// returns immediately.
    pub fn sleep(&mut self) -> bool {
        let deadline = self.start + self.period;
        let now = Instant::now();

        if now < deadline {
            std::thread::sleep(deadline - now);
            self.start = deadline;
            true
        } else {
            self.overruns += 1;
            self.start = now;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_positive_rates() {
        assert!(Rate::new(0.0).is_err());
        assert!(Rate::new(-5.0).is_err());
        assert!(Rate::new(f64::NAN).is_err());
        assert_eq!(Rate::new(10.0).unwrap().period(), Duration::from_millis(100));
    }

    #[test]
    fn test_sleep_holds_the_period() {
        let mut rate = Rate::from_period(Duration::from_millis(20));
        let started = Instant::now();
        for _ in 0..3 {
            assert!(rate.sleep());
        }
        assert!(started.elapsed() >= Duration::from_millis(60));
        assert_eq!(rate.overruns(), 0);
    }

    #[test]
    fn test_overrun_does_not_burst() {
        let mut rate = Rate::from_period(Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(35));

        // Late cycle returns immediately, the next one waits a full period
        assert!(!rate.sleep());
        let after_overrun = Instant::now();
        assert!(rate.sleep());
        assert!(after_overrun.elapsed() >= Duration::from_millis(5));
        assert_eq!(rate.overruns(), 1);
    }
}
