//! Scheduler configuration

use crate::error::{KariError, KariResult};
use serde::{Deserialize, Serialize};

/// Default loop frequency
pub const DEFAULT_RATE_HZ: f64 = 10.0;

/// Timing settings for the fixed-rate loop. Read once at startup; the rate
/// cannot change while the loop runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Tick frequency in Hz
    pub rate_hz: f64,
    /// Log a metrics summary every this many ticks (0 = never)
    pub report_every: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            rate_hz: DEFAULT_RATE_HZ,
            report_every: 0,
        }
    }
}

impl SchedulerConfig {
    pub fn with_rate(rate_hz: f64) -> Self {
        Self {
            rate_hz,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> KariResult<()> {
        if !self.rate_hz.is_finite() || self.rate_hz <= 0.0 {
            return Err(KariError::config(format!(
                "scheduler.rate_hz must be positive, got {}",
                self.rate_hz
            )));
        }
        Ok(())
    }
}
