use std::time::Duration;

/// Wait policy applied between reads of an idle partition.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub min: Duration,
    pub max: Duration,
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(500),
            max: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl BackoffPolicy {
    pub fn new(min: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            min,
            max: max.max(min),
            multiplier: if multiplier.is_finite() && multiplier >= 1.0 {
                multiplier
            } else {
                1.0
            },
        }
    }

    /// Constant poll delay, the classic fixed feed poll interval.
    pub fn fixed(delay: Duration) -> Self {
        Self::new(delay, delay, 1.0)
    }
}

/// Tracks consecutive empty reads and hands out the next wait.
#[derive(Clone, Debug)]
pub struct IdleBackoff {
    policy: BackoffPolicy,
    consecutive_empty: u32,
}

impl IdleBackoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            consecutive_empty: 0,
        }
    }

    /// Records an empty read and returns how long to wait before the next one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.delay_for(self.consecutive_empty);
        self.consecutive_empty = self.consecutive_empty.saturating_add(1);
        delay
    }

    /// Called after a page with changes.
    pub fn reset(&mut self) {
        self.consecutive_empty = 0;
    }

    pub fn consecutive_empty(&self) -> u32 {
        self.consecutive_empty
    }

    fn delay_for(&self, empties: u32) -> Duration {
        if self.policy.min.is_zero() {
            return Duration::ZERO;
        }

        let min = self.policy.min.as_nanos() as f64;
        let max = (self.policy.max.as_nanos() as f64).max(min);
        // Exponent capped so the float math never overflows to infinity.
        let exponent = empties.min(32) as i32;
        let nanos = (min * self.policy.multiplier.powi(exponent)).clamp(min, max);
        Duration::from_nanos(nanos.round() as u64)
    }
}
