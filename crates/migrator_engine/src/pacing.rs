use std::time::Duration;

/// Randomized pause inserted between two campaigns of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    pub min: Duration,
    pub max: Duration,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(60),
            max: Duration::from_secs(180),
        }
    }
}

impl PacingPolicy {
    /// Bounds are swapped if given in the wrong order.
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn is_disabled(&self) -> bool {
        self.max.is_zero()
    }

    /// A delay uniformly drawn from `[min, max]` at millisecond resolution.
    /// Falls back to `min` if the OS random source is unavailable.
    pub fn next_delay(&self) -> Duration {
        let span = self.max.saturating_sub(self.min).as_millis() as u64;
        if span == 0 {
            return self.min;
        }
        let mut bytes = [0u8; 8];
        if getrandom::fill(&mut bytes).is_err() {
            return self.min;
        }
        let offset = u64::from_le_bytes(bytes) % (span + 1);
        self.min + Duration::from_millis(offset)
    }
}
