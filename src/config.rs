use rand::Rng;
use std::time::Duration;

/// Knobs for `BankService`.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Upper bound on each storage call (begin, read, write, commit, rollback).
    /// Expiry is reported as `BankError::Timeout` and rolls the scope back.
    pub storage_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            storage_timeout: Duration::from_secs(5),
        }
    }
}

/// Artificial delay applied by the bundled stores to every storage call,
/// standing in for network and disk round trips.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatencyProfile {
    pub min: Duration,
    pub max: Duration,
}

impl LatencyProfile {
    pub const NONE: Self = Self {
        min: Duration::ZERO,
        max: Duration::ZERO,
    };

    pub fn between(min: Duration, max: Duration) -> Self {
        if max < min {
            Self { min: max, max: min }
        } else {
            Self { min, max }
        }
    }

    pub fn is_none(&self) -> bool {
        self.max.is_zero()
    }

    /// Picks a delay uniformly in `[min, max]`.
    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let min = self.min.as_micros() as u64;
        let max = self.max.as_micros() as u64;
        Duration::from_micros(rand::thread_rng().gen_range(min..=max))
    }

    pub async fn pause(&self) {
        if self.is_none() {
            return;
        }
        let delay = self.sample();
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_within_bounds() {
        let profile = LatencyProfile::between(Duration::from_millis(20), Duration::from_millis(200));
        for _ in 0..100 {
            let d = profile.sample();
            assert!(d >= Duration::from_millis(20) && d <= Duration::from_millis(200));
        }
    }

    #[test]
    fn test_between_swaps_reversed_bounds() {
        let profile = LatencyProfile::between(Duration::from_millis(9), Duration::from_millis(3));
        assert_eq!(profile.min, Duration::from_millis(3));
        assert_eq!(profile.max, Duration::from_millis(9));
    }

    #[tokio::test]
    async fn test_none_does_not_sleep() {
        let start = std::time::Instant::now();
        LatencyProfile::NONE.pause().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
