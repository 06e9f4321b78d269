use std::time::Duration;

use follow_core::DelayRange;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Samples human-looking delays, uniformly over whole milliseconds.
#[derive(Debug, Clone)]
pub struct Humanizer {
    rng: StdRng,
}

impl Humanizer {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// An independent stream derived from this one.
    pub fn fork(&mut self) -> Self {
        Self {
            rng: StdRng::from_rng(&mut self.rng),
        }
    }

    pub fn sample(&mut self, range: DelayRange) -> Duration {
        let range = range.normalized();
        let min = range.min.as_millis() as u64;
        let max = range.max.as_millis() as u64;
        if min == max {
            return range.min;
        }
        Duration::from_millis(self.rng.random_range(min..=max))
    }

    /// Sleep for a sampled delay and return it.
    pub async fn pause(&mut self, range: DelayRange) -> Duration {
        let delay = self.sample(range);
        tokio::time::sleep(delay).await;
        delay
    }
}
