use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaSettings {
    /// Maximum admissions per window.
    pub cap: u32,
    pub window: Duration,
    /// Floor applied to every non-zero wait.
    pub min_wait: Duration,
}

impl Default for QuotaSettings {
    fn default() -> Self {
        Self {
            cap: 20,
            window: Duration::from_secs(3600),
            min_wait: Duration::from_secs(60),
        }
    }
}

/// Rolling window counting admitted actions since `start`.
///
/// The window only rolls over inside `admit_at`, so the number of
/// admissions between two rollovers never exceeds `cap`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaWindow {
    settings: QuotaSettings,
    start: Instant,
    count: u32,
}

impl QuotaWindow {
    pub fn new(settings: QuotaSettings, now: Instant) -> Self {
        Self {
            settings,
            start: now,
            count: 0,
        }
    }

    /// Try to admit one action at `now`.
    ///
    /// Returns `0` when admitted. Otherwise returns the number of seconds to
    /// wait before asking again, and leaves the window untouched.
    pub fn admit_at(&mut self, now: Instant) -> u64 {
        let mut elapsed = now.saturating_duration_since(self.start);
        if elapsed >= self.settings.window {
            self.start = now;
            self.count = 0;
            elapsed = Duration::ZERO;
        }
        if self.count < self.settings.cap {
            self.count += 1;
            return 0;
        }
        let wait = (self.settings.window - elapsed).max(self.settings.min_wait);
        // Round up so a caller sleeping `wait` seconds lands past the rollover.
        wait.as_secs() + u64::from(wait.subsec_nanos() > 0)
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    pub fn settings(&self) -> &QuotaSettings {
        &self.settings
    }
}
