use std::time::{Duration, Instant};

/// Bounds of the stop-the-world pause after a rate-limit detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownSettings {
    pub min: Duration,
    pub max: Duration,
    /// Progress is reported at least this often while waiting.
    pub tick: Duration,
}

impl Default for CooldownSettings {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(10 * 60),
            max: Duration::from_secs(20 * 60),
            tick: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CooldownState {
    #[default]
    Normal,
    Detected,
    Waiting {
        until: Instant,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownEvent {
    /// A rate-limit marker was seen.
    Detected,
    /// A pause deadline was chosen.
    Scheduled { until: Instant },
    /// The clock reached `now`.
    Elapsed { now: Instant },
}

impl CooldownState {
    /// Pure transition function. Events that do not apply to the current
    /// state leave it unchanged, so a second detection while already
    /// waiting never stacks another pause.
    pub fn apply(self, event: CooldownEvent) -> CooldownState {
        match (self, event) {
            (CooldownState::Normal, CooldownEvent::Detected) => CooldownState::Detected,
            (CooldownState::Detected, CooldownEvent::Scheduled { until }) => {
                CooldownState::Waiting { until }
            }
            (CooldownState::Waiting { until }, CooldownEvent::Elapsed { now }) if now >= until => {
                CooldownState::Normal
            }
            (state, _) => state,
        }
    }

    pub fn is_normal(&self) -> bool {
        matches!(self, CooldownState::Normal)
    }

    /// Time left before the pause ends, if waiting.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        match self {
            CooldownState::Waiting { until } => Some(until.saturating_duration_since(now)),
            _ => None,
        }
    }
}
