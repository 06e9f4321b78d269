use std::fmt;
use std::time::Duration;

use follow_core::{Completeness, Direction, Identifier, PaceKind, RoundVerdict, TargetOutcome};

use crate::PersistError;

/// Everything the engine surfaces to its observability sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    RateSignal {
        marker: String,
    },
    CooldownEntered {
        duration: Duration,
    },
    CooldownProgress {
        remaining: Duration,
    },
    CooldownExited,
    QuotaWait {
        wait: Duration,
        admitted_in_window: u32,
    },
    QuotaProgress {
        remaining: Duration,
    },
    HarvestStarted {
        direction: Direction,
        attempt: u32,
    },
    HarvestExpected {
        direction: Direction,
        expected: Option<usize>,
    },
    HarvestRound {
        direction: Direction,
        round: u32,
        verdict: RoundVerdict,
        collected: usize,
    },
    HarvestAttemptFailed {
        direction: Direction,
        attempt: u32,
        reason: String,
    },
    HarvestRetry {
        direction: Direction,
        attempt: u32,
        completeness: Completeness,
    },
    HarvestFinished {
        direction: Direction,
        collected: usize,
        completeness: Completeness,
    },
    TargetStarted {
        index: usize,
        total: usize,
        target: Identifier,
    },
    TargetFinished {
        target: Identifier,
        outcome: TargetOutcome,
        dry_run: bool,
    },
    InteractionRetry {
        target: Identifier,
        attempt: u32,
        reason: String,
    },
    Pacing {
        kind: PaceKind,
        delay: Duration,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct DriverError {
    pub kind: FailureKind,
    pub message: String,
}

impl DriverError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_unauthenticated(&self) -> bool {
        self.kind == FailureKind::Unauthenticated
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    /// The session no longer grants access; fatal to the run.
    Unauthenticated,
    /// The list view or profile could not be located.
    ContainerMissing,
    EmptyResponse,
    Decode,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    InteractionFailed,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Unauthenticated => write!(f, "not authenticated"),
            FailureKind::ContainerMissing => write!(f, "container missing"),
            FailureKind::EmptyResponse => write!(f, "empty response"),
            FailureKind::Decode => write!(f, "undecodable response"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::InteractionFailed => write!(f, "interaction failed"),
        }
    }
}

/// Failures that abort the run.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("could not locate the {direction} list in {attempts} attempt(s)")]
    ContainerNotFound { direction: Direction, attempts: u32 },
    #[error("session is no longer authenticated: {0}")]
    SessionExpired(String),
    #[error("no persisted {0}; run once without skipping the harvest")]
    MissingSnapshot(String),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

impl EngineError {
    pub(crate) fn session_expired(err: &DriverError) -> Self {
        EngineError::SessionExpired(err.message.clone())
    }
}
