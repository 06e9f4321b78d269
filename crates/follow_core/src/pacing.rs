use std::time::Duration;

use crate::TargetOutcome;

/// Inclusive range a humanized delay is sampled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    pub const fn from_millis(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_millis(min),
            max: Duration::from_millis(max),
        }
    }

    pub const fn from_secs(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_secs(min),
            max: Duration::from_secs(max),
        }
    }

    /// Swap the bounds if they were given in the wrong order.
    pub fn normalized(self) -> Self {
        if self.min <= self.max {
            self
        } else {
            Self {
                min: self.max,
                max: self.min,
            }
        }
    }

    pub fn contains(&self, value: Duration) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Which pause follows a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaceKind {
    /// After a state-changing request went out.
    AfterMutation,
    /// After a failed target.
    AfterError,
    /// After a skip; nothing was billed.
    Brief,
}

impl PaceKind {
    /// `dry_run` mutations never touched the platform, so they get the brief pause.
    pub fn after(outcome: TargetOutcome, dry_run: bool) -> Self {
        match outcome {
            TargetOutcome::Mutated if dry_run => PaceKind::Brief,
            TargetOutcome::Mutated => PaceKind::AfterMutation,
            TargetOutcome::Error => PaceKind::AfterError,
            TargetOutcome::SkippedPrivate | TargetOutcome::SkippedAlreadyNotRelated => {
                PaceKind::Brief
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaceSettings {
    pub after_mutation: DelayRange,
    pub after_error: DelayRange,
    pub brief: DelayRange,
    /// Between opening the confirmation and confirming it.
    pub confirm_step: DelayRange,
    /// After loading a target before reading it.
    pub visit_settle: DelayRange,
}

impl Default for PaceSettings {
    fn default() -> Self {
        Self {
            after_mutation: DelayRange::from_secs(170, 240),
            after_error: DelayRange::from_secs(60, 120),
            brief: DelayRange::from_millis(300, 1_200),
            confirm_step: DelayRange::from_millis(1_000, 2_500),
            visit_settle: DelayRange::from_millis(2_500, 5_000),
        }
    }
}

impl PaceSettings {
    pub fn range_for(&self, kind: PaceKind) -> DelayRange {
        match kind {
            PaceKind::AfterMutation => self.after_mutation,
            PaceKind::AfterError => self.after_error,
            PaceKind::Brief => self.brief,
        }
    }
}
