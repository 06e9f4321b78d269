use std::collections::BTreeMap;
use std::fmt;

use crate::{Identifier, TargetList};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetOutcome {
    Mutated,
    SkippedPrivate,
    SkippedAlreadyNotRelated,
    Error,
}

impl TargetOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetOutcome::Mutated => "mutated",
            TargetOutcome::SkippedPrivate => "skipped_private",
            TargetOutcome::SkippedAlreadyNotRelated => "skipped_not_related",
            TargetOutcome::Error => "error",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "mutated" => Some(TargetOutcome::Mutated),
            "skipped_private" => Some(TargetOutcome::SkippedPrivate),
            "skipped_not_related" => Some(TargetOutcome::SkippedAlreadyNotRelated),
            "error" => Some(TargetOutcome::Error),
            _ => None,
        }
    }

    /// Settled outcomes are not revisited when a run resumes.
    pub fn is_settled(self) -> bool {
        !matches!(self, TargetOutcome::Error)
    }
}

impl fmt::Display for TargetOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate counts for one executor run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub mutated: usize,
    pub skipped_private: usize,
    pub skipped_unrelated: usize,
    pub errors: usize,
    /// Settled in an earlier run and not revisited.
    pub resumed: usize,
    /// Not reached because the run was interrupted.
    pub remaining: usize,
    pub interrupted: bool,
}

impl RunSummary {
    pub fn record(&mut self, outcome: TargetOutcome) {
        match outcome {
            TargetOutcome::Mutated => self.mutated += 1,
            TargetOutcome::SkippedPrivate => self.skipped_private += 1,
            TargetOutcome::SkippedAlreadyNotRelated => self.skipped_unrelated += 1,
            TargetOutcome::Error => self.errors += 1,
        }
    }

    /// Targets that received an outcome in this run.
    pub fn processed(&self) -> usize {
        self.mutated + self.skipped_private + self.skipped_unrelated + self.errors
    }
}

/// Outcome per target, keyed by identifier. Single writer: the executor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutcomeLog {
    entries: BTreeMap<Identifier, TargetOutcome>,
}

impl OutcomeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, id: Identifier, outcome: TargetOutcome) {
        self.entries.insert(id, outcome);
    }

    pub fn get(&self, id: &Identifier) -> Option<TargetOutcome> {
        self.entries.get(id).copied()
    }

    pub fn is_settled(&self, id: &Identifier) -> bool {
        self.get(id).is_some_and(TargetOutcome::is_settled)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, TargetOutcome)> {
        self.entries.iter().map(|(id, outcome)| (id, *outcome))
    }

    /// Targets with no settled outcome, in list order.
    pub fn pending<'a>(&'a self, targets: &'a TargetList) -> impl Iterator<Item = &'a Identifier> {
        targets.iter().filter(move |id| !self.is_settled(id))
    }

    /// Counts over every recorded entry.
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for outcome in self.entries.values() {
            summary.record(*outcome);
        }
        summary
    }
}

impl FromIterator<(Identifier, TargetOutcome)> for OutcomeLog {
    fn from_iter<T: IntoIterator<Item = (Identifier, TargetOutcome)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
