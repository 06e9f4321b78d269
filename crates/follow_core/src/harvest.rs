use crate::{DelayRange, Identifier, RelationSet};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarvestSettings {
    /// Upper bound on scroll/page rounds in one pass.
    pub max_rounds: u32,
    /// Consecutive unchanged extents that mean the list is fully loaded.
    pub stale_threshold: u32,
    /// Full restarts after an incomplete pass.
    pub max_retries: u32,
    /// Minimum `scraped / expected` for a pass to count as complete.
    pub completeness_ratio: f64,
    pub round_delay: DelayRange,
    pub settle_delay: DelayRange,
    pub retry_delay: DelayRange,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            max_rounds: 200,
            stale_threshold: 3,
            max_retries: 2,
            completeness_ratio: 0.90,
            round_delay: DelayRange::from_millis(1_200, 2_200),
            settle_delay: DelayRange::from_millis(3_500, 5_500),
            retry_delay: DelayRange::from_secs(5, 10),
        }
    }
}

/// How far a list has been loaded: a scroll offset or a page cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extent {
    Offset(u64),
    Cursor(String),
    /// No further pages.
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundVerdict {
    Growing,
    Stale(u32),
    Converged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completeness {
    Verified { scraped: usize, expected: usize },
    Incomplete { scraped: usize, expected: usize },
    /// No usable counter; only scroll stability vouches for the result.
    Unverified { scraped: usize },
}

impl Completeness {
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Completeness::Incomplete { .. })
    }
}

/// Bookkeeping for one pass over a relation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestAttempt {
    accumulated: RelationSet,
    last_extent: Option<Extent>,
    stale_rounds: u32,
    rounds: u32,
    expected: Option<usize>,
}

impl HarvestAttempt {
    pub fn new(expected: Option<usize>) -> Self {
        Self {
            accumulated: RelationSet::new(),
            last_extent: None,
            stale_rounds: 0,
            rounds: 0,
            expected,
        }
    }

    /// Record the extent read after a round.
    pub fn observe(&mut self, extent: Extent, stale_threshold: u32) -> RoundVerdict {
        self.rounds += 1;
        if self.last_extent.as_ref() == Some(&extent) {
            self.stale_rounds += 1;
            if self.stale_rounds >= stale_threshold {
                return RoundVerdict::Converged;
            }
            return RoundVerdict::Stale(self.stale_rounds);
        }
        self.stale_rounds = 0;
        self.last_extent = Some(extent);
        RoundVerdict::Growing
    }

    /// A round interrupted by a cooldown: counted, but not as stale.
    pub fn skip_round(&mut self) {
        self.rounds += 1;
    }

    /// Union newly extracted identifiers in; returns how many were new.
    pub fn absorb<I: IntoIterator<Item = Identifier>>(&mut self, ids: I) -> usize {
        let before = self.accumulated.len();
        self.accumulated.extend(ids);
        self.accumulated.len() - before
    }

    pub fn completeness(&self, ratio: f64) -> Completeness {
        let scraped = self.accumulated.len();
        match self.expected {
            Some(expected) if expected > 0 => {
                if (scraped as f64) / (expected as f64) < ratio {
                    Completeness::Incomplete { scraped, expected }
                } else {
                    Completeness::Verified { scraped, expected }
                }
            }
            _ => Completeness::Unverified { scraped },
        }
    }

    pub fn len(&self) -> usize {
        self.accumulated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accumulated.is_empty()
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn stale_rounds(&self) -> u32 {
        self.stale_rounds
    }

    pub fn into_set(self) -> RelationSet {
        self.accumulated
    }
}
