//! Follow-sync core: pure relationship arithmetic, quota/cooldown state and
//! per-target policy. No IO, no clocks, no randomness.
mod classify;
mod cooldown;
mod harvest;
mod identifier;
mod outcome;
mod pacing;
mod quota;
mod rate_signal;
mod resolve;

pub use classify::{classify, Classification, TargetProfile};
pub use cooldown::{CooldownEvent, CooldownSettings, CooldownState};
pub use harvest::{Completeness, Extent, HarvestAttempt, HarvestSettings, RoundVerdict};
pub use identifier::{Direction, Identifier, IdentifierError, RelationSet, RESERVED_PATHS};
pub use outcome::{OutcomeLog, RunSummary, TargetOutcome};
pub use pacing::{DelayRange, PaceKind, PaceSettings};
pub use quota::{QuotaSettings, QuotaWindow};
pub use rate_signal::{RateSignalMonitor, DEFAULT_MARKERS};
pub use resolve::{resolve, ResolveMode, TargetList};
