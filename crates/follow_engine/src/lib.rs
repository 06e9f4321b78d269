//! Follow-sync engine: harvesting, throttled mutation and the IO collaborators
//! they drive.
mod cooldown;
mod driver;
mod executor;
mod harvest;
mod humanize;
mod persist;
mod pipeline;
mod quota;
mod resolver;
mod sink;
mod store;
mod types;
mod web;

pub use cooldown::{CooldownController, Throttle};
pub use driver::{RelationSource, SeverStep, TargetDriver, TargetPage};
pub use executor::{ExecutorSettings, MutationExecutor};
pub use harvest::ListHarvester;
pub use humanize::Humanizer;
pub use persist::{ensure_output_dir, DataDir, PersistError};
pub use pipeline::{prepare_targets, PrepareOptions};
pub use quota::QuotaGate;
pub use resolver::SetResolver;
pub use sink::{ChannelProgressSink, FanoutSink, LogSink, NullSink, ProgressSink};
pub use store::{FileStore, RecordStore, StorePaths};
pub use types::{DriverError, EngineError, EngineEvent, FailureKind};
pub use web::{Credentials, WebSession, WebSettings};
