use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use engine_logging::LogDestination;
use follow_core::ResolveMode;

#[derive(Debug, Parser)]
#[command(name = "follow-sync")]
#[command(about = "Unfollow every account outside your whitelist, at a human pace")]
#[command(version)]
pub struct Cli {
    /// Visit and classify targets without unfollowing anyone
    #[arg(long)]
    pub dry_run: bool,

    /// Reuse saved targets or snapshots instead of reading the lists again
    #[arg(long)]
    pub skip_harvest: bool,

    /// Which accounts to unfollow
    #[arg(long, value_enum, default_value_t = Mode::Everyone)]
    pub mode: Mode,

    /// Continue an interrupted run, skipping targets already handled
    #[arg(long)]
    pub resume: bool,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Where snapshots, targets and the run journal live
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// JSON whitelist: an array of handles or {"whitelist": [...]}
    #[arg(long, default_value = "config/whitelist.json")]
    pub whitelist: PathBuf,

    /// RON tuning file (defaults to ./follow_sync.ron when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogTo::Both)]
    pub log: LogTo,

    #[arg(long, default_value = "follow_sync.log")]
    pub log_file: PathBuf,

    /// Debug-level logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Seed for the delay sampler, for reproducible pacing
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Everyone you follow who is not whitelisted
    Everyone,
    /// Only accounts that do not follow you back
    NonReciprocal,
}

impl From<Mode> for ResolveMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Everyone => ResolveMode::Everyone,
            Mode::NonReciprocal => ResolveMode::NonReciprocal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogTo {
    File,
    Terminal,
    Both,
}

impl From<LogTo> for LogDestination {
    fn from(value: LogTo) -> Self {
        match value {
            LogTo::File => LogDestination::File,
            LogTo::Terminal => LogDestination::Terminal,
            LogTo::Both => LogDestination::Both,
        }
    }
}
