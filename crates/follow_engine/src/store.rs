use std::path::{Path, PathBuf};

use engine_logging::{engine_info, engine_warn};
use follow_core::{Direction, Identifier, OutcomeLog, RelationSet, TargetList, TargetOutcome};
use serde::{Deserialize, Serialize};

use crate::persist::{read_optional, DataDir, PersistError};

const TARGETS_FILENAME: &str = "targets.json";
const STATE_FILENAME: &str = ".follow_sync_state.ron";

/// Load/save access to the run's flat record collections.
pub trait RecordStore: Send + Sync {
    /// `Ok(None)` when no snapshot for `direction` was ever saved.
    fn load_relation(&self, direction: Direction) -> Result<Option<RelationSet>, PersistError>;

    fn save_relation(&self, direction: Direction, set: &RelationSet) -> Result<(), PersistError>;

    /// A missing whitelist is an empty one.
    fn load_whitelist(&self) -> Result<RelationSet, PersistError>;

    fn load_targets(&self) -> Result<Option<TargetList>, PersistError>;

    fn save_targets(&self, targets: &TargetList) -> Result<(), PersistError>;

    fn load_outcomes(&self) -> Result<OutcomeLog, PersistError>;

    fn save_outcomes(&self, outcomes: &OutcomeLog) -> Result<(), PersistError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub data_dir: PathBuf,
    pub whitelist: PathBuf,
}

impl StorePaths {
    pub fn relation_file(&self, direction: Direction) -> PathBuf {
        self.data_dir.join(format!("{}.json", direction.as_str()))
    }

    pub fn targets_file(&self) -> PathBuf {
        self.data_dir.join(TARGETS_FILENAME)
    }

    pub fn state_file(&self) -> PathBuf {
        self.data_dir.join(STATE_FILENAME)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WhitelistFile {
    Plain(Vec<String>),
    Wrapped { whitelist: Vec<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedOutcome {
    target: String,
    outcome: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PersistedState {
    outcomes: Vec<PersistedOutcome>,
}

/// JSON snapshots and a RON outcome journal under one data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    paths: StorePaths,
    dir: DataDir,
}

impl FileStore {
    pub fn new(paths: StorePaths) -> Self {
        let dir = DataDir::new(paths.data_dir.clone());
        Self { paths, dir }
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    fn read_handles(path: &Path) -> Result<Option<Vec<String>>, PersistError> {
        let Some(content) = read_optional(path)? else {
            return Ok(None);
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|err| decode_error(path, err))
    }

    fn write_handles<'a, I>(&self, filename: &str, handles: I) -> Result<(), PersistError>
    where
        I: IntoIterator<Item = &'a Identifier>,
    {
        let handles: Vec<&str> = handles.into_iter().map(Identifier::as_str).collect();
        let content = serde_json::to_string_pretty(&handles)
            .map_err(|err| PersistError::Encode(err.to_string()))?;
        let path = self.dir.write(filename, &content)?;
        engine_info!("Saved {} handle(s) to {:?}", handles.len(), path);
        Ok(())
    }
}

impl RecordStore for FileStore {
    fn load_relation(&self, direction: Direction) -> Result<Option<RelationSet>, PersistError> {
        let handles = Self::read_handles(&self.paths.relation_file(direction))?;
        Ok(handles.map(Identifier::collect_valid))
    }

    fn save_relation(&self, direction: Direction, set: &RelationSet) -> Result<(), PersistError> {
        self.write_handles(&format!("{}.json", direction.as_str()), set)
    }

    fn load_whitelist(&self) -> Result<RelationSet, PersistError> {
        let path = &self.paths.whitelist;
        let Some(content) = read_optional(path)? else {
            engine_warn!("Whitelist {:?} not found; treating it as empty", path);
            return Ok(RelationSet::new());
        };
        let file: WhitelistFile =
            serde_json::from_str(&content).map_err(|err| decode_error(path, err))?;
        let raw = match file {
            WhitelistFile::Plain(handles) | WhitelistFile::Wrapped { whitelist: handles } => handles,
        };
        let set = Identifier::collect_valid(&raw);
        if set.len() < raw.len() {
            engine_warn!(
                "Whitelist {:?}: ignored {} invalid or duplicate entries",
                path,
                raw.len() - set.len()
            );
        }
        Ok(set)
    }

    fn load_targets(&self) -> Result<Option<TargetList>, PersistError> {
        let handles = Self::read_handles(&self.paths.targets_file())?;
        Ok(handles.map(|raw| TargetList::from_identifiers(Identifier::collect_valid(raw))))
    }

    fn save_targets(&self, targets: &TargetList) -> Result<(), PersistError> {
        self.write_handles(TARGETS_FILENAME, targets)
    }

    fn load_outcomes(&self) -> Result<OutcomeLog, PersistError> {
        let path = self.paths.state_file();
        let Some(content) = self.dir.read(STATE_FILENAME)? else {
            return Ok(OutcomeLog::new());
        };
        let state: PersistedState =
            ron::from_str(&content).map_err(|err| decode_error(&path, err))?;

        let mut log = OutcomeLog::new();
        for entry in state.outcomes {
            match (
                Identifier::parse(&entry.target),
                TargetOutcome::parse(&entry.outcome),
            ) {
                (Ok(target), Some(outcome)) => log.record(target, outcome),
                _ => engine_warn!(
                    "Ignoring journal entry {:?} = {:?}",
                    entry.target,
                    entry.outcome
                ),
            }
        }
        engine_info!("Loaded {} journaled outcome(s) from {:?}", log.len(), path);
        Ok(log)
    }

    fn save_outcomes(&self, outcomes: &OutcomeLog) -> Result<(), PersistError> {
        let state = PersistedState {
            outcomes: outcomes
                .iter()
                .map(|(target, outcome)| PersistedOutcome {
                    target: target.as_str().to_string(),
                    outcome: outcome.as_str().to_string(),
                })
                .collect(),
        };
        let pretty = ron::ser::PrettyConfig::new();
        let content = ron::ser::to_string_pretty(&state, pretty)
            .map_err(|err| PersistError::Encode(err.to_string()))?;
        self.dir.write(STATE_FILENAME, &content)?;
        Ok(())
    }
}

fn decode_error(path: &Path, err: impl std::fmt::Display) -> PersistError {
    PersistError::Decode {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}
