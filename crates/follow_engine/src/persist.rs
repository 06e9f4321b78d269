use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("data directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("could not encode record: {0}")]
    Encode(String),
    #[error("could not read {path}: {message}")]
    Decode { path: String, message: String },
}

/// Create `dir` if needed and prove a file can be created inside it.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    let unusable = |err: io::Error| PersistError::OutputDir(format!("{}: {err}", dir.display()));
    fs::create_dir_all(dir).map_err(unusable)?;
    NamedTempFile::new_in(dir).map(drop).map_err(unusable)
}

/// `Ok(None)` when the file does not exist.
pub fn read_optional(path: &Path) -> Result<Option<String>, PersistError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(PersistError::Io(err)),
    }
}

/// The directory holding a run's records, addressed by file name.
///
/// Writes go through a staged temp file in the same directory that is
/// renamed over the record, so a reader sees either the old or the new
/// version.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn record(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// `Ok(None)` when the record was never written.
    pub fn read(&self, name: &str) -> Result<Option<String>, PersistError> {
        read_optional(&self.record(name))
    }

    pub fn write(&self, name: &str, content: &str) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.root)?;

        let mut staged = NamedTempFile::new_in(&self.root)?;
        let file = staged.as_file_mut();
        file.write_all(content.as_bytes())?;
        file.sync_all()?;

        let record = self.record(name);
        staged
            .persist(&record)
            .map_err(|err| PersistError::Io(err.error))?;
        Ok(record)
    }
}
