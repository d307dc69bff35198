//! File-backed persistence for sessions and history.
//!
//! # Defensive Design
//!
//! A missing, empty, corrupt, or wrong-version file loads as empty state with a
//! warning. The file has only ever been absent or unreadable when state was
//! empty, so this is a fresh start rather than data loss.
//!
//! # Atomic Writes
//!
//! Every save rewrites the whole file through a temp file in the same directory
//! and renames it into place, so a reader never sees a partial document.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use fs_err as fs;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{Result, TrackerError};

use super::types::{HistoryEntry, PersistedState, Session};

pub const STORE_VERSION: u32 = 1;

fn default_version() -> u32 {
    STORE_VERSION
}

/// The on-disk JSON structure. Files written before versioning carry no
/// `version` field and are read as version 1.
#[derive(Debug, Deserialize)]
struct StoreFile {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    sessions: BTreeMap<u64, BTreeMap<String, Vec<Session>>>,
    #[serde(default)]
    history: Vec<HistoryEntry>,
}

#[derive(Serialize)]
struct StoreFileRef<'a> {
    version: u32,
    sessions: &'a BTreeMap<u64, BTreeMap<String, Vec<Session>>>,
    history: &'a [HistoryEntry],
}

#[derive(Debug, Clone)]
pub struct StateStore {
    file_path: PathBuf,
}

impl StateStore {
    pub fn new(file_path: &Path) -> Self {
        StateStore {
            file_path: file_path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn load(&self) -> PersistedState {
        let content = match fs::read_to_string(&self.file_path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.file_path.display(), "State file missing, starting empty");
                return PersistedState::default();
            }
            Err(err) => {
                warn!(error = %err, "Failed to read state file, starting empty");
                return PersistedState::default();
            }
        };

        if content.trim().is_empty() {
            warn!(path = %self.file_path.display(), "Empty state file, starting empty");
            return PersistedState::default();
        }

        match serde_json::from_str::<StoreFile>(&content) {
            Ok(file) if file.version == STORE_VERSION => PersistedState {
                sessions: file.sessions,
                history: file.history,
            },
            Ok(file) => {
                warn!(
                    version = file.version,
                    expected = STORE_VERSION,
                    "Unsupported state file version, starting empty"
                );
                PersistedState::default()
            }
            Err(err) => {
                warn!(
                    error = %err,
                    path = %self.file_path.display(),
                    "Failed to parse state file, starting empty"
                );
                PersistedState::default()
            }
        }
    }

    pub fn save(&self, state: &PersistedState) -> Result<()> {
        let file = StoreFileRef {
            version: STORE_VERSION,
            sessions: &state.sessions,
            history: &state.history,
        };
        let content = serde_json::to_string_pretty(&file).map_err(|source| TrackerError::Json {
            context: "serialize state".to_string(),
            source,
        })?;

        let parent_dir = self
            .file_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent_dir)
            .map_err(|e| TrackerError::io("create state directory", e))?;

        let mut temp_file = NamedTempFile::new_in(parent_dir)
            .map_err(|e| TrackerError::io("create temp state file", e))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|e| TrackerError::io("write temp state file", e))?;
        temp_file
            .flush()
            .map_err(|e| TrackerError::io("flush temp state file", e))?;
        temp_file
            .persist(&self.file_path)
            .map_err(|e| TrackerError::io("replace state file", e.error))?;

        debug!(
            path = %self.file_path.display(),
            history = state.history.len(),
            "State saved"
        );
        Ok(())
    }
}

/// Writes rendered report text, replacing the previous report.
pub fn write_report_file(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| TrackerError::io("create report directory", e))?;
    }
    fs::write(path, text).map_err(|e| TrackerError::io("write report file", e))
}
