//! Startup configuration.
//!
//! Read from `~/.presence-tracker/config.toml` unless a path is given.
//! A missing file yields defaults.
//!
//! ```toml
//! tracked = ["@alice", "bob"]
//! utc_offset = "+03:00"
//! state_path = "/var/lib/presence/sessions.json"
//! report_path = "/var/lib/presence/report.txt"
//!
//! [directory]
//! alice = 1001
//! bob = 1002
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::clock::ReferenceZone;
use crate::error::{Result, TrackerError};
use crate::identity::StaticDirectory;

const DATA_DIR_NAME: &str = ".presence-tracker";
const CONFIG_FILE_NAME: &str = "config.toml";
const STATE_FILE_NAME: &str = "sessions.json";
const REPORT_FILE_NAME: &str = "report.txt";
const DEFAULT_UTC_OFFSET: &str = "+03:00";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackerConfig {
    /// Name references to track; a leading `@` is allowed.
    pub tracked: Vec<String>,
    /// Reference timezone as a fixed UTC offset.
    pub utc_offset: String,
    pub state_path: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
    /// When set, the daemon also writes logs here.
    pub log_dir: Option<PathBuf>,
    /// Name → numeric id table used by the static directory lookup.
    pub directory: BTreeMap<String, u64>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            tracked: Vec::new(),
            utc_offset: DEFAULT_UTC_OFFSET.to_string(),
            state_path: None,
            report_path: None,
            log_dir: None,
            directory: BTreeMap::new(),
        }
    }
}

/// Returns the tracker's data directory (`~/.presence-tracker`).
pub fn data_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(DATA_DIR_NAME))
        .ok_or(TrackerError::HomeDirNotFound)
}

pub fn default_config_path() -> Result<PathBuf> {
    data_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

impl TrackerConfig {
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path,
            None => default_config_path()?,
        };

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs_err::read_to_string(&config_path)
            .map_err(|e| TrackerError::io(format!("read config {}", config_path.display()), e))?;
        Self::parse(&content, &config_path)
    }

    pub fn parse(content: &str, origin: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|err| TrackerError::ConfigMalformed {
            path: origin.to_path_buf(),
            details: err.to_string(),
        })?;
        // fail at startup rather than on the first close
        config.zone()?;
        Ok(config)
    }

    pub fn zone(&self) -> Result<ReferenceZone> {
        ReferenceZone::parse(&self.utc_offset)
    }

    pub fn state_path(&self) -> Result<PathBuf> {
        match &self.state_path {
            Some(path) => Ok(path.clone()),
            None => data_dir().map(|dir| dir.join(STATE_FILE_NAME)),
        }
    }

    pub fn report_path(&self) -> Result<PathBuf> {
        match &self.report_path {
            Some(path) => Ok(path.clone()),
            None => data_dir().map(|dir| dir.join(REPORT_FILE_NAME)),
        }
    }

    pub fn directory(&self) -> StaticDirectory {
        StaticDirectory::new(self.directory.iter().map(|(name, id)| (name, *id)))
    }
}
