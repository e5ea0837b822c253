use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::clues::Clue;
use crate::session_management::session::MissionConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    File,
    Database,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory for the file backend, SQLite file (or its directory) for the database backend
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            path: PathBuf::from("./cluehunt-data"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
    pub enforce: bool,
    pub submit_opens_with_phase: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            enforce: true,
            submit_opens_with_phase: true,
        }
    }
}

/// `[mission]` table: defaults stamped on every new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MissionDefaults {
    pub internal_rounds: u32,
    pub cross_rounds: u32,
    /// Minutes
    pub round_duration: u32,
    /// Minutes
    pub submit_duration: u32,
}

impl Default for MissionDefaults {
    fn default() -> Self {
        MissionConfig::default().into()
    }
}

impl From<MissionConfig> for MissionDefaults {
    fn from(c: MissionConfig) -> Self {
        Self {
            internal_rounds: c.internal_rounds,
            cross_rounds: c.cross_rounds,
            round_duration: c.round_duration,
            submit_duration: c.submit_duration,
        }
    }
}

impl From<MissionDefaults> for MissionConfig {
    fn from(d: MissionDefaults) -> Self {
        Self {
            internal_rounds: d.internal_rounds,
            cross_rounds: d.cross_rounds,
            round_duration: d.round_duration,
            submit_duration: d.submit_duration,
        }
    }
}

/// One `[[clues]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClueConfig {
    pub id: String,
    pub label: String,
    pub image_url: String,
}

impl From<ClueConfig> for Clue {
    fn from(c: ClueConfig) -> Self {
        Clue {
            id: c.id,
            label: c.label,
            image_url: c.image_url,
        }
    }
}
