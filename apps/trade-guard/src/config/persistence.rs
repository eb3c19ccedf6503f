//! Position persistence configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where positions and the trade journal live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceBackend {
    /// Process memory; lost on exit.
    Memory,
    /// JSON files under `data_dir`.
    #[default]
    JsonFile,
}

/// Persistence settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceSettings {
    /// Storage backend.
    #[serde(default)]
    pub backend: PersistenceBackend,
    /// Root directory for the `json_file` backend.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            backend: PersistenceBackend::default(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
