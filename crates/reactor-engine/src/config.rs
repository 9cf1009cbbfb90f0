use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigLoadError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How long a sync activation from another thread waits for the main
    /// thread (default: 3000ms)
    #[serde(default = "default_sync_timeout")]
    pub sync_timeout_ms: u64,

    /// Worker threads for the owned runtime (default: one per core)
    #[serde(default)]
    pub worker_threads: Option<usize>,

    /// Upper bound on concurrently running async activations (default: 512)
    #[serde(default = "default_max_blocking_threads")]
    pub max_blocking_threads: usize,

    /// Name of the dedicated main thread when the host does not supply one
    #[serde(default = "default_main_thread_name")]
    pub main_thread_name: String,
}

fn default_sync_timeout() -> u64 {
    3000
}

fn default_max_blocking_threads() -> usize {
    512
}

fn default_main_thread_name() -> String {
    "reactor-main".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sync_timeout_ms: default_sync_timeout(),
            worker_threads: None,
            max_blocking_threads: default_max_blocking_threads(),
            main_thread_name: default_main_thread_name(),
        }
    }
}

impl EngineConfig {
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_timeout_ms)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigLoadError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        if !path.exists() {
            return Err(ConfigLoadError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }
}
