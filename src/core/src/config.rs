use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};

/// Environment variable overriding the store root.
pub const ENV_ROOT: &str = "IMGSTORE_ROOT";

/// Environment variable overriding the staging parent directory.
pub const ENV_TMPDIR: &str = "IMGSTORE_TMPDIR";

/// Environment variable overriding the log filter.
pub const ENV_LOG: &str = "IMGSTORE_LOG";

/// Name of the optional config file inside the store root.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory holding the graph and the tag index
    pub root: PathBuf,

    /// Parent directory for per-load staging areas (system temp dir when unset)
    pub tmp_dir: Option<PathBuf>,

    /// Default `tracing` filter directive when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            tmp_dir: None,
            log_filter: "warn".to_string(),
        }
    }
}

impl StoreConfig {
    /// Create a config rooted at `root` with default settings otherwise.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Load a config from a YAML file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            StoreError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        serde_yaml::from_str(&data).map_err(|e| {
            StoreError::ConfigError(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Resolve the effective config.
    ///
    /// Precedence, lowest first: defaults, the YAML file (`explicit_file`, or
    /// `config.yaml` under the resolved root if it exists), then environment
    /// variables. CLI flags are applied by the caller on top.
    pub fn resolve(explicit_file: Option<&Path>) -> Result<Self> {
        let mut config = match explicit_file {
            Some(path) => Self::from_file(path)?,
            None => {
                let root = std::env::var_os(ENV_ROOT)
                    .map(PathBuf::from)
                    .unwrap_or_else(default_root);
                let candidate = root.join(CONFIG_FILE_NAME);
                if candidate.is_file() {
                    Self::from_file(&candidate)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env();
        Ok(config)
    }

    /// Apply `IMGSTORE_*` environment overrides.
    pub fn apply_env(&mut self) {
        if let Some(root) = std::env::var_os(ENV_ROOT) {
            self.root = PathBuf::from(root);
        }
        if let Some(tmp) = std::env::var_os(ENV_TMPDIR) {
            self.tmp_dir = Some(PathBuf::from(tmp));
        }
        if let Ok(filter) = std::env::var(ENV_LOG) {
            if !filter.is_empty() {
                self.log_filter = filter;
            }
        }
    }

    /// Directory holding registered images.
    pub fn graph_dir(&self) -> PathBuf {
        self.root.join("graph")
    }

    /// Path of the persisted tag index.
    pub fn repositories_path(&self) -> PathBuf {
        self.root.join("repositories.json")
    }
}

/// Default store root (`~/.imgstore`).
pub fn default_root() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".imgstore"))
        .unwrap_or_else(|| PathBuf::from(".imgstore"))
}
