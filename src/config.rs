use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

use crate::bridge::DispatchFailurePolicy;
use crate::canvas::PackerKind;

pub const CONFIG_ENV: &str = "NATIVEBRIDGE_CONFIG";
const DEFAULT_ID_PREFIX: &str = "$";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read bridge config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("id_prefix must not be empty")]
    EmptyIdPrefix,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    pub canvas_packer: PackerKind,
    pub dispatch_failure: DispatchFailurePolicy,
    pub id_prefix: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            canvas_packer: PackerKind::default(),
            dispatch_failure: DispatchFailurePolicy::default(),
            id_prefix: DEFAULT_ID_PREFIX.to_string(),
        }
    }
}

impl BridgeConfig {
    /// Loads from `config_path`, falling back to `$NATIVEBRIDGE_CONFIG` and then the
    /// platform config directory. A file that does not exist yields the defaults.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        match config_path.or_else(Self::default_path) {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        // an empty document deserializes as unit, not a map
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: BridgeConfig = serde_yaml::from_str(contents)?;
        if config.id_prefix.is_empty() {
            return Err(ConfigError::EmptyIdPrefix);
        }
        Ok(config)
    }

    fn default_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        ProjectDirs::from("", "", "nativebridge").map(|dirs| dirs.config_dir().join("config.yaml"))
    }
}
