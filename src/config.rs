use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ec::CurveId;
use crate::error::ConfigError;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PbtxConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub signing: SigningConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Delete the database when the last handle is dropped.
    #[serde(default)]
    pub temporary: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SigningConfig {
    #[serde(default = "default_curve")]
    pub curve: CurveId,
    #[serde(default = "default_key_alias_prefix")]
    pub key_alias_prefix: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_db_path() -> String {
    "./data/pbtx".to_string()
}

fn default_curve() -> CurveId {
    CurveId::R1
}

fn default_key_alias_prefix() -> String {
    "PBTX-".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            temporary: false,
        }
    }
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            curve: default_curve(),
            key_alias_prefix: default_key_alias_prefix(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for PbtxConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            signing: SigningConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl PbtxConfig {
    /// Strict load: missing file or bad TOML is an error.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&s)?)
    }

    pub fn load_or_default(path: &str) -> Self {
        if std::path::Path::new(path).exists() {
            match Self::load(path) {
                Ok(c) => {
                    info!(path, "config loaded");
                    c
                }
                Err(e) => {
                    warn!(path, error = %e, "error loading config, using defaults");
                    Self::default()
                }
            }
        } else {
            info!(path, "config file not found, creating default");
            let config = Self::default();
            if let Ok(s) = toml::to_string_pretty(&config) {
                if let Err(e) = std::fs::write(path, s) {
                    warn!(path, error = %e, "could not write default config");
                }
            }
            config
        }
    }
}
