//! User configuration.
//!
//! Read from `<config dir>/presence-tui/config.toml` unless `--config` names
//! another file. Every field is optional. Precedence, lowest first: built-in
//! defaults, the file, `PRESENCE_TUI_API_URL`, command-line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_BASE_URL;
use crate::error::ConfigError;
use crate::models::DisplayZone;

pub const APP_DIR: &str = "presence-tui";
const CONFIG_FILE: &str = "config.toml";

/// Environment variable overriding `api_url`
pub const API_URL_ENV: &str = "PRESENCE_TUI_API_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the status backend
    pub api_url: String,
    pub request_timeout_secs: u64,
    /// Zone used for the day window, bars and tooltips
    pub display_zone: DisplayZone,
    /// Where log files go; platform data dir when unset
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 30,
            display_zone: DisplayZone::default(),
            log_dir: None,
        }
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load from an explicit path, or from the default location.
    ///
    /// A missing file at the default location is not an error; a missing
    /// explicit file is.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load_from(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Apply the value of `PRESENCE_TUI_API_URL`, if set and non-empty
    pub fn with_env_api_url(mut self, value: Option<String>) -> Self {
        if let Some(url) = value.filter(|url| !url.trim().is_empty()) {
            self.api_url = url.trim().to_string();
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(APP_DIR)
                .join("logs")
        })
    }
}
