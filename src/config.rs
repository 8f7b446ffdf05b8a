use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};
use tracing::debug;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_ERROR_MESSAGE: &str =
    "Sorry, I encountered an error. Please make sure the server is running and try again.";
pub const DEFAULT_FAILURE_MESSAGE: &str = "An error occurred while searching for grants.";

/// Environment variable that overrides the configured API base URL
pub const API_URL_ENV: &str = "GRANTCHAT_API_URL";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    /// Shown when the request itself fails (network, bad body)
    pub error_message: String,
    /// Shown when the server answers `success: false` without a message
    pub failure_message: String,
    /// No timeout unless set
    pub request_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            error_message: DEFAULT_ERROR_MESSAGE.to_string(),
            failure_message: DEFAULT_FAILURE_MESSAGE.to_string(),
            request_timeout_secs: None,
        }
    }
}

impl Config {
    /// Load from the user config directory, falling back to defaults when no
    /// file exists yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)
            .map_err(|e| anyhow!("Invalid config file {}: {}", path.display(), e))?;
        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Write to the user config directory and return where it went.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::get_config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Apply the environment value and then the command-line flag, each
    /// replacing whatever came before it.
    pub fn with_overrides(mut self, env_url: Option<String>, flag_url: Option<String>) -> Self {
        for url in [env_url, flag_url].into_iter().flatten() {
            if !url.trim().is_empty() {
                self.api_base_url = url.trim().to_string();
            }
        }
        self
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("grantchat").join("config.json"))
    }
}
