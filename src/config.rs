use std::path::PathBuf;
use std::time::Duration;

use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use serde::{Deserialize, Serialize};

use crate::services::import::ImportConfig;
use crate::services::retry::RetryPolicy;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Path to the saved browser credentials, ~-expandable.
    #[serde(default)]
    auth_file: Option<String>,
    #[serde(default)]
    import: ImportSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImportSection {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    #[serde(default = "default_flush_pause_ms")]
    pub flush_pause_ms: u64,
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    #[serde(default = "default_retry_base_backoff_secs")]
    pub retry_base_backoff_secs: u64,
}

fn default_batch_size() -> usize {
    20
}

fn default_search_limit() -> usize {
    5
}

fn default_flush_pause_ms() -> u64 {
    1000
}

fn default_retry_max_attempts() -> u32 {
    3
}

fn default_retry_base_backoff_secs() -> u64 {
    2
}

impl Default for ImportSection {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            search_limit: default_search_limit(),
            flush_pause_ms: default_flush_pause_ms(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_base_backoff_secs: default_retry_base_backoff_secs(),
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .wrap_err_with(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join("playlist-sync").join("config.toml"))
    }

    /// Load config from the default location, falling back to defaults when
    /// no file exists.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Write a default config to the default location.
    pub fn create_default() -> Result<PathBuf> {
        let path = Self::config_path()
            .ok_or_else(|| color_eyre::eyre::eyre!("No config directory on this platform"))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .wrap_err_with(|| format!("Failed to create {}", parent.display()))?;
        }
        let contents = toml::to_string_pretty(&Config::default())
            .wrap_err("Failed to serialize default config")?;
        std::fs::write(&path, contents)
            .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Expand ~ to home directory
    fn expand_path(path: &str) -> PathBuf {
        if path.starts_with("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(&path[2..]);
            }
        }
        PathBuf::from(path)
    }

    /// Get the credentials file path, defaulting to browser.json in the
    /// working directory.
    pub fn auth_file_path(&self) -> PathBuf {
        match &self.auth_file {
            Some(path) => Self::expand_path(path),
            None => PathBuf::from(crate::auth::DEFAULT_AUTH_FILE),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.import.retry_max_attempts.max(1),
            base_backoff: Duration::from_secs(self.import.retry_base_backoff_secs),
        }
    }

    pub fn import_config(&self) -> ImportConfig {
        ImportConfig {
            batch_size: self.import.batch_size.max(1),
            search_limit: self.import.search_limit.max(1),
            flush_pause: Duration::from_millis(self.import.flush_pause_ms),
            retry: self.retry_policy(),
        }
    }
}
