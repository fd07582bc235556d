//! Settings file handling
//!
//! Loads and saves `~/.config/mailtm/config.yaml`, which holds the account to
//! watch plus the server options.

use super::auth::ServerAuth;
use super::server_config::{ServerConfig, DEFAULT_CACHE_CAPACITY, DEFAULT_POLL_INTERVAL};
use crate::retry::RetryConfig;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub auth: ServerAuth,

    /// Override the API endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Seconds between polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    #[serde(default = "default_true")]
    pub banner: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner_path: Option<PathBuf>,

    #[serde(default)]
    pub suppress_errors: bool,

    #[serde(default)]
    pub enable_logging: bool,

    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Retries per poll fetch
    #[serde(default = "default_retries")]
    pub retries: u32,
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL
}

fn default_true() -> bool {
    true
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

fn default_retries() -> u32 {
    RetryConfig::polling().max_retries
}

impl ServerSettings {
    pub fn new(auth: ServerAuth) -> Self {
        Self {
            auth,
            base_url: None,
            poll_interval: default_poll_interval(),
            banner: true,
            banner_path: None,
            suppress_errors: false,
            enable_logging: false,
            cache_capacity: default_cache_capacity(),
            retries: default_retries(),
        }
    }

    /// Load settings from the default path (~/.config/mailtm/config.yaml)
    pub fn load_default() -> Result<Self> {
        Self::load(Self::default_path())
    }

    /// Load settings from a specific path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(crate::MailServerError::Config(format!(
                "Settings file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading mail server settings");

        let content = fs::read_to_string(path)?;
        let settings: Self = serde_yaml::from_str(&content)?;

        tracing::debug!(
            account_id = %settings.auth.account_id,
            poll_interval = settings.poll_interval,
            "Settings loaded"
        );

        Ok(settings)
    }

    /// Save settings to a specific path, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "Saving mail server settings");

        fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    pub fn save_default(&self) -> Result<()> {
        self.save(Self::default_path())
    }

    /// `~/.config/mailtm/config.yaml`
    pub fn default_path() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".config");
        path.push("mailtm");
        path.push("config.yaml");
        path
    }

    /// Split into the credentials and the server options
    pub fn into_parts(self) -> (ServerAuth, ServerConfig) {
        let mut config = ServerConfig::default()
            .with_poll_interval(self.poll_interval)
            .with_banner(self.banner)
            .with_suppress_errors(self.suppress_errors)
            .with_logging(self.enable_logging)
            .with_cache_capacity(self.cache_capacity)
            .with_retry(RetryConfig::polling().with_max_retries(self.retries));
        config.banner_path = self.banner_path;
        (self.auth, config)
    }
}
