//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! `API_BASE_URL` overrides `[api] base_url` so one config file can target
//! several deployments.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use transport::HeaderInjection;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub session: SessionConfig,
    /// Pass-through headers attached to every call
    #[serde(default)]
    pub headers: Vec<HeaderInjection>,
}

/// Where calls go
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Session file location
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

/// Teardown behaviour when the session cannot be renewed
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_login_route")]
    pub login_route: String,
    #[serde(default = "default_navigate_delay_ms")]
    pub navigate_delay_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            login_route: default_login_route(),
            navigate_delay_ms: default_navigate_delay_ms(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("session.json")
}

fn default_login_route() -> String {
    session_auth::DEFAULT_LOGIN_ROUTE.to_string()
}

fn default_navigate_delay_ms() -> u64 {
    session_auth::DEFAULT_NAVIGATE_DELAY.as_millis() as u64
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SessionConfig {
    pub fn navigate_delay(&self) -> Duration {
        Duration::from_millis(self.navigate_delay_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(url) = std::env::var("API_BASE_URL")
            && !url.is_empty()
        {
            config.api.base_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(common::Error::config(format!(
                "base_url must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(common::Error::config("timeout_secs must be greater than 0"));
        }

        if self.storage.path.as_os_str().is_empty() {
            return Err(common::Error::config("storage path must not be empty"));
        }

        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&Path>) -> PathBuf {
        if let Some(p) = cli_path {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("dingdong-api.toml")
    }
}
