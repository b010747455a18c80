use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::http::RetryPolicy;
use crate::storage::StorageConfig;

const APP_DIR: &str = "fatdiary";
const CONFIG_FILE: &str = "config.toml";

/// Overrides the secret storage directory.
pub const DATA_DIR_ENV: &str = "FATDIARY_DATA_DIR";

pub const SECRETS_NAMESPACE: &str = "fatsecret_oauth";

/// Optional `config.toml` in the user config dir. Every key has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_dir: Option<PathBuf>,
    pub courtesy_delay_ms: u64,
    pub request_timeout_secs: u64,
    #[serde(default = "RetrySettings::transport")]
    pub http: RetrySettings,
    #[serde(default = "RetrySettings::rate_limit")]
    pub rate_limit: RetrySettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl RetrySettings {
    fn transport() -> Self {
        RetryPolicy::transport_default().into()
    }

    fn rate_limit() -> Self {
        RetryPolicy::rate_limit_default().into()
    }

    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }
}

impl From<RetryPolicy> for RetrySettings {
    fn from(policy: RetryPolicy) -> Self {
        Self {
            max_retries: policy.max_retries,
            initial_backoff_ms: u64::try_from(policy.initial_backoff.as_millis()).unwrap_or(u64::MAX),
            max_backoff_ms: u64::try_from(policy.max_backoff.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            courtesy_delay_ms: 1000,
            request_timeout_secs: 60,
            http: RetrySettings::transport(),
            rate_limit: RetrySettings::rate_limit(),
        }
    }
}

impl AppConfig {
    pub fn config_path() -> Result<PathBuf> {
        Ok(dirs::config_dir()
            .context("Could not determine config directory")?
            .join(APP_DIR)
            .join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn courtesy_delay(&self) -> Duration {
        Duration::from_millis(self.courtesy_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Storage location: `env_override`, else `data_dir`, else the platform
    /// data dir (`$XDG_DATA_HOME` or `~/.local/share` on Linux).
    pub fn storage_config(&self, env_override: Option<&str>) -> Result<StorageConfig> {
        let base = match (env_override.filter(|v| !v.is_empty()), &self.data_dir) {
            (Some(dir), _) => expand_home(Path::new(dir))?,
            (None, Some(dir)) => expand_home(dir)?,
            (None, None) => dirs::data_dir()
                .context("Could not determine data directory")?
                .join(APP_DIR),
        };
        Ok(StorageConfig::new(base, SECRETS_NAMESPACE))
    }
}

/// Expands a leading `~` to the home directory.
pub fn expand_home(path: &Path) -> Result<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => Ok(dirs::home_dir()
            .context("Could not determine home directory")?
            .join(rest)),
        Err(_) => Ok(path.to_path_buf()),
    }
}
