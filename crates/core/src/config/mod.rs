//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (URLTTL_*)
//! 2. TOML config file (explicit path, or URLTTL_CONFIG_FILE)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::TimeDelta;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::policy::ExpireAfter;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite response cache.
    ///
    /// Set via URLTTL_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Keep responses in memory instead of SQLite.
    ///
    /// Set via URLTTL_IN_MEMORY environment variable.
    #[serde(default)]
    pub in_memory: bool,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via URLTTL_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via URLTTL_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via URLTTL_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum number of redirects to follow.
    ///
    /// Set via URLTTL_MAX_REDIRECTS environment variable.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Session-wide expiry in seconds for URLs without their own TTL.
    /// Absent means cached responses never expire.
    ///
    /// Set via URLTTL_EXPIRE_AFTER_SECS environment variable.
    #[serde(default)]
    pub expire_after_secs: Option<f64>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./urlttl-cache.sqlite")
}

fn default_user_agent() -> String {
    "urlttl/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_redirects() -> usize {
    5
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            in_memory: false,
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
            expire_after_secs: None,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Session default expiry; `None` means never expire.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `expire_after_secs` is not a finite,
    /// representable number of seconds.
    pub fn default_expiry(&self) -> Result<Option<TimeDelta>, ConfigError> {
        match self.expire_after_secs {
            None => Ok(None),
            Some(secs) => match ExpireAfter::from_secs_f64(secs) {
                Ok(ExpireAfter::Duration(d)) => Ok(Some(d)),
                Ok(_) => Ok(None),
                Err(e) => Err(ConfigError::Invalid { field: "expire_after_secs".into(), reason: e.to_string() }),
            },
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `URLTTL_`
    /// 2. TOML file from `URLTTL_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var("URLTTL_CONFIG_FILE").ok().map(PathBuf::from);
        Self::load_from(file.as_deref())
    }

    /// Like [`AppConfig::load`], but with an explicit TOML file taking the
    /// place of `URLTTL_CONFIG_FILE`.
    pub fn load_from(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(path) = config_file {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(
            Env::prefixed("URLTTL_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
