//! Engine configuration.
//!
//! Values come from, in increasing precedence:
//! 1. Built-in defaults
//! 2. A TOML file (`keystate.toml` in the working directory, or an explicit path)
//! 3. Environment variables prefixed with `KEYSTATE_`
//!
//! Nested keys use a double underscore, e.g. `KEYSTATE_AUTH__LOCKOUT_SECS=60`.

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Sign-in hardening: brute-force lockout and password hashing cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthPolicy {
    /// Failed attempts allowed before an email is locked out
    pub max_failed_attempts: u32,
    /// Lockout length in seconds, also the window in which failures accumulate
    pub lockout_secs: u64,
    /// bcrypt work factor for stored passwords
    pub hash_cost: u32,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            lockout_secs: 15 * 60,
            hash_cost: 12,
        }
    }
}

impl AuthPolicy {
    pub fn lockout(&self) -> Duration {
        Duration::from_secs(self.lockout_secs)
    }
}

/// Tunables for an [`Engine`](crate::engine::Engine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Session key used when a caller supplies none
    pub default_key: String,
    /// Transitions retained per session
    pub history_limit: usize,
    /// Sessions untouched for this long are evicted; `None` disables idle eviction
    pub idle_ttl_secs: Option<u64>,
    /// Upper bound on live sessions; the least recently used is evicted first
    pub max_sessions: Option<usize>,
    /// How often the background reaper sweeps idle sessions
    pub reaper_interval_secs: u64,
    /// Per-effect time limit; `None` lets handlers run to completion
    pub effect_timeout_ms: Option<u64>,
    pub auth: AuthPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_key: "default".to_string(),
            history_limit: 64,
            idle_ttl_secs: Some(30 * 60),
            max_sessions: None,
            reaper_interval_secs: 60,
            effect_timeout_ms: None,
            auth: AuthPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Load from defaults, an optional file, and the environment.
    ///
    /// When `path` is `None`, `keystate.toml` is read if it exists.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        match path {
            Some(path) => builder = builder.add_source(File::from(path)),
            None if Path::new("keystate.toml").exists() => {
                builder = builder.add_source(File::with_name("keystate"));
            }
            None => {}
        }

        builder = builder.add_source(
            Environment::with_prefix("KEYSTATE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: EngineConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document on top of the defaults.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_key.is_empty() {
            return Err(ConfigError::Invalid("default_key must not be empty".to_string()));
        }
        if self.history_limit == 0 {
            return Err(ConfigError::Invalid("history_limit must be at least 1".to_string()));
        }
        if self.reaper_interval_secs == 0 {
            return Err(ConfigError::Invalid("reaper_interval_secs must be at least 1".to_string()));
        }
        if self.max_sessions == Some(0) {
            return Err(ConfigError::Invalid("max_sessions must be at least 1".to_string()));
        }
        if self.auth.max_failed_attempts == 0 {
            return Err(ConfigError::Invalid(
                "auth.max_failed_attempts must be at least 1".to_string(),
            ));
        }
        if !(4..=31).contains(&self.auth.hash_cost) {
            return Err(ConfigError::Invalid(
                "auth.hash_cost must be between 4 and 31".to_string(),
            ));
        }
        Ok(())
    }

    pub fn idle_ttl(&self) -> Option<Duration> {
        self.idle_ttl_secs.map(Duration::from_secs)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs)
    }

    pub fn effect_timeout(&self) -> Option<Duration> {
        self.effect_timeout_ms.map(Duration::from_millis)
    }
}
