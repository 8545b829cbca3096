//! Tunables of the chat core, read from a TOML file.

use crate::log::LOG_CAPACITY;
use mikron_concurrency::Backend;
use serde::Deserialize;
use std::{fs, io::ErrorKind, path::Path, time::Duration};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    #[default]
    Async,
    Thread,
}

impl From<BackendChoice> for Backend {
    fn from(choice: BackendChoice) -> Self {
        match choice {
            BackendChoice::Async => Backend::Async,
            BackendChoice::Thread => Backend::Thread,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoreConfig {
    /// Seconds without activity before a session is logged out.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_activity_sweep_interval")]
    pub activity_sweep_interval_secs: u64,
    /// Seconds a challenge stays answerable.
    #[serde(default = "default_challenge_timeout")]
    pub challenge_timeout_secs: u64,
    #[serde(default = "default_challenge_sweep_interval")]
    pub challenge_sweep_interval_secs: u64,
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
    /// Where the workers run.
    #[serde(default)]
    pub backend: BackendChoice,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
            activity_sweep_interval_secs: default_activity_sweep_interval(),
            challenge_timeout_secs: default_challenge_timeout(),
            challenge_sweep_interval_secs: default_challenge_sweep_interval(),
            log_capacity: default_log_capacity(),
            backend: BackendChoice::default(),
        }
    }
}

impl CoreConfig {
    /// Reads and validates `path`. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = match fs::read_to_string(path.as_ref()) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let intervals = [
            ("idle_timeout_secs", self.idle_timeout_secs),
            ("activity_sweep_interval_secs", self.activity_sweep_interval_secs),
            ("challenge_timeout_secs", self.challenge_timeout_secs),
            ("challenge_sweep_interval_secs", self.challenge_sweep_interval_secs),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be positive")));
            }
            if i64::try_from(value).is_err() {
                return Err(ConfigError::Invalid(format!("{name} is too large")));
            }
        }
        if !(2..=LOG_CAPACITY).contains(&self.log_capacity) {
            return Err(ConfigError::Invalid(format!(
                "log_capacity must be within 2..={LOG_CAPACITY}, got {}",
                self.log_capacity
            )));
        }
        Ok(())
    }

    pub fn idle_timeout(&self) -> i64 {
        secs(self.idle_timeout_secs)
    }

    pub fn challenge_timeout(&self) -> i64 {
        secs(self.challenge_timeout_secs)
    }

    pub fn activity_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.activity_sweep_interval_secs)
    }

    pub fn challenge_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.challenge_sweep_interval_secs)
    }
}

fn secs(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn default_idle_timeout() -> u64 {
    120
}

fn default_activity_sweep_interval() -> u64 {
    30
}

fn default_challenge_timeout() -> u64 {
    60
}

fn default_challenge_sweep_interval() -> u64 {
    120
}

fn default_log_capacity() -> usize {
    LOG_CAPACITY
}
