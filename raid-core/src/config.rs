//! Server configuration.
//!
//! Layered: built-in defaults, then an optional JSON file named by
//! `RAID_CONFIG`, then individual environment overrides.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::{DEFAULT_RETENTION_MS, MIN_RETENTION_MS, TICK_HZ};
use crate::error::ConfigError;
use crate::logging::LogLevel;

/// Highest tick rate the driver accepts
pub const MAX_TICK_HZ: u32 = 120;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub tick_hz: u32,
    pub data_dir: PathBuf,
    pub retention_secs: u64,
    pub database_url: Option<String>,
    pub pg_max_connections: u32,
    pub log_level: LogLevel,
    /// Fixed seed for every raid RNG; entropy when unset
    pub rng_seed: Option<u64>,
    pub hot_reload: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            tick_hz: TICK_HZ,
            data_dir: PathBuf::from("data"),
            retention_secs: DEFAULT_RETENTION_MS / 1000,
            database_url: None,
            pg_max_connections: 10,
            log_level: LogLevel::Info,
            rng_seed: None,
            hot_reload: true,
        }
    }
}

fn parse_env<T: FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { key, value })
}

impl ServerConfig {
    /// Load from the process environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` in place of the process environment
    pub fn load_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("RAID_CONFIG") {
            Some(path) if !path.trim().is_empty() => Self::from_file(Path::new(path.trim()))?,
            _ => Self::default(),
        };
        config.apply_overrides(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    fn apply_overrides<F>(&mut self, lookup: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("RAID_HOST") {
            self.host = v;
        }
        if let Some(v) = lookup("RAID_PORT") {
            self.port = parse_env("RAID_PORT", v)?;
        }
        if let Some(v) = lookup("RAID_TICK_HZ") {
            self.tick_hz = parse_env("RAID_TICK_HZ", v)?;
        }
        if let Some(v) = lookup("RAID_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("RAID_RETENTION_SECS") {
            self.retention_secs = parse_env("RAID_RETENTION_SECS", v)?;
        }
        if let Some(v) = lookup("DATABASE_URL") {
            self.database_url = Some(v).filter(|url| !url.trim().is_empty());
        }
        if let Some(v) = lookup("PG_MAX_CONNECTIONS") {
            self.pg_max_connections = parse_env("PG_MAX_CONNECTIONS", v)?;
        }
        if let Some(v) = lookup("RAID_RNG_SEED") {
            self.rng_seed = Some(parse_env("RAID_RNG_SEED", v)?);
        }
        if let Some(v) = lookup("RAID_LOG_LEVEL") {
            match v.parse() {
                Ok(level) => self.log_level = level,
                Err(e) => warn!(error = %e, "Ignoring RAID_LOG_LEVEL"),
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_hz == 0 || self.tick_hz > MAX_TICK_HZ {
            return Err(ConfigError::Invalid(format!(
                "tick_hz must be in 1..={MAX_TICK_HZ}, got {}",
                self.tick_hz
            )));
        }
        if self.retention_secs == 0 {
            return Err(ConfigError::Invalid("retention_secs must be positive".into()));
        }
        if self.pg_max_connections == 0 {
            return Err(ConfigError::Invalid("pg_max_connections must be positive".into()));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_hz.max(1)))
    }

    /// How long an ended raid stays resident, never below 15 seconds
    pub fn retention(&self) -> Duration {
        let ms = self.retention_secs.saturating_mul(1000).max(MIN_RETENTION_MS);
        Duration::from_millis(ms)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
