//! TOML-based configuration for rockstream.
//!
//! Supports a config file (rockstream.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [connections.analytics]
//! host = "fe.internal"
//! username = "analyst"
//! password = "${SR_PASSWORD}"
//! database = "sales"
//! transport = "flight"
//! flight_port = 9408
//! max_flight_queries = 4
//!
//! [connections.lake]
//! dsn = "${SR_LAKE_DSN}"
//! catalog = "iceberg"
//!
//! [pool]
//! min_conns = 0
//! max_conns = 10
//! conn_max_idle_time = "1m"
//! conn_max_lifetime = "5m"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::connection::ConnectionConfig;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("Invalid duration format: {0}")]
    InvalidDuration(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Named cluster connections.
    pub connections: HashMap<String, ConnectionConfig>,

    /// MySQL connection pool settings shared by all connections.
    pub pool: PoolSettings,
}

/// MySQL protocol connection pool settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Minimum number of connections kept open.
    pub min_conns: usize,

    /// Maximum number of open connections.
    pub max_conns: usize,

    /// Maximum connection idle time (e.g., "1m", "30s").
    pub conn_max_idle_time: String,

    /// Maximum connection lifetime (e.g., "5m", "1h").
    pub conn_max_lifetime: String,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            min_conns: 0,
            max_conns: 10,
            conn_max_idle_time: "1m".to_string(),
            conn_max_lifetime: "5m".to_string(),
        }
    }
}

impl PoolSettings {
    /// Parsed idle timeout.
    pub fn idle_timeout(&self) -> Result<Duration, SettingsError> {
        parse_duration(&self.conn_max_idle_time)
    }

    /// Parsed connection lifetime.
    pub fn max_lifetime(&self) -> Result<Duration, SettingsError> {
        parse_duration(&self.conn_max_lifetime)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.max_conns == 0 || self.min_conns > self.max_conns {
            return Err(SettingsError::InvalidConfig(format!(
                "pool bounds {}..{} are invalid",
                self.min_conns, self.max_conns
            )));
        }
        self.idle_timeout()?;
        self.max_lifetime()?;
        Ok(())
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.pool.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `ROCKSTREAM_CONFIG`
    /// 2. `./rockstream.toml`
    /// 3. `~/.config/rockstream/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("ROCKSTREAM_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("rockstream.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("rockstream").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Get a connection by name with environment variables expanded.
    pub fn connection(&self, name: &str) -> Result<ConnectionConfig, SettingsError> {
        let raw = self
            .connections
            .get(name)
            .ok_or_else(|| SettingsError::ConnectionNotFound(name.to_string()))?;
        resolve_connection(raw)
    }

    /// Get the default connection ("default" if it exists, else the only one).
    pub fn default_connection(&self) -> Result<(String, ConnectionConfig), SettingsError> {
        if self.connections.contains_key("default") {
            return Ok(("default".to_string(), self.connection("default")?));
        }
        match self.connections.len() {
            1 => {
                let name = self.connections.keys().next().cloned().unwrap_or_default();
                let config = self.connection(&name)?;
                Ok((name, config))
            }
            0 => Err(SettingsError::ConnectionNotFound("default".to_string())),
            _ => Err(SettingsError::InvalidConfig(
                "several connections defined; pick one by name".to_string(),
            )),
        }
    }
}

fn resolve_connection(raw: &ConnectionConfig) -> Result<ConnectionConfig, SettingsError> {
    let expand = |v: &Option<String>| -> Result<Option<String>, SettingsError> {
        v.as_deref().map(expand_env_vars).transpose()
    };

    Ok(ConnectionConfig {
        dsn: expand(&raw.dsn)?,
        host: expand_env_vars(&raw.host)?,
        username: expand(&raw.username)?,
        password: expand(&raw.password)?,
        database: expand(&raw.database)?,
        catalog: expand(&raw.catalog)?,
        flight_override: expand(&raw.flight_override)?,
        ..raw.clone()
    })
}

/// Parse durations such as `"500ms"`, `"30s"`, `"5m"`, `"1h"`.
pub fn parse_duration(s: &str) -> Result<Duration, SettingsError> {
    let s = s.trim();
    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| SettingsError::InvalidDuration(s.to_string()))?;
    let (value, unit) = s.split_at(split);
    let value: u64 = value
        .parse()
        .map_err(|_| SettingsError::InvalidDuration(s.to_string()))?;

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 3600)),
        _ => Err(SettingsError::InvalidDuration(s.to_string())),
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let braced = chars.peek() == Some(&'{');
        if braced {
            chars.next();
        }

        let mut var_name = String::new();
        while let Some(&ch) = chars.peek() {
            if braced && ch == '}' {
                chars.next();
                break;
            }
            if !braced && !(ch.is_alphanumeric() || ch == '_') {
                break;
            }
            var_name.push(ch);
            chars.next();
        }

        if var_name.is_empty() && !braced {
            // Just a lone $, keep it
            result.push('$');
            continue;
        }

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
