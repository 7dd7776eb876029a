use anyhow::{Context, Result};
use snapshot_store::{RetentionPolicy, DEFAULT_RETENTION_DAYS};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub retention_days: i64,
    /// Empty means any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("results"),
            host: "0.0.0.0".to_string(),
            port: 3000,
            retention_days: DEFAULT_RETENTION_DAYS,
            allowed_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup; unset variables take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let port = match lookup("API_PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("API_PORT must be a port number, got {raw:?}"))?,
            None => defaults.port,
        };

        let retention_days = match lookup("RETENTION_DAYS") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("RETENTION_DAYS must be a whole number of days, got {raw:?}"))?,
            None => defaults.retention_days,
        };
        if retention_days < 0 {
            anyhow::bail!("RETENTION_DAYS must not be negative, got {retention_days}");
        }

        let allowed_origins = lookup("ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            data_dir: lookup("SIGNAL_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            host: lookup("API_HOST").unwrap_or(defaults.host),
            port,
            retention_days,
            allowed_origins,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy::new(self.retention_days)
    }
}
