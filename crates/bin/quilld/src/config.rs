//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `quill.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use quill_domain::event::Topology;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Database settings.
    pub database: DatabaseConfig,
    /// Counter store settings.
    pub counters: CountersConfig,
    /// Metrics sync settings.
    pub sync: SyncConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Which counter store implementation backs likes and views.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterBackend {
    /// Process-local map; counters vanish on restart.
    #[default]
    Memory,
    /// Shared Redis server.
    Redis,
}

impl FromStr for CounterBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => Err(format!("unknown counter backend `{other}`")),
        }
    }
}

/// Counter store configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CountersConfig {
    pub backend: CounterBackend,
    /// Redis URL, used when `backend = "redis"`.
    pub redis_url: String,
}

/// Metrics sync configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Topic layout shared by the publisher and the consumer.
    pub topology: Topology,
    /// Bound on each durable-store call made by the consumer, in milliseconds.
    pub store_deadline_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `quill.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("quill.toml")?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(val) = lookup("QUILL_HOST") {
            self.server.host = val;
        }
        if let Some(val) = lookup("QUILL_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Some(val) = lookup("QUILL_BIND") {
            if let Some((host, port)) = val.rsplit_once(':') {
                self.server.host = host.to_string();
                if let Ok(port) = port.parse() {
                    self.server.port = port;
                }
            }
        }
        if let Some(val) = lookup("QUILL_DATABASE_URL") {
            self.database.url = val;
        }
        if let Some(val) = lookup("QUILL_COUNTER_BACKEND") {
            self.counters.backend = val.parse().map_err(ConfigError::Validation)?;
        }
        if let Some(val) = lookup("QUILL_REDIS_URL") {
            self.counters.redis_url = val;
        }
        if let Some(val) = lookup("QUILL_TOPOLOGY") {
            self.sync.topology = val.parse().map_err(ConfigError::Validation)?;
        }
        if let Some(val) = lookup("QUILL_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = lookup("RUST_LOG") {
            self.logging.filter = val;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.counters.backend == CounterBackend::Redis && self.counters.redis_url.is_empty() {
            return Err(ConfigError::Validation(
                "redis_url is required for the redis counter backend".to_string(),
            ));
        }
        if self.sync.store_deadline_ms == 0 {
            return Err(ConfigError::Validation(
                "store_deadline_ms must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    /// Bound on each durable-store call made by the consumer.
    #[must_use]
    pub fn store_deadline(&self) -> Duration {
        Duration::from_millis(self.sync.store_deadline_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:quill.db?mode=rwc".to_string(),
        }
    }
}

impl Default for CountersConfig {
    fn default() -> Self {
        Self {
            backend: CounterBackend::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            topology: Topology::Unified,
            store_deadline_ms: 5_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "quilld=info,quill_app=info,quill_adapter_redis=info,tower_http=debug"
                .to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
