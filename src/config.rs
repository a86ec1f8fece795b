//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Which job-store backend to run against. Selected once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StoreBackend {
    /// In-memory store; state is lost on restart.
    #[default]
    Memory,
    /// Embedded libSQL database at the given file path.
    LibSql(PathBuf),
}

/// Store configuration.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
}

/// Task-execution configuration.
#[derive(Debug, Clone)]
pub struct ComputeConfig {
    /// Groq API key; the alternate strategy is disabled when unset.
    pub groq_api_key: Option<SecretString>,
    /// Upper bound on one alternate-strategy call.
    pub strategy_timeout: Duration,
    /// Maximum simultaneously running tasks.
    pub max_concurrent_tasks: usize,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            groq_api_key: None,
            strategy_timeout: Duration::from_secs(10),
            max_concurrent_tasks: 4,
        }
    }
}

/// Full service configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub compute: ComputeConfig,
}

impl Config {
    /// Build config from environment variables, keeping defaults for
    /// anything unset. Set but unparseable values are startup errors rather
    /// than silent fallbacks.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Ok(host) = std::env::var("QUADOP_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("QUADOP_PORT") {
            config.server.port = parse_env("QUADOP_PORT", &port)?;
        }

        if let Ok(db) = std::env::var("QUADOP_DB") {
            if db != "memory" {
                config.store.backend = StoreBackend::LibSql(PathBuf::from(db));
            }
        }

        if let Ok(key) = std::env::var("GROQ_API_KEY") {
            if !key.is_empty() {
                config.compute.groq_api_key = Some(SecretString::from(key));
            }
        }
        if let Ok(secs) = std::env::var("QUADOP_STRATEGY_TIMEOUT_SECS") {
            let secs: u64 = parse_env("QUADOP_STRATEGY_TIMEOUT_SECS", &secs)?;
            config.compute.strategy_timeout = Duration::from_secs(secs);
        }
        if let Ok(tasks) = std::env::var("QUADOP_MAX_CONCURRENT_TASKS") {
            let tasks: usize = parse_env("QUADOP_MAX_CONCURRENT_TASKS", &tasks)?;
            if tasks == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "QUADOP_MAX_CONCURRENT_TASKS".to_string(),
                    message: "must be at least 1".to_string(),
                });
            }
            config.compute.max_concurrent_tasks = tasks;
        }

        Ok(config)
    }
}

/// Parse an env value, mapping failure to a config error naming the key.
fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse {value:?}"),
    })
}
