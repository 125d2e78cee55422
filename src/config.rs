use crate::error::ConfigError;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://api.turath.io";
pub const DEFAULT_REFERENCE_BASE_URL: &str = "https://shamela.ws";
pub const DEFAULT_DB_PATH: &str = "turath_metadata.db";
pub const DEFAULT_API_VERSION: u32 = 3;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_BLOCKING_THREADS: usize = 8;
const HTTP_USER_AGENT: &str = "turath-library/0.1";

#[derive(Debug, Clone, PartialEq)]
pub struct LibraryConfig {
    pub api_base_url: String,
    pub db_path: PathBuf,
    /// Site used for citation links, e.g. `<base>/book/7/99`.
    pub reference_base_url: String,
    pub api_version: u32,
    pub http_timeout: Duration,
    pub user_agent: String,
    /// Upper bound for the worker threads that run store calls.
    pub max_blocking_threads: usize,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            reference_base_url: DEFAULT_REFERENCE_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            user_agent: HTTP_USER_AGENT.to_string(),
            max_blocking_threads: DEFAULT_MAX_BLOCKING_THREADS,
        }
    }
}

impl LibraryConfig {
    /// Defaults overridden by `TURATH_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(value) = get("TURATH_API_BASE_URL") {
            config.api_base_url = value;
        }
        if let Some(value) = get("TURATH_DB_PATH") {
            config.db_path = PathBuf::from(value);
        }
        if let Some(value) = get("TURATH_REFERENCE_BASE_URL") {
            config.reference_base_url = value;
        }
        if let Some(value) = get("TURATH_API_VERSION") {
            config.api_version = parse_number("TURATH_API_VERSION", &value)?;
        }
        if let Some(value) = get("TURATH_HTTP_TIMEOUT_SECS") {
            let secs: u64 = parse_number("TURATH_HTTP_TIMEOUT_SECS", &value)?;
            config.http_timeout = Duration::from_secs(secs);
        }
        if let Some(value) = get("TURATH_MAX_BLOCKING_THREADS") {
            let threads: usize = parse_number("TURATH_MAX_BLOCKING_THREADS", &value)?;
            if threads == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "TURATH_MAX_BLOCKING_THREADS",
                    value,
                });
            }
            config.max_blocking_threads = threads;
        }
        Ok(config)
    }

    /// Fails when the seeded cache file is missing.
    pub fn ensure_database_exists(&self) -> Result<(), ConfigError> {
        if self.db_path.is_file() {
            Ok(())
        } else {
            Err(ConfigError::MissingDatabase(
                self.db_path.display().to_string(),
            ))
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse::<T>().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}
