//! Configuration file parser for ~/.config/newsflow/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde but logged as likely typos. A few
//! environment variables override the file (see [`Config::apply_env`]).
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::feed::{DEFAULT_FETCH_TIMEOUT, DEFAULT_LIST_FIELD, DEFAULT_MAX_RESPONSE_BYTES};
use crate::storage::DEFAULT_STORAGE_TIMEOUT;

/// MediaStack live news endpoint
pub const DEFAULT_FEED_ENDPOINT: &str = "http://api.mediastack.com/v1/news";

/// Access key for the feed endpoint
pub const ENV_ACCESS_KEY: &str = "NEWS_API_KEY";
pub const ENV_FEED_ENDPOINT: &str = "NEWSFLOW_FEED_ENDPOINT";
pub const ENV_DATABASE: &str = "NEWSFLOW_DATABASE";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// The custom Debug impl masks `access_key`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file. `None` means `news.db` in the config directory.
    pub database_path: Option<PathBuf>,

    /// Article list endpoint
    pub feed_endpoint: String,

    /// Feed API access key (`NEWS_API_KEY` takes precedence)
    pub access_key: Option<String>,

    /// Top-level response field holding the article list
    pub list_field: String,

    /// Extra query parameters sent with every fetch (e.g. `languages = "en"`)
    pub feed_params: BTreeMap<String, String>,

    /// Upper bound on one fetch, request through body
    pub fetch_timeout_secs: u64,

    /// Upper bound on any single storage operation
    pub storage_timeout_secs: u64,

    /// Response body cap in bytes
    pub max_response_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            feed_endpoint: DEFAULT_FEED_ENDPOINT.to_string(),
            access_key: None,
            list_field: DEFAULT_LIST_FIELD.to_string(),
            feed_params: BTreeMap::new(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT.as_secs(),
            storage_timeout_secs: DEFAULT_STORAGE_TIMEOUT.as_secs(),
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("feed_endpoint", &self.feed_endpoint)
            .field("access_key", &self.access_key.as_ref().map(|_| "[REDACTED]"))
            .field("list_field", &self.list_field)
            .field("feed_params", &self.feed_params)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("storage_timeout_secs", &self.storage_timeout_secs)
            .field("max_response_bytes", &self.max_response_bytes)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 8] = [
        "database_path",
        "feed_endpoint",
        "access_key",
        "list_field",
        "feed_params",
        "fetch_timeout_secs",
        "storage_timeout_secs",
        "max_response_bytes",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check size before reading so a huge file is never pulled into memory
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            endpoint = %config.feed_endpoint,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// Empty values are ignored. Takes a lookup function rather than reading
    /// the process environment so callers and tests control the source.
    pub fn apply_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_ACCESS_KEY) {
            self.access_key = Some(key);
        }
        if let Some(endpoint) = get(ENV_FEED_ENDPOINT) {
            self.feed_endpoint = endpoint;
        }
        if let Some(path) = get(ENV_DATABASE) {
            self.database_path = Some(PathBuf::from(path));
        }
        self
    }

    pub fn access_key(&self) -> Option<SecretString> {
        self.access_key
            .as_ref()
            .filter(|k| !k.is_empty())
            .map(|k| SecretString::from(k.clone()))
    }

    /// Never shorter than one second
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    /// Never shorter than one second
    pub fn storage_timeout(&self) -> Duration {
        Duration::from_secs(self.storage_timeout_secs.max(1))
    }
}

// ============================================================================
// Tests
// ============================================================================
