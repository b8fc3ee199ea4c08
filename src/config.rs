use crate::constants::*;
use crate::error::{LoaderError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing::level_filters::LevelFilter;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub input: InputConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub uri: String,
    pub database: String,
    pub collection: String,
    pub connect_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_MONGO_URI.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub dir: PathBuf,
    pub delimiter: char,
    pub on_invalid_row: InvalidRowPolicy,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_INPUT_DIR),
            delimiter: DEFAULT_DELIMITER,
            on_invalid_row: InvalidRowPolicy::default(),
        }
    }
}

/// What the loader does with a row that fails normalization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidRowPolicy {
    /// Fail the whole file
    #[default]
    Abort,
    /// Log the row and keep going
    Skip,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
    pub file_name: String,
    pub append: bool,
    pub json: bool,
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_LOG_DIR),
            file_name: DEFAULT_LOG_FILE.to_string(),
            append: false,
            json: false,
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load from an explicit path, or from `loader.toml` in the working
    /// directory when it exists, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            LoaderError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment overrides. `lookup` is `std::env::var` in the binary.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_MONGO_URI) {
            self.store.uri = v;
        }
        if let Some(v) = lookup(ENV_MONGO_DATABASE) {
            self.store.database = v;
        }
        if let Some(v) = lookup(ENV_MONGO_COLLECTION) {
            self.store.collection = v;
        }
        if let Some(v) = lookup(ENV_INPUT_DIR) {
            self.input.dir = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_LOG_DIR) {
            self.logging.dir = PathBuf::from(v);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.store.uri.trim().is_empty() {
            return Err(LoaderError::Config("store.uri must not be empty".to_string()));
        }
        if self.store.database.trim().is_empty() {
            return Err(LoaderError::Config("store.database must not be empty".to_string()));
        }
        if self.store.collection.trim().is_empty() {
            return Err(LoaderError::Config("store.collection must not be empty".to_string()));
        }
        self.input.delimiter_byte()?;
        // EnvFilter silently drops a directive it cannot parse
        if self.logging.level.parse::<LevelFilter>().is_err() {
            return Err(LoaderError::Config(format!(
                "logging.level must be one of off, error, warn, info, debug, trace; got '{}'",
                self.logging.level
            )));
        }
        Ok(())
    }
}

impl InputConfig {
    /// The csv reader only takes single-byte delimiters
    pub fn delimiter_byte(&self) -> Result<u8> {
        if self.delimiter.is_ascii() {
            Ok(self.delimiter as u8)
        } else {
            Err(LoaderError::Config(format!(
                "input.delimiter must be a single ASCII character, got '{}'",
                self.delimiter
            )))
        }
    }
}
