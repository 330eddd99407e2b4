//! Application configuration and credential persistence.
//!
//! Configuration is layered with `figment`: built-in defaults, then
//! `~/.chem-tutor-ai/config.json`, then `CHEM_TUTOR_*` environment variables
//! (nested keys separated by `__`, e.g. `CHEM_TUTOR_RETRY__MAX_ATTEMPTS`).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Json, Serialized},
    Figment,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::access::AdminCredentials;
use crate::classifier::ClassifierPolicy;
use crate::client::DEFAULT_BASE_URL;
use crate::models::{Settings, DEFAULT_MODEL};
use crate::retry::RetryPolicy;

/// Directory under the home directory holding all local state.
pub const CONFIG_DIR_NAME: &str = ".chem-tutor-ai";
/// Key under which the API key is stored.
pub const CREDENTIAL_KEY: &str = "gemini_api_key";
/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "CHEM_TUTOR_";

/// Errors from loading or saving local configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The home directory could not be determined.
    #[error("Could not find home directory")]
    NoHomeDir,
    /// A configuration source could not be parsed.
    #[error("Invalid configuration: {0}")]
    Figment(#[from] Box<figment::Error>),
    /// Failed to read or write a file.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// A stored file is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Everything the application reads at start-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Selected model, or "custom"
    pub model: String,
    /// Model used when `model` is "custom"
    pub custom_model: String,
    /// Key used when the user has not entered one
    pub system_credential: String,
    /// Gemini endpoint
    pub base_url: String,
    /// Retry timing
    pub retry: RetryPolicy,
    /// Error trigger phrases
    pub classifier: ClassifierPolicy,
    /// Admin login for the registration panel
    pub admin: AdminCredentials,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            custom_model: String::new(),
            system_credential: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            retry: RetryPolicy::default(),
            classifier: ClassifierPolicy::default(),
            admin: AdminCredentials::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from the default location.
    ///
    /// # Errors
    ///
    /// Fails when the home directory is unknown or a source is malformed.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_dir()?.join("config.json"))
    }

    /// Loads configuration layered over the JSON file at `path`, which may be absent.
    ///
    /// # Errors
    ///
    /// Fails when a source is malformed.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Json::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| ConfigError::Figment(Box::new(e)))
    }

    /// Settings for a session, with the user's stored key if any.
    pub fn settings(&self, credential: Option<String>) -> Settings {
        Settings::builder()
            .model(self.model.clone())
            .custom_model(self.custom_model.clone())
            .credential(credential.unwrap_or_default())
            .build()
    }
}

/// `~/.chem-tutor-ai`, created on demand by the stores.
///
/// # Errors
///
/// Returns [`ConfigError::NoHomeDir`] when the home directory is unknown.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR_NAME))
        .ok_or(ConfigError::NoHomeDir)
}

/// A small JSON key-value file holding the API key across sessions.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// A store backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The store in the default config directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoHomeDir`] when the home directory is unknown.
    pub fn open_default() -> Result<Self, ConfigError> {
        Ok(Self::new(config_dir()?.join("storage.json")))
    }

    fn read_map(&self) -> Result<Map<String, Value>, ConfigError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(Map::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_map(&self, map: &Map<String, Value>) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(map)?)?;
        Ok(())
    }

    /// The stored key, trimmed; `None` when absent or blank.
    ///
    /// # Errors
    ///
    /// Fails when the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<Option<String>, ConfigError> {
        Ok(self
            .read_map()?
            .get(CREDENTIAL_KEY)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string))
    }

    /// Stores `key`, keeping any other entries in the file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or written.
    pub fn save(&self, key: &str) -> Result<(), ConfigError> {
        let mut map = self.read_map()?;
        map.insert(CREDENTIAL_KEY.to_string(), Value::String(key.trim().to_string()));
        self.write_map(&map)
    }

    /// Removes the stored key.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or written.
    pub fn clear(&self) -> Result<(), ConfigError> {
        let mut map = self.read_map()?;
        if map.remove(CREDENTIAL_KEY).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}
