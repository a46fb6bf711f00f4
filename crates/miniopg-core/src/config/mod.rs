//! Persisted application configuration.
//!
//! The config file is a single JSON document shared by the CLI and the upload
//! bridge. The bridge re-reads it for every request, so edits made by the CLI
//! take effect without restarting the listener.

mod storage;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::links::LinkFormat;
use crate::util::normalize_text_option;
use crate::{Error, Result};

pub use storage::{StorageConfig, DEFAULT_MINIO_PORT};

const CONFIG_DIR_NAME: &str = "miniopg";
const CONFIG_FILE_NAME: &str = "MinioPG-config.json";
const ENV_CONFIG_PATH: &str = "MINIOPG_CONFIG_PATH";

/// Default custom link template.
pub const DEFAULT_CUSTOM_TEMPLATE: &str = "![$fileName]($url)";

/// Whole persisted configuration document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub storage: Option<StorageConfig>,
    #[serde(default)]
    pub links: LinkSettings,
    #[serde(default)]
    pub upload: UploadSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_config_version(),
            storage: None,
            links: LinkSettings::default(),
            upload: UploadSettings::default(),
        }
    }
}

/// How uploaded objects are rendered as shareable text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LinkSettings {
    #[serde(default)]
    pub format: LinkFormat,
    #[serde(default = "default_custom_template")]
    pub custom_template: String,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            format: LinkFormat::default(),
            custom_template: default_custom_template(),
        }
    }
}

/// Object naming rule for uploads started from the CLI.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum NamingRule {
    /// `{millis}-{filename}`
    #[default]
    TimestampPrefix,
    /// Keep the filename, appending `-copy` when the key is taken.
    Original,
}

/// Upload behaviour settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadSettings {
    #[serde(default)]
    pub naming: NamingRule,
    /// Target directory for CLI uploads, relative to the bucket root.
    #[serde(default)]
    pub directory: Option<String>,
}

const fn default_config_version() -> u32 {
    1
}

fn default_custom_template() -> String {
    DEFAULT_CUSTOM_TEMPLATE.to_string()
}

impl AppConfig {
    /// Returns the storage section when every required field is present.
    pub fn require_storage(&self) -> Result<&StorageConfig> {
        let storage = self.storage.as_ref().ok_or_else(|| {
            Error::Config("MinIO storage is not configured. Run `miniopg config set`.".to_string())
        })?;
        storage.validate()?;
        Ok(storage)
    }

    fn normalize(&mut self) {
        if let Some(storage) = self.storage.as_mut() {
            storage.normalize();
        }
        if self.links.custom_template.trim().is_empty() {
            self.links.custom_template = default_custom_template();
        }
        self.upload.directory = normalize_text_option(self.upload.directory.take())
            .map(|directory| directory.trim_matches('/').to_string())
            .filter(|directory| !directory.is_empty());
    }
}

/// File-backed config store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Store at an explicit path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `MINIOPG_CONFIG_PATH` or the platform config directory.
    pub fn from_env() -> Result<Self> {
        if let Some(path) = normalize_text_option(std::env::var(ENV_CONFIG_PATH).ok()) {
            return Ok(Self::at(path));
        }
        default_config_path().map(Self::at)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the config, returning defaults when the file does not exist yet.
    pub fn load(&self) -> Result<AppConfig> {
        if !self.path.exists() {
            return Ok(AppConfig::default());
        }

        let raw = std::fs::read_to_string(&self.path).map_err(|error| self.read_error(&error))?;
        self.parse(&raw)
    }

    /// [`ConfigStore::load`] without blocking the runtime thread.
    pub async fn load_async(&self) -> Result<AppConfig> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(AppConfig::default());
            }
            Err(error) => return Err(self.read_error(&error)),
        };
        self.parse(&raw)
    }

    fn read_error(&self, error: &std::io::Error) -> Error {
        Error::Config(format!(
            "Failed to read config at {}: {error}",
            self.path.display()
        ))
    }

    fn parse(&self, raw: &str) -> Result<AppConfig> {
        let mut config = serde_json::from_str::<AppConfig>(raw).map_err(|error| {
            Error::Config(format!(
                "Failed to parse config at {}: {error}",
                self.path.display()
            ))
        })?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                Error::Config(format!(
                    "Failed to create config directory {}: {error}",
                    parent.display()
                ))
            })?;
        }

        let mut normalized = config.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)?;
        std::fs::write(&self.path, serialized).map_err(|error| {
            Error::Config(format!(
                "Failed to write config at {}: {error}",
                self.path.display()
            ))
        })
    }

    /// Remove the config file. Clearing an absent file is not an error.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(Error::Config(format!(
                "Failed to clear config at {}: {error}",
                self.path.display()
            ))),
        }
    }
}

fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
        .ok_or_else(|| Error::Config("Failed to resolve config directory".to_string()))
}
