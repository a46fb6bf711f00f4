use std::path::Path;
use std::sync::Arc;

use miniopg_core::browser::{Browser, BrowserEntry, EntryKind};
use miniopg_core::config::{AppConfig, ConfigStore};
use miniopg_core::storage::{ObjectStore, S3Connector, StoreConnector};
use miniopg_core::util::format_file_size;

use crate::error::CliError;

/// Config store at `--config`, else `MINIOPG_CONFIG_PATH` or the platform default.
pub fn open_config_store(path: Option<&Path>) -> Result<ConfigStore, CliError> {
    match path {
        Some(path) => Ok(ConfigStore::at(path)),
        None => Ok(ConfigStore::from_env()?),
    }
}

/// Load the config and connect to the configured bucket.
pub fn connect(
    config_store: &ConfigStore,
    connector: &dyn StoreConnector,
) -> Result<(AppConfig, Arc<dyn ObjectStore>), CliError> {
    let config = config_store.load()?;
    let storage = config.require_storage()?;
    let store = connector.connect(storage)?;
    Ok((config, store))
}

pub fn open_browser(config_store: &ConfigStore) -> Result<Browser, CliError> {
    let (config, store) = connect(config_store, &S3Connector)?;
    let storage = config.require_storage()?.clone();
    Ok(Browser::new(store, storage))
}

/// One listing row: size, modification time and name.
pub fn format_entry_line(entry: &BrowserEntry) -> String {
    let size = match entry.kind {
        EntryKind::File => format_file_size(entry.size),
        EntryKind::Folder | EntryKind::Parent => "-".to_string(),
    };
    let modified = entry.last_modified.map_or_else(
        || "-".to_string(),
        |time| time.format("%Y-%m-%d %H:%M").to_string(),
    );
    format!("{size:>10}  {modified:<16}  {}", entry.name)
}
