use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] miniopg_core::Error),
    #[error(transparent)]
    Bridge(#[from] miniopg_bridge::BridgeError),
    #[error(transparent)]
    BridgeConfig(#[from] miniopg_bridge::ConfigError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("{failed} of {total} uploads failed")]
    UploadsFailed { failed: usize, total: usize },
    #[error("{failed} of {total} downloads failed")]
    DownloadsFailed { failed: usize, total: usize },
    #[error("Nothing to download: {0}")]
    NothingToDownload(String),
}
