//! Tracing setup shared by the MinioPG binaries.
//!
//! Events go to stderr and to a daily rolling plain-text file,
//! `miniopg.log.YYYY-MM-DD`, under the log directory.

use std::path::{Path, PathBuf};

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::util::normalize_text_option;
use crate::{Error, Result};

const ENV_LOG_DIR: &str = "MINIOPG_LOG_DIR";
const LOG_FILE_PREFIX: &str = "miniopg.log";

/// Log directory from `MINIOPG_LOG_DIR`, else `<data dir>/miniopg/logs`.
pub fn default_log_dir() -> Option<PathBuf> {
    normalize_text_option(std::env::var(ENV_LOG_DIR).ok())
        .map(PathBuf::from)
        .or_else(|| dirs::data_dir().map(|dir| dir.join("miniopg").join("logs")))
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides `default_directive`. When the log directory cannot be
/// used, logging continues on stderr only. Calling this twice is harmless.
pub fn init(default_directive: &str, log_dir: Option<&Path>) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file_appender, file_error) = match log_dir.map(file_appender) {
        Some(Ok(appender)) => (Some(appender), None),
        Some(Err(error)) => (None, Some(error)),
        None => (None, None),
    };
    let file_layer = file_appender.map(|appender| {
        fmt::layer()
            .with_writer(appender)
            .with_ansi(false)
    });

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    if let Some(error) = file_error {
        tracing::warn!(error = %error, "file logging disabled");
    }
}

fn file_appender(log_dir: &Path) -> Result<RollingFileAppender> {
    std::fs::create_dir_all(log_dir).map_err(|error| {
        Error::Config(format!(
            "Failed to create log directory {}: {error}",
            log_dir.display()
        ))
    })?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .build(log_dir)
        .map_err(|error| {
            Error::Config(format!(
                "Failed to open log file in {}: {error}",
                log_dir.display()
            ))
        })
}
