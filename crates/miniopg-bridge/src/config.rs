use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// PicGo server address, which Typora posts to when PicGo is the uploader.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:36677";
const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;
const MIN_MAX_BODY_BYTES: usize = 1024;
const MAX_MAX_BODY_BYTES: usize = 1024 * 1024 * 1024;
const DEFAULT_HANDOFF_BACKOFF_MS: u64 = 1_000;
const MAX_HANDOFF_BACKOFF_MS: u64 = 10_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Process settings for the upload bridge.
///
/// Storage credentials are not part of this; they live in the shared config
/// file and are re-read for every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub bind_addr: SocketAddr,
    pub max_body_bytes: usize,
    /// Pause between asking a previous listener to exit and rebinding.
    pub handoff_backoff: Duration,
    /// Overrides the config file location.
    pub config_path: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 36677)),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            handoff_backoff: Duration::from_millis(DEFAULT_HANDOFF_BACKOFF_MS),
            config_path: None,
            log_dir: None,
        }
    }
}

impl BridgeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "MINIOPG_BRIDGE_ADDR", DEFAULT_BIND_ADDR)
            .parse::<SocketAddr>()
            .map_err(|_| {
                ConfigError::Invalid(
                    "MINIOPG_BRIDGE_ADDR must be a socket address like 127.0.0.1:36677"
                        .to_string(),
                )
            })?;
        let bind_addr = require_loopback(bind_addr)?;

        let max_body_bytes = value_or_default(
            &lookup,
            "MINIOPG_BRIDGE_MAX_BODY_BYTES",
            &DEFAULT_MAX_BODY_BYTES.to_string(),
        )
        .parse::<usize>()
        .map_err(|_| {
            ConfigError::Invalid(format!(
                "MINIOPG_BRIDGE_MAX_BODY_BYTES must be an integer in [{MIN_MAX_BODY_BYTES}, {MAX_MAX_BODY_BYTES}]"
            ))
        })?;
        if !(MIN_MAX_BODY_BYTES..=MAX_MAX_BODY_BYTES).contains(&max_body_bytes) {
            return Err(ConfigError::Invalid(format!(
                "MINIOPG_BRIDGE_MAX_BODY_BYTES must be in [{MIN_MAX_BODY_BYTES}, {MAX_MAX_BODY_BYTES}]"
            )));
        }

        let backoff_ms = value_or_default(
            &lookup,
            "MINIOPG_BRIDGE_HANDOFF_BACKOFF_MS",
            &DEFAULT_HANDOFF_BACKOFF_MS.to_string(),
        )
        .parse::<u64>()
        .map_err(|_| {
            ConfigError::Invalid(format!(
                "MINIOPG_BRIDGE_HANDOFF_BACKOFF_MS must be an integer in [0, {MAX_HANDOFF_BACKOFF_MS}]"
            ))
        })?;
        if backoff_ms > MAX_HANDOFF_BACKOFF_MS {
            return Err(ConfigError::Invalid(format!(
                "MINIOPG_BRIDGE_HANDOFF_BACKOFF_MS must be in [0, {MAX_HANDOFF_BACKOFF_MS}]"
            )));
        }

        Ok(Self {
            bind_addr,
            max_body_bytes,
            handoff_backoff: Duration::from_millis(backoff_ms),
            config_path: optional_trimmed(&lookup, "MINIOPG_CONFIG_PATH").map(PathBuf::from),
            log_dir: optional_trimmed(&lookup, "MINIOPG_LOG_DIR").map(PathBuf::from),
        })
    }
}

/// The bridge answers any origin and exposes `/shutdown` without
/// authentication, so it only ever listens on a loopback address.
pub fn require_loopback(addr: SocketAddr) -> Result<SocketAddr, ConfigError> {
    if addr.ip().is_loopback() {
        Ok(addr)
    } else {
        Err(ConfigError::Invalid(format!(
            "Bridge address {addr} is not a loopback address; use 127.0.0.1 or [::1]"
        )))
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
