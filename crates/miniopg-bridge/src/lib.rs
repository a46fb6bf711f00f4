//! miniopg-bridge - local HTTP endpoint that uploads Typora images to MinIO
//!
//! Typora posts images to `POST /upload` the same way it talks to a PicGo
//! server. Each request re-reads the shared MinioPG config file, uploads
//! every file it carries and answers with the public URLs.

pub mod config;
pub mod error;
pub mod routes;
pub mod server;
pub mod upload;

#[cfg(test)]
mod test_support;

pub use config::{require_loopback, BridgeConfig, ConfigError};
pub use error::BridgeError;
pub use routes::{app_router, AppState};
pub use server::BridgeServer;
