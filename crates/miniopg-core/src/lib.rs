//! miniopg-core - Core library for MinioPG
//!
//! This crate contains the configuration model, the multipart decoder, the
//! object-store client and the link/browser helpers shared by the upload
//! bridge and the command-line interface.

pub mod browser;
pub mod config;
pub mod error;
pub mod links;
pub mod logging;
pub mod multipart;
pub mod storage;
pub mod uploader;
pub mod util;

pub use error::{Error, Result};
