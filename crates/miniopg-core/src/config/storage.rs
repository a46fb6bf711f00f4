//! MinIO connection settings.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

/// Port MinIO listens on out of the box.
pub const DEFAULT_MINIO_PORT: u16 = 9000;

/// Connection and placement settings for the MinIO bucket.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Host name of the MinIO server, without scheme.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default, rename = "useSSL")]
    pub use_ssl: bool,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub bucket: String,
    /// Public base URL used instead of the endpoint when building links.
    #[serde(default)]
    pub domain: Option<String>,
    /// Key prefix applied to every bridge upload.
    #[serde(default)]
    pub upload_path: Option<String>,
}

const fn default_port() -> u16 {
    DEFAULT_MINIO_PORT
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            port: DEFAULT_MINIO_PORT,
            use_ssl: false,
            access_key: String::new(),
            secret_key: String::new(),
            bucket: String::new(),
            domain: None,
            upload_path: None,
        }
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("port", &self.port)
            .field("use_ssl", &self.use_ssl)
            .field("access_key", &redact_access_key(&self.access_key))
            .field("secret_key", &"[REDACTED]")
            .field("bucket", &self.bucket)
            .field("domain", &self.domain)
            .field("upload_path", &self.upload_path)
            .finish()
    }
}

impl StorageConfig {
    /// Check that every required field is present.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.endpoint.trim().is_empty() {
            missing.push("endpoint");
        }
        if self.access_key.trim().is_empty() {
            missing.push("accessKey");
        }
        if self.secret_key.trim().is_empty() {
            missing.push("secretKey");
        }
        if self.bucket.trim().is_empty() {
            missing.push("bucket");
        }

        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "MinIO configuration is incomplete. Missing: {}",
                missing.join(", ")
            )));
        }
        if self.port == 0 {
            return Err(Error::Config("MinIO port must be greater than zero".to_string()));
        }
        if let Some(domain) = self.domain.as_deref() {
            if !is_http_url(domain) {
                return Err(Error::Config(
                    "Custom domain must start with http:// or https://".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// S3 endpoint URL for the SDK client.
    pub fn endpoint_url(&self) -> String {
        format!("{}://{}:{}", self.scheme(), self.endpoint, self.port)
    }

    pub const fn scheme(&self) -> &'static str {
        if self.use_ssl {
            "https"
        } else {
            "http"
        }
    }

    /// Trim fields, strip a scheme from the endpoint, and tidy optional paths.
    ///
    /// An `https://` endpoint prefix switches TLS on.
    pub(crate) fn normalize(&mut self) {
        let endpoint = self.endpoint.trim();
        let endpoint = if let Some(rest) = endpoint.strip_prefix("https://") {
            self.use_ssl = true;
            rest
        } else {
            endpoint.strip_prefix("http://").unwrap_or(endpoint)
        };
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self.access_key = self.access_key.trim().to_string();
        self.secret_key = self.secret_key.trim().to_string();
        self.bucket = self.bucket.trim().to_string();
        self.domain = normalize_text_option(self.domain.take())
            .map(|domain| domain.trim_end_matches('/').to_string());
        self.upload_path = normalize_text_option(self.upload_path.take())
            .map(|path| path.trim_matches('/').to_string())
            .filter(|path| !path.is_empty());
    }
}

fn redact_access_key(access_key: &str) -> String {
    let visible: String = access_key.chars().take(3).collect();
    format!("{visible}***")
}
