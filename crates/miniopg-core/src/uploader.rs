//! Local-file and remote-image uploads with naming rules and link rendering.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::{AppConfig, LinkSettings, NamingRule, StorageConfig};
use crate::links::{format_link, image_extension, LinkFormat};
use crate::storage::{content_type_for, join_key, public_url, KeyStamp, ObjectStore};
use crate::util::{compact_text, is_http_url, unix_millis_now};
use crate::{Error, Result};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const FETCH_USER_AGENT: &str = concat!("miniopg/", env!("CARGO_PKG_VERSION"));

/// Result of one successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedObject {
    pub file_name: String,
    pub key: String,
    pub url: String,
    /// `url` rendered in the configured link format.
    pub link: String,
}

/// Uploads files into one directory of the configured bucket.
pub struct Uploader {
    store: Arc<dyn ObjectStore>,
    storage: StorageConfig,
    links: LinkSettings,
    naming: NamingRule,
    directory: Option<String>,
    stamp: KeyStamp,
}

impl Uploader {
    pub fn new(store: Arc<dyn ObjectStore>, config: &AppConfig) -> Result<Self> {
        let storage = config.require_storage()?.clone();
        Ok(Self {
            store,
            storage,
            links: config.links.clone(),
            naming: config.upload.naming,
            directory: config.upload.directory.clone(),
            stamp: KeyStamp::new(),
        })
    }

    /// Override the target directory for this uploader.
    #[must_use]
    pub fn with_directory(mut self, directory: Option<&str>) -> Self {
        if let Some(directory) = directory {
            let directory = directory.trim().trim_matches('/');
            self.directory = (!directory.is_empty()).then(|| directory.to_string());
        }
        self
    }

    #[must_use]
    pub const fn with_format(mut self, format: LinkFormat) -> Self {
        self.links.format = format;
        self
    }

    #[must_use]
    pub const fn with_naming(mut self, naming: NamingRule) -> Self {
        self.naming = naming;
        self
    }

    /// Upload a local file.
    pub async fn upload_file(&mut self, path: &Path) -> Result<UploadedObject> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                Error::InvalidInput(format!("Not a file path: {}", path.display()))
            })?
            .to_string();

        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(Error::InvalidInput(format!(
                "Not a regular file: {}",
                path.display()
            )));
        }

        let key = self.object_key(&file_name).await?;
        let content_type = content_type_for(&file_name);
        self.store
            .put_file(&key, path, content_type.as_deref())
            .await?;

        let url = public_url(&self.storage, &key);
        let link = format_link(
            self.links.format,
            &file_name,
            &url,
            &self.links.custom_template,
        );
        tracing::info!(key = %key, url = %url, "file uploaded");

        Ok(UploadedObject {
            file_name,
            key,
            url,
            link,
        })
    }

    /// Download an image from `url` and upload it.
    pub async fn upload_url(&mut self, url: &str) -> Result<UploadedObject> {
        let staging = tempfile::tempdir()?;
        let path = fetch_remote_image(url, staging.path()).await?;
        self.upload_file(&path).await
    }

    async fn object_key(&mut self, file_name: &str) -> Result<String> {
        let directory = self.directory.as_deref().unwrap_or_default();
        match self.naming {
            NamingRule::TimestampPrefix => {
                Ok(self.stamp.object_key(Some(directory), file_name))
            }
            NamingRule::Original => {
                let key = join_key(directory, file_name);
                if !self.store.stat_object(&key).await? {
                    return Ok(key);
                }
                let renamed = copy_name(file_name);
                tracing::warn!(file = %file_name, renamed = %renamed, "object exists, renaming");
                Ok(join_key(directory, &renamed))
            }
        }
    }
}

/// `shot.png` → `shot-copy.png`.
fn copy_name(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => format!("{stem}-copy.{extension}"),
        _ => format!("{file_name}-copy"),
    }
}

/// Download an `image/*` resource into `dir` as `url-{millis}.{subtype}`.
pub async fn fetch_remote_image(url: &str, dir: &Path) -> Result<PathBuf> {
    let url = url.trim();
    if !is_http_url(url) {
        return Err(Error::InvalidInput(format!(
            "Only http:// and https:// URLs can be fetched: {}",
            compact_text(url)
        )));
    }
    tracing::info!(url = %url, "fetching remote image");

    let client = reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .user_agent(FETCH_USER_AGENT)
        .build()
        .map_err(|error| Error::Http(format!("Failed to build HTTP client: {error}")))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|error| Error::Http(format!("Failed to fetch {url}: {error}")))?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(Error::Http(format!("Fetching {url} returned HTTP {status}")));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let Some(subtype) = image_extension(&content_type) else {
        return Err(Error::InvalidInput(format!(
            "{url} is not an image (Content-Type: {content_type})"
        )));
    };

    let bytes = response
        .bytes()
        .await
        .map_err(|error| Error::Http(format!("Failed to read body of {url}: {error}")))?;

    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("url-{}.{subtype}", unix_millis_now()));
    tokio::fs::write(&path, &bytes).await?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "remote image saved");
    Ok(path)
}
