//! Folder-style browsing over the flat key space of a bucket.
//!
//! Folders exist either implicitly, as the shared prefix of deeper keys, or
//! explicitly, as an empty marker object whose key ends with `/`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::StorageConfig;
use crate::links::FileKind;
use crate::storage::{public_url, ObjectStore};
use crate::{Error, Result};

/// Name of the entry that leads to the parent folder.
pub const PARENT_ENTRY_NAME: &str = "../";

const FORBIDDEN_NAME_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Parent,
    Folder,
    File,
}

/// One row of a folder listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserEntry {
    /// Display name relative to the listed folder. Folders end with `/`.
    pub name: String,
    /// Full object key, or the folder prefix for folders.
    pub key: String,
    pub kind: EntryKind,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub url: Option<String>,
}

impl BrowserEntry {
    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }

    fn folder(name: String, key: String) -> Self {
        Self {
            name,
            key,
            kind: EntryKind::Folder,
            size: 0,
            last_modified: None,
            url: None,
        }
    }
}

/// Which entries a listing shows. The parent entry is always shown, and an
/// all-off filter shows everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct EntryFilter {
    pub folders: bool,
    pub images: bool,
    pub text: bool,
    pub documents: bool,
    pub archives: bool,
    pub others: bool,
}

impl Default for EntryFilter {
    fn default() -> Self {
        Self {
            folders: false,
            images: true,
            text: false,
            documents: false,
            archives: false,
            others: false,
        }
    }
}

impl EntryFilter {
    pub const fn all() -> Self {
        Self {
            folders: true,
            images: true,
            text: true,
            documents: true,
            archives: true,
            others: true,
        }
    }

    const fn is_empty(&self) -> bool {
        !(self.folders || self.images || self.text || self.documents || self.archives || self.others)
    }

    pub fn allows(&self, entry: &BrowserEntry) -> bool {
        if self.is_empty() {
            return true;
        }
        match entry.kind {
            EntryKind::Parent => true,
            EntryKind::Folder => self.folders,
            EntryKind::File => match FileKind::of(&entry.name) {
                FileKind::Image => self.images,
                FileKind::Text => self.text,
                FileKind::Document => self.documents,
                FileKind::Archive => self.archives,
                FileKind::Other => self.others,
            },
        }
    }

    pub fn apply(&self, entries: Vec<BrowserEntry>) -> Vec<BrowserEntry> {
        entries.into_iter().filter(|entry| self.allows(entry)).collect()
    }
}

/// Outcome of downloading one file.
#[derive(Debug)]
pub struct DownloadOutcome {
    pub key: String,
    pub result: std::result::Result<PathBuf, String>,
}

/// Result of a connection check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub buckets: Vec<String>,
    /// The configured bucket did not exist and was created.
    pub bucket_created: bool,
}

/// Folder operations against one bucket.
pub struct Browser {
    store: Arc<dyn ObjectStore>,
    storage: StorageConfig,
}

impl Browser {
    pub const fn new(store: Arc<dyn ObjectStore>, storage: StorageConfig) -> Self {
        Self { store, storage }
    }

    /// List the direct children of `prefix`.
    pub async fn list(&self, prefix: &str) -> Result<Vec<BrowserEntry>> {
        let prefix = folder_prefix(prefix);
        let objects = self.store.list_objects(&prefix, false).await?;

        let mut entries = Vec::with_capacity(objects.len() + 1);
        if !prefix.is_empty() {
            entries.push(BrowserEntry {
                name: PARENT_ENTRY_NAME.to_string(),
                key: parent_prefix(&prefix),
                kind: EntryKind::Parent,
                size: 0,
                last_modified: None,
                url: None,
            });
        }

        for object in objects {
            if object.key == prefix {
                continue;
            }
            let Some(relative) = object.key.strip_prefix(&prefix) else {
                continue;
            };
            if object.is_prefix || relative.ends_with('/') {
                let Some(first) = relative.split('/').next().filter(|s| !s.is_empty()) else {
                    continue;
                };
                let name = format!("{first}/");
                let key = format!("{prefix}{name}");
                entries.push(BrowserEntry::folder(name, key));
            } else if !relative.contains('/') {
                entries.push(BrowserEntry {
                    name: relative.to_string(),
                    url: Some(public_url(&self.storage, &object.key)),
                    key: object.key,
                    kind: EntryKind::File,
                    size: object.size,
                    last_modified: object.last_modified,
                });
            }
        }

        entries.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.name.cmp(&b.name)));
        let mut seen = BTreeSet::new();
        entries.retain(|entry| seen.insert(entry.name.clone()));
        Ok(entries)
    }

    /// Resolve a bucket path to an entry. Paths ending in `/`, or naming a
    /// prefix with children, resolve to folders.
    pub async fn entry_for(&self, path: &str) -> Result<BrowserEntry> {
        let path = path.trim().trim_start_matches('/');
        if path.is_empty() {
            return Err(Error::InvalidInput("Path cannot be empty".to_string()));
        }
        if path.ends_with('/') {
            return Ok(folder_entry(path));
        }

        if self.store.stat_object(path).await? {
            let name = path.rsplit('/').next().unwrap_or(path).to_string();
            return Ok(BrowserEntry {
                name,
                key: path.to_string(),
                kind: EntryKind::File,
                size: 0,
                last_modified: None,
                url: Some(public_url(&self.storage, path)),
            });
        }

        let prefix = format!("{path}/");
        if self.store.list_objects(&prefix, true).await?.is_empty() {
            return Err(Error::InvalidInput(format!("No such object or folder: {path}")));
        }
        Ok(folder_entry(&prefix))
    }

    /// Create an empty marker object for `name` under `current`.
    pub async fn create_folder(&self, current: &str, name: &str) -> Result<String> {
        let name = validate_name(name)?;
        let key = format!("{}{name}/", folder_prefix(current));
        self.store.put_bytes(&key, Vec::new(), None).await?;
        tracing::info!(key = %key, "folder created");
        Ok(key)
    }

    /// Delete a file, or a folder with everything below it. Returns the
    /// number of keys removed.
    pub async fn delete(&self, entry: &BrowserEntry) -> Result<usize> {
        match entry.kind {
            EntryKind::Parent => Err(Error::InvalidInput(
                "The parent entry cannot be deleted".to_string(),
            )),
            EntryKind::File => {
                self.store.remove_object(&entry.key).await?;
                tracing::info!(key = %entry.key, "object deleted");
                Ok(1)
            }
            EntryKind::Folder => {
                let mut keys: Vec<String> = self
                    .store
                    .list_objects(&entry.key, true)
                    .await?
                    .into_iter()
                    .filter(|object| !object.is_prefix)
                    .map(|object| object.key)
                    .collect();
                if !keys.contains(&entry.key) {
                    keys.push(entry.key.clone());
                }
                self.store.remove_objects(&keys).await?;
                tracing::info!(prefix = %entry.key, count = keys.len(), "folder deleted");
                Ok(keys.len())
            }
        }
    }

    /// Rename an entry within its parent folder. Returns the new key.
    pub async fn rename(&self, entry: &BrowserEntry, new_name: &str) -> Result<String> {
        let new_name = validate_name(new_name)?;
        match entry.kind {
            EntryKind::Parent => Err(Error::InvalidInput(
                "The parent entry cannot be renamed".to_string(),
            )),
            EntryKind::File => {
                let new_key = format!("{}{new_name}", parent_prefix(&entry.key));
                if new_key == entry.key {
                    return Ok(new_key);
                }
                if self.store.stat_object(&new_key).await? {
                    return Err(Error::InvalidInput(format!(
                        "An object named {new_name} already exists"
                    )));
                }
                self.store.copy_object(&entry.key, &new_key).await?;
                self.store.remove_object(&entry.key).await?;
                tracing::info!(from = %entry.key, to = %new_key, "object renamed");
                Ok(new_key)
            }
            EntryKind::Folder => {
                let old_prefix = folder_prefix(&entry.key);
                let new_prefix = format!("{}{new_name}/", parent_prefix(&old_prefix));
                if new_prefix == old_prefix {
                    return Ok(new_prefix);
                }

                let keys: Vec<String> = self
                    .store
                    .list_objects(&old_prefix, true)
                    .await?
                    .into_iter()
                    .filter(|object| !object.is_prefix)
                    .map(|object| object.key)
                    .collect();

                if keys.is_empty() {
                    self.store.put_bytes(&new_prefix, Vec::new(), None).await?;
                } else {
                    for key in &keys {
                        let relative = &key[old_prefix.len()..];
                        self.store
                            .copy_object(key, &format!("{new_prefix}{relative}"))
                            .await?;
                    }
                    self.store.remove_objects(&keys).await?;
                }
                tracing::info!(from = %old_prefix, to = %new_prefix, count = keys.len(), "folder renamed");
                Ok(new_prefix)
            }
        }
    }

    /// Download file entries into `dir`. Folders are ignored.
    pub async fn download(&self, entries: &[BrowserEntry], dir: &Path) -> Vec<DownloadOutcome> {
        let mut outcomes = Vec::new();
        for entry in entries.iter().filter(|entry| entry.kind == EntryKind::File) {
            let result = self
                .download_one(&entry.key, dir)
                .await
                .map_err(|error| error.to_string());
            if let Err(error) = &result {
                tracing::warn!(key = %entry.key, error = %error, "download failed");
            }
            outcomes.push(DownloadOutcome {
                key: entry.key.clone(),
                result,
            });
        }
        outcomes
    }

    async fn download_one(&self, key: &str, dir: &Path) -> Result<PathBuf> {
        let data = self.store.get_object(key).await?;
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(download_file_name(key));
        tokio::fs::write(&path, data.bytes).await?;
        Ok(path)
    }

    /// Verify credentials and make sure the configured bucket exists.
    pub async fn check_connection(&self) -> Result<ConnectionStatus> {
        let buckets = self.store.list_buckets().await?;
        let bucket_created = if self.store.bucket_exists().await? {
            false
        } else {
            self.store.make_bucket().await?;
            true
        };
        Ok(ConnectionStatus {
            buckets,
            bucket_created,
        })
    }
}

/// `a/b` → `a/b/`, with the root as the empty string.
fn folder_prefix(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}

/// Prefix of the folder containing `key`.
fn parent_prefix(key: &str) -> String {
    let trimmed = key.trim_end_matches('/');
    trimmed
        .rfind('/')
        .map_or_else(String::new, |index| trimmed[..=index].to_string())
}

fn folder_entry(prefix: &str) -> BrowserEntry {
    let key = folder_prefix(prefix);
    let name = key
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .map(|last| format!("{last}/"))
        .unwrap_or_default();
    BrowserEntry::folder(name, key)
}

/// Check a folder or file name typed by the user. One trailing `/` is
/// tolerated and dropped.
pub fn validate_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("Name cannot be empty".to_string()));
    }
    if trimmed.contains(FORBIDDEN_NAME_CHARS) {
        return Err(Error::InvalidInput(format!(
            "Name cannot contain any of \\ / : * ? \" < > |: {trimmed}"
        )));
    }
    Ok(trimmed)
}

/// Local file name for a downloaded object.
fn download_file_name(key: &str) -> String {
    let name = key.rsplit('/').next().unwrap_or(key);
    let sanitized: String = name
        .chars()
        .map(|ch| if FORBIDDEN_NAME_CHARS.contains(&ch) { '_' } else { ch })
        .collect();
    if sanitized.is_empty() {
        "download".to_string()
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::storage::memory::MemoryStore;

    fn storage() -> StorageConfig {
        StorageConfig {
            endpoint: "minio.local".to_string(),
            port: 9000,
            use_ssl: false,
            access_key: "a".to_string(),
            secret_key: "b".to_string(),
            bucket: "images".to_string(),
            domain: None,
            upload_path: None,
        }
    }

    fn browser(keys: &[&str]) -> (Arc<MemoryStore>, Browser) {
        let store = Arc::new(MemoryStore::with_keys(keys));
        let browser = Browser::new(store.clone(), storage());
        (store, browser)
    }

    fn names(entries: &[BrowserEntry]) -> Vec<&str> {
        entries.iter().map(|entry| entry.name.as_str()).collect()
    }

    #[tokio::test]
    async fn list_root_orders_folders_before_files() {
        let (_, browser) = browser(&[
            "b.png",
            "a.txt",
            "docs/",
            "docs/readme.md",
            "pics/2024/x.png",
            "empty/",
        ]);

        let entries = browser.list("").await.unwrap();
        assert_eq!(names(&entries), vec!["docs/", "empty/", "pics/", "a.txt", "b.png"]);
        assert_eq!(entries[0].key, "docs/");
        assert_eq!(
            entries[4].url.as_deref(),
            Some("http://minio.local:9000/images/b.png")
        );
    }

    #[tokio::test]
    async fn list_subfolder_adds_parent_and_skips_own_marker() {
        let (_, browser) = browser(&["pics/", "pics/a.png", "pics/2024/b.png", "other.png"]);

        let entries = browser.list("/pics").await.unwrap();
        assert_eq!(names(&entries), vec!["../", "2024/", "a.png"]);
        assert_eq!(entries[0].kind, EntryKind::Parent);
        assert_eq!(entries[0].key, "");
        assert_eq!(entries[1].key, "pics/2024/");
    }

    #[test]
    fn default_filter_shows_images_and_parent() {
        let entries = vec![
            BrowserEntry {
                name: PARENT_ENTRY_NAME.to_string(),
                key: String::new(),
                kind: EntryKind::Parent,
                size: 0,
                last_modified: None,
                url: None,
            },
            BrowserEntry::folder("docs/".to_string(), "docs/".to_string()),
            BrowserEntry {
                name: "a.png".to_string(),
                key: "a.png".to_string(),
                kind: EntryKind::File,
                size: 3,
                last_modified: None,
                url: None,
            },
            BrowserEntry {
                name: "a.pdf".to_string(),
                key: "a.pdf".to_string(),
                kind: EntryKind::File,
                size: 3,
                last_modified: None,
                url: None,
            },
        ];

        let shown = EntryFilter::default().apply(entries.clone());
        assert_eq!(names(&shown), vec!["../", "a.png"]);

        let everything = EntryFilter {
            folders: false,
            images: false,
            text: false,
            documents: false,
            archives: false,
            others: false,
        };
        assert_eq!(everything.apply(entries.clone()).len(), 4);
        assert_eq!(EntryFilter::all().apply(entries).len(), 4);
    }

    #[tokio::test]
    async fn create_folder_writes_marker() {
        let (store, browser) = browser(&[]);
        let key = browser.create_folder("pics/", "2024/").await.unwrap();
        assert_eq!(key, "pics/2024/");
        assert_eq!(store.keys(), vec!["pics/2024/"]);
    }

    #[test]
    fn validate_name_rejects_reserved_characters() {
        assert_eq!(validate_name(" shots/ ").unwrap(), "shots");
        for bad in ["", "/", "a/b", "a:b", "a*b", "a?b", "a\"b", "a<b", "a>b", "a|b", "a\\b"] {
            assert!(validate_name(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[tokio::test]
    async fn delete_folder_removes_everything_below() {
        let (store, browser) = browser(&["docs/", "docs/a.md", "docs/deep/b.md", "keep.png"]);
        let entry = browser.entry_for("docs/").await.unwrap();

        let removed = browser.delete(&entry).await.unwrap();
        assert_eq!(removed, 3);
        assert_eq!(store.keys(), vec!["keep.png"]);
    }

    #[tokio::test]
    async fn rename_file_copies_then_removes() {
        let (store, browser) = browser(&["pics/a.png"]);
        let entry = browser.entry_for("pics/a.png").await.unwrap();

        let new_key = browser.rename(&entry, "b.png").await.unwrap();
        assert_eq!(new_key, "pics/b.png");
        assert_eq!(store.keys(), vec!["pics/b.png"]);
        assert_eq!(
            store.objects.lock().unwrap().get("pics/b.png").unwrap(),
            b"pics/a.png"
        );
    }

    #[tokio::test]
    async fn rename_file_refuses_to_overwrite() {
        let (_, browser) = browser(&["a.png", "b.png"]);
        let entry = browser.entry_for("a.png").await.unwrap();
        assert!(browser.rename(&entry, "b.png").await.is_err());
    }

    #[tokio::test]
    async fn rename_folder_moves_every_key() {
        let (store, browser) = browser(&["old/", "old/a.png", "old/sub/b.png"]);
        let entry = browser.entry_for("old").await.unwrap();
        assert!(entry.is_folder());

        let new_prefix = browser.rename(&entry, "new").await.unwrap();
        assert_eq!(new_prefix, "new/");
        assert_eq!(store.keys(), vec!["new/", "new/a.png", "new/sub/b.png"]);
    }

    #[tokio::test]
    async fn rename_empty_folder_creates_new_marker() {
        let (store, browser) = browser(&[]);
        let entry = folder_entry("ghost/");

        browser.rename(&entry, "real").await.unwrap();
        assert_eq!(store.keys(), vec!["real/"]);
    }

    #[tokio::test]
    async fn entry_for_reports_missing_paths() {
        let (_, browser) = browser(&["a.png"]);
        assert!(matches!(
            browser.entry_for("missing.png").await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn download_writes_sanitized_files_and_skips_folders() {
        let (_, browser) = browser(&["pics/a:b.png", "pics/ok.png"]);
        let dir = tempfile::tempdir().unwrap();
        let mut entries = browser.list("pics").await.unwrap();
        entries.push(BrowserEntry::folder("x/".to_string(), "x/".to_string()));
        entries.push(BrowserEntry {
            name: "gone.png".to_string(),
            key: "pics/gone.png".to_string(),
            kind: EntryKind::File,
            size: 0,
            last_modified: None,
            url: None,
        });

        let outcomes = browser.download(&entries, dir.path()).await;
        assert_eq!(outcomes.len(), 3);
        let saved = outcomes[0].result.as_ref().unwrap();
        assert_eq!(saved.file_name().unwrap(), "a_b.png");
        assert_eq!(std::fs::read(saved).unwrap(), b"pics/a:b.png");
        assert!(outcomes[1].result.is_ok());
        assert!(outcomes[2].result.is_err());
    }

    #[tokio::test]
    async fn check_connection_creates_missing_bucket() {
        let (store, browser) = browser(&[]);
        let status = browser.check_connection().await.unwrap();
        assert!(status.bucket_created);
        assert_eq!(status.buckets, vec!["memory"]);
        assert!(*store.bucket_created.lock().unwrap());

        let again = browser.check_connection().await.unwrap();
        assert!(!again.bucket_created);
    }

    #[test]
    fn parent_prefix_walks_up_one_level() {
        assert_eq!(parent_prefix("a/b/c.png"), "a/b/");
        assert_eq!(parent_prefix("a/b/"), "a/");
        assert_eq!(parent_prefix("a/"), "");
        assert_eq!(parent_prefix("c.png"), "");
    }
}
