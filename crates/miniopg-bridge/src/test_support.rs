//! Fakes shared by the router tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use miniopg_core::config::StorageConfig;
use miniopg_core::storage::{ObjectData, ObjectInfo, ObjectStore, StoreConnector};
use miniopg_core::{Error, Result};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct RecordedPut {
    pub key: String,
    pub data: Vec<u8>,
    pub content_type: Option<String>,
    pub staged_path: PathBuf,
}

/// Store that records uploads and fails any key containing `fail`.
#[derive(Default)]
pub struct RecordingStore {
    puts: Mutex<Vec<RecordedPut>>,
}

impl RecordingStore {
    /// Successful uploads in call order.
    pub fn puts(&self) -> Vec<RecordedPut> {
        self.puts
            .lock()
            .unwrap()
            .iter()
            .filter(|put| !put.key.contains("fail"))
            .cloned()
            .collect()
    }

    /// Every staged file handed to the store, including failed ones.
    pub fn staged_paths(&self) -> Vec<PathBuf> {
        self.puts
            .lock()
            .unwrap()
            .iter()
            .map(|put| put.staged_path.clone())
            .collect()
    }
}

fn unsupported() -> Error {
    Error::Storage("not supported by the recording store".to_string())
}

#[async_trait]
impl ObjectStore for RecordingStore {
    fn bucket(&self) -> &str {
        "images"
    }

    async fn put_file(&self, key: &str, path: &Path, content_type: Option<&str>) -> Result<u64> {
        let data = std::fs::read(path)?;
        let length = data.len() as u64;
        self.puts.lock().unwrap().push(RecordedPut {
            key: key.to_string(),
            data,
            content_type: content_type.map(ToOwned::to_owned),
            staged_path: path.to_path_buf(),
        });
        if key.contains("fail") {
            return Err(Error::Storage(format!("refused {key}")));
        }
        Ok(length)
    }

    async fn put_bytes(&self, _key: &str, _bytes: Vec<u8>, _content_type: Option<&str>) -> Result<()> {
        Err(unsupported())
    }

    async fn get_object(&self, _key: &str) -> Result<ObjectData> {
        Err(unsupported())
    }

    async fn stat_object(&self, _key: &str) -> Result<bool> {
        Err(unsupported())
    }

    async fn remove_object(&self, _key: &str) -> Result<()> {
        Err(unsupported())
    }

    async fn remove_objects(&self, _keys: &[String]) -> Result<()> {
        Err(unsupported())
    }

    async fn list_objects(&self, _prefix: &str, _recursive: bool) -> Result<Vec<ObjectInfo>> {
        Err(unsupported())
    }

    async fn copy_object(&self, _source_key: &str, _dest_key: &str) -> Result<()> {
        Err(unsupported())
    }

    async fn bucket_exists(&self) -> Result<bool> {
        Err(unsupported())
    }

    async fn make_bucket(&self) -> Result<()> {
        Err(unsupported())
    }

    async fn list_buckets(&self) -> Result<Vec<String>> {
        Err(unsupported())
    }
}

/// Connector that hands out one shared [`RecordingStore`].
#[derive(Default)]
pub struct RecordingConnector {
    pub store: Arc<RecordingStore>,
    connects: AtomicUsize,
}

impl RecordingConnector {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl StoreConnector for RecordingConnector {
    fn connect(&self, _config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.store.clone())
    }
}

pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
