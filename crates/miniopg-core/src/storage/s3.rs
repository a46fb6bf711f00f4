//! MinIO storage over the S3 API.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::{primitives::ByteStream, Client};
use aws_types::region::Region;
use chrono::{DateTime, Utc};

use super::{ObjectData, ObjectInfo, ObjectStore, StoreConnector};
use crate::config::StorageConfig;
use crate::{Error, Result};

// MinIO ignores the region but the SDK requires one for signing.
const SIGNING_REGION: &str = "us-east-1";

/// Bucket-scoped S3 client for a MinIO server.
#[derive(Clone, Debug)]
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(config: &StorageConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client: build_s3_client(config),
            bucket: config.bucket.clone(),
        })
    }
}

/// Connector producing [`S3Storage`] clients.
#[derive(Debug, Clone, Copy, Default)]
pub struct S3Connector;

impl StoreConnector for S3Connector {
    fn connect(&self, config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
        Ok(Arc::new(S3Storage::new(config)?))
    }
}

#[async_trait]
impl ObjectStore for S3Storage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_file(&self, key: &str, path: &Path, content_type: Option<&str>) -> Result<u64> {
        let key = normalize_object_key(key)?;
        let length = tokio::fs::metadata(path).await?.len();
        let body = ByteStream::from_path(path)
            .await
            .map_err(|error| storage_error("put_object", &self.bucket, Some(&key), error))?;

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_length(i64::try_from(length).unwrap_or(i64::MAX))
            .body(body);
        if let Some(content_type) = normalize_content_type(content_type) {
            request = request.content_type(content_type);
        }

        request.send().await.map_err(|error| {
            storage_error(
                "put_object",
                &self.bucket,
                Some(&key),
                DisplayErrorContext(error),
            )
        })?;

        tracing::debug!(bucket = %self.bucket, key = %key, bytes = length, "object uploaded");
        Ok(length)
    }

    async fn put_bytes(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<()> {
        let key = normalize_object_key(key)?;
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes));
        if let Some(content_type) = normalize_content_type(content_type) {
            request = request.content_type(content_type);
        }

        request.send().await.map_err(|error| {
            storage_error(
                "put_object",
                &self.bucket,
                Some(&key),
                DisplayErrorContext(error),
            )
        })?;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<ObjectData> {
        let key = normalize_object_key(key)?;
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|error| {
                storage_error(
                    "get_object",
                    &self.bucket,
                    Some(&key),
                    DisplayErrorContext(error),
                )
            })?;

        let content_type = normalize_content_type(response.content_type());
        let payload = response.body.collect().await.map_err(|error| {
            storage_error("get_object_body", &self.bucket, Some(&key), error)
        })?;

        Ok(ObjectData {
            bytes: payload.into_bytes().to_vec(),
            content_type,
        })
    }

    async fn stat_object(&self, key: &str) -> Result<bool> {
        let key = normalize_object_key(key)?;
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(error) => {
                let service_error = error.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(storage_error(
                        "head_object",
                        &self.bucket,
                        Some(&key),
                        DisplayErrorContext(service_error),
                    ))
                }
            }
        }
    }

    async fn remove_object(&self, key: &str) -> Result<()> {
        let key = normalize_object_key(key)?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|error| {
                storage_error(
                    "delete_object",
                    &self.bucket,
                    Some(&key),
                    DisplayErrorContext(error),
                )
            })?;
        Ok(())
    }

    async fn remove_objects(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            self.remove_object(key).await?;
        }
        Ok(())
    }

    async fn list_objects(&self, prefix: &str, recursive: bool) -> Result<Vec<ObjectInfo>> {
        let mut listed = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);
            if !recursive {
                request = request.delimiter("/");
            }
            if let Some(token) = continuation.take() {
                request = request.continuation_token(token);
            }

            let response = request.send().await.map_err(|error| {
                storage_error(
                    "list_objects_v2",
                    &self.bucket,
                    Some(prefix),
                    DisplayErrorContext(error),
                )
            })?;

            listed.extend(response.common_prefixes().iter().filter_map(|common| {
                common.prefix().map(|key| ObjectInfo {
                    key: key.to_string(),
                    size: 0,
                    last_modified: None,
                    is_prefix: true,
                })
            }));
            listed.extend(response.contents().iter().filter_map(|object| {
                object.key().map(|key| ObjectInfo {
                    key: key.to_string(),
                    size: object
                        .size()
                        .and_then(|size| u64::try_from(size).ok())
                        .unwrap_or_default(),
                    last_modified: object.last_modified().and_then(|modified| {
                        DateTime::<Utc>::from_timestamp(modified.secs(), modified.subsec_nanos())
                    }),
                    is_prefix: false,
                })
            }));

            match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(listed)
    }

    async fn copy_object(&self, source_key: &str, dest_key: &str) -> Result<()> {
        let source_key = normalize_object_key(source_key)?;
        let dest_key = normalize_object_key(dest_key)?;
        let copy_source = format!("{}/{}", self.bucket, urlencoding::encode(&source_key));

        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(copy_source)
            .key(&dest_key)
            .send()
            .await
            .map_err(|error| {
                storage_error(
                    "copy_object",
                    &self.bucket,
                    Some(&source_key),
                    DisplayErrorContext(error),
                )
            })?;
        Ok(())
    }

    async fn bucket_exists(&self) -> Result<bool> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(true),
            Err(error) => {
                let service_error = error.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(storage_error(
                        "head_bucket",
                        &self.bucket,
                        None,
                        DisplayErrorContext(service_error),
                    ))
                }
            }
        }
    }

    async fn make_bucket(&self) -> Result<()> {
        self.client
            .create_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|error| {
                storage_error(
                    "create_bucket",
                    &self.bucket,
                    None,
                    DisplayErrorContext(error),
                )
            })?;
        tracing::info!(bucket = %self.bucket, "bucket created");
        Ok(())
    }

    async fn list_buckets(&self) -> Result<Vec<String>> {
        let response = self.client.list_buckets().send().await.map_err(|error| {
            storage_error("list_buckets", &self.bucket, None, DisplayErrorContext(error))
        })?;
        Ok(response
            .buckets()
            .iter()
            .filter_map(|bucket| bucket.name().map(ToOwned::to_owned))
            .collect())
    }
}

fn build_s3_client(config: &StorageConfig) -> Client {
    let credentials = Credentials::new(
        config.access_key.clone(),
        config.secret_key.clone(),
        None,
        None,
        "miniopg-storage",
    );

    let sdk_config = aws_sdk_s3::config::Builder::new()
        .region(Region::new(SIGNING_REGION))
        .credentials_provider(credentials)
        .endpoint_url(config.endpoint_url())
        .force_path_style(true)
        .build();

    Client::from_conf(sdk_config)
}

fn storage_error(
    operation: &str,
    bucket: &str,
    object_key: Option<&str>,
    error: impl std::fmt::Display,
) -> Error {
    let target = object_key.map_or_else(|| bucket.to_string(), |key| format!("{bucket}/{key}"));
    Error::Storage(format!("MinIO {operation} failed for {target}: {error}"))
}

fn normalize_object_key(object_key: &str) -> Result<String> {
    let trimmed = object_key.trim().trim_start_matches('/');
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("Object key cannot be empty".to_string()));
    }
    Ok(trimmed.to_string())
}

fn normalize_content_type(content_type: Option<&str>) -> Option<String> {
    content_type
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}
