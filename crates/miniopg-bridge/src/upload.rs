//! `POST /upload`: decode the request into files and push each one to MinIO.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::HeaderMap;
use axum::Json;
use http_body_util::LengthLimitError;
use miniopg_core::config::StorageConfig;
use miniopg_core::links::image_extension;
use miniopg_core::multipart::{self, Part, DEFAULT_FILE_NAME};
use miniopg_core::storage::{base_file_name, content_type_for, public_url, KeyStamp, ObjectStore};
use miniopg_core::util::unix_millis_now;
use serde::Serialize;

use crate::error::BridgeError;
use crate::routes::AppState;

pub const SUCCESS_MESSAGE: &str = "上传成功";
pub const FAILURE_MESSAGE: &str = "上传失败";

/// PicGo-compatible upload response.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct UploadResponse {
    pub success: bool,
    pub msg: &'static str,
    /// URLs of the parts that uploaded, in request order.
    pub result: Vec<String>,
}

/// What happened to one decoded file.
#[derive(Debug)]
pub struct UploadOutcome {
    pub file_name: String,
    pub key: String,
    pub result: Result<String, String>,
}

impl UploadResponse {
    pub fn from_outcomes(outcomes: &[UploadOutcome]) -> Self {
        let result: Vec<String> = outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().ok().cloned())
            .collect();
        let success = !result.is_empty();
        Self {
            success,
            msg: if success {
                SUCCESS_MESSAGE
            } else {
                FAILURE_MESSAGE
            },
            result,
        }
    }
}

pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<UploadResponse>, BridgeError> {
    let app_config = state
        .config_store
        .load_async()
        .await
        .map_err(|error| BridgeError::config(error.to_string()))?;
    let storage = app_config
        .require_storage()
        .map_err(|error| BridgeError::config(error.to_string()))?
        .clone();

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let bytes = read_body_limited(&headers, body, state.max_body_bytes).await?;
    let parts = decode_parts(&content_type, &bytes)?;

    let store = state
        .connector
        .connect(&storage)
        .map_err(|error| BridgeError::config(error.to_string()))?;

    // Runs detached so the uploads finish even if Typora hangs up early.
    let outcomes = tokio::spawn(upload_parts(store, storage, parts))
        .await
        .map_err(|error| BridgeError::internal(format!("Upload task failed: {error}")))?;

    let response = UploadResponse::from_outcomes(&outcomes);
    tracing::info!(
        parts = outcomes.len(),
        uploaded = response.result.len(),
        "upload request finished"
    );
    Ok(Json(response))
}

async fn read_body_limited(
    headers: &HeaderMap,
    body: Body,
    limit: usize,
) -> Result<Bytes, BridgeError> {
    let declared = headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());
    if declared.is_some_and(|length| length > limit) {
        return Err(BridgeError::PayloadTooLarge(limit));
    }

    axum::body::to_bytes(body, limit).await.map_err(|error| {
        let inner = error.into_inner();
        if inner.is::<LengthLimitError>() {
            BridgeError::PayloadTooLarge(limit)
        } else {
            BridgeError::bad_request(format!("Failed to read request body: {inner}"))
        }
    })
}

fn decode_parts(content_type: &str, bytes: &[u8]) -> Result<Vec<Part>, BridgeError> {
    if !multipart::is_multipart_form_data(content_type) {
        return Ok(vec![anonymous_part(content_type, bytes.to_vec())]);
    }

    let boundary = multipart::parse_boundary(content_type).ok_or_else(|| {
        BridgeError::bad_request("multipart/form-data request is missing its boundary")
    })?;
    let decoded = multipart::decode(bytes, &boundary);
    if decoded.skipped > 0 {
        tracing::warn!(skipped = decoded.skipped, "ignored malformed multipart segments");
    }
    if decoded.parts.is_empty() {
        return Err(BridgeError::bad_request(
            "multipart/form-data request contains no file parts",
        ));
    }
    Ok(decoded.parts)
}

/// Raw request bodies carry no file name, so one is generated.
fn anonymous_part(content_type: &str, data: Vec<u8>) -> Part {
    let extension = image_extension(content_type)
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "png".to_string());
    Part {
        field_name: "file".to_string(),
        file_name: format!("image-{}.{extension}", unix_millis_now()),
        data,
    }
}

/// Upload parts in order. A failed part does not stop the rest.
pub async fn upload_parts(
    store: Arc<dyn ObjectStore>,
    storage: StorageConfig,
    parts: Vec<Part>,
) -> Vec<UploadOutcome> {
    let mut stamp = KeyStamp::new();
    let mut outcomes = Vec::with_capacity(parts.len());

    for part in parts {
        let file_name = base_file_name(&part.file_name, DEFAULT_FILE_NAME).to_string();
        let key = stamp.object_key(storage.upload_path.as_deref(), &file_name);

        let result = stage_and_put(store.as_ref(), &key, &file_name, &part.data)
            .await
            .map(|()| public_url(&storage, &key))
            .map_err(|error| error.to_string());
        match &result {
            Ok(url) => tracing::info!(key = %key, url = %url, "part uploaded"),
            Err(error) => tracing::error!(key = %key, error = %error, "part upload failed"),
        }

        outcomes.push(UploadOutcome {
            file_name,
            key,
            result,
        });
    }
    outcomes
}

/// Write `data` to a temporary file and upload it. The file is removed on
/// every path out of this function.
async fn stage_and_put(
    store: &dyn ObjectStore,
    key: &str,
    file_name: &str,
    data: &[u8],
) -> miniopg_core::Result<()> {
    let staged = tempfile::Builder::new().prefix("miniopg-").tempfile()?;
    tokio::fs::write(staged.path(), data).await?;
    let content_type = content_type_for(file_name);
    store
        .put_file(key, staged.path(), content_type.as_deref())
        .await?;
    staged.close()?;
    Ok(())
}
