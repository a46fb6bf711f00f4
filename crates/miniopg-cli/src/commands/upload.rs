use std::path::Path;

use miniopg_core::config::ConfigStore;
use miniopg_core::storage::S3Connector;
use miniopg_core::uploader::{UploadedObject, Uploader};
use miniopg_core::util::is_http_url;

use crate::cli::{FormatArg, NamingArg};
use crate::commands::common::connect;
use crate::error::CliError;

pub struct UploadOptions<'a> {
    pub format: Option<FormatArg>,
    pub directory: Option<&'a str>,
    pub naming: Option<NamingArg>,
    pub as_json: bool,
}

/// Upload every path in order. Failures are reported on stderr and do not stop
/// the remaining uploads.
pub async fn run_upload(
    paths: &[String],
    options: &UploadOptions<'_>,
    config_store: &ConfigStore,
) -> Result<(), CliError> {
    let (config, store) = connect(config_store, &S3Connector)?;
    let mut uploader = Uploader::new(store, &config)?.with_directory(options.directory);
    if let Some(format) = options.format {
        uploader = uploader.with_format(format.into());
    }
    if let Some(naming) = options.naming {
        uploader = uploader.with_naming(naming.into());
    }

    let mut uploaded = Vec::new();
    let mut failed = 0;
    for path in paths {
        let result = if is_http_url(path.trim()) {
            uploader.upload_url(path).await
        } else {
            uploader.upload_file(Path::new(path)).await
        };
        match result {
            Ok(object) => {
                if !options.as_json {
                    println!("{}", output_line(&object, options.format.is_some()));
                }
                uploaded.push(object);
            }
            Err(error) => {
                failed += 1;
                tracing::error!(path = %path, error = %error, "upload failed");
                eprintln!("Failed to upload {path}: {error}");
            }
        }
    }

    if options.as_json {
        println!("{}", serde_json::to_string_pretty(&uploaded)?);
    }

    if failed > 0 {
        return Err(CliError::UploadsFailed {
            failed,
            total: paths.len(),
        });
    }
    Ok(())
}

pub async fn run_fetch(
    url: &str,
    format: Option<FormatArg>,
    directory: Option<&str>,
    config_store: &ConfigStore,
) -> Result<(), CliError> {
    let (config, store) = connect(config_store, &S3Connector)?;
    let mut uploader = Uploader::new(store, &config)?.with_directory(directory);
    if let Some(format) = format {
        uploader = uploader.with_format(format.into());
    }

    let object = uploader.upload_url(url).await?;
    println!("{}", output_line(&object, format.is_some()));
    Ok(())
}

/// Bare URL unless a link format was asked for.
pub fn output_line(object: &UploadedObject, formatted: bool) -> String {
    if formatted {
        object.link.clone()
    } else {
        object.url.clone()
    }
}
