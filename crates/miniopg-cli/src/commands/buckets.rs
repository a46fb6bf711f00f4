use miniopg_core::browser::Browser;
use miniopg_core::config::ConfigStore;
use miniopg_core::storage::S3Connector;

use crate::commands::common::connect;
use crate::error::CliError;

pub async fn run_buckets(config_store: &ConfigStore) -> Result<(), CliError> {
    let (config, store) = connect(config_store, &S3Connector)?;
    let storage = config.require_storage()?.clone();
    let bucket = storage.bucket.clone();
    let status = Browser::new(store, storage).check_connection().await?;

    for name in &status.buckets {
        let marker = if *name == bucket { "*" } else { " " };
        println!("{marker} {name}");
    }
    if status.bucket_created {
        println!("Created bucket {bucket}");
    }
    Ok(())
}
