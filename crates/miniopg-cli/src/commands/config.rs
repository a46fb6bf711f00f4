use miniopg_core::config::{AppConfig, ConfigStore};
use serde_json::Value;

use crate::cli::{ConfigCommands, ConfigSetArgs};
use crate::error::CliError;

const SECRET_MASK: &str = "********";

pub fn run_config(command: ConfigCommands, config_store: &ConfigStore) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show => {
            let config = config_store.load()?;
            println!("{}", serde_json::to_string_pretty(&redacted_json(&config)?)?);
        }
        ConfigCommands::Set(args) => run_config_set(args, config_store)?,
        ConfigCommands::Clear => {
            config_store.clear()?;
            println!("Cleared {}", config_store.path().display());
        }
        ConfigCommands::Path => println!("{}", config_store.path().display()),
    }
    Ok(())
}

pub fn run_config_set(args: ConfigSetArgs, config_store: &ConfigStore) -> Result<(), CliError> {
    let mut config = config_store.load()?;
    if !apply_config_set(&mut config, args) {
        println!("Nothing to change. Pass at least one option; see `miniopg config set --help`.");
        return Ok(());
    }

    config_store.save(&config)?;
    let saved = config_store.load()?;
    if let Some(storage) = saved.storage.as_ref() {
        if let Err(error) = storage.validate() {
            eprintln!("Warning: {error}");
        }
    }
    println!("Saved {}", config_store.path().display());
    Ok(())
}

/// Copy every given option into `config`. Returns whether anything was given.
pub fn apply_config_set(config: &mut AppConfig, args: ConfigSetArgs) -> bool {
    let touches_storage = args.endpoint.is_some()
        || args.port.is_some()
        || args.use_ssl.is_some()
        || args.access_key.is_some()
        || args.secret_key.is_some()
        || args.bucket.is_some()
        || args.domain.is_some()
        || args.upload_path.is_some();
    let touches_rest = args.format.is_some()
        || args.custom_template.is_some()
        || args.naming.is_some()
        || args.directory.is_some();

    if touches_storage {
        let storage = config.storage.get_or_insert_with(Default::default);
        if let Some(endpoint) = args.endpoint {
            storage.endpoint = endpoint;
        }
        if let Some(port) = args.port {
            storage.port = port;
        }
        if let Some(use_ssl) = args.use_ssl {
            storage.use_ssl = use_ssl;
        }
        if let Some(access_key) = args.access_key {
            storage.access_key = access_key;
        }
        if let Some(secret_key) = args.secret_key {
            storage.secret_key = secret_key;
        }
        if let Some(bucket) = args.bucket {
            storage.bucket = bucket;
        }
        if let Some(domain) = args.domain {
            storage.domain = Some(domain);
        }
        if let Some(upload_path) = args.upload_path {
            storage.upload_path = Some(upload_path);
        }
    }

    if let Some(format) = args.format {
        config.links.format = format.into();
    }
    if let Some(template) = args.custom_template {
        config.links.custom_template = template;
    }
    if let Some(naming) = args.naming {
        config.upload.naming = naming.into();
    }
    if let Some(directory) = args.directory {
        config.upload.directory = Some(directory);
    }

    touches_storage || touches_rest
}

/// Config as JSON with the secret key masked.
pub fn redacted_json(config: &AppConfig) -> Result<Value, CliError> {
    let mut value = serde_json::to_value(config)?;
    if let Some(secret) = value
        .get_mut("storage")
        .and_then(|storage| storage.get_mut("secretKey"))
    {
        if secret.as_str().is_some_and(|secret| !secret.is_empty()) {
            *secret = Value::String(SECRET_MASK.to_string());
        }
    }
    Ok(value)
}
