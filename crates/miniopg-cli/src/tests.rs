use std::net::SocketAddr;
use std::path::Path;

use clap::{CommandFactory, Parser};
use miniopg_bridge::{BridgeConfig, BridgeServer};
use miniopg_core::browser::{BrowserEntry, EntryFilter, EntryKind};
use miniopg_core::config::{AppConfig, ConfigStore, NamingRule, DEFAULT_MINIO_PORT};
use miniopg_core::links::LinkFormat;
use miniopg_core::uploader::UploadedObject;
use pretty_assertions::assert_eq;

use crate::cli::{Cli, Commands, CompletionShell, ConfigCommands, ConfigSetArgs, FormatArg};
use crate::commands::browse::entry_filter;
use crate::commands::common::{format_entry_line, open_config_store};
use crate::commands::completions::render_completions;
use crate::commands::config::{apply_config_set, redacted_json, run_config_set};
use crate::commands::serve::bridge_config;
use crate::commands::upload::{output_line, run_upload, UploadOptions};
use crate::error::CliError;

fn temp_store(dir: &tempfile::TempDir) -> ConfigStore {
    ConfigStore::at(dir.path().join("MinioPG-config.json"))
}

fn storage_args() -> ConfigSetArgs {
    ConfigSetArgs {
        endpoint: Some("https://minio.example.com".to_string()),
        access_key: Some("AKID".to_string()),
        secret_key: Some("s3cr3t".to_string()),
        bucket: Some("images".to_string()),
        ..ConfigSetArgs::default()
    }
}

#[test]
fn command_tree_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn upload_accepts_several_paths_and_a_format() {
    let cli = Cli::try_parse_from([
        "miniopg", "upload", "a.png", "b.png", "--format", "markdown", "--json",
    ])
    .unwrap();

    match cli.command {
        Commands::Upload {
            paths,
            format,
            json,
            ..
        } => {
            assert_eq!(paths, vec!["a.png".to_string(), "b.png".to_string()]);
            assert_eq!(format, Some(FormatArg::Markdown));
            assert!(json);
        }
        _ => panic!("expected upload"),
    }
}

#[test]
fn upload_requires_at_least_one_path() {
    assert!(Cli::try_parse_from(["miniopg", "upload"]).is_err());
}

#[test]
fn global_config_flag_works_after_subcommand() {
    let cli = Cli::try_parse_from(["miniopg", "ls", "shots/", "--config", "/tmp/c.json"]).unwrap();
    assert_eq!(cli.config.as_deref(), Some(Path::new("/tmp/c.json")));
    assert!(matches!(cli.command, Commands::Ls { ref prefix, .. } if prefix == "shots/"));
}

#[test]
fn config_set_parses_boolean_tls_flag() {
    let cli = Cli::try_parse_from([
        "miniopg", "config", "set", "--use-ssl", "true", "--port", "9443",
    ])
    .unwrap();

    match cli.command {
        Commands::Config {
            command: ConfigCommands::Set(args),
        } => {
            assert_eq!(args.use_ssl, Some(true));
            assert_eq!(args.port, Some(9443));
            assert_eq!(args.bucket, None);
        }
        _ => panic!("expected config set"),
    }
}

#[test]
fn entry_filter_defaults_to_images() {
    assert_eq!(
        entry_filter(false, false, false, false, false, false, false),
        EntryFilter::default()
    );
    assert_eq!(
        entry_filter(true, false, true, false, false, false, false),
        EntryFilter::all()
    );

    let filter = entry_filter(false, true, false, true, false, false, false);
    assert!(filter.folders);
    assert!(filter.text);
    assert!(!filter.images);
}

#[test]
fn apply_config_set_creates_storage_with_default_port() {
    let mut config = AppConfig::default();
    assert!(apply_config_set(&mut config, storage_args()));

    let storage = config.storage.as_ref().unwrap();
    assert_eq!(storage.port, DEFAULT_MINIO_PORT);
    assert_eq!(storage.bucket, "images");
    assert_eq!(storage.secret_key, "s3cr3t");
}

#[test]
fn apply_config_set_without_options_changes_nothing() {
    let mut config = AppConfig::default();
    assert!(!apply_config_set(&mut config, ConfigSetArgs::default()));
    assert_eq!(config, AppConfig::default());
}

#[test]
fn apply_config_set_leaves_storage_alone_for_link_options() {
    let mut config = AppConfig::default();
    let changed = apply_config_set(
        &mut config,
        ConfigSetArgs {
            format: Some(FormatArg::Html),
            naming: Some(crate::cli::NamingArg::Original),
            ..ConfigSetArgs::default()
        },
    );

    assert!(changed);
    assert_eq!(config.storage, None);
    assert_eq!(config.links.format, LinkFormat::Html);
    assert_eq!(config.upload.naming, NamingRule::Original);
}

#[test]
fn config_set_persists_normalized_values() {
    let dir = tempfile::tempdir().unwrap();
    let store = temp_store(&dir);

    run_config_set(storage_args(), &store).unwrap();

    let saved = store.load().unwrap();
    let storage = saved.require_storage().unwrap();
    assert_eq!(storage.endpoint, "minio.example.com");
    assert!(storage.use_ssl);
}

#[test]
fn config_set_without_options_does_not_create_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = temp_store(&dir);

    run_config_set(ConfigSetArgs::default(), &store).unwrap();
    assert!(!store.path().exists());
}

#[test]
fn redacted_json_masks_secret_key() {
    let mut config = AppConfig::default();
    apply_config_set(&mut config, storage_args());

    let value = redacted_json(&config).unwrap();
    assert_eq!(value["storage"]["secretKey"], "********");
    assert_eq!(value["storage"]["accessKey"], "AKID");
    assert_eq!(value["links"]["format"], "markdown");
}

#[test]
fn redacted_json_handles_missing_storage() {
    let value = redacted_json(&AppConfig::default()).unwrap();
    assert!(value["storage"].is_null());
}

#[tokio::test]
async fn upload_without_storage_fails_before_touching_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = temp_store(&dir);
    let options = UploadOptions {
        format: None,
        directory: None,
        naming: None,
        as_json: false,
    };

    let error = run_upload(&["missing.png".to_string()], &options, &store)
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        CliError::Core(miniopg_core::Error::Config(_))
    ));
}

#[test]
fn output_line_prints_url_unless_formatted() {
    let object = UploadedObject {
        file_name: "shot.png".to_string(),
        key: "1700000000000-shot.png".to_string(),
        url: "http://minio.local:9000/images/1700000000000-shot.png".to_string(),
        link: "![shot.png](http://minio.local:9000/images/1700000000000-shot.png)".to_string(),
    };

    assert_eq!(output_line(&object, false), object.url);
    assert_eq!(output_line(&object, true), object.link);
}

#[test]
fn format_entry_line_shows_size_and_date_for_files() {
    let file = BrowserEntry {
        name: "shot.png".to_string(),
        key: "shots/shot.png".to_string(),
        kind: EntryKind::File,
        size: 1536,
        last_modified: Some("2024-05-01T10:30:00Z".parse().unwrap()),
        url: None,
    };
    let folder = BrowserEntry {
        name: "old/".to_string(),
        key: "shots/old/".to_string(),
        kind: EntryKind::Folder,
        size: 0,
        last_modified: None,
        url: None,
    };

    assert_eq!(
        format_entry_line(&file),
        "    1.5 KB  2024-05-01 10:30  shot.png"
    );
    assert_eq!(format_entry_line(&folder), "         -  -                 old/");
}

#[test]
fn bridge_config_prefers_flags() {
    let bind: SocketAddr = "127.0.0.1:40000".parse().unwrap();
    let config = bridge_config(
        BridgeConfig::default(),
        Some(bind),
        Some(Path::new("/tmp/miniopg.json")),
    )
    .unwrap();

    assert_eq!(config.bind_addr, bind);
    assert_eq!(
        config.config_path.as_deref(),
        Some(Path::new("/tmp/miniopg.json"))
    );

    let untouched = bridge_config(BridgeConfig::default(), None, None).unwrap();
    assert_eq!(untouched, BridgeConfig::default());
}

#[test]
fn bind_flag_must_be_loopback() {
    let bind: SocketAddr = "0.0.0.0:36677".parse().unwrap();
    let error = bridge_config(BridgeConfig::default(), Some(bind), None).unwrap_err();
    assert!(matches!(error, CliError::BridgeConfig(_)));
    assert!(error.to_string().contains("loopback"));
}

#[tokio::test(flavor = "current_thread")]
async fn serve_runs_on_a_single_threaded_runtime() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("MinioPG-config.json");
    let config = bridge_config(
        BridgeConfig::default(),
        Some("127.0.0.1:0".parse().unwrap()),
        Some(&config_path),
    )
    .unwrap();

    let server = BridgeServer::from_config(config).unwrap();
    let addr = server.start().await.unwrap();
    assert!(server.is_running());
    assert!(addr.ip().is_loopback());
    tokio::net::TcpStream::connect(addr).await.unwrap();

    server.stop().await;
    assert!(!server.is_running());
}

#[test]
fn open_config_store_uses_explicit_path() {
    let store = open_config_store(Some(Path::new("/tmp/elsewhere.json"))).unwrap();
    assert_eq!(store.path(), Path::new("/tmp/elsewhere.json"));
}

#[test]
fn completions_name_the_binary() {
    for shell in [CompletionShell::Bash, CompletionShell::Zsh, CompletionShell::Fish] {
        let script = String::from_utf8(render_completions(shell)).unwrap();
        assert!(script.contains("miniopg"), "{shell:?}");
    }
}
