use std::path::Path;

use miniopg_core::browser::{BrowserEntry, EntryFilter};
use miniopg_core::config::ConfigStore;

use crate::commands::common::{format_entry_line, open_browser};
use crate::error::CliError;

pub async fn run_ls(
    prefix: &str,
    filter: EntryFilter,
    as_json: bool,
    config_store: &ConfigStore,
) -> Result<(), CliError> {
    let browser = open_browser(config_store)?;
    let entries = filter.apply(browser.list(prefix).await?);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for entry in &entries {
            println!("{}", format_entry_line(entry));
        }
    }
    Ok(())
}

pub async fn run_mkdir(name: &str, parent: &str, config_store: &ConfigStore) -> Result<(), CliError> {
    let browser = open_browser(config_store)?;
    let key = browser.create_folder(parent, name).await?;
    println!("{key}");
    Ok(())
}

pub async fn run_rm(paths: &[String], config_store: &ConfigStore) -> Result<(), CliError> {
    let browser = open_browser(config_store)?;
    for path in paths {
        let entry = browser.entry_for(path).await?;
        let removed = browser.delete(&entry).await?;
        println!("{} ({removed} removed)", entry.key);
    }
    Ok(())
}

pub async fn run_mv(path: &str, new_name: &str, config_store: &ConfigStore) -> Result<(), CliError> {
    let browser = open_browser(config_store)?;
    let entry = browser.entry_for(path).await?;
    let new_key = browser.rename(&entry, new_name).await?;
    println!("{new_key}");
    Ok(())
}

pub async fn run_download(
    paths: &[String],
    dir: &Path,
    config_store: &ConfigStore,
) -> Result<(), CliError> {
    let browser = open_browser(config_store)?;
    let mut entries: Vec<BrowserEntry> = Vec::with_capacity(paths.len());
    for path in paths {
        let entry = browser.entry_for(path).await?;
        if entry.is_folder() {
            eprintln!("Skipping folder {}", entry.key);
            continue;
        }
        entries.push(entry);
    }
    if entries.is_empty() {
        return Err(CliError::NothingToDownload(paths.join(", ")));
    }

    let outcomes = browser.download(&entries, dir).await;
    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(path) => println!("{}", path.display()),
            Err(error) => {
                failed += 1;
                eprintln!("Failed to download {}: {error}", outcome.key);
            }
        }
    }

    if failed > 0 {
        return Err(CliError::DownloadsFailed {
            failed,
            total: outcomes.len(),
        });
    }
    Ok(())
}

/// Build a listing filter from the `ls` flags. `--all` wins; with no type flag
/// the default (images only) applies.
#[allow(clippy::fn_params_excessive_bools)]
pub fn entry_filter(
    all: bool,
    folders: bool,
    images: bool,
    text: bool,
    documents: bool,
    archives: bool,
    others: bool,
) -> EntryFilter {
    if all {
        return EntryFilter::all();
    }
    if !(folders || images || text || documents || archives || others) {
        return EntryFilter::default();
    }
    EntryFilter {
        folders,
        images,
        text,
        documents,
        archives,
        others,
    }
}
