//! MinioPG CLI - upload files to MinIO and manage the bucket from the terminal
//!
//! `miniopg serve` runs the Typora upload bridge; `miniopg upload` works as a
//! Typora custom upload command, printing one URL per uploaded file.

mod cli;
mod commands;
mod error;

#[cfg(test)]
mod tests;

use clap::Parser;
use miniopg_core::logging;

use crate::cli::{Cli, Commands};
use crate::commands::browse::{entry_filter, run_download, run_ls, run_mkdir, run_mv, run_rm};
use crate::commands::buckets::run_buckets;
use crate::commands::common::open_config_store;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::serve::run_serve;
use crate::commands::upload::{run_fetch, run_upload, UploadOptions};
use crate::error::CliError;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    // Only load .env in development builds.
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(&cli);

    let config_path = cli.config;
    let config_store = || open_config_store(config_path.as_deref());
    match cli.command {
        Commands::Serve { bind } => run_serve(bind, config_path.as_deref()).await?,
        Commands::Upload {
            paths,
            format,
            dir,
            naming,
            json,
        } => {
            let options = UploadOptions {
                format,
                directory: dir.as_deref(),
                naming,
                as_json: json,
            };
            run_upload(&paths, &options, &config_store()?).await?;
        }
        Commands::Fetch { url, format, dir } => {
            run_fetch(&url, format, dir.as_deref(), &config_store()?).await?;
        }
        Commands::Ls {
            prefix,
            all,
            folders,
            images,
            text,
            documents,
            archives,
            others,
            json,
        } => {
            let filter = entry_filter(all, folders, images, text, documents, archives, others);
            run_ls(&prefix, filter, json, &config_store()?).await?;
        }
        Commands::Mkdir { name, parent } => run_mkdir(&name, &parent, &config_store()?).await?,
        Commands::Rm { paths } => run_rm(&paths, &config_store()?).await?,
        Commands::Mv { path, new_name } => run_mv(&path, &new_name, &config_store()?).await?,
        Commands::Download { paths, dir } => run_download(&paths, &dir, &config_store()?).await?,
        Commands::Buckets => run_buckets(&config_store()?).await?,
        Commands::Config { command } => run_config(command, &config_store()?)?,
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref())?,
    }

    Ok(())
}

/// The bridge logs at info level and to the log directory; one-shot commands
/// keep stderr quiet unless `--verbose` is given.
fn init_logging(cli: &Cli) {
    match (&cli.command, cli.verbose) {
        (Commands::Serve { .. }, verbose) => {
            let directive = if verbose {
                "miniopg_cli=debug,miniopg_bridge=debug,miniopg_core=debug"
            } else {
                "miniopg_cli=info,miniopg_bridge=info,miniopg_core=info"
            };
            logging::init(directive, logging::default_log_dir().as_deref());
        }
        (_, true) => logging::init("miniopg_cli=debug,miniopg_core=debug", None),
        (_, false) => logging::init("warn", None),
    }
}
