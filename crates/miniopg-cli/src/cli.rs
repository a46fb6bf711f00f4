use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use miniopg_core::config::NamingRule;
use miniopg_core::links::LinkFormat;

#[derive(Parser)]
#[command(name = "miniopg")]
#[command(about = "Upload files to MinIO and share them as links")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the MinioPG config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Show debug logs on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the Typora upload bridge until interrupted
    Serve {
        /// Address to listen on (defaults to MINIOPG_BRIDGE_ADDR or 127.0.0.1:36677)
        #[arg(long, value_name = "ADDR")]
        bind: Option<SocketAddr>,
    },
    /// Upload local files (or http(s) image URLs) and print their links
    Upload {
        /// Files or image URLs to upload
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<String>,
        /// Print formatted links instead of bare URLs
        #[arg(long, value_enum)]
        format: Option<FormatArg>,
        /// Bucket directory to upload into (defaults to the configured one)
        #[arg(long, value_name = "DIR")]
        dir: Option<String>,
        /// Object naming rule (defaults to the configured one)
        #[arg(long, value_enum)]
        naming: Option<NamingArg>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Download an image from a URL and upload it
    Fetch {
        /// Image URL
        url: String,
        /// Print a formatted link instead of the bare URL
        #[arg(long, value_enum)]
        format: Option<FormatArg>,
        /// Bucket directory to upload into (defaults to the configured one)
        #[arg(long, value_name = "DIR")]
        dir: Option<String>,
    },
    /// List a bucket folder
    #[command(alias = "list")]
    Ls {
        /// Folder to list (bucket root when omitted)
        #[arg(default_value = "")]
        prefix: String,
        /// Show every entry type (defaults to images only)
        #[arg(short, long)]
        all: bool,
        /// Show folders
        #[arg(long)]
        folders: bool,
        /// Show images
        #[arg(long)]
        images: bool,
        /// Show text files
        #[arg(long)]
        text: bool,
        /// Show documents
        #[arg(long)]
        documents: bool,
        /// Show archives
        #[arg(long)]
        archives: bool,
        /// Show everything else
        #[arg(long)]
        others: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a folder
    Mkdir {
        /// Folder name
        name: String,
        /// Parent folder (bucket root when omitted)
        #[arg(long, default_value = "", value_name = "DIR")]
        parent: String,
    },
    /// Delete files or folders
    Rm {
        /// Object keys, or folder paths ending in `/`
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<String>,
    },
    /// Rename a file or folder within its parent folder
    Mv {
        /// Object key or folder path
        path: String,
        /// New name (no slashes)
        new_name: String,
    },
    /// Download files into a local directory
    Download {
        /// Object keys to download
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<String>,
        /// Local target directory
        #[arg(short, long, default_value = ".", value_name = "DIR")]
        dir: PathBuf,
    },
    /// Check the connection and list buckets
    Buckets,
    /// Manage the MinioPG config file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the current config with the secret key hidden
    Show,
    /// Update config values; omitted flags keep their current value
    Set(ConfigSetArgs),
    /// Delete the config file
    Clear,
    /// Print the config file location
    Path,
}

#[derive(Debug, Default, clap::Args)]
pub struct ConfigSetArgs {
    /// MinIO host, optionally with http:// or https://
    #[arg(long, value_name = "HOST")]
    pub endpoint: Option<String>,
    /// MinIO port
    #[arg(long)]
    pub port: Option<u16>,
    /// Connect over TLS
    #[arg(long, value_name = "BOOL")]
    pub use_ssl: Option<bool>,
    /// Access key
    #[arg(long, value_name = "KEY")]
    pub access_key: Option<String>,
    /// Secret key
    #[arg(long, value_name = "KEY")]
    pub secret_key: Option<String>,
    /// Bucket name
    #[arg(long)]
    pub bucket: Option<String>,
    /// Public base URL used for links (empty to unset)
    #[arg(long, value_name = "URL")]
    pub domain: Option<String>,
    /// Key prefix for bridge uploads (empty to unset)
    #[arg(long, value_name = "PREFIX")]
    pub upload_path: Option<String>,
    /// Default link format
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,
    /// Template for the custom link format ($fileName and $url)
    #[arg(long, value_name = "TEMPLATE")]
    pub custom_template: Option<String>,
    /// Default naming rule for CLI uploads
    #[arg(long, value_enum)]
    pub naming: Option<NamingArg>,
    /// Default bucket directory for CLI uploads (empty to unset)
    #[arg(long, value_name = "DIR")]
    pub directory: Option<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum FormatArg {
    Markdown,
    Html,
    Url,
    Ubb,
    Custom,
}

impl From<FormatArg> for LinkFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Markdown => Self::Markdown,
            FormatArg::Html => Self::Html,
            FormatArg::Url => Self::Url,
            FormatArg::Ubb => Self::Ubb,
            FormatArg::Custom => Self::Custom,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum NamingArg {
    /// `{millis}-{filename}`
    Timestamp,
    /// Keep the filename, appending `-copy` when taken
    Original,
}

impl From<NamingArg> for NamingRule {
    fn from(value: NamingArg) -> Self {
        match value {
            NamingArg::Timestamp => Self::TimestampPrefix,
            NamingArg::Original => Self::Original,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
