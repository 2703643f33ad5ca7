use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use crag_core::EntityKind;

#[derive(Parser)]
#[command(name = "crag")]
#[command(about = "Browse and sync the climbing catalog from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding the local catalog and downloaded files
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// CLI profile name
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Synchronize the local catalog with the server
    Sync {
        /// Run even when bookkeeping says the catalog is current
        #[arg(long)]
        force: bool,
        /// Retry transient failures this many times with backoff
        #[arg(long, default_value = "0", value_name = "N")]
        retries: u32,
    },
    /// List catalog records
    #[command(alias = "ls")]
    List {
        /// Record kind
        #[arg(value_enum)]
        kind: KindArg,
        /// Only records whose parent has this id
        #[arg(long, value_name = "ID")]
        parent: Option<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a record and its children, locally and on the next sync remotely
    #[command(alias = "rm")]
    Delete {
        #[arg(value_enum)]
        kind: KindArg,
        id: i64,
    },
    /// Manage local bookmarks
    Favorite {
        #[command(subcommand)]
        command: FavoriteCommands,
    },
    /// Fetch or evict catalog files (images, KMZ, GPX)
    File {
        #[command(subcommand)]
        command: FileCommands,
    },
    /// Configure CLI profiles
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

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum KindArg {
    Area,
    Zone,
    Sector,
    Path,
    Block,
}

impl From<KindArg> for EntityKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Area => Self::Area,
            KindArg::Zone => Self::Zone,
            KindArg::Sector => Self::Sector,
            KindArg::Path => Self::Path,
            KindArg::Block => Self::Blocking,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum FavoriteCommands {
    /// Bookmark a record
    Add {
        #[arg(value_enum)]
        kind: KindArg,
        id: i64,
    },
    /// Remove a bookmark
    Remove {
        #[arg(value_enum)]
        kind: KindArg,
        id: i64,
    },
    /// List bookmarked records
    List {
        /// Only this kind
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum FileCommands {
    /// Download a file if it changed and print its local path
    Fetch {
        /// File uuid
        id: String,
        /// Requested image width in pixels
        #[arg(long, value_name = "PX")]
        width: Option<u32>,
        /// Keep the file out of the evictable cache
        #[arg(long)]
        permanent: bool,
    },
    /// Refresh every file referenced by the local catalog
    RefreshAll {
        /// Requested image width in pixels
        #[arg(long, value_name = "PX")]
        width: Option<u32>,
    },
    /// Drop the cached copy of a file
    Evict {
        /// File uuid
        id: String,
        /// Also delete the permanent copy
        #[arg(long)]
        permanent: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update a profile
    Init {
        /// Catalog API base URL
        #[arg(long, value_name = "URL")]
        api_url: String,
        /// API key used to push local edits
        #[arg(long, value_name = "KEY")]
        api_key: Option<String>,
        /// Data directory for this profile
        #[arg(long, value_name = "PATH")]
        data_dir: Option<PathBuf>,
        /// Default image width in pixels
        #[arg(long, value_name = "PX")]
        image_width: Option<u32>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Show the resolved configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
