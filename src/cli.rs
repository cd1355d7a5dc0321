use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "tvtrack",
    version,
    about = "Browse the TVmaze show catalog with a local cache and favorites"
)]
pub struct Cli {
    /// Directory holding the cache database, preferences and log file
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Open the interactive browser (default)
    Tui,
    /// Synchronize the show list
    Sync {
        /// Fetch even when the cached list is still fresh
        #[arg(long)]
        force: bool,
    },
    /// Print the cached show list
    List {
        #[arg(long)]
        favorites: bool,
    },
    /// Search cached shows by name
    Search { query: String },
    /// Print a show's episodes grouped by season
    Episodes {
        /// Catalog id of the show
        show_api_id: i64,
        /// Read the local cache only
        #[arg(long)]
        cached: bool,
    },
    /// Forget every freshness stamp and drop cached episodes
    ClearCache,
}
