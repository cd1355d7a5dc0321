mod app;
mod catalog;
mod cli;
mod config;
mod db;
mod model;
mod paths;
mod prefs;
mod screen;
mod sync;

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    let data_dir = match cli.data_dir.clone() {
        Some(dir) => dir,
        None => paths::default_data_dir()?,
    };
    init_logging(&data_dir)?;
    app::run(cli, &data_dir)
}

/// Logs go to a file so the TUI keeps the terminal to itself.
fn init_logging(data_dir: &Path) -> Result<()> {
    fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;
    let log_path = paths::log_file_path(data_dir);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init();
    Ok(())
}
