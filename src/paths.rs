use std::path::PathBuf;

use anyhow::{Context, Result};

const APP_DIR: &str = "tvtrack";

pub fn default_data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().context("unable to resolve data directory")?;
    Ok(base.join(APP_DIR))
}

pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join(APP_DIR).join("config.json"))
}

pub fn database_file_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("tvtrack.db")
}

pub fn preferences_file_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("prefs.json")
}

pub fn log_file_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("tvtrack.log")
}
