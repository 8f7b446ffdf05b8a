use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

/// Send tracing output to a file; the terminal belongs to the UI. Level comes
/// from `RUST_LOG`, default `info`.
pub fn init(log_file: Option<PathBuf>) -> Result<PathBuf> {
    let path = match log_file {
        Some(path) => path,
        None => default_log_path()?,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("Could not initialise logging: {}", e))?;

    Ok(path)
}

fn default_log_path() -> Result<PathBuf> {
    let cache_dir = dirs::cache_dir()
        .ok_or_else(|| anyhow!("Could not determine cache directory"))?;

    Ok(cache_dir.join("grantchat").join("grantchat.log"))
}
