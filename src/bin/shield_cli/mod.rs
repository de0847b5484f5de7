//! CLI subcommand implementations for storage-shield

pub mod analyze;
pub mod logging;
pub mod output;
pub mod policy;
pub mod replay;

use std::path::PathBuf;

/// Default policy store location.
pub fn store_home() -> PathBuf {
    std::env::var("STORAGE_SHIELD_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".storage-shield")
        })
}
