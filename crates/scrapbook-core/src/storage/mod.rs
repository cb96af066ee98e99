mod memory;
mod settings;
pub mod vault;

pub use memory::MemoryVault;
pub use settings::{MemorySettingsStore, Settings, SettingsStore, TomlSettingsStore};
pub use vault::{AttachmentStore, DocumentStore, FsVault};

use std::path::PathBuf;

use crate::error::{ConfigError, Result};

/// Returns the settings directory.
///
/// `SCRAPBOOK_HOME` overrides the location; otherwise
/// `~/.config/scrapbook[-dev]/` based on `SCRAPBOOK_ENV`.
///
/// Set SCRAPBOOK_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("SCRAPBOOK_HOME") {
        Some(home) => PathBuf::from(home),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("SCRAPBOOK_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("scrapbook-dev")
            } else {
                base_dir.join("scrapbook")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
