//! Document and attachment stores.
//!
//! A vault is a directory of markdown documents addressed by relative,
//! `/`-separated identifiers such as `questions.md` or `notes/today.md`.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{CoreError, Result, ValidationError};

/// Read/write access to text documents.
pub trait DocumentStore: Send + Sync {
    fn read(&self, id: &str) -> Result<String>;
    /// Replace the document, creating it if needed.
    fn write(&self, id: &str, text: &str) -> Result<()>;
    fn exists(&self, id: &str) -> bool;
    /// Create a new document. Fails if it already exists.
    fn create(&self, id: &str, text: &str) -> Result<()>;
    /// Identifiers of every markdown document, sorted.
    fn list(&self) -> Result<Vec<String>>;
}

/// Binary attachments (embedded images).
pub trait AttachmentStore: Send + Sync {
    fn write_binary(&self, path: &str, bytes: &[u8]) -> Result<()>;
    fn create_folder(&self, path: &str) -> Result<()>;
    fn binary_exists(&self, path: &str) -> bool;
}

/// Reject identifiers that would escape the vault root.
///
/// # Errors
/// Returns [`ValidationError::InvalidPath`] for empty, absolute,
/// backslash-separated or `..`-containing identifiers.
pub fn validate_id(id: &str) -> Result<&str> {
    let invalid = || CoreError::from(ValidationError::InvalidPath(id.to_string()));
    if id.trim().is_empty() || id.contains('\\') || id.contains('\0') {
        return Err(invalid());
    }
    let path = Path::new(id);
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => return Err(invalid()),
        }
    }
    Ok(id)
}

/// Directory-backed vault.
#[derive(Debug, Clone)]
pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, id: &str) -> Result<PathBuf> {
        Ok(self.root.join(validate_id(id)?))
    }

    fn ensure_parent(&self, path: &Path, id: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| CoreError::storage(id, e))?;
        }
        Ok(())
    }

    fn collect(&self, dir: &Path, prefix: &str, out: &mut Vec<String>) -> Result<()> {
        let entries = fs::read_dir(dir).map_err(|e| CoreError::storage(prefix, e))?;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let id = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}/{name}")
            };
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                self.collect(&entry.path(), &id, out)?;
            } else if file_type.is_file() && name.ends_with(".md") {
                out.push(id);
            }
        }
        Ok(())
    }
}

impl DocumentStore for FsVault {
    fn read(&self, id: &str) -> Result<String> {
        let path = self.resolve(id)?;
        fs::read_to_string(path).map_err(|e| CoreError::storage(id, e))
    }

    fn write(&self, id: &str, text: &str) -> Result<()> {
        let path = self.resolve(id)?;
        self.ensure_parent(&path, id)?;
        fs::write(path, text).map_err(|e| CoreError::storage(id, e))
    }

    fn exists(&self, id: &str) -> bool {
        self.resolve(id).map(|p| p.is_file()).unwrap_or(false)
    }

    fn create(&self, id: &str, text: &str) -> Result<()> {
        let path = self.resolve(id)?;
        self.ensure_parent(&path, id)?;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| CoreError::storage(id, e))?;
        std::io::Write::write_all(&mut file, text.as_bytes()).map_err(|e| CoreError::storage(id, e))
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut out = Vec::new();
        if self.root.is_dir() {
            self.collect(&self.root, "", &mut out)?;
        }
        out.sort();
        Ok(out)
    }
}

impl AttachmentStore for FsVault {
    fn write_binary(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let full = self.resolve(path)?;
        self.ensure_parent(&full, path)?;
        fs::write(full, bytes).map_err(|e| CoreError::storage(path, e))
    }

    fn create_folder(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        fs::create_dir_all(full).map_err(|e| CoreError::storage(path, e))
    }

    fn binary_exists(&self, path: &str) -> bool {
        self.resolve(path).map(|p| p.exists()).unwrap_or(false)
    }
}
