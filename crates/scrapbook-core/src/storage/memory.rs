//! In-memory vault, for tests and embedding.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use super::vault::{validate_id, AttachmentStore, DocumentStore};
use crate::error::{CoreError, Result};

#[derive(Debug, Default)]
struct Contents {
    documents: BTreeMap<String, String>,
    binaries: BTreeMap<String, Vec<u8>>,
    folders: BTreeSet<String>,
    writes: usize,
}

#[derive(Debug, Default)]
pub struct MemoryVault {
    contents: Mutex<Contents>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, id: &str, text: &str) -> Self {
        if let Ok(mut contents) = self.contents.lock() {
            contents.documents.insert(id.to_string(), text.to_string());
        }
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, Contents>> {
        self.contents
            .lock()
            .map_err(|e| CoreError::Custom(format!("vault lock poisoned: {e}")))
    }

    pub fn document(&self, id: &str) -> Option<String> {
        self.lock().ok()?.documents.get(id).cloned()
    }

    pub fn binary(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().ok()?.binaries.get(path).cloned()
    }

    pub fn has_folder(&self, path: &str) -> bool {
        self.lock().map(|c| c.folders.contains(path)).unwrap_or(false)
    }

    /// Number of document writes and creates so far.
    pub fn write_count(&self) -> usize {
        self.lock().map(|c| c.writes).unwrap_or(0)
    }
}

impl DocumentStore for MemoryVault {
    fn read(&self, id: &str) -> Result<String> {
        validate_id(id)?;
        self.lock()?
            .documents
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(id.to_string()))
    }

    fn write(&self, id: &str, text: &str) -> Result<()> {
        validate_id(id)?;
        let mut contents = self.lock()?;
        contents.documents.insert(id.to_string(), text.to_string());
        contents.writes += 1;
        Ok(())
    }

    fn exists(&self, id: &str) -> bool {
        self.lock().map(|c| c.documents.contains_key(id)).unwrap_or(false)
    }

    fn create(&self, id: &str, text: &str) -> Result<()> {
        validate_id(id)?;
        let mut contents = self.lock()?;
        if contents.documents.contains_key(id) {
            return Err(CoreError::storage(
                id,
                std::io::Error::new(std::io::ErrorKind::AlreadyExists, "document exists"),
            ));
        }
        contents.documents.insert(id.to_string(), text.to_string());
        contents.writes += 1;
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(self
            .lock()?
            .documents
            .keys()
            .filter(|id| id.ends_with(".md"))
            .cloned()
            .collect())
    }
}

impl AttachmentStore for MemoryVault {
    fn write_binary(&self, path: &str, bytes: &[u8]) -> Result<()> {
        validate_id(path)?;
        self.lock()?.binaries.insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn create_folder(&self, path: &str) -> Result<()> {
        validate_id(path)?;
        self.lock()?.folders.insert(path.to_string());
        Ok(())
    }

    fn binary_exists(&self, path: &str) -> bool {
        self.lock()
            .map(|c| c.binaries.contains_key(path) || c.folders.contains(path))
            .unwrap_or(false)
    }
}
