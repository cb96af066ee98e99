use std::path::Path;
use std::sync::Arc;

use scrapbook_core::{DocumentStore, FsVault, QueueStore, SettingsStore, TomlSettingsStore};

pub fn show(vault: &Path) -> anyhow::Result<()> {
    let settings = TomlSettingsStore::default_location()?.load()?;
    let queue = QueueStore::new(Arc::new(FsVault::new(vault)), settings.questions_file);
    let doc = queue.snapshot()?;
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

pub fn files(vault: &Path) -> anyhow::Result<()> {
    for id in FsVault::new(vault).list()? {
        println!("{id}");
    }
    Ok(())
}
