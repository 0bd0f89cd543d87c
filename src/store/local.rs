//! Local-folder object store.
//!
//! Writes are atomic (temp file + rename) so a reader never sees a partially
//! written artifact. Every write gets its own dot-prefixed temp file, so
//! concurrent writers of one name end with the last rename winning. Temp
//! files are never listed.

use super::{persistence_err, validate_name, Folder, ObjectStore};
use crate::config::StorageLayout;
use crate::error::AnalysisError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// [`ObjectStore`] over the directories of a [`StorageLayout`].
#[derive(Debug, Clone)]
pub struct LocalStore {
    layout: StorageLayout,
}

impl LocalStore {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// On-disk path of `(folder, name)`.
    pub fn path(&self, folder: Folder, name: &str) -> Result<PathBuf, AnalysisError> {
        Ok(self.layout.dir(folder).join(validate_name(name)?))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn put(
        &self,
        folder: Folder,
        name: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), AnalysisError> {
        let path = self.path(folder, name)?;
        let dir = self.layout.dir(folder);
        let err = |e: std::io::Error| persistence_err("local", folder, name, e);

        tokio::fs::create_dir_all(&dir).await.map_err(err)?;
        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp_path = dir.join(format!(".{name}.{}.{seq}.tmp", std::process::id()));
        let written = match tokio::fs::write(&tmp_path, &bytes).await {
            Ok(()) => tokio::fs::rename(&tmp_path, &path).await,
            Err(e) => Err(e),
        };
        if written.is_err() {
            let _ = tokio::fs::remove_file(&tmp_path).await;
        }
        written.map_err(err)
    }

    async fn get(&self, folder: Folder, name: &str) -> Result<Option<Vec<u8>>, AnalysisError> {
        let path = self.path(folder, name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(persistence_err("local", folder, name, e)),
        }
    }

    async fn exists(&self, folder: Folder, name: &str) -> Result<bool, AnalysisError> {
        let path = self.path(folder, name)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| persistence_err("local", folder, name, e))
    }

    async fn delete(&self, folder: Folder, name: &str) -> Result<bool, AnalysisError> {
        let path = self.path(folder, name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(persistence_err("local", folder, name, e)),
        }
    }

    async fn list(&self, folder: Folder) -> Result<Vec<String>, AnalysisError> {
        let dir = self.layout.dir(folder);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(persistence_err("local", folder, "", e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| persistence_err("local", folder, "", e))?
        {
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_file && !name.starts_with('.') {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}
