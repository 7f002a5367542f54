//! Core sandboxed file store implementation.

use crate::{
    error::{Result, StoreError},
    security::validate_relative_path,
};

use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// File storage rooted at a single base directory.
///
/// All paths are given relative to the base directory and validated before
/// use. The store itself is cheap to clone and holds no open handles.
#[derive(Debug, Clone)]
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Create a new builder for configuring the store.
    #[must_use]
    pub fn builder() -> FileStoreBuilder {
        FileStoreBuilder::new()
    }

    /// The base directory this store is rooted at.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolve a store-relative path to its absolute location, without
    /// touching the filesystem.
    pub fn resolve<P: AsRef<str>>(&self, path: P) -> Result<PathBuf> {
        let relative = validate_relative_path(path.as_ref())?;
        Ok(self.base_dir.join(relative))
    }

    /// Sandboxed version of `std::fs::read`.
    pub async fn read<P: AsRef<str>>(&self, path: P) -> Result<Vec<u8>> {
        let file_path = self.resolve(path)?;
        Ok(fs::read(&file_path).await?)
    }

    /// Sandboxed version of `std::fs::write`. Parent directories are
    /// created as needed.
    pub async fn write<P: AsRef<str>, C: AsRef<[u8]>>(&self, path: P, contents: C) -> Result<()> {
        let file_path = self.resolve(path)?;
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&file_path, contents.as_ref()).await?;
        Ok(())
    }

    /// Write contents so that the destination is only ever observed
    /// complete: the bytes are staged in a temporary file in the same
    /// directory and renamed over the destination.
    ///
    /// Concurrent writers of the same path are safe as long as they write
    /// identical contents; the last rename wins.
    pub async fn write_atomic<P: AsRef<str>>(&self, path: P, contents: &[u8]) -> Result<()> {
        let file_path = self.resolve(path)?;
        let parent = file_path
            .parent()
            .ok_or_else(|| StoreError::PathValidation {
                path: file_path.clone(),
                reason: "path has no parent directory".to_string(),
            })?
            .to_path_buf();
        fs::create_dir_all(&parent).await?;

        let bytes = contents.to_vec();
        let destination = file_path.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut staged = tempfile::Builder::new()
                .prefix(".staged-")
                .tempfile_in(&parent)?;
            staged.write_all(&bytes)?;
            staged.as_file().sync_all()?;
            staged
                .persist(&destination)
                .map_err(|e| StoreError::Io(e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::TaskFailed {
            reason: e.to_string(),
        })??;

        debug!("atomically wrote {}", file_path.display());
        Ok(())
    }

    /// Sandboxed version of `std::fs::metadata`.
    pub async fn metadata<P: AsRef<str>>(&self, path: P) -> Result<std::fs::Metadata> {
        let file_path = self.resolve(path)?;
        Ok(fs::metadata(&file_path).await?)
    }

    /// Whether a file exists at the given store-relative path.
    pub async fn exists<P: AsRef<str>>(&self, path: P) -> Result<bool> {
        let file_path = self.resolve(path)?;
        Ok(fs::try_exists(&file_path).await?)
    }

    /// Sandboxed version of `std::fs::remove_file`.
    pub async fn remove_file<P: AsRef<str>>(&self, path: P) -> Result<()> {
        let file_path = self.resolve(path)?;
        fs::remove_file(&file_path).await?;
        Ok(())
    }

    /// Sandboxed version of `std::fs::create_dir_all`.
    pub async fn create_dir_all<P: AsRef<str>>(&self, path: P) -> Result<()> {
        let dir_path = self.resolve(path)?;
        fs::create_dir_all(&dir_path).await?;
        Ok(())
    }
}

/// Builder for [`FileStore`].
#[derive(Debug, Default)]
pub struct FileStoreBuilder {
    base_dir: Option<PathBuf>,
}

impl FileStoreBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base directory. It is created if it does not exist.
    #[must_use]
    pub fn base_directory<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.base_dir = Some(path.into());
        self
    }

    /// Build the store, creating the base directory if necessary.
    pub async fn build(self) -> Result<FileStore> {
        let base_dir = self.base_dir.ok_or_else(|| StoreError::PathValidation {
            path: PathBuf::new(),
            reason: "base directory is required".to_string(),
        })?;

        fs::create_dir_all(&base_dir)
            .await
            .map_err(|source| StoreError::BaseDirectory {
                path: base_dir.clone(),
                source,
            })?;

        let base_dir = base_dir
            .canonicalize()
            .map_err(|source| StoreError::BaseDirectory {
                path: base_dir.clone(),
                source,
            })?;

        Ok(FileStore { base_dir })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_in_tempdir() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::builder()
            .base_directory(dir.path())
            .build()
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn write_read_round_trip() {
        let (_dir, store) = store_in_tempdir().await;

        store.write("nested/dir/file.bin", b"hello").await.unwrap();
        assert_eq!(store.read("nested/dir/file.bin").await.unwrap(), b"hello");
        assert!(store.exists("nested/dir/file.bin").await.unwrap());
        assert!(!store.exists("nested/dir/missing.bin").await.unwrap());
    }

    #[tokio::test]
    async fn atomic_write_replaces_existing_contents() {
        let (_dir, store) = store_in_tempdir().await;

        store.write_atomic("artifact.jpg", b"first").await.unwrap();
        store.write_atomic("artifact.jpg", b"second").await.unwrap();

        assert_eq!(store.read("artifact.jpg").await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn atomic_write_leaves_no_staging_files() {
        let (dir, store) = store_in_tempdir().await;

        store.write_atomic("out/render.jpg", b"bytes").await.unwrap();

        let staged: Vec<_> = std::fs::read_dir(dir.path().join("out"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".staged-"))
            .collect();
        assert!(staged.is_empty());
    }

    #[tokio::test]
    async fn rejects_paths_outside_the_sandbox() {
        let (_dir, store) = store_in_tempdir().await;

        assert!(store.read("../escape.txt").await.is_err());
        assert!(store.write("/abs/path.txt", b"x").await.is_err());
        assert!(store.remove_file("a/../../b").await.is_err());
    }

    #[tokio::test]
    async fn metadata_reports_length() {
        let (_dir, store) = store_in_tempdir().await;

        store.write("file.bin", b"12345").await.unwrap();
        let meta = store.metadata("file.bin").await.unwrap();
        assert_eq!(meta.len(), 5);
    }
}
