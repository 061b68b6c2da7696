use super::atomic::write_atomic;
use crate::domain::entities::manifest::{Manifest, ManifestError};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs as async_fs;

/// Manifest store related errors
#[derive(Debug, Error)]
pub enum ManifestStoreError {
    #[error("Manifest file not found at path: {0}")]
    ManifestFileNotFound(PathBuf),

    #[error("Manifest file read failed for {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Manifest file write failed for {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// Manifest store for reading and writing manifest documents
#[derive(Debug, Clone, Default)]
pub struct ManifestStore;

impl ManifestStore {
    /// Create a new manifest store
    pub fn new() -> Self {
        Self
    }

    /// Read and parse a manifest from a YAML file
    pub async fn read_manifest<P: AsRef<Path>>(
        &self,
        manifest_path: P,
    ) -> Result<Manifest, ManifestStoreError> {
        let manifest_path = manifest_path.as_ref();
        let content = self.read_content(manifest_path).await?;
        Ok(Manifest::parse(&content, manifest_path)?)
    }

    /// Read a manifest, treating a missing file as `None`
    pub async fn read_manifest_if_exists<P: AsRef<Path>>(
        &self,
        manifest_path: P,
    ) -> Result<Option<Manifest>, ManifestStoreError> {
        match self.read_manifest(manifest_path).await {
            Ok(manifest) => Ok(Some(manifest)),
            Err(ManifestStoreError::ManifestFileNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Read the raw content of a manifest file
    pub async fn read_content(&self, manifest_path: &Path) -> Result<String, ManifestStoreError> {
        match async_fs::read_to_string(manifest_path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
                ManifestStoreError::ManifestFileNotFound(manifest_path.to_path_buf()),
            ),
            Err(source) => Err(ManifestStoreError::ReadFailed {
                path: manifest_path.to_path_buf(),
                source,
            }),
        }
    }

    /// Write a manifest to a YAML file
    pub async fn write_manifest<P: AsRef<Path>>(
        &self,
        manifest_path: P,
        manifest: &Manifest,
    ) -> Result<(), ManifestStoreError> {
        let manifest_path = manifest_path.as_ref();
        manifest.validate(manifest_path)?;
        let yaml_content = manifest.to_yaml()?;

        write_atomic(manifest_path, yaml_content.as_bytes()).map_err(|source| {
            ManifestStoreError::WriteFailed {
                path: manifest_path.to_path_buf(),
                source,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::manifest::{Import, Project, RemoteImport};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_and_read_manifest() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".wsync_manifest");
        let store = ManifestStore::new();

        let manifest = Manifest::new()
            .with_import(Import::Remote(RemoteImport::new(
                "manifest",
                "default",
                "https://example.com/manifest.git",
            )))
            .with_project(Project::new("tools", "tools", "https://example.com/tools.git"));

        store.write_manifest(&path, &manifest).await.unwrap();
        let loaded = store.read_manifest(&path).await.unwrap();

        assert_eq!(loaded, manifest);
    }

    #[tokio::test]
    async fn test_read_nonexistent_manifest() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing");
        let store = ManifestStore::new();

        assert!(matches!(
            store.read_manifest(&path).await,
            Err(ManifestStoreError::ManifestFileNotFound(_))
        ));
        assert!(store.read_manifest_if_exists(&path).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_manifest_is_not_written() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("m");
        let manifest = Manifest::new().with_project(Project::new("a", "/abs", "r"));

        assert!(ManifestStore::new().write_manifest(&path, &manifest).await.is_err());
        assert!(!path.exists());
    }
}
