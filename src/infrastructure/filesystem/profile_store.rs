use super::atomic::write_atomic;
use crate::domain::entities::profile::ProfileManifest;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Profile manifest store errors
#[derive(Debug, Error)]
pub enum ProfileStoreError {
    #[error("Profile manifest IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse profile manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to serialize profile manifest: {0}")]
    Serialize(#[source] serde_yaml::Error),
}

/// Reads and writes the profile manifest
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    /// Create a store for the manifest at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the profile manifest
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the profile manifest; a missing file is an empty manifest
    pub fn load(&self) -> Result<ProfileManifest, ProfileStoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ProfileManifest::default())
            }
            Err(source) => {
                return Err(ProfileStoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(ProfileManifest::default());
        }

        serde_yaml::from_str(&content).map_err(|source| ProfileStoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Raw YAML of the persisted manifest
    pub fn load_raw(&self) -> Result<String, ProfileStoreError> {
        let manifest = self.load()?;
        serde_yaml::to_string(&manifest).map_err(ProfileStoreError::Serialize)
    }

    /// Persist the profile manifest
    pub fn save(&self, manifest: &ProfileManifest) -> Result<(), ProfileStoreError> {
        let content = serde_yaml::to_string(manifest).map_err(ProfileStoreError::Serialize)?;
        write_atomic(&self.path, content.as_bytes()).map_err(|source| ProfileStoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}
