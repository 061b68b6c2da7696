use crate::domain::entities::manifest::Project;
use crate::infrastructure::vcs::{CloneOptions, VcsError, VcsOperations};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Errors raised while obtaining manifest documents
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Manifest not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to check out manifest provider '{name}': {source}")]
    Provider {
        name: String,
        #[source]
        source: VcsError,
    },

    #[error("Manifest provider '{name}' path {path} exists and is not a repository")]
    NotARepository { name: String, path: PathBuf },
}

impl SourceError {
    /// Exit status of a failing VCS subprocess, if any
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Provider { source, .. } => source.exit_code(),
            _ => None,
        }
    }
}

/// Where the resolver gets manifest documents from
///
/// Fetching (making a provider checkout available) and reading are separate
/// steps so resolution can run against in-memory documents.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// Make the provider checkout available and return its directory
    async fn ensure_provider(&self, provider: &Project, refresh: bool)
        -> Result<PathBuf, SourceError>;

    /// Read a manifest document
    async fn read(&self, path: &Path) -> Result<String, SourceError>;
}

/// Manifest source backed by checkouts under the workspace root
pub struct WorkspaceManifestSource {
    root: PathBuf,
    vcs: Arc<dyn VcsOperations>,
}

impl WorkspaceManifestSource {
    /// Create a source rooted at the workspace root
    pub fn new(root: impl Into<PathBuf>, vcs: Arc<dyn VcsOperations>) -> Self {
        Self {
            root: root.into(),
            vcs,
        }
    }

    async fn refresh_checkout(&self, provider: &Project, dir: &Path) -> Result<(), VcsError> {
        self.vcs.fetch(dir).await?;
        if let Some(revision) = &provider.revision {
            self.vcs.checkout(dir, revision).await?;
        } else if let Some(branch) = &provider.branch {
            self.vcs.switch_branch(dir, branch).await?;
            self.vcs.fast_forward(dir, branch).await?;
        } else if let Some(branch) = self.vcs.current_branch(dir).await? {
            self.vcs.fast_forward(dir, &branch).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ManifestSource for WorkspaceManifestSource {
    async fn ensure_provider(
        &self,
        provider: &Project,
        refresh: bool,
    ) -> Result<PathBuf, SourceError> {
        let dir = provider
            .path
            .split('/')
            .fold(self.root.clone(), |acc, part| acc.join(part));
        let vcs_error = |source| SourceError::Provider {
            name: provider.name.clone(),
            source,
        };

        if self.vcs.is_repository(&dir) {
            if refresh {
                self.refresh_checkout(provider, &dir).await.map_err(vcs_error)?;
            }
            return Ok(dir);
        }

        let occupied = std::fs::read_dir(&dir)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false);
        if occupied {
            return Err(SourceError::NotARepository {
                name: provider.name.clone(),
                path: dir,
            });
        }

        info!("Cloning manifest provider {} into {}", provider.name, dir.display());
        let mut options = CloneOptions::default();
        if let Some(branch) = &provider.branch {
            options = options.with_branch(branch);
        }
        self.vcs
            .clone_repository(&provider.remote, &dir, &options)
            .await
            .map_err(vcs_error)?;
        if let Some(revision) = &provider.revision {
            self.vcs.checkout(&dir, revision).await.map_err(vcs_error)?;
        }

        Ok(dir)
    }

    async fn read(&self, path: &Path) -> Result<String, SourceError> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SourceError::NotFound(path.to_path_buf()))
            }
            Err(source) => Err(SourceError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}
