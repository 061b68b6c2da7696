use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Common interface for version control operations on a single checkout
///
/// Mutating operations run against one checkout at a time; callers must never
/// issue two operations against the same path concurrently.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VcsOperations: Send + Sync {
    /// Clone `remote` into `dest_path`
    async fn clone_repository(
        &self,
        remote: &str,
        dest_path: &Path,
        options: &CloneOptions,
    ) -> Result<(), VcsError>;

    /// Fetch from origin
    async fn fetch(&self, repo_path: &Path) -> Result<(), VcsError>;

    /// Point origin at a new URL
    async fn set_remote_url(&self, repo_path: &Path, remote: &str) -> Result<(), VcsError>;

    /// Check out a revision with a detached HEAD
    async fn checkout(&self, repo_path: &Path, revision: &str) -> Result<(), VcsError>;

    /// Switch to a local branch, creating it from origin if needed
    async fn switch_branch(&self, repo_path: &Path, branch: &str) -> Result<(), VcsError>;

    /// Fast-forward the checked out branch to `origin/<branch>`
    async fn fast_forward(&self, repo_path: &Path, branch: &str) -> Result<(), VcsError>;

    /// Commit id of HEAD
    async fn current_revision(&self, repo_path: &Path) -> Result<String, VcsError>;

    /// Name of the checked out branch, `None` when HEAD is detached
    async fn current_branch(&self, repo_path: &Path) -> Result<Option<String>, VcsError>;

    /// URL of origin, `None` when no origin is configured
    async fn remote_url(&self, repo_path: &Path) -> Result<Option<String>, VcsError>;

    /// Whether the checkout has uncommitted or untracked changes
    async fn has_changes(&self, repo_path: &Path) -> Result<bool, VcsError>;

    /// Check if a directory is a checkout
    fn is_repository(&self, path: &Path) -> bool;
}

/// Options for cloning repositories
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloneOptions {
    /// Branch to check out after cloning
    pub branch: Option<String>,
}

impl CloneOptions {
    /// Clone and check out `branch`
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }
}

/// Errors that can occur during VCS operations
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    #[error("Repository not found at path: {path}")]
    RepositoryNotFound { path: PathBuf },

    #[error("Command execution failed: {command}, exit code: {exit_code}, stderr: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Failed to inspect repository {path}: {source}")]
    Inspect {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    #[error("Invalid path: {path}")]
    InvalidPath { path: PathBuf },

    #[error("IO error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },
}

impl VcsError {
    /// Create a command failed error
    pub fn command_failed(
        command: impl Into<String>,
        exit_code: i32,
        stderr: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            command: command.into(),
            exit_code,
            stderr: stderr.into(),
        }
    }

    /// Exit status of the failing subprocess, if any
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::CommandFailed { exit_code, .. } if *exit_code > 0 => Some(*exit_code),
            _ => None,
        }
    }
}
