use super::vcs_interface::{CloneOptions, VcsError, VcsOperations};
use async_trait::async_trait;
use git2::{Repository, StatusOptions};
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Git implementation of VCS operations
///
/// Mutations go through the git executable so that user configuration
/// (credential helpers, proxies, hooks) applies. Read-only inspection uses libgit2.
pub struct GitVcs {
    git_executable: String,
    search_path: Option<OsString>,
}

impl Default for GitVcs {
    fn default() -> Self {
        Self {
            git_executable: "git".to_string(),
            search_path: None,
        }
    }
}

impl GitVcs {
    /// Create a new Git VCS instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom git executable
    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.git_executable = executable.into();
        self
    }

    /// Override PATH for spawned git processes
    pub fn with_search_path(mut self, search_path: Option<OsString>) -> Self {
        self.search_path = search_path;
        self
    }

    /// Execute a git command in the given directory
    async fn execute_git_command(
        &self,
        args: &[&str],
        working_dir: Option<&Path>,
    ) -> Result<std::process::Output, VcsError> {
        let mut cmd = Command::new(&self.git_executable);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("GIT_TERMINAL_PROMPT", "0");

        if let Some(path) = &self.search_path {
            cmd.env("PATH", path);
        }

        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        debug!(
            "Running {} {} in {}",
            self.git_executable,
            args.join(" "),
            working_dir.map(|d| d.display().to_string()).unwrap_or_default()
        );

        let output = cmd.output().await?;
        Ok(output)
    }

    /// Execute a git command and check for success
    async fn execute_git_command_checked(
        &self,
        args: &[&str],
        working_dir: Option<&Path>,
    ) -> Result<String, VcsError> {
        let output = self.execute_git_command(args, working_dir).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let command = format!("{} {}", self.git_executable, args.join(" "));
            return Err(VcsError::command_failed(
                command,
                output.status.code().unwrap_or(-1),
                stderr.trim(),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn open(&self, repo_path: &Path) -> Result<Repository, VcsError> {
        if !self.is_repository(repo_path) {
            return Err(VcsError::RepositoryNotFound {
                path: repo_path.to_path_buf(),
            });
        }
        Repository::open(repo_path).map_err(|source| VcsError::Inspect {
            path: repo_path.to_path_buf(),
            source,
        })
    }
}

#[async_trait]
impl VcsOperations for GitVcs {
    async fn clone_repository(
        &self,
        remote: &str,
        dest_path: &Path,
        options: &CloneOptions,
    ) -> Result<(), VcsError> {
        if let Some(parent) = dest_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let dest = dest_path.to_str().ok_or_else(|| VcsError::InvalidPath {
            path: dest_path.to_path_buf(),
        })?;

        let mut args = vec!["clone"];
        if let Some(branch) = &options.branch {
            args.push("--branch");
            args.push(branch);
        }
        args.push(remote);
        args.push(dest);

        self.execute_git_command_checked(&args, None).await?;
        Ok(())
    }

    async fn fetch(&self, repo_path: &Path) -> Result<(), VcsError> {
        self.execute_git_command_checked(&["fetch", "--tags", "origin"], Some(repo_path))
            .await?;
        Ok(())
    }

    async fn set_remote_url(&self, repo_path: &Path, remote: &str) -> Result<(), VcsError> {
        self.execute_git_command_checked(&["remote", "set-url", "origin", remote], Some(repo_path))
            .await?;
        Ok(())
    }

    async fn checkout(&self, repo_path: &Path, revision: &str) -> Result<(), VcsError> {
        self.execute_git_command_checked(&["checkout", "--detach", revision], Some(repo_path))
            .await?;
        Ok(())
    }

    async fn switch_branch(&self, repo_path: &Path, branch: &str) -> Result<(), VcsError> {
        self.execute_git_command_checked(&["checkout", branch], Some(repo_path))
            .await?;
        Ok(())
    }

    async fn fast_forward(&self, repo_path: &Path, branch: &str) -> Result<(), VcsError> {
        let upstream = format!("origin/{}", branch);
        self.execute_git_command_checked(&["merge", "--ff-only", &upstream], Some(repo_path))
            .await?;
        Ok(())
    }

    async fn current_revision(&self, repo_path: &Path) -> Result<String, VcsError> {
        let repo = self.open(repo_path)?;
        let commit = repo
            .head()
            .and_then(|head| head.peel_to_commit())
            .map_err(|source| VcsError::Inspect {
                path: repo_path.to_path_buf(),
                source,
            })?;
        Ok(commit.id().to_string())
    }

    async fn current_branch(&self, repo_path: &Path) -> Result<Option<String>, VcsError> {
        let repo = self.open(repo_path)?;
        let head = repo.head().map_err(|source| VcsError::Inspect {
            path: repo_path.to_path_buf(),
            source,
        })?;

        if head.is_branch() {
            Ok(head.shorthand().map(str::to_string))
        } else {
            Ok(None)
        }
    }

    async fn remote_url(&self, repo_path: &Path) -> Result<Option<String>, VcsError> {
        let repo = self.open(repo_path)?;
        let url = match repo.find_remote("origin") {
            Ok(remote) => remote.url().map(str::to_string),
            Err(e) if e.code() == git2::ErrorCode::NotFound => None,
            Err(source) => {
                return Err(VcsError::Inspect {
                    path: repo_path.to_path_buf(),
                    source,
                })
            }
        };
        Ok(url)
    }

    async fn has_changes(&self, repo_path: &Path) -> Result<bool, VcsError> {
        let repo = self.open(repo_path)?;
        let mut options = StatusOptions::new();
        options
            .include_untracked(true)
            .include_ignored(false)
            .exclude_submodules(true);

        let statuses = repo
            .statuses(Some(&mut options))
            .map_err(|source| VcsError::Inspect {
                path: repo_path.to_path_buf(),
                source,
            })?;
        Ok(!statuses.is_empty())
    }

    fn is_repository(&self, path: &Path) -> bool {
        path.join(".git").exists()
    }
}
