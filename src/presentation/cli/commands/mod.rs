pub mod history;
pub mod import;
pub mod profile;
pub mod resolve;
pub mod update;

pub use history::*;
pub use import::*;
pub use profile::*;
pub use resolve::*;
pub use update::*;

use clap::ValueEnum;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::common::error::WsyncError;
use crate::domain::entities::workspace::Workspace;
use crate::infrastructure::filesystem::{ConfigStore, WorkspaceConfig};
use crate::infrastructure::vcs::{GitVcs, VcsOperations};

/// Output format of documents printed by commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Yaml,
    Json,
}

impl OutputFormat {
    /// Render a serializable document
    pub fn render<T: Serialize>(self, value: &T) -> Result<String, WsyncError> {
        match self {
            Self::Yaml => serde_yaml::to_string(value)
                .map_err(|e| WsyncError::Serialization(e.to_string())),
            Self::Json => serde_json::to_string_pretty(value)
                .map(|json| json + "\n")
                .map_err(|e| WsyncError::Serialization(e.to_string())),
        }
    }
}

/// Workspace and settings shared by every command
pub struct CommandContext {
    pub workspace: Workspace,
    pub config: WorkspaceConfig,
}

impl CommandContext {
    /// Locate the workspace from the environment and read its configuration
    pub fn load(jobs: Option<usize>) -> Result<Self, WsyncError> {
        let workspace = Workspace::from_env()?;
        let mut config = ConfigStore::new().read_workspace_config(workspace.config_path())?;
        if let Some(jobs) = jobs {
            config = config.with_jobs(jobs.max(1));
        }
        debug!(
            "Workspace {} (jobs: {})",
            workspace.root_path.display(),
            config.jobs
        );
        Ok(Self { workspace, config })
    }

    /// Git driver configured for this workspace
    pub fn vcs(&self) -> Arc<dyn VcsOperations> {
        let search_path = self
            .workspace
            .search_path(std::env::var_os("PATH").as_deref());
        Arc::new(
            GitVcs::new()
                .with_executable(self.config.git_executable.clone())
                .with_search_path(search_path),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Doc {
        name: &'static str,
    }

    #[test]
    fn test_render_formats() {
        let doc = Doc { name: "a" };
        assert_eq!(OutputFormat::Yaml.render(&doc).unwrap(), "name: a\n");
        assert_eq!(
            OutputFormat::Json.render(&doc).unwrap(),
            "{\n  \"name\": \"a\"\n}\n"
        );
    }
}
