use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use validator::Validate;

/// Configuration store related errors
#[derive(Debug, Error)]
pub enum ConfigStoreError {
    #[error("Configuration file read failed for {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parsing failed for {path}: {source}")]
    YamlParsingFailed {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Configuration validation failed for {path}: {source}")]
    ValidationFailed {
        path: PathBuf,
        #[source]
        source: validator::ValidationErrors,
    },
}

fn default_jobs() -> usize {
    num_cpus::get().clamp(1, 256)
}

fn default_git_executable() -> String {
    "git".to_string()
}

fn default_history_read_retries() -> u32 {
    3
}

/// Per-workspace settings read from `.wsync_root/config.yaml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceConfig {
    /// Maximum number of concurrent VCS operations
    #[serde(default = "default_jobs")]
    #[validate(range(min = 1, max = 256))]
    pub jobs: usize,

    /// Git executable used for mutating operations
    #[serde(default = "default_git_executable")]
    #[validate(length(min = 1))]
    pub git_executable: String,

    /// How many times readers retry when the history index rotates mid-read
    #[serde(default = "default_history_read_retries")]
    #[validate(range(min = 1, max = 32))]
    pub history_read_retries: u32,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            git_executable: default_git_executable(),
            history_read_retries: default_history_read_retries(),
        }
    }
}

impl WorkspaceConfig {
    /// Override the job count
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }
}

/// Configuration store
#[derive(Debug, Clone, Default)]
pub struct ConfigStore;

impl ConfigStore {
    /// Create a new configuration store
    pub fn new() -> Self {
        Self
    }

    /// Read workspace configuration; a missing file yields the defaults
    pub fn read_workspace_config<P: AsRef<Path>>(
        &self,
        config_path: P,
    ) -> Result<WorkspaceConfig, ConfigStoreError> {
        let config_path = config_path.as_ref();

        let contents = match std::fs::read_to_string(config_path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(WorkspaceConfig::default())
            }
            Err(source) => {
                return Err(ConfigStoreError::ReadFailed {
                    path: config_path.to_path_buf(),
                    source,
                })
            }
        };

        if contents.trim().is_empty() {
            return Ok(WorkspaceConfig::default());
        }

        let config: WorkspaceConfig =
            serde_yaml::from_str(&contents).map_err(|source| ConfigStoreError::YamlParsingFailed {
                path: config_path.to_path_buf(),
                source,
            })?;

        config
            .validate()
            .map_err(|source| ConfigStoreError::ValidationFailed {
                path: config_path.to_path_buf(),
                source,
            })?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = ConfigStore::new()
            .read_workspace_config(temp_dir.path().join("config.yaml"))
            .unwrap();
        assert_eq!(config, WorkspaceConfig::default());
        assert!(config.jobs >= 1);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        std::fs::write(&path, "jobs: 4\n").unwrap();

        let config = ConfigStore::new().read_workspace_config(&path).unwrap();
        assert_eq!(config.jobs, 4);
        assert_eq!(config.git_executable, "git");
        assert_eq!(config.history_read_retries, 3);
    }

    #[test]
    fn test_out_of_range_jobs_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        std::fs::write(&path, "jobs: 0\n").unwrap();

        assert!(matches!(
            ConfigStore::new().read_workspace_config(&path),
            Err(ConfigStoreError::ValidationFailed { .. })
        ));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        std::fs::write(&path, "parallel: 3\n").unwrap();

        assert!(matches!(
            ConfigStore::new().read_workspace_config(&path),
            Err(ConfigStoreError::YamlParsingFailed { .. })
        ));
    }
}
