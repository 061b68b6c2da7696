use super::atomic::write_atomic;
use crate::domain::entities::project_state::{LocalProject, ProjectMetadata};
use crate::domain::entities::workspace::{METADATA_DIR, PROJECT_METADATA_DIR};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use walkdir::WalkDir;

const METADATA_FILE: &str = "project.yaml";

/// Project metadata store errors
#[derive(Debug, Error)]
pub enum ProjectMetadataError {
    #[error("Project metadata IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse project metadata {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to serialize project metadata: {0}")]
    Serialize(#[source] serde_yaml::Error),

    #[error("Failed to scan workspace {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Reads and writes `<project>/.wsync/project.yaml` and discovers local projects
#[derive(Debug, Clone)]
pub struct ProjectMetadataStore {
    root: PathBuf,
}

impl ProjectMetadataStore {
    /// Create a store for the workspace rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn metadata_path(project_dir: &Path) -> PathBuf {
        project_dir.join(PROJECT_METADATA_DIR).join(METADATA_FILE)
    }

    /// Read the metadata of a checkout, `None` if it has none
    pub fn read(&self, project_dir: &Path) -> Result<Option<ProjectMetadata>, ProjectMetadataError> {
        let path = Self::metadata_path(project_dir);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(ProjectMetadataError::Io { path, source }),
        };

        serde_yaml::from_str(&content)
            .map(Some)
            .map_err(|source| ProjectMetadataError::Parse { path, source })
    }

    /// Write the metadata of a checkout and hide it from git status
    pub fn write(
        &self,
        project_dir: &Path,
        metadata: &ProjectMetadata,
    ) -> Result<(), ProjectMetadataError> {
        let path = Self::metadata_path(project_dir);
        let content = serde_yaml::to_string(metadata).map_err(ProjectMetadataError::Serialize)?;
        write_atomic(&path, content.as_bytes())
            .map_err(|source| ProjectMetadataError::Io { path, source })?;
        self.exclude_from_git(project_dir)
    }

    /// Add `/.wsync/` to `.git/info/exclude` if it is not there yet
    pub fn exclude_from_git(&self, project_dir: &Path) -> Result<(), ProjectMetadataError> {
        let git_dir = project_dir.join(".git");
        if !git_dir.is_dir() {
            return Ok(());
        }

        let exclude = git_dir.join("info").join("exclude");
        let pattern = format!("/{}/", PROJECT_METADATA_DIR);
        let io_error = |source| ProjectMetadataError::Io {
            path: exclude.clone(),
            source,
        };

        let existing = match std::fs::read_to_string(&exclude) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(io_error(e)),
        };
        if existing.lines().any(|line| line.trim() == pattern) {
            return Ok(());
        }

        if let Some(parent) = exclude.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&exclude)
            .map_err(io_error)?;
        let separator = if existing.is_empty() || existing.ends_with('\n') {
            ""
        } else {
            "\n"
        };
        writeln!(file, "{}{}", separator, pattern).map_err(io_error)
    }

    /// Walk the workspace and collect every checkout carrying metadata
    ///
    /// Does not descend into `.git`, the metadata directory, or below a
    /// discovered project.
    pub fn discover(&self) -> Result<Vec<LocalProject>, ProjectMetadataError> {
        let mut projects = Vec::new();
        let mut walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = walker.next() {
            let entry = entry.map_err(|source| ProjectMetadataError::Scan {
                path: self.root.clone(),
                source,
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }

            let name = entry.file_name();
            if name == ".git" || name == METADATA_DIR || name == PROJECT_METADATA_DIR {
                walker.skip_current_dir();
                continue;
            }

            let metadata = match self.read(entry.path()) {
                Ok(Some(metadata)) => metadata,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Ignoring unreadable project metadata: {}", e);
                    continue;
                }
            };

            let relative = pathdiff::diff_paths(entry.path(), &self.root)
                .unwrap_or_else(|| entry.path().to_path_buf());
            let path = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");

            if path.is_empty() {
                warn!("Ignoring project metadata at the workspace root");
                continue;
            }

            projects.push(LocalProject {
                path,
                abs_path: entry.path().to_path_buf(),
                metadata,
            });
            walker.skip_current_dir();
        }

        Ok(projects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::manifest::Project;
    use tempfile::TempDir;

    fn checkout(root: &Path, path: &str) -> PathBuf {
        let dir = root.join(path);
        std::fs::create_dir_all(dir.join(".git").join("info")).unwrap();
        dir
    }

    #[test]
    fn test_write_read_and_exclude() {
        let temp_dir = TempDir::new().unwrap();
        let store = ProjectMetadataStore::new(temp_dir.path());
        let dir = checkout(temp_dir.path(), "tools");

        assert!(store.read(&dir).unwrap().is_none());

        let metadata = ProjectMetadata::new(Project::new("tools", "tools", "R1"), "abc");
        store.write(&dir, &metadata).unwrap();
        store.write(&dir, &metadata).unwrap();

        assert_eq!(store.read(&dir).unwrap(), Some(metadata));
        let exclude = std::fs::read_to_string(dir.join(".git/info/exclude")).unwrap();
        assert_eq!(exclude.matches("/.wsync/").count(), 1);
    }

    #[test]
    fn test_discover_finds_nested_paths() {
        let temp_dir = TempDir::new().unwrap();
        let store = ProjectMetadataStore::new(temp_dir.path());

        for (name, path) in [("a", "a"), ("b", "third_party/b")] {
            let dir = checkout(temp_dir.path(), path);
            store
                .write(&dir, &ProjectMetadata::new(Project::new(name, path, "R"), "abc"))
                .unwrap();
        }
        std::fs::create_dir_all(temp_dir.path().join("plain/dir")).unwrap();

        let found = store.discover().unwrap();
        let paths: Vec<&str> = found.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, vec!["a", "third_party/b"]);
        assert_eq!(found[1].name(), "b");
    }
}
