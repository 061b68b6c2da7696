use fd_lock::{RwLock, RwLockWriteGuard};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Workspace lock errors
#[derive(Debug, Error)]
#[error("Failed to lock {path}: {source}")]
pub struct LockError {
    path: PathBuf,
    #[source]
    source: std::io::Error,
}

/// Process-level exclusive lock on a file under the metadata directory
///
/// Used to serialize writers of the update history, the root manifest and
/// the profile manifest across concurrent invocations.
pub struct WorkspaceLock {
    path: PathBuf,
    lock: RwLock<File>,
}

impl WorkspaceLock {
    /// Open (creating if needed) the lock file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LockError> {
        let path = path.as_ref().to_path_buf();
        let error = |source| LockError {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(error)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(error)?;

        Ok(Self {
            lock: RwLock::new(file),
            path,
        })
    }

    /// Acquire the lock, waiting for other holders to release it
    pub fn acquire(&mut self) -> Result<RwLockWriteGuard<'_, File>, LockError> {
        let contended = match self.lock.try_write() {
            Ok(_) => false,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => true,
            Err(source) => {
                return Err(LockError {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if contended {
            info!("Waiting for another wsync process to release {}", self.path.display());
        }

        let path = self.path.clone();
        self.lock
            .write()
            .map_err(|source| LockError { path, source })
    }

    /// Acquire the lock only if nobody else holds it
    pub fn try_acquire(&mut self) -> Result<Option<RwLockWriteGuard<'_, File>>, LockError> {
        match self.lock.try_write() {
            Ok(guard) => Ok(Some(guard)),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(source) => Err(LockError {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_excludes_second_holder() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("meta").join("update.lock");

        let mut first = WorkspaceLock::open(&path).unwrap();
        let mut second = WorkspaceLock::open(&path).unwrap();

        let guard = first.acquire().unwrap();
        assert!(second.try_acquire().unwrap().is_none());
        drop(guard);
        assert!(second.try_acquire().unwrap().is_some());
    }
}
