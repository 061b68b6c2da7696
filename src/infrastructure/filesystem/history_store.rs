use super::atomic::write_atomic;
use crate::domain::entities::history::{HistoryEntry, HistoryIndex, HISTORY_ID_FORMAT};
use crate::domain::entities::universe::Universe;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

const INDEX_FILE: &str = "index.yaml";

/// Update history related errors
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("History IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse history file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to serialize history entry: {0}")]
    Serialize(#[source] serde_yaml::Error),

    #[error("No {0} update history entry")]
    NotFound(&'static str),

    #[error("Update history changed during {attempts} read attempts")]
    Unstable { attempts: u32 },
}

impl HistoryError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Which pointer to resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryPointer {
    /// 最新のエントリ
    Latest,
    /// 1つ前のエントリ
    SecondLatest,
}

impl HistoryPointer {
    fn name(self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::SecondLatest => "second-latest",
        }
    }

    fn select(self, index: &HistoryIndex) -> Option<&String> {
        match self {
            Self::Latest => index.latest.as_ref(),
            Self::SecondLatest => index.second_latest.as_ref(),
        }
    }
}

/// 更新履歴のストア
///
/// エントリは作成後に変更されない。`latest`/`second-latest`の2ポインタは
/// 小さなインデックスファイルで表し、一時ファイル経由のリネームで更新する。
/// 書き込みは呼び出し側がupdateロックを保持している前提。
#[derive(Debug, Clone)]
pub struct HistoryStore {
    dir: PathBuf,
    read_retries: u32,
}

impl HistoryStore {
    /// 新しいHistoryStoreインスタンスを作成
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            read_retries: 3,
        }
    }

    /// 読み取りの再試行回数を設定
    pub fn with_read_retries(mut self, retries: u32) -> Self {
        self.read_retries = retries.max(1);
        self
    }

    /// 履歴ディレクトリ
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    fn entry_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.yaml", id))
    }

    /// 成功した同期の結果を記録し、ポインタを回転させる
    pub fn record(&self, universe: &Universe) -> Result<HistoryEntry, HistoryError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| HistoryError::io(&self.dir, e))?;

        let index = self.read_index()?;
        let mut timestamp = Utc::now();
        if let Some(previous) = index.latest.as_deref().and_then(parse_entry_id) {
            if timestamp <= previous {
                timestamp = previous + Duration::nanoseconds(1);
            }
        }

        let entry = loop {
            let entry = HistoryEntry::new(timestamp, universe.clone());
            match self.create_entry(&entry) {
                Ok(()) => break entry,
                Err(HistoryError::Io { source, .. })
                    if source.kind() == std::io::ErrorKind::AlreadyExists =>
                {
                    timestamp = timestamp + Duration::nanoseconds(1);
                }
                Err(e) => return Err(e),
            }
        };

        let rotated = index.rotate(entry.id.clone());
        let content = serde_yaml::to_string(&rotated).map_err(HistoryError::Serialize)?;
        let index_path = self.index_path();
        write_atomic(&index_path, content.as_bytes())
            .map_err(|e| HistoryError::io(&index_path, e))?;

        info!("Recorded update history entry {}", entry.id);
        Ok(entry)
    }

    fn create_entry(&self, entry: &HistoryEntry) -> Result<(), HistoryError> {
        let path = self.entry_path(&entry.id);
        let content = serde_yaml::to_string(entry).map_err(HistoryError::Serialize)?;

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| HistoryError::io(&path, e))?;
        file.write_all(content.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| HistoryError::io(&path, e))
    }

    /// 最新のエントリ
    pub fn latest(&self) -> Result<Option<HistoryEntry>, HistoryError> {
        self.resolve(HistoryPointer::Latest)
    }

    /// 1つ前のエントリ
    pub fn second_latest(&self) -> Result<Option<HistoryEntry>, HistoryError> {
        self.resolve(HistoryPointer::SecondLatest)
    }

    /// ポインタの指すエントリを読む。エントリが存在しない場合は`NotFound`
    pub fn require(&self, pointer: HistoryPointer) -> Result<HistoryEntry, HistoryError> {
        self.resolve(pointer)?
            .ok_or(HistoryError::NotFound(pointer.name()))
    }

    /// ポインタとその参照先を一貫した組として読む
    ///
    /// 読み取り中にインデックスが書き換えられた場合は再試行する。
    pub fn resolve(&self, pointer: HistoryPointer) -> Result<Option<HistoryEntry>, HistoryError> {
        self.resolve_with(pointer, |path| self.read_entry(path))
    }

    fn resolve_with<F>(
        &self,
        pointer: HistoryPointer,
        mut read_entry: F,
    ) -> Result<Option<HistoryEntry>, HistoryError>
    where
        F: FnMut(&Path) -> Result<HistoryEntry, HistoryError>,
    {
        for attempt in 1..=self.read_retries {
            let index = self.read_index()?;
            let Some(id) = pointer.select(&index) else {
                return Ok(None);
            };

            let entry = read_entry(&self.entry_path(id));
            let stable = self.read_index()? == index;

            match entry {
                Ok(entry) if stable => return Ok(Some(entry)),
                Err(e) if stable => return Err(e),
                _ => debug!(
                    "History index changed while reading {} (attempt {})",
                    pointer.name(),
                    attempt
                ),
            }
        }

        Err(HistoryError::Unstable {
            attempts: self.read_retries,
        })
    }

    /// 任意のスナップショットファイルを読む
    pub fn read_entry(&self, path: &Path) -> Result<HistoryEntry, HistoryError> {
        let content = std::fs::read_to_string(path).map_err(|e| HistoryError::io(path, e))?;
        serde_yaml::from_str(&content).map_err(|source| HistoryError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn read_index(&self) -> Result<HistoryIndex, HistoryError> {
        let path = self.index_path();
        match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => Ok(HistoryIndex::default()),
            Ok(content) => {
                serde_yaml::from_str(&content).map_err(|source| HistoryError::Parse { path, source })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HistoryIndex::default()),
            Err(e) => Err(HistoryError::io(&path, e)),
        }
    }
}

fn parse_entry_id(id: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(id, HISTORY_ID_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::manifest::Project;
    use tempfile::TempDir;

    fn universe(remote: &str) -> Universe {
        let mut universe = Universe::new();
        universe.merge_project(Project::new("tools", "tools", remote));
        universe
    }

    #[test]
    fn test_empty_history() {
        let temp_dir = TempDir::new().unwrap();
        let store = HistoryStore::new(temp_dir.path().join("update_history"));

        assert!(store.latest().unwrap().is_none());
        assert!(store.second_latest().unwrap().is_none());
        assert!(matches!(
            store.require(HistoryPointer::Latest),
            Err(HistoryError::NotFound("latest"))
        ));
    }

    #[test]
    fn test_record_rotates_pointers() {
        let temp_dir = TempDir::new().unwrap();
        let store = HistoryStore::new(temp_dir.path().join("update_history"));

        let first = store.record(&universe("R1")).unwrap();
        assert_eq!(store.latest().unwrap(), Some(first.clone()));
        assert!(store.second_latest().unwrap().is_none());

        let second = store.record(&universe("R2")).unwrap();
        let latest = store.latest().unwrap().unwrap();
        let previous = store.second_latest().unwrap().unwrap();

        assert_eq!(latest, second);
        assert_eq!(previous, first);
        assert!(latest.timestamp > previous.timestamp);
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let temp_dir = TempDir::new().unwrap();
        let store = HistoryStore::new(temp_dir.path());

        let mut previous: Option<HistoryEntry> = None;
        for _ in 0..5 {
            let entry = store.record(&Universe::new()).unwrap();
            if let Some(prev) = &previous {
                assert!(entry.timestamp > prev.timestamp);
                assert!(entry.id > prev.id);
            }
            previous = Some(entry);
        }
    }

    #[test]
    fn test_future_latest_still_monotonic() {
        let temp_dir = TempDir::new().unwrap();
        let store = HistoryStore::new(temp_dir.path());

        let future = Utc::now() + Duration::days(1);
        let index = HistoryIndex::default().rotate(future.format(HISTORY_ID_FORMAT).to_string());
        std::fs::write(
            temp_dir.path().join(INDEX_FILE),
            serde_yaml::to_string(&index).unwrap(),
        )
        .unwrap();

        let entry = store.record(&Universe::new()).unwrap();
        assert!(entry.timestamp > future);
    }

    #[test]
    fn test_entries_are_immutable_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = HistoryStore::new(temp_dir.path());

        let entry = store.record(&universe("R1")).unwrap();
        let path = temp_dir.path().join(format!("{}.yaml", entry.id));
        let before = std::fs::read_to_string(&path).unwrap();

        store.record(&universe("R2")).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
        assert_eq!(store.read_entry(&path).unwrap(), entry);
    }

    #[test]
    fn test_rotation_during_read_is_retried() {
        let temp_dir = TempDir::new().unwrap();
        let store = HistoryStore::new(temp_dir.path());
        store.record(&universe("R1")).unwrap();

        let mut reads = 0;
        let mut rotated = None;
        let resolved = store
            .resolve_with(HistoryPointer::Latest, |path| {
                reads += 1;
                if reads == 1 {
                    // another update lands between the index read and the entry read
                    rotated = Some(store.record(&universe("R2")).unwrap());
                }
                store.read_entry(path)
            })
            .unwrap();

        assert_eq!(reads, 2);
        assert_eq!(resolved, rotated);
    }

    #[test]
    fn test_unstable_history_gives_up_after_retries() {
        let temp_dir = TempDir::new().unwrap();
        let store = HistoryStore::new(temp_dir.path()).with_read_retries(2);
        store.record(&universe("R0")).unwrap();
        store.record(&universe("R1")).unwrap();

        let mut reads = 0;
        let err = store
            .resolve_with(HistoryPointer::SecondLatest, |path| {
                reads += 1;
                store.record(&universe("R2")).unwrap();
                store.read_entry(path)
            })
            .unwrap_err();

        assert!(matches!(err, HistoryError::Unstable { attempts: 2 }));
        assert_eq!(reads, 2);
    }
}
