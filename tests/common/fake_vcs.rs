//! 記録機能付きのインメモリVCS
//!
//! クローンすると`.git`ディレクトリと状態ファイルを作るだけで、実際のgitは呼ばない。
//! 状態はチェックアウト内に置くので、ディレクトリの移動にも追従する。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use wsync::infrastructure::vcs::{CloneOptions, VcsError, VcsOperations};

const STATE_FILE: &str = "fake_state.json";
pub const DEFAULT_HEAD: &str = "1111111111111111111111111111111111111111";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CheckoutState {
    remote: String,
    revision: String,
    branch: Option<String>,
    dirty: bool,
}

#[derive(Debug, Clone, Default)]
struct RemoteState {
    head: Option<String>,
    files: Vec<(String, String)>,
    fail_code: Option<i32>,
}

/// 変更系の呼び出しを記録するフェイクVCS
#[derive(Default)]
pub struct FakeVcs {
    remotes: Mutex<BTreeMap<String, RemoteState>>,
    calls: Mutex<Vec<String>>,
}

impl FakeVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// クローン時にチェックアウトへ書き込むファイルを登録する
    pub fn with_remote_files(self, remote: &str, files: &[(&str, &str)]) -> Self {
        self.remotes
            .lock()
            .unwrap()
            .entry(remote.to_string())
            .or_default()
            .files = files
            .iter()
            .map(|(path, content)| (path.to_string(), content.to_string()))
            .collect();
        self
    }

    /// リモートのHEADを進める
    pub fn set_head(&self, remote: &str, revision: &str) {
        self.remotes
            .lock()
            .unwrap()
            .entry(remote.to_string())
            .or_default()
            .head = Some(revision.to_string());
    }

    /// リモートへのclone/fetchを指定の終了コードで失敗させる
    pub fn fail_remote(&self, remote: &str, code: i32) {
        self.remotes
            .lock()
            .unwrap()
            .entry(remote.to_string())
            .or_default()
            .fail_code = Some(code);
    }

    /// チェックアウトに未コミットの変更があることにする
    pub fn make_dirty(&self, repo_path: &Path) {
        let mut state = read_state(repo_path).unwrap();
        state.dirty = true;
        write_state(repo_path, &state).unwrap();
    }

    /// 記録された変更系の呼び出し
    pub fn mutations(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// 記録をクリアする
    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn head_of(&self, remote: &str) -> String {
        self.remotes
            .lock()
            .unwrap()
            .get(remote)
            .and_then(|r| r.head.clone())
            .unwrap_or_else(|| DEFAULT_HEAD.to_string())
    }

    fn check_failure(&self, command: &str, remote: &str) -> Result<(), VcsError> {
        match self.remotes.lock().unwrap().get(remote).and_then(|r| r.fail_code) {
            Some(code) => Err(VcsError::command_failed(
                format!("git {} {}", command, remote),
                code,
                "fatal: simulated failure",
            )),
            None => Ok(()),
        }
    }
}

fn state_path(repo_path: &Path) -> std::path::PathBuf {
    repo_path.join(".git").join(STATE_FILE)
}

fn read_state(repo_path: &Path) -> Result<CheckoutState, VcsError> {
    let content = std::fs::read_to_string(state_path(repo_path)).map_err(|_| {
        VcsError::RepositoryNotFound {
            path: repo_path.to_path_buf(),
        }
    })?;
    serde_json::from_str(&content).map_err(|e| VcsError::IoError {
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
    })
}

fn write_state(repo_path: &Path, state: &CheckoutState) -> Result<(), VcsError> {
    let content = serde_json::to_string(state).map_err(|e| VcsError::IoError {
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
    })?;
    std::fs::write(state_path(repo_path), content)?;
    Ok(())
}

fn update_state(
    repo_path: &Path,
    change: impl FnOnce(&mut CheckoutState),
) -> Result<(), VcsError> {
    let mut state = read_state(repo_path)?;
    change(&mut state);
    write_state(repo_path, &state)
}

#[async_trait]
impl VcsOperations for FakeVcs {
    async fn clone_repository(
        &self,
        remote: &str,
        dest_path: &Path,
        options: &CloneOptions,
    ) -> Result<(), VcsError> {
        self.record(format!("clone {}", remote));
        self.check_failure("clone", remote)?;

        std::fs::create_dir_all(dest_path.join(".git"))?;
        let files = self
            .remotes
            .lock()
            .unwrap()
            .get(remote)
            .map(|r| r.files.clone())
            .unwrap_or_default();
        for (path, content) in files {
            let file = dest_path.join(path);
            if let Some(parent) = file.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(file, content)?;
        }

        write_state(
            dest_path,
            &CheckoutState {
                remote: remote.to_string(),
                revision: self.head_of(remote),
                branch: Some(options.branch.clone().unwrap_or_else(|| "main".to_string())),
                dirty: false,
            },
        )
    }

    async fn fetch(&self, repo_path: &Path) -> Result<(), VcsError> {
        let state = read_state(repo_path)?;
        self.record(format!("fetch {}", state.remote));
        self.check_failure("fetch", &state.remote)
    }

    async fn set_remote_url(&self, repo_path: &Path, remote: &str) -> Result<(), VcsError> {
        self.record(format!("set-url {}", remote));
        update_state(repo_path, |state| state.remote = remote.to_string())
    }

    async fn checkout(&self, repo_path: &Path, revision: &str) -> Result<(), VcsError> {
        self.record(format!("checkout {}", revision));
        update_state(repo_path, |state| {
            state.revision = revision.to_string();
            state.branch = None;
        })
    }

    async fn switch_branch(&self, repo_path: &Path, branch: &str) -> Result<(), VcsError> {
        self.record(format!("switch {}", branch));
        update_state(repo_path, |state| state.branch = Some(branch.to_string()))
    }

    async fn fast_forward(&self, repo_path: &Path, branch: &str) -> Result<(), VcsError> {
        self.record(format!("fast-forward {}", branch));
        let remote = read_state(repo_path)?.remote;
        let head = self.head_of(&remote);
        update_state(repo_path, |state| state.revision = head)
    }

    async fn current_revision(&self, repo_path: &Path) -> Result<String, VcsError> {
        Ok(read_state(repo_path)?.revision)
    }

    async fn current_branch(&self, repo_path: &Path) -> Result<Option<String>, VcsError> {
        Ok(read_state(repo_path)?.branch)
    }

    async fn remote_url(&self, repo_path: &Path) -> Result<Option<String>, VcsError> {
        Ok(Some(read_state(repo_path)?.remote))
    }

    async fn has_changes(&self, repo_path: &Path) -> Result<bool, VcsError> {
        Ok(read_state(repo_path)?.dirty)
    }

    fn is_repository(&self, path: &Path) -> bool {
        path.join(".git").is_dir()
    }
}
