use super::sync_universe::{AbortSignal, SyncError, SyncOptions, SyncReport, SyncUniverseUseCase};
use crate::application::services::import_resolver::{ImportResolver, ResolveError, ResolveOptions};
use crate::application::services::manifest_source::{ManifestSource, WorkspaceManifestSource};
use crate::domain::entities::history::HistoryEntry;
use crate::domain::entities::universe::{Universe, UniverseError};
use crate::domain::entities::workspace::{Workspace, WorkspaceError};
use crate::infrastructure::filesystem::{HistoryError, HistoryPointer, HistoryStore, LockError, WorkspaceLock};
use crate::infrastructure::vcs::VcsOperations;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Update関連のエラー
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Invalid snapshot: {0}")]
    Snapshot(#[from] UniverseError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    History(#[from] HistoryError),
}

/// 同期対象のユニバースの取得元
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotSource {
    /// 更新履歴のポインタ
    History(HistoryPointer),
    /// 任意のスナップショットファイル
    File(PathBuf),
}

impl SnapshotSource {
    /// `latest`、`second-latest`、またはファイルパスを解釈する
    pub fn parse(value: &str) -> Self {
        match value {
            "latest" => Self::History(HistoryPointer::Latest),
            "second-latest" => Self::History(HistoryPointer::SecondLatest),
            path => Self::File(PathBuf::from(path)),
        }
    }
}

/// Updateの設定
#[derive(Debug, Clone)]
pub struct UpdateOptions {
    /// 宣言されていないプロジェクトを削除するか
    pub gc: bool,

    /// マニフェスト提供元とブランチ追跡プロジェクトを更新するか
    pub refresh: bool,

    /// 並列実行の最大数
    pub jobs: usize,

    /// ルートマニフェストの代わりに使うスナップショット
    pub snapshot: Option<SnapshotSource>,

    /// 履歴読み取りの再試行回数
    pub history_read_retries: u32,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            gc: false,
            refresh: false,
            jobs: num_cpus::get(),
            snapshot: None,
            history_read_retries: 3,
        }
    }
}

impl UpdateOptions {
    /// gcを設定
    pub fn with_gc(mut self, gc: bool) -> Self {
        self.gc = gc;
        self
    }

    /// refreshを設定
    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    /// 並列度を設定
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// スナップショットを設定
    pub fn with_snapshot(mut self, snapshot: Option<SnapshotSource>) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// 履歴読み取りの再試行回数を設定
    pub fn with_history_read_retries(mut self, retries: u32) -> Self {
        self.history_read_retries = retries;
        self
    }
}

/// Updateの結果
#[derive(Debug, Clone)]
pub struct UpdateResult {
    /// 同期の結果
    pub report: SyncReport,
    /// 記録された履歴エントリ
    pub entry: HistoryEntry,
}

/// ワークスペースを更新するユースケース
///
/// updateロックを取得し、ルートマニフェスト（またはスナップショット）から
/// ユニバースを求めて同期し、成功した場合のみ履歴に記録する。
pub struct UpdateWorkspaceUseCase {
    workspace: Workspace,
    vcs: Arc<dyn VcsOperations>,
    source: Arc<dyn ManifestSource>,
    options: UpdateOptions,
    abort: AbortSignal,
}

impl UpdateWorkspaceUseCase {
    /// 新しいUpdateWorkspaceUseCaseインスタンスを作成
    pub fn new(workspace: Workspace, vcs: Arc<dyn VcsOperations>) -> Self {
        let source = Arc::new(WorkspaceManifestSource::new(
            workspace.root_path.clone(),
            vcs.clone(),
        ));
        Self {
            workspace,
            vcs,
            source,
            options: UpdateOptions::default(),
            abort: AbortSignal::new(),
        }
    }

    /// オプションを設定
    pub fn with_options(mut self, options: UpdateOptions) -> Self {
        self.options = options;
        self
    }

    /// マニフェストの取得元を差し替える
    pub fn with_manifest_source(mut self, source: Arc<dyn ManifestSource>) -> Self {
        self.source = source;
        self
    }

    /// 中断シグナルを設定
    pub fn with_abort_signal(mut self, abort: AbortSignal) -> Self {
        self.abort = abort;
        self
    }

    /// Updateを実行
    pub async fn execute(&self) -> Result<UpdateResult, UpdateError> {
        self.workspace.ensure_layout()?;

        let mut lock = WorkspaceLock::open(self.workspace.update_lock_path())?;
        let _guard = lock.acquire()?;

        let history = HistoryStore::new(self.workspace.history_dir())
            .with_read_retries(self.options.history_read_retries);

        let universe = self.target_universe(&history).await?;
        let previous = history.latest()?.map(|entry| entry.universe);

        let sync_options = SyncOptions::default()
            .with_gc(self.options.gc)
            .with_refresh(self.options.refresh)
            .with_jobs(self.options.jobs);
        let report = SyncUniverseUseCase::new(self.workspace.clone(), self.vcs.clone())
            .with_options(sync_options)
            .with_abort_signal(self.abort.clone())
            .with_previous_universe(previous)
            .execute(&universe)
            .await?;

        let entry = history.record(&universe)?;
        info!("Workspace updated ({})", entry.id);

        Ok(UpdateResult { report, entry })
    }

    async fn target_universe(&self, history: &HistoryStore) -> Result<Universe, UpdateError> {
        match &self.options.snapshot {
            None => {
                let options = ResolveOptions::default()
                    .with_refresh(self.options.refresh)
                    .with_jobs(self.options.jobs);
                let universe = ImportResolver::new(self.source.clone())
                    .with_options(options)
                    .resolve(&self.workspace.manifest_path())
                    .await?;
                Ok(universe)
            }
            Some(snapshot) => {
                let entry = match snapshot {
                    SnapshotSource::History(pointer) => history.require(*pointer)?,
                    SnapshotSource::File(path) => history.read_entry(path)?,
                };
                info!("Synchronizing against snapshot {}", entry.id);
                entry.universe.validate()?;
                Ok(entry.universe)
            }
        }
    }
}
