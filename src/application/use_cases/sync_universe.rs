use crate::domain::entities::manifest::Project;
use crate::domain::entities::project_state::{LocalProject, ProjectMetadata};
use crate::domain::entities::universe::Universe;
use crate::domain::entities::workspace::Workspace;
use crate::domain::value_objects::relative_path;
use crate::infrastructure::filesystem::{ProjectMetadataError, ProjectMetadataStore};
use crate::infrastructure::vcs::{CloneOptions, VcsError, VcsOperations};
use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

/// 単一プロジェクトの収束エラー
#[derive(Debug, Error)]
pub enum ProjectSyncError {
    #[error(transparent)]
    Vcs(#[from] VcsError),

    #[error("{path} has local changes")]
    LocalChanges { path: PathBuf },

    #[error("{path} exists, is not empty and is not a repository")]
    NotEmpty { path: PathBuf },

    #[error("Cannot move to {path}: destination exists")]
    DestinationExists { path: PathBuf },

    #[error(transparent)]
    Metadata(#[from] ProjectMetadataError),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Task failed: {0}")]
    Task(String),
}

impl ProjectSyncError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// 失敗したVCSサブプロセスの終了コード
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Vcs(e) => e.exit_code(),
            _ => None,
        }
    }
}

/// 収束できなかったプロジェクト
#[derive(Debug)]
pub struct ProjectFailure {
    /// プロジェクト名
    pub project: String,
    /// 失敗の原因
    pub error: ProjectSyncError,
}

/// 同期関連のエラー
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Failed to scan local projects: {0}")]
    Scan(#[from] ProjectMetadataError),

    #[error("Synchronization aborted")]
    Aborted,

    #[error("{} project(s) failed to converge:{}", .failures.len(), format_failures(.failures))]
    Convergence { failures: Vec<ProjectFailure> },
}

impl SyncError {
    /// 単一のVCSコマンドが失敗した場合はその終了コード
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Convergence { failures } if failures.len() == 1 => failures[0].error.exit_code(),
            _ => None,
        }
    }
}

fn format_failures(failures: &[ProjectFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("\n  {}: {}", f.project, f.error))
        .collect()
}

/// ユーザーによる中断要求
///
/// 中断後は新しい作業を開始しないが、実行中のVCS操作は完了させる。
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    flag: Arc<AtomicBool>,
}

impl AbortSignal {
    /// 新しいAbortSignalを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 中断を要求する
    pub fn abort(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// 中断が要求されたか
    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Ctrl-Cで中断を要求するタスクを起動する
    pub fn listen_for_ctrl_c(&self) -> tokio::task::JoinHandle<()> {
        let signal = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, waiting for running operations to finish");
                signal.abort();
            }
        })
    }
}

/// 同期の設定
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// 宣言されていないプロジェクトを削除するか
    pub gc: bool,

    /// ブランチ追跡プロジェクトを常に更新するか
    pub refresh: bool,

    /// 並列実行の最大数
    pub jobs: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            gc: false,
            refresh: false,
            jobs: num_cpus::get(),
        }
    }
}

impl SyncOptions {
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
}

/// 同期の結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// 新規クローンしたプロジェクト
    pub cloned: Vec<String>,
    /// 更新したプロジェクト
    pub updated: Vec<String>,
    /// 移動したプロジェクト
    pub moved: Vec<String>,
    /// 既に収束していたプロジェクト
    pub unchanged: Vec<String>,
    /// 削除したプロジェクト
    pub removed: Vec<String>,
    /// 宣言されていないが残したプロジェクト
    pub orphaned: Vec<String>,
    /// gcが安全でないため残したプロジェクトとその理由
    pub kept: Vec<(String, String)>,
}

impl SyncReport {
    /// ワークスペースを変更したか
    pub fn changed_anything(&self) -> bool {
        !(self.cloned.is_empty()
            && self.updated.is_empty()
            && self.moved.is_empty()
            && self.removed.is_empty())
    }

    fn add(&mut self, name: String, outcome: Outcome) {
        match outcome {
            Outcome::Cloned => self.cloned.push(name),
            Outcome::Updated => self.updated.push(name),
            Outcome::Moved => self.moved.push(name),
            Outcome::Unchanged => self.unchanged.push(name),
            Outcome::Removed => self.removed.push(name),
            Outcome::Orphaned => self.orphaned.push(name),
            Outcome::Kept(reason) => self.kept.push((name, reason)),
            Outcome::Skipped => {}
        }
    }
}

#[derive(Debug)]
enum Outcome {
    Cloned,
    Updated,
    Moved,
    Unchanged,
    Removed,
    Orphaned,
    Kept(String),
    Skipped,
}

/// 計画された1プロジェクト分の操作
#[derive(Debug, Clone, PartialEq, Eq)]
enum Operation {
    /// 存在しないので新規にクローンする
    Create(Project),
    /// 既存のチェックアウトを更新する（メタデータがなければ採用する）
    Update {
        project: Project,
        metadata: Option<ProjectMetadata>,
    },
    /// 別のパスにあるチェックアウトを移動してから更新する
    Move {
        project: Project,
        from: PathBuf,
        metadata: ProjectMetadata,
    },
    /// 宣言されていないプロジェクトを削除する
    Delete(LocalProject),
    /// 宣言されていないプロジェクトを報告のみする
    Orphan(LocalProject),
}

impl Operation {
    fn name(&self) -> &str {
        match self {
            Self::Create(project) | Self::Update { project, .. } | Self::Move { project, .. } => {
                &project.name
            }
            Self::Delete(local) | Self::Orphan(local) => local.name(),
        }
    }
}

/// 2段階で実行する操作の計画
///
/// 移動で空くパスを使うプロジェクトは、移動が終わってからクローンする。
#[derive(Debug, Default)]
struct Plan {
    operations: Vec<Operation>,
    after_moves: Vec<Operation>,
}

/// ツール由来でプロジェクトと一緒に削除するパス
#[derive(Debug, Clone, Default)]
struct OwnedPaths {
    by_project: BTreeMap<String, Vec<PathBuf>>,
}

/// 統合マニフェストに合わせてワークスペースを収束させるユースケース
pub struct SyncUniverseUseCase {
    workspace: Workspace,
    vcs: Arc<dyn VcsOperations>,
    options: SyncOptions,
    abort: AbortSignal,
    previous: Option<Universe>,
}

impl SyncUniverseUseCase {
    /// 新しいSyncUniverseUseCaseインスタンスを作成
    pub fn new(workspace: Workspace, vcs: Arc<dyn VcsOperations>) -> Self {
        Self {
            workspace,
            vcs,
            options: SyncOptions::default(),
            abort: AbortSignal::new(),
            previous: None,
        }
    }

    /// オプションを設定
    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// 中断シグナルを設定
    pub fn with_abort_signal(mut self, abort: AbortSignal) -> Self {
        self.abort = abort;
        self
    }

    /// 前回の同期結果を設定（gc時のツール所有者の判定に使う）
    pub fn with_previous_universe(mut self, previous: Option<Universe>) -> Self {
        self.previous = previous;
        self
    }

    /// 同期を実行
    pub async fn execute(&self, universe: &Universe) -> Result<SyncReport, SyncError> {
        let store = ProjectMetadataStore::new(&self.workspace.root_path);
        let locals = store.discover()?;
        let plan = self.plan(universe, locals);

        info!(
            "Synchronizing {} projects ({} operations)",
            universe.projects.len(),
            plan.operations.len() + plan.after_moves.len()
        );

        let worker = Arc::new(Worker {
            workspace: self.workspace.clone(),
            vcs: self.vcs.clone(),
            store,
            refresh: self.options.refresh,
            declared_paths: universe.projects.values().map(|p| p.path.clone()).collect(),
            owned: self.owned_paths(universe),
            fs_lock: Mutex::new(()),
        });

        let mut report = SyncReport::default();
        let mut failures = Vec::new();
        self.run_phase(&worker, plan.operations, &mut report, &mut failures)
            .await;
        if !plan.after_moves.is_empty() && !self.abort.is_aborted() {
            self.run_phase(&worker, plan.after_moves, &mut report, &mut failures)
                .await;
        }

        if self.abort.is_aborted() {
            return Err(SyncError::Aborted);
        }
        if !failures.is_empty() {
            return Err(SyncError::Convergence { failures });
        }

        info!(
            "Synchronized: {} cloned, {} updated, {} moved, {} unchanged, {} removed",
            report.cloned.len(),
            report.updated.len(),
            report.moved.len(),
            report.unchanged.len(),
            report.removed.len()
        );
        Ok(report)
    }

    /// 操作を並列に実行し、結果を報告と失敗に振り分ける
    async fn run_phase(
        &self,
        worker: &Arc<Worker>,
        operations: Vec<Operation>,
        report: &mut SyncReport,
        failures: &mut Vec<ProjectFailure>,
    ) {
        let semaphore = Arc::new(Semaphore::new(self.options.jobs.max(1)));
        let (names, handles): (Vec<_>, Vec<_>) = operations
            .into_iter()
            .map(|operation| {
                let worker = worker.clone();
                let semaphore = semaphore.clone();
                let abort = self.abort.clone();
                let name = operation.name().to_string();

                let handle = tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire()
                        .await
                        .map_err(|e| ProjectSyncError::Task(e.to_string()))?;
                    if abort.is_aborted() {
                        return Ok(Outcome::Skipped);
                    }
                    worker.run(operation).await
                });
                (name, handle)
            })
            .unzip();

        for (name, result) in names.into_iter().zip(join_all(handles).await) {
            match result {
                Ok(Ok(outcome)) => report.add(name, outcome),
                Ok(Err(error)) => failures.push(ProjectFailure {
                    project: name,
                    error,
                }),
                Err(e) => failures.push(ProjectFailure {
                    project: name,
                    error: ProjectSyncError::Task(e.to_string()),
                }),
            }
        }
    }

    /// 宣言とローカルの状態から操作を計画する
    fn plan(&self, universe: &Universe, locals: Vec<LocalProject>) -> Plan {
        let mut by_name: BTreeMap<String, LocalProject> = BTreeMap::new();
        for local in locals {
            if let Some(previous) = by_name.insert(local.name().to_string(), local) {
                warn!(
                    "Project '{}' has metadata in more than one checkout, ignoring {}",
                    previous.name(),
                    previous.path
                );
            }
        }

        // 別のパスへ移動するチェックアウトが今いる場所
        let vacated: Vec<String> = by_name
            .values()
            .filter(|local| {
                universe
                    .projects
                    .get(local.name())
                    .is_some_and(|project| project.path != local.path)
            })
            .map(|local| local.path.clone())
            .collect();

        let mut plan = Plan::default();
        let mut claimed_paths = BTreeSet::new();

        for project in universe.projects.values() {
            let dir = self.workspace.project_path(&project.path);

            if let Some(local) = by_name.remove(&project.name) {
                if local.path == project.path {
                    plan.operations.push(Operation::Update {
                        project: project.clone(),
                        metadata: Some(local.metadata),
                    });
                } else {
                    plan.operations.push(Operation::Move {
                        project: project.clone(),
                        from: local.abs_path,
                        metadata: local.metadata,
                    });
                }
            } else if vacated.iter().any(|path| {
                relative_path::contains(path, &project.path)
                    || relative_path::contains(&project.path, path)
            }) {
                debug!("{} waits for a checkout to move out of {}", project.name, project.path);
                plan.after_moves.push(Operation::Create(project.clone()));
            } else if self.vcs.is_repository(&dir) {
                debug!("Adopting existing checkout at {}", dir.display());
                plan.operations.push(Operation::Update {
                    project: project.clone(),
                    metadata: None,
                });
            } else {
                plan.operations.push(Operation::Create(project.clone()));
            }
            claimed_paths.insert(project.path.clone());
        }

        for local in by_name.into_values() {
            if claimed_paths.contains(&local.path) {
                // 宣言されたプロジェクトが同じパスを採用する
                continue;
            }
            if self.options.gc {
                plan.operations.push(Operation::Delete(local));
            } else {
                warn!("Project '{}' at {} is no longer declared", local.name(), local.path);
                plan.operations.push(Operation::Orphan(local));
            }
        }

        plan
    }

    /// 削除されるプロジェクトだけが提供していたツールのバイナリとデータ
    fn owned_paths(&self, universe: &Universe) -> OwnedPaths {
        let mut owned = OwnedPaths::default();
        let Some(previous) = &self.previous else {
            return owned;
        };

        let data_dir = self.workspace.data_dir();
        let bin_dir = self.workspace.bin_dir();
        let arch = self.workspace.host_target().arch;
        let live_data: BTreeSet<&str> = universe
            .tools
            .values()
            .filter_map(|t| t.data.as_deref())
            .collect();

        for tool in previous.tools.values() {
            if universe.projects.contains_key(&tool.project) || universe.tools.contains_key(&tool.name)
            {
                continue;
            }

            let paths = owned.by_project.entry(tool.project.clone()).or_default();
            paths.push(bin_dir.join(&tool.name));
            paths.push(bin_dir.join(&arch).join(&tool.name));
            if let Some(data) = tool.data.as_deref().filter(|d| !live_data.contains(d)) {
                paths.push(data_dir.join(data));
            }
        }
        owned
    }
}

/// タスク間で共有される同期の実行部
struct Worker {
    workspace: Workspace,
    vcs: Arc<dyn VcsOperations>,
    store: ProjectMetadataStore,
    refresh: bool,
    declared_paths: Vec<String>,
    owned: OwnedPaths,
    /// 移動と削除のための排他区間
    fs_lock: Mutex<()>,
}

impl Worker {
    async fn run(&self, operation: Operation) -> Result<Outcome, ProjectSyncError> {
        match operation {
            Operation::Create(project) => self.create(&project).await,
            Operation::Update { project, metadata } => {
                let dir = self.workspace.project_path(&project.path);
                self.update(&project, metadata.as_ref(), &dir).await
            }
            Operation::Move {
                project,
                from,
                metadata,
            } => self.relocate(&project, &from, &metadata).await,
            Operation::Delete(local) => self.delete(&local).await,
            Operation::Orphan(_) => Ok(Outcome::Orphaned),
        }
    }

    async fn create(&self, project: &Project) -> Result<Outcome, ProjectSyncError> {
        let dir = self.workspace.project_path(&project.path);
        if !is_empty_or_missing(&dir)? {
            return Err(ProjectSyncError::NotEmpty { path: dir });
        }

        info!("Cloning {} into {}", project.remote, project.path);
        let mut options = CloneOptions::default();
        if let Some(branch) = &project.branch {
            options = options.with_branch(branch.clone());
        }
        self.vcs
            .clone_repository(&project.remote, &dir, &options)
            .await?;
        if let Some(revision) = &project.revision {
            self.vcs.checkout(&dir, revision).await?;
        }

        self.record(project, &dir).await?;
        Ok(Outcome::Cloned)
    }

    async fn update(
        &self,
        project: &Project,
        metadata: Option<&ProjectMetadata>,
        dir: &Path,
    ) -> Result<Outcome, ProjectSyncError> {
        if let Some(metadata) = metadata {
            if self.is_converged(project, metadata, dir).await? {
                debug!("{} is up to date", project.name);
                return Ok(Outcome::Unchanged);
            }
        }

        if self.vcs.has_changes(dir).await? {
            return Err(ProjectSyncError::LocalChanges {
                path: dir.to_path_buf(),
            });
        }

        info!("Updating {}", project.path);
        if self.vcs.remote_url(dir).await?.as_deref() != Some(project.remote.as_str()) {
            self.vcs.set_remote_url(dir, &project.remote).await?;
        }
        self.vcs.fetch(dir).await?;

        if let Some(revision) = &project.revision {
            self.vcs.checkout(dir, revision).await?;
        } else if let Some(branch) = &project.branch {
            if self.vcs.current_branch(dir).await?.as_deref() != Some(branch.as_str()) {
                self.vcs.switch_branch(dir, branch).await?;
            }
            self.vcs.fast_forward(dir, branch).await?;
        } else if let Some(branch) = self.vcs.current_branch(dir).await? {
            self.vcs.fast_forward(dir, &branch).await?;
        }

        self.record(project, dir).await?;
        Ok(Outcome::Updated)
    }

    async fn is_converged(
        &self,
        project: &Project,
        metadata: &ProjectMetadata,
        dir: &Path,
    ) -> Result<bool, ProjectSyncError> {
        if metadata.project != *project {
            return Ok(false);
        }
        if self.refresh && project.revision.is_none() {
            return Ok(false);
        }
        if self.vcs.current_revision(dir).await? != metadata.revision {
            return Ok(false);
        }
        if let (None, Some(branch)) = (&project.revision, &project.branch) {
            if self.vcs.current_branch(dir).await?.as_deref() != Some(branch.as_str()) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn relocate(
        &self,
        project: &Project,
        from: &Path,
        metadata: &ProjectMetadata,
    ) -> Result<Outcome, ProjectSyncError> {
        let dir = self.workspace.project_path(&project.path);
        {
            let _guard = self.fs_lock.lock().await;
            if dir.exists() {
                return Err(ProjectSyncError::DestinationExists { path: dir });
            }
            if let Some(parent) = dir.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| ProjectSyncError::io(parent, e))?;
            }
            info!(
                "Moving {} from {} to {}",
                project.name, metadata.project.path, project.path
            );
            tokio::fs::rename(from, &dir)
                .await
                .map_err(|e| ProjectSyncError::io(from, e))?;
        }

        self.update(project, Some(metadata), &dir).await?;
        Ok(Outcome::Moved)
    }

    async fn delete(&self, local: &LocalProject) -> Result<Outcome, ProjectSyncError> {
        if let Some(declared) = self
            .declared_paths
            .iter()
            .find(|path| relative_path::contains(&local.path, path))
        {
            return Ok(self.keep(local, format!("contains declared project at {}", declared)));
        }
        if !self.vcs.is_repository(&local.abs_path) {
            return Ok(self.keep(local, "not a repository".to_string()));
        }
        if self.vcs.has_changes(&local.abs_path).await? {
            return Ok(self.keep(local, "has local changes".to_string()));
        }

        let _guard = self.fs_lock.lock().await;
        info!("Removing {} at {}", local.name(), local.path);
        tokio::fs::remove_dir_all(&local.abs_path)
            .await
            .map_err(|e| ProjectSyncError::io(&local.abs_path, e))?;

        for path in self.owned.by_project.get(local.name()).into_iter().flatten() {
            let removed = if path.is_dir() {
                tokio::fs::remove_dir_all(path).await
            } else if path.exists() {
                tokio::fs::remove_file(path).await
            } else {
                continue;
            };
            removed.map_err(|e| ProjectSyncError::io(path, e))?;
            debug!("Removed {}", path.display());
        }

        Ok(Outcome::Removed)
    }

    fn keep(&self, local: &LocalProject, reason: String) -> Outcome {
        warn!("Not removing {} at {}: {}", local.name(), local.path, reason);
        Outcome::Kept(reason)
    }

    async fn record(&self, project: &Project, dir: &Path) -> Result<(), ProjectSyncError> {
        let revision = self.vcs.current_revision(dir).await?;
        self.store
            .write(dir, &ProjectMetadata::new(project.clone(), revision))?;
        Ok(())
    }
}

fn is_empty_or_missing(dir: &Path) -> Result<bool, ProjectSyncError> {
    match std::fs::read_dir(dir) {
        Ok(mut entries) => Ok(entries.next().is_none()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(ProjectSyncError::io(dir, e)),
    }
}
