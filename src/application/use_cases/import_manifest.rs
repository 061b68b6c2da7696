use crate::domain::entities::manifest::{Import, Manifest, RemoteImport};
use crate::domain::entities::workspace::{Workspace, WorkspaceError};
use crate::infrastructure::filesystem::{LockError, ManifestStore, ManifestStoreError, WorkspaceLock};
use thiserror::Error;
use tracing::info;
use url::Url;

/// Import関連のエラー
#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Store(#[from] ManifestStoreError),

    #[error("Cannot derive a project name from remote '{0}', pass --name")]
    NoName(String),
}

/// ルートマニフェストに追加するリモートインポート
#[derive(Debug, Clone, Default)]
pub struct ImportRequest {
    /// 提供プロジェクト内のマニフェストファイル
    pub manifest: String,
    /// 提供プロジェクトのリモート
    pub remote: String,
    /// 提供プロジェクト名（省略時はリモートから導出）
    pub name: Option<String>,
    /// マウントルート
    pub root: Option<String>,
    /// ブランチ
    pub branch: Option<String>,
    /// リビジョン
    pub revision: Option<String>,
    /// 既存のインポートをすべて置き換えるか
    pub overwrite: bool,
}

/// ルートマニフェストにインポートを追加するユースケース
pub struct ImportManifestUseCase {
    workspace: Workspace,
    store: ManifestStore,
}

impl ImportManifestUseCase {
    /// 新しいImportManifestUseCaseインスタンスを作成
    pub fn new(workspace: Workspace) -> Self {
        Self {
            workspace,
            store: ManifestStore::new(),
        }
    }

    /// インポートを追加し、書き込んだルートマニフェストを返す
    pub async fn execute(&self, request: ImportRequest) -> Result<Manifest, ImportError> {
        self.workspace.ensure_layout()?;
        let mut lock = WorkspaceLock::open(self.workspace.update_lock_path())?;
        let _guard = lock.acquire()?;

        let name = match request.name {
            Some(name) => name,
            None => project_name_from_remote(&request.remote)
                .ok_or_else(|| ImportError::NoName(request.remote.clone()))?,
        };

        let mut import = RemoteImport::new(name, request.manifest, request.remote);
        if let Some(root) = request.root {
            import = import.with_root(root);
        }
        if let Some(branch) = request.branch {
            import = import.with_branch(branch);
        }
        if let Some(revision) = request.revision {
            import = import.with_revision(revision);
        }

        let path = self.workspace.manifest_path();
        let mut manifest = self
            .store
            .read_manifest_if_exists(&path)
            .await?
            .unwrap_or_default();
        if request.overwrite {
            manifest.imports.clear();
        }
        info!("Adding import of {}:{}", import.name, import.manifest);
        manifest.imports.push(Import::Remote(import));

        self.store.write_manifest(&path, &manifest).await?;
        Ok(manifest)
    }
}

/// リモートの最後のパス要素から`.git`を除いた名前
pub fn project_name_from_remote(remote: &str) -> Option<String> {
    let last = match Url::parse(remote) {
        Ok(url) => url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(str::to_string),
        // scp形式（host:path）やローカルパス
        Err(_) => remote
            .rsplit(|c| c == '/' || c == ':')
            .find(|s| !s.is_empty())
            .map(str::to_string),
    }?;

    let name = last.strip_suffix(".git").unwrap_or(&last);
    (!name.is_empty()).then(|| name.to_string())
}
