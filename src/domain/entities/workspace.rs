use crate::domain::value_objects::target::Target;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// ワークスペースルートを指定する環境変数
pub const ROOT_ENV: &str = "WSYNC_ROOT";

/// 設定されている場合、binディレクトリをPATHに追加しない
pub const PRESERVE_PATH_ENV: &str = "WSYNC_PRESERVE_PATH";

/// ツールバイナリ選択に使うアーキテクチャの上書き
pub const ARCH_ENV: &str = "WSYNC_ARCH";

/// ルートマニフェストのファイル名
pub const ROOT_MANIFEST_FILE: &str = ".wsync_manifest";

/// メタデータディレクトリ名
pub const METADATA_DIR: &str = ".wsync_root";

/// プロジェクトごとのメタデータディレクトリ名
pub const PROJECT_METADATA_DIR: &str = ".wsync";

/// ワークスペースの特定に関するエラー
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("{0} is not set; it must point to the workspace root")]
    RootNotSet(&'static str),

    #[error("Workspace root '{path}' is invalid: {reason}")]
    InvalidRoot { path: PathBuf, reason: String },

    #[error("Failed to prepare workspace directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// wsyncワークスペースのエンティティ
///
/// ルート配下のメタデータレイアウトと、環境変数から得られる実行時の設定を保持する。
#[derive(Debug, Clone)]
pub struct Workspace {
    /// ワークスペースのルートパス（シンボリックリンク解決済みの絶対パス）
    pub root_path: PathBuf,

    /// binディレクトリをPATHに追加しないか
    pub preserve_path: bool,

    /// アーキテクチャの上書き
    pub arch_override: Option<String>,
}

impl Workspace {
    /// 環境変数からワークスペースを特定する
    pub fn from_env() -> Result<Self, WorkspaceError> {
        Self::from_values(
            std::env::var_os(ROOT_ENV),
            std::env::var_os(PRESERVE_PATH_ENV),
            std::env::var_os(ARCH_ENV),
        )
    }

    /// 環境変数の値からワークスペースを特定する
    pub fn from_values(
        root: Option<OsString>,
        preserve_path: Option<OsString>,
        arch: Option<OsString>,
    ) -> Result<Self, WorkspaceError> {
        let root = root
            .filter(|r| !r.is_empty())
            .ok_or(WorkspaceError::RootNotSet(ROOT_ENV))?;

        let mut workspace = Self::open(Path::new(&root))?;
        workspace.preserve_path = preserve_path.is_some_and(|v| !v.is_empty());
        workspace.arch_override = arch
            .and_then(|a| a.into_string().ok())
            .filter(|a| !a.is_empty());
        Ok(workspace)
    }

    /// 指定されたディレクトリをワークスペースルートとして開く
    pub fn open(root: &Path) -> Result<Self, WorkspaceError> {
        if !root.is_absolute() {
            return Err(WorkspaceError::InvalidRoot {
                path: root.to_path_buf(),
                reason: "path is not absolute".to_string(),
            });
        }

        let resolved = root
            .canonicalize()
            .map_err(|e| WorkspaceError::InvalidRoot {
                path: root.to_path_buf(),
                reason: e.to_string(),
            })?;

        if !resolved.is_dir() {
            return Err(WorkspaceError::InvalidRoot {
                path: root.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }

        Ok(Self {
            root_path: resolved,
            preserve_path: false,
            arch_override: None,
        })
    }

    /// アーキテクチャの上書きを設定
    pub fn with_arch_override(mut self, arch: impl Into<String>) -> Self {
        self.arch_override = Some(arch.into());
        self
    }

    /// PATHの保持を設定
    pub fn with_preserve_path(mut self, preserve: bool) -> Self {
        self.preserve_path = preserve;
        self
    }

    /// ルートマニフェストのパスを取得
    pub fn manifest_path(&self) -> PathBuf {
        self.root_path.join(ROOT_MANIFEST_FILE)
    }

    /// メタデータディレクトリのパスを取得
    pub fn metadata_dir(&self) -> PathBuf {
        self.root_path.join(METADATA_DIR)
    }

    /// ツールバイナリのディレクトリ
    pub fn bin_dir(&self) -> PathBuf {
        self.metadata_dir().join("bin")
    }

    /// ツールデータのディレクトリ
    pub fn data_dir(&self) -> PathBuf {
        self.metadata_dir().join("data")
    }

    /// 更新履歴のディレクトリ
    pub fn history_dir(&self) -> PathBuf {
        self.metadata_dir().join("update_history")
    }

    /// プロファイルのインストール先ルート
    pub fn profiles_dir(&self) -> PathBuf {
        self.metadata_dir().join("profiles")
    }

    /// プロファイルマニフェストのパス
    pub fn profile_manifest_path(&self) -> PathBuf {
        self.metadata_dir().join("profile_manifest.yaml")
    }

    /// 設定ファイルのパス
    pub fn config_path(&self) -> PathBuf {
        self.metadata_dir().join("config.yaml")
    }

    /// update/importを直列化するロックファイル
    pub fn update_lock_path(&self) -> PathBuf {
        self.metadata_dir().join("update.lock")
    }

    /// プロファイル操作を直列化するロックファイル
    pub fn profiles_lock_path(&self) -> PathBuf {
        self.metadata_dir().join("profiles.lock")
    }

    /// ワークスペース相対パスを絶対パスに変換
    pub fn project_path(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root_path.clone(), |acc, part| acc.join(part))
    }

    /// メタデータディレクトリ一式を作成する
    pub fn ensure_layout(&self) -> Result<(), WorkspaceError> {
        for dir in [
            self.metadata_dir(),
            self.bin_dir(),
            self.data_dir(),
            self.history_dir(),
            self.profiles_dir(),
        ] {
            std::fs::create_dir_all(&dir).map_err(|source| WorkspaceError::Io {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// 子プロセスに渡すPATHを計算する
    ///
    /// `preserve_path`が有効な場合は`None`（現在のPATHをそのまま使う）。
    pub fn search_path(&self, current: Option<&OsStr>) -> Option<OsString> {
        if self.preserve_path {
            return None;
        }

        let mut paths = vec![self.bin_dir()];
        if let Some(current) = current {
            paths.extend(std::env::split_paths(current));
        }
        std::env::join_paths(paths).ok()
    }

    /// ツールの実行ファイルを探す
    ///
    /// `bin/<arch>/<tool>`が存在すればそれを、なければ`bin/<tool>`を返す。
    pub fn tool_binary(&self, tool: &str) -> PathBuf {
        let arch = self.host_target().arch;
        let arch_specific = self.bin_dir().join(arch).join(tool);
        if arch_specific.exists() {
            arch_specific
        } else {
            self.bin_dir().join(tool)
        }
    }

    /// 実行中のホストを表すTarget
    pub fn host_target(&self) -> Target {
        Target::host(self.arch_override.as_deref())
    }
}
