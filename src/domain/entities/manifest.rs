use crate::domain::value_objects::relative_path::{self, RelativePathError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// マニフェスト文書関連のエラー
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to parse manifest {path}: {source}{excerpt}")]
    Parse {
        path: PathBuf,
        excerpt: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to serialize manifest: {0}")]
    Serialize(#[source] serde_yaml::Error),

    #[error("Invalid {kind} in manifest {path}: {message}")]
    Invalid {
        path: PathBuf,
        kind: &'static str,
        message: String,
    },
}

impl ManifestError {
    fn invalid(path: &Path, kind: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            path: path.to_path_buf(),
            kind,
            message: message.into(),
        }
    }
}

/// 別のマニフェストへの参照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Import {
    /// リモートのマニフェスト提供プロジェクト内にあるマニフェスト
    Remote(RemoteImport),
    /// チェックアウト済みの提供プロジェクト内の相対パス
    File(FileImport),
}

/// リモートインポート
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteImport {
    /// マニフェスト提供プロジェクトの名前
    pub name: String,

    /// 提供プロジェクト内のマニフェストファイルのパス
    pub manifest: String,

    /// 提供プロジェクトのリモートURL
    pub remote: String,

    /// インポートされる全プロジェクトのマウントルート
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub root: String,

    /// 提供プロジェクトのブランチ（オプション）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    /// 提供プロジェクトのリビジョン（オプション）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

impl RemoteImport {
    /// 新しいRemoteImportインスタンスを作成
    pub fn new(
        name: impl Into<String>,
        manifest: impl Into<String>,
        remote: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            manifest: manifest.into(),
            remote: remote.into(),
            root: String::new(),
            branch: None,
            revision: None,
        }
    }

    /// マウントルートを設定
    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = root.into();
        self
    }

    /// ブランチを設定
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// リビジョンを設定
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    /// 親のマウントルートの下に置いた提供プロジェクトを作成
    pub fn provider_project(&self, parent_root: &str) -> Result<Project, RelativePathError> {
        let root = relative_path::join(parent_root, &self.root)?;
        let path = relative_path::join(&root, &self.name)?;
        Ok(Project {
            name: self.name.clone(),
            path,
            remote: self.remote.clone(),
            revision: self.revision.clone(),
            branch: self.branch.clone(),
            host: None,
        })
    }
}

/// ファイルインポート
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileImport {
    /// インポート元マニフェストのディレクトリからの相対パス
    pub file: String,
}

/// 管理対象のプロジェクト（1つのチェックアウト）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// 一意なプロジェクト名
    pub name: String,

    /// ワークスペースルートからの相対パス
    pub path: String,

    /// リモートURL（hostが指定されている場合はホストからの相対パス）
    pub remote: String,

    /// 固定リビジョン（オプション）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,

    /// 追跡ブランチ（オプション）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    /// リモートの基準となるホスト名（オプション）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl Project {
    /// 新しいProjectインスタンスを作成
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        remote: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            remote: remote.into(),
            revision: None,
            branch: None,
            host: None,
        }
    }

    /// リビジョンを設定
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    /// ブランチを設定
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// ホストを設定
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// 固定リビジョンもブランチも持たないか
    pub fn is_unpinned(&self) -> bool {
        self.revision.is_none() && self.branch.is_none()
    }
}

/// リモートの名前付きエイリアス
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    /// ホスト名
    pub name: String,

    /// ホストのURL
    pub location: String,
}

impl Host {
    /// 新しいHostインスタンスを作成
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
        }
    }
}

/// ツールと、それをビルドするプロジェクトの対応
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tool {
    /// ツール名（実行ファイル名）
    pub name: String,

    /// ツールを提供するプロジェクトの名前
    pub project: String,

    /// ツール専用のデータディレクトリ（オプション）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl Tool {
    /// 新しいToolインスタンスを作成
    pub fn new(name: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            project: project.into(),
            data: None,
        }
    }

    /// データディレクトリを設定
    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }
}

/// マニフェスト文書
///
/// インポートは宣言順に処理され、その後に文書自身のプロジェクト・ホスト・ツールが
/// 適用される。同じキーの宣言は後のものが優先される。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// インポートのリスト（宣言順）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<Import>,

    /// プロジェクトのリスト
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub projects: Vec<Project>,

    /// ホストのリスト
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<Host>,

    /// ツールのリスト
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
}

impl Manifest {
    /// 空のManifestを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// インポートを追加
    pub fn with_import(mut self, import: Import) -> Self {
        self.imports.push(import);
        self
    }

    /// プロジェクトを追加
    pub fn with_project(mut self, project: Project) -> Self {
        self.projects.push(project);
        self
    }

    /// ホストを追加
    pub fn with_host(mut self, host: Host) -> Self {
        self.hosts.push(host);
        self
    }

    /// ツールを追加
    pub fn with_tool(mut self, tool: Tool) -> Self {
        self.tools.push(tool);
        self
    }

    /// YAML文字列を解析して検証する
    ///
    /// `origin`はエラー報告にのみ使用する。
    pub fn parse(content: &str, origin: &Path) -> Result<Self, ManifestError> {
        let manifest: Manifest = if content.trim().is_empty() {
            Manifest::default()
        } else {
            serde_yaml::from_str(content).map_err(|source| ManifestError::Parse {
                path: origin.to_path_buf(),
                excerpt: offending_line(content, &source),
                source,
            })?
        };

        manifest.validate(origin)?;
        Ok(manifest)
    }

    /// YAML文字列にシリアライズする
    pub fn to_yaml(&self) -> Result<String, ManifestError> {
        serde_yaml::to_string(self).map_err(ManifestError::Serialize)
    }

    /// 各宣言の必須フィールドとパスを検証する
    pub fn validate(&self, origin: &Path) -> Result<(), ManifestError> {
        for import in &self.imports {
            match import {
                Import::Remote(remote) => {
                    require(origin, "import", "name", &remote.name)?;
                    require(origin, "import", "manifest", &remote.manifest)?;
                    require(origin, "import", "remote", &remote.remote)?;
                    relative_path::normalize(&remote.root).map_err(|e| {
                        ManifestError::invalid(origin, "import", format!("{}: {}", remote.name, e))
                    })?;
                    relative_path::normalize_non_empty(&remote.manifest).map_err(|e| {
                        ManifestError::invalid(origin, "import", format!("{}: {}", remote.name, e))
                    })?;
                }
                Import::File(file) => {
                    require(origin, "file import", "file", &file.file)?;
                }
            }
        }

        for project in &self.projects {
            require(origin, "project", "name", &project.name)?;
            require(origin, "project", "remote", &project.remote)?;
            relative_path::normalize_non_empty(&project.path).map_err(|e| {
                ManifestError::invalid(origin, "project", format!("{}: {}", project.name, e))
            })?;
        }

        for host in &self.hosts {
            require(origin, "host", "name", &host.name)?;
            require(origin, "host", "location", &host.location)?;
            url::Url::parse(&host.location).map_err(|e| {
                ManifestError::invalid(
                    origin,
                    "host",
                    format!("{}: invalid location '{}': {}", host.name, host.location, e),
                )
            })?;
        }

        for tool in &self.tools {
            require(origin, "tool", "name", &tool.name)?;
            require(origin, "tool", "project", &tool.project)?;
            if let Some(data) = &tool.data {
                relative_path::normalize_non_empty(data).map_err(|e| {
                    ManifestError::invalid(origin, "tool", format!("{}: {}", tool.name, e))
                })?;
            }
        }

        Ok(())
    }
}

fn require(
    origin: &Path,
    kind: &'static str,
    field: &str,
    value: &str,
) -> Result<(), ManifestError> {
    if value.trim().is_empty() {
        return Err(ManifestError::invalid(
            origin,
            kind,
            format!("missing required field '{}'", field),
        ));
    }
    Ok(())
}

fn offending_line(content: &str, error: &serde_yaml::Error) -> String {
    error
        .location()
        .and_then(|loc| {
            content
                .lines()
                .nth(loc.line().saturating_sub(1))
                .map(|line| format!("\n  --> line {}: {}", loc.line(), line.trim_end()))
        })
        .unwrap_or_default()
}
