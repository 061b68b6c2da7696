use super::manifest::Project;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// チェックアウトに記録されるプロジェクトのメタデータ
///
/// 最後に収束した時点の宣言とHEADリビジョンを保持する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    /// 収束した時点の宣言
    pub project: Project,

    /// 収束後に観測したHEADリビジョン
    pub revision: String,
}

impl ProjectMetadata {
    /// 新しいProjectMetadataインスタンスを作成
    pub fn new(project: Project, revision: impl Into<String>) -> Self {
        Self {
            project,
            revision: revision.into(),
        }
    }
}

/// ディスク上で発見されたプロジェクト
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalProject {
    /// ワークスペース相対パス
    pub path: String,

    /// 絶対パス
    pub abs_path: PathBuf,

    /// 記録されているメタデータ
    pub metadata: ProjectMetadata,
}

impl LocalProject {
    /// プロジェクト名
    pub fn name(&self) -> &str {
        &self.metadata.project.name
    }
}

