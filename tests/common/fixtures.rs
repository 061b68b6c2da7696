//! テスト用のワークスペースとマニフェスト

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wsync::domain::entities::workspace::Workspace;

/// 一時ディレクトリ上のワークスペース
pub struct TestWorkspace {
    _temp_dir: TempDir,
    pub workspace: Workspace,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let workspace = Workspace::open(temp_dir.path()).unwrap();
        workspace.ensure_layout().unwrap();
        Self {
            _temp_dir: temp_dir,
            workspace,
        }
    }

    pub fn root(&self) -> &Path {
        &self.workspace.root_path
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.workspace.project_path(relative)
    }

    /// ルートマニフェストを書き込む
    pub fn write_manifest(&self, content: &str) {
        std::fs::write(self.workspace.manifest_path(), content).unwrap();
    }

    /// ワークスペース内に任意のファイルを書き込む
    pub fn write_file(&self, relative: &str, content: &str) {
        let path = self.path(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
}

/// toolsプロジェクト1つだけのマニフェスト
pub const SINGLE_PROJECT_MANIFEST: &str = r#"
projects:
  - name: tools
    path: tools
    remote: R1
"#;

/// toolsとlibを宣言し、toolsがツールを提供するマニフェスト
pub const TOOLS_AND_LIB_MANIFEST: &str = r#"
projects:
  - name: tools
    path: tools
    remote: R1
  - name: lib
    path: lib
    remote: R2
    branch: main
tools:
  - name: fmt
    project: tools
    data: fmt-data
"#;

/// libだけを宣言するマニフェスト
pub const LIB_ONLY_MANIFEST: &str = r#"
projects:
  - name: lib
    path: lib
    remote: R2
    branch: main
"#;

/// 提供プロジェクトをインポートするルートマニフェスト
pub fn remote_import_manifest(remote: &str, root: &str) -> String {
    format!(
        r#"
imports:
  - type: remote
    name: manifest
    manifest: public
    remote: {remote}
    root: "{root}"
projects:
  - name: local
    path: local
    remote: R-local
"#
    )
}

/// 提供プロジェクトが公開するマニフェスト
pub const PUBLIC_MANIFEST: &str = r#"
projects:
  - name: core
    path: core
    remote: R-core
hosts:
  - name: review
    location: https://review.example.com
"#;
