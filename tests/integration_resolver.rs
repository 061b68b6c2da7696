//! インポート解決の統合テスト
//!
//! ディスク上のマニフェストとフェイクVCSの提供プロジェクトから統合マニフェストを作る。

mod common;

use common::fixtures::{remote_import_manifest, PUBLIC_MANIFEST};
use common::{FakeVcs, TestWorkspace};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use wsync::application::services::import_resolver::{ImportResolver, ResolveError};
use wsync::application::services::manifest_source::WorkspaceManifestSource;
use wsync::domain::entities::universe::Universe;

const MANIFEST_REMOTE: &str = "https://example.com/manifest.git";

async fn resolve(ws: &TestWorkspace, vcs: &Arc<FakeVcs>) -> Result<Universe, ResolveError> {
    let source = Arc::new(WorkspaceManifestSource::new(ws.root(), vcs.clone()));
    ImportResolver::new(source)
        .resolve(&ws.workspace.manifest_path())
        .await
}

#[tokio::test]
async fn test_resolution_is_byte_for_byte_deterministic() {
    let ws = TestWorkspace::new();
    let vcs = Arc::new(
        FakeVcs::new().with_remote_files(MANIFEST_REMOTE, &[("public", PUBLIC_MANIFEST)]),
    );
    ws.write_manifest(&remote_import_manifest(MANIFEST_REMOTE, ""));

    let first = resolve(&ws, &vcs).await.unwrap().to_yaml().unwrap();
    let second = resolve(&ws, &vcs).await.unwrap().to_yaml().unwrap();

    assert_eq!(first, second);
    assert_eq!(
        vcs.mutations(),
        vec![format!("clone {}", MANIFEST_REMOTE)],
        "the provider is cloned once and reused"
    );
}

#[tokio::test]
async fn test_later_file_import_wins_and_own_declarations_win_over_imports() {
    let ws = TestWorkspace::new();
    let vcs = Arc::new(FakeVcs::new());
    ws.write_file(
        "manifests/first",
        "projects:\n  - {name: lib, path: lib, remote: R-first}\n  - {name: app, path: app, remote: R-app-first}\n",
    );
    ws.write_file(
        "manifests/second",
        "projects:\n  - {name: lib, path: lib, remote: R-second}\n",
    );
    ws.write_manifest(
        r#"
imports:
  - {type: file, file: manifests/first}
  - {type: file, file: manifests/second}
projects:
  - {name: app, path: app, remote: R-app-root}
"#,
    );

    let universe = resolve(&ws, &vcs).await.unwrap();

    assert_eq!(universe.projects["lib"].remote, "R-second");
    assert_eq!(universe.projects["app"].remote, "R-app-root");
    assert!(vcs.mutations().is_empty());
}

#[tokio::test]
async fn test_host_relative_remotes_are_resolved() {
    let ws = TestWorkspace::new();
    let vcs = Arc::new(FakeVcs::new());
    ws.write_manifest(
        r#"
hosts:
  - {name: review, location: "https://review.example.com"}
projects:
  - {name: app, path: app, remote: team/app, host: review}
"#,
    );

    let universe = resolve(&ws, &vcs).await.unwrap();

    assert_eq!(
        universe.projects["app"].remote,
        "https://review.example.com/team/app"
    );
    assert_eq!(universe.projects["app"].host, None);
}

#[tokio::test]
async fn test_file_import_cycle_is_reported() {
    let ws = TestWorkspace::new();
    let vcs = Arc::new(FakeVcs::new());
    ws.write_file("a/manifest", "imports:\n  - {type: file, file: ../b/manifest}\n");
    ws.write_file("b/manifest", "imports:\n  - {type: file, file: ../a/manifest}\n");
    ws.write_manifest("imports:\n  - {type: file, file: a/manifest}\n");

    let err = resolve(&ws, &vcs).await.unwrap_err();

    assert!(matches!(err, ResolveError::Cycle { .. }));
    let message = err.to_string();
    assert!(message.contains("a/manifest"), "{}", message);
    assert!(message.contains("b/manifest"), "{}", message);
}

#[tokio::test]
async fn test_unknown_host_is_a_configuration_error() {
    let ws = TestWorkspace::new();
    let vcs = Arc::new(FakeVcs::new());
    ws.write_manifest("projects:\n  - {name: app, path: app, remote: team/app, host: nowhere}\n");

    let err = resolve(&ws, &vcs).await.unwrap_err();

    assert!(matches!(err, ResolveError::Universe(_)));
    assert!(err.to_string().contains("nowhere"));
}
