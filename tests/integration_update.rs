//! ワークスペース更新の統合テスト
//!
//! 解決・同期・履歴の記録を通しで実行する。

mod common;

use common::fixtures::{
    remote_import_manifest, LIB_ONLY_MANIFEST, PUBLIC_MANIFEST, SINGLE_PROJECT_MANIFEST,
    TOOLS_AND_LIB_MANIFEST,
};
use common::{FakeVcs, TestWorkspace};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use wsync::application::use_cases::update_workspace::{
    SnapshotSource, UpdateError, UpdateOptions, UpdateResult, UpdateWorkspaceUseCase,
};
use wsync::infrastructure::filesystem::{HistoryPointer, HistoryStore};

const MANIFEST_REMOTE: &str = "https://example.com/manifest.git";

async fn update(
    ws: &TestWorkspace,
    vcs: &Arc<FakeVcs>,
    options: UpdateOptions,
) -> Result<UpdateResult, UpdateError> {
    UpdateWorkspaceUseCase::new(ws.workspace.clone(), vcs.clone())
        .with_options(options.with_jobs(4))
        .execute()
        .await
}

fn history(ws: &TestWorkspace) -> HistoryStore {
    HistoryStore::new(ws.workspace.history_dir())
}

#[tokio::test]
async fn test_history_pointers_rotate_on_every_update() {
    let ws = TestWorkspace::new();
    let vcs = Arc::new(FakeVcs::new());
    let mut previous_latest = None;

    for manifest in [SINGLE_PROJECT_MANIFEST, TOOLS_AND_LIB_MANIFEST, LIB_ONLY_MANIFEST] {
        ws.write_manifest(manifest);
        let result = update(&ws, &vcs, UpdateOptions::default()).await.unwrap();

        let latest = history(&ws).latest().unwrap().unwrap();
        assert_eq!(latest, result.entry);

        if let Some(previous) = previous_latest.take() {
            let second = history(&ws).second_latest().unwrap().unwrap();
            assert_eq!(second, previous);
            assert!(latest.timestamp > second.timestamp);
        }
        previous_latest = Some(latest);
    }
}

#[tokio::test]
async fn test_failed_update_records_no_history() {
    let ws = TestWorkspace::new();
    let vcs = Arc::new(FakeVcs::new());
    ws.write_manifest(SINGLE_PROJECT_MANIFEST);
    update(&ws, &vcs, UpdateOptions::default()).await.unwrap();
    let before = history(&ws).latest().unwrap();

    ws.write_manifest(TOOLS_AND_LIB_MANIFEST);
    vcs.fail_remote("R2", 2);
    let err = update(&ws, &vcs, UpdateOptions::default()).await.unwrap_err();

    assert!(matches!(err, UpdateError::Sync(_)));
    assert_eq!(history(&ws).latest().unwrap(), before);
    assert!(history(&ws).second_latest().unwrap().is_none());
}

#[tokio::test]
async fn test_invalid_manifest_records_no_history() {
    let ws = TestWorkspace::new();
    let vcs = Arc::new(FakeVcs::new());
    ws.write_manifest("projects:\n  - {name: a, path: ../escape, remote: R}\n");

    let err = update(&ws, &vcs, UpdateOptions::default()).await.unwrap_err();

    assert!(matches!(err, UpdateError::Resolve(_)));
    assert!(history(&ws).latest().unwrap().is_none());
    assert!(vcs.mutations().is_empty());
}

#[tokio::test]
async fn test_snapshot_rolls_back_to_previous_universe() {
    let ws = TestWorkspace::new();
    let vcs = Arc::new(FakeVcs::new());
    ws.write_manifest(SINGLE_PROJECT_MANIFEST);
    let first = update(&ws, &vcs, UpdateOptions::default()).await.unwrap();
    ws.write_manifest(TOOLS_AND_LIB_MANIFEST);
    update(&ws, &vcs, UpdateOptions::default()).await.unwrap();
    assert!(ws.path("lib").is_dir());

    let options = UpdateOptions::default()
        .with_gc(true)
        .with_snapshot(Some(SnapshotSource::History(HistoryPointer::SecondLatest)));
    let result = update(&ws, &vcs, options).await.unwrap();

    assert_eq!(result.report.removed, vec!["lib".to_string()]);
    assert!(!ws.path("lib").exists());
    assert!(ws.path("tools").is_dir());
    assert_eq!(result.entry.universe, first.entry.universe);
}

#[tokio::test]
async fn test_snapshot_from_file() {
    let ws = TestWorkspace::new();
    let vcs = Arc::new(FakeVcs::new());
    ws.write_manifest(SINGLE_PROJECT_MANIFEST);
    let first = update(&ws, &vcs, UpdateOptions::default()).await.unwrap();

    let snapshot = ws.root().join("snapshot.yaml");
    std::fs::write(&snapshot, serde_yaml::to_string(&first.entry).unwrap()).unwrap();
    ws.write_manifest(LIB_ONLY_MANIFEST);

    let options = UpdateOptions::default().with_snapshot(Some(SnapshotSource::File(snapshot)));
    let result = update(&ws, &vcs, options).await.unwrap();

    assert_eq!(result.entry.universe, first.entry.universe);
    assert!(!ws.path("lib").exists());
}

#[tokio::test]
async fn test_remote_import_is_cloned_and_mounted() {
    let ws = TestWorkspace::new();
    let vcs = Arc::new(
        FakeVcs::new().with_remote_files(MANIFEST_REMOTE, &[("public", PUBLIC_MANIFEST)]),
    );
    ws.write_manifest(&remote_import_manifest(MANIFEST_REMOTE, "third_party"));

    let result = update(&ws, &vcs, UpdateOptions::default()).await.unwrap();
    let universe = &result.entry.universe;

    let paths: Vec<(&str, &str)> = universe
        .projects
        .values()
        .map(|p| (p.name.as_str(), p.path.as_str()))
        .collect();
    assert_eq!(
        paths,
        vec![
            ("core", "third_party/core"),
            ("local", "local"),
            ("manifest", "third_party/manifest"),
        ]
    );
    assert!(universe.hosts.contains_key("review"));
    assert!(ws.path("third_party/core").join(".git").is_dir());
    assert!(ws.path("third_party/manifest/public").is_file());

    // a converged workspace issues no mutating calls
    vcs.clear();
    let again = update(&ws, &vcs, UpdateOptions::default()).await.unwrap();
    assert!(vcs.mutations().is_empty(), "unexpected calls: {:?}", vcs.mutations());
    assert_eq!(again.entry.universe, result.entry.universe);
}

#[tokio::test]
async fn test_missing_snapshot_is_an_error() {
    let ws = TestWorkspace::new();
    let vcs = Arc::new(FakeVcs::new());
    ws.write_manifest(SINGLE_PROJECT_MANIFEST);

    let options = UpdateOptions::default()
        .with_snapshot(Some(SnapshotSource::History(HistoryPointer::Latest)));
    let err = update(&ws, &vcs, options).await.unwrap_err();

    assert!(matches!(err, UpdateError::History(_)));
    assert!(vcs.mutations().is_empty());
}
