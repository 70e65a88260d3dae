//! Unit tests for the checkin `Aggregator`.

#![allow(clippy::expect_used)]

use serde_json::json;
use tempfile::TempDir;

use sal_agent::application::services::checkin::Aggregator;
use sal_agent::domain::submission::SubmissionDocument;
use sal_agent::infra::fs::LocalFs;

use crate::helpers::{err_output, ok_output, write_file};
use crate::mocks::{MemoryStore, RecordingRunner};

#[tokio::test]
async fn test_set_persists_every_mutation() {
    let store = MemoryStore::default();
    let agg = Aggregator::new(&store);

    agg.set("Machine", json!({"facts": {"a": 1}})).await.expect("set");
    agg.set("Munki", json!({"facts": {}})).await.expect("set");

    assert_eq!(store.saves(), 2);
    let doc = store.doc();
    assert_eq!(doc.get("Machine"), Some(&json!({"facts": {"a": 1}})));
    assert!(doc.get("Munki").is_some());
}

#[tokio::test]
async fn test_set_keeps_sections_written_by_others() {
    let mut existing = SubmissionDocument::new();
    existing.set("External", json!({"facts": {"x": true}}));
    let store = MemoryStore::with_doc(existing);
    let agg = Aggregator::new(&store);

    agg.set("Sal", json!({})).await.expect("set");

    let doc = store.doc();
    assert!(doc.get("External").is_some());
    assert!(doc.get("Sal").is_some());
}

#[tokio::test]
async fn test_clear_empties_store() {
    let mut existing = SubmissionDocument::new();
    existing.set("Machine", json!({}));
    let store = MemoryStore::with_doc(existing);

    Aggregator::new(&store).clear().await.expect("clear");

    assert!(store.doc().is_empty());
    assert_eq!(store.clears(), 1);
}

#[tokio::test]
async fn test_run_merges_sections_named_in_module_output() {
    let dir = TempDir::new().expect("tempdir");
    write_file(&dir.path().join("machine_checkin.py"), b"");
    write_file(&dir.path().join("munki_checkin.py"), b"");
    let runner = RecordingRunner::new();
    runner.on(
        "machine_checkin.py",
        ok_output(br#"{"Machine": {"extra_data": {"serial": "C02X"}}, "Extra": [1]}"#),
    );
    runner.on("munki_checkin.py", ok_output(b"not json"));
    let store = MemoryStore::default();

    let statuses = Aggregator::new(&store)
        .run(&runner, &LocalFs, dir.path())
        .await;

    assert_eq!(runner.ran(), ["machine_checkin.py", "munki_checkin.py"]);
    assert!(runner.calls().iter().all(|(_, args)| args.is_empty()));
    assert_eq!(statuses.len(), 2);
    assert!(statuses.iter().all(|s| s.ends_with("ran successfully")));
    let doc = store.doc();
    assert_eq!(doc.serial(), Some("C02X"));
    assert_eq!(doc.get("Extra"), Some(&json!([1])));
    assert!(doc.get("machine_checkin").is_none());
    assert!(doc.get("munki_checkin").is_none());
    assert_eq!(store.saves(), 1);
}

#[tokio::test]
async fn test_run_reports_failures_and_continues() {
    let dir = TempDir::new().expect("tempdir");
    write_file(&dir.path().join("a_broken"), b"");
    write_file(&dir.path().join("b_missing"), b"");
    write_file(&dir.path().join("c_fine"), b"");
    let runner = RecordingRunner::new();
    runner.on("a_broken", err_output(2, b"Traceback"));
    runner.fail_spawn("b_missing");
    runner.on("c_fine", ok_output(br#"{"Fine": {"facts": {}}}"#));
    let store = MemoryStore::default();

    let statuses = Aggregator::new(&store)
        .run(&runner, &LocalFs, dir.path())
        .await;

    assert!(statuses[0].contains("had errors during execution"));
    assert!(statuses[1].contains("had errors during execution"));
    assert!(statuses[2].ends_with("ran successfully"));
    assert_eq!(store.doc().get("Fine"), Some(&json!({"facts": {}})));
}

#[tokio::test]
async fn test_run_skips_pycache_and_directories() {
    let dir = TempDir::new().expect("tempdir");
    write_file(&dir.path().join("__pycache__").join("x.pyc"), b"");
    write_file(&dir.path().join("nested").join("inner"), b"");
    write_file(&dir.path().join("module"), b"");
    let runner = RecordingRunner::new();

    let statuses = Aggregator::new(&MemoryStore::default())
        .run(&runner, &LocalFs, dir.path())
        .await;

    assert_eq!(runner.ran(), ["module"]);
    assert_eq!(statuses.len(), 1);
}

#[cfg(unix)]
#[tokio::test]
async fn test_run_refuses_world_writable_module() {
    let dir = TempDir::new().expect("tempdir");
    let module = dir.path().join("tampered");
    write_file(&module, b"");
    crate::helpers::set_mode(&module, 0o777);
    let runner = RecordingRunner::new();

    let statuses = Aggregator::new(&MemoryStore::default())
        .run(&runner, &LocalFs, dir.path())
        .await;

    assert!(runner.calls().is_empty());
    assert!(statuses[0].contains("bad permissions"));
}

#[tokio::test]
async fn test_run_missing_module_dir_is_empty() {
    let dir = TempDir::new().expect("tempdir");
    let statuses = Aggregator::new(&MemoryStore::default())
        .run(&RecordingRunner::new(), &LocalFs, &dir.path().join("absent"))
        .await;
    assert!(statuses.is_empty());
}
