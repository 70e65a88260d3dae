//! Unit tests for `application::services::filter`.

#![allow(clippy::expect_used)]

use regex::Regex;
use serde_json::json;

use sal_agent::application::services::checkin::Aggregator;
use sal_agent::application::services::filter::{
    remove_blacklisted_messages, remove_skipped_facts, sanitize_submission,
};
use sal_agent::domain::submission::SubmissionDocument;

use crate::mocks::MemoryStore;

fn store_with(value: serde_json::Value) -> MemoryStore {
    let doc: SubmissionDocument = serde_json::from_value(value).expect("document");
    MemoryStore::with_doc(doc)
}

fn patterns(raw: &[&str]) -> Vec<Regex> {
    raw.iter().map(|p| Regex::new(p).expect("regex")).collect()
}

#[tokio::test]
async fn test_blacklisted_message_removed_and_saved() {
    let store = store_with(json!({"mod1": {"messages": [{"text": "secret leak"}]}}));
    let agg = Aggregator::new(&store);

    let saved = remove_blacklisted_messages(&agg, &patterns(&["secret"]))
        .await
        .expect("filter");

    assert!(saved);
    assert_eq!(store.saves(), 1);
    assert_eq!(store.doc().get("mod1"), Some(&json!({"messages": []})));
}

#[tokio::test]
async fn test_no_match_does_not_save() {
    let store = store_with(json!({"mod1": {"messages": [{"text": "secret leak"}]}}));
    let agg = Aggregator::new(&store);

    let saved = remove_blacklisted_messages(&agg, &patterns(&["zzz"]))
        .await
        .expect("filter");

    assert!(!saved);
    assert_eq!(store.saves(), 0);
}

#[tokio::test]
async fn test_blacklist_leaves_list_sections_alone() {
    let store = store_with(json!({"plugin_results": [{"text": "secret"}]}));
    let agg = Aggregator::new(&store);

    remove_blacklisted_messages(&agg, &patterns(&["secret"]))
        .await
        .expect("filter");

    assert_eq!(store.doc().get("plugin_results"), Some(&json!([{"text": "secret"}])));
}

#[tokio::test]
async fn test_skipped_facts_removed_and_second_pass_is_noop() {
    let store = store_with(json!({
        "Machine": {"facts": {"serial": "C02X", "os": "14.5"}},
        "Munki": {"facts": {"serial": "C02X"}},
    }));
    let agg = Aggregator::new(&store);
    let skip = vec!["serial".to_string()];

    assert!(remove_skipped_facts(&agg, &skip).await.expect("first"));
    assert!(!remove_skipped_facts(&agg, &skip).await.expect("second"));

    assert_eq!(store.saves(), 1);
    assert_eq!(store.doc().get("Machine"), Some(&json!({"facts": {"os": "14.5"}})));
}

#[tokio::test]
async fn test_sanitize_strips_nul_and_saves_once() {
    let store = store_with(json!({"m": {"facts": {"name": "bad\u{0}value"}}}));
    let agg = Aggregator::new(&store);

    assert!(sanitize_submission(&agg).await.expect("first"));
    assert!(!sanitize_submission(&agg).await.expect("second"));

    assert_eq!(store.saves(), 1);
    assert_eq!(store.doc().get("m"), Some(&json!({"facts": {"name": "badvalue"}})));
}

#[tokio::test]
async fn test_empty_configuration_never_loads_or_saves() {
    let store = store_with(json!({"m": {"messages": [{"text": "x"}], "facts": {"a": 1}}}));
    let agg = Aggregator::new(&store);

    assert!(!remove_blacklisted_messages(&agg, &[]).await.expect("blacklist"));
    assert!(!remove_skipped_facts(&agg, &[]).await.expect("facts"));

    assert_eq!(store.saves(), 0);
}
