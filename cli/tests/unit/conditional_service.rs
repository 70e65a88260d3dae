//! Unit tests for `application::services::conditional`.

#![allow(clippy::expect_used)]

use std::io::Read;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tempfile::TempDir;

use sal_agent::application::services::conditional::{
    MachineIdentity, send_catalogs, send_inventory, send_profiles,
};
use sal_agent::domain::artifact::{
    ArtifactOutcome, CatalogHash, decode_catalog_hashes, encode_catalog_hashes,
};
use sal_agent::domain::checksum::sha256_bytes;
use sal_agent::infra::fs::LocalFs;

use crate::helpers::write_file;
use crate::mocks::{FakeServer, MockHasher};

const ID: MachineIdentity<'static> = MachineIdentity {
    serial: "C02X",
    key: "bu-key",
};

fn decode_body(encoded: &str) -> Vec<u8> {
    let compressed = STANDARD.decode(encoded).expect("base64");
    let mut out = Vec::new();
    bzip2::read::BzDecoder::new(compressed.as_slice())
        .read_to_end(&mut out)
        .expect("bzip2");
    out
}

// ── inventory / profiles ─────────────────────────────────────────────────────

#[test]
fn test_equal_hash_submits_nothing() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("inventory.plist");
    write_file(&path, b"inventory");
    let server = FakeServer::new();
    server.respond("GET", "inventory/hash/C02X", 200, format!("{}\n", sha256_bytes(b"inventory")));

    let outcome = send_inventory(&server, &LocalFs, &LocalFs, &path, ID);

    assert_eq!(outcome, ArtifactOutcome::UpToDate);
    assert!(server.requests_to("inventory/submit").is_empty());
}

#[test]
fn test_unknown_artifact_is_submitted_encoded() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("inventory.plist");
    write_file(&path, b"<plist>apps</plist>");
    let server = FakeServer::new();
    server.respond("GET", "inventory/hash/C02X", 404, "");
    server.respond("POST", "inventory/submit", 200, "");

    let outcome = send_inventory(&server, &LocalFs, &LocalFs, &path, ID);

    assert_eq!(outcome, ArtifactOutcome::Submitted);
    let submits = server.requests_to("inventory/submit");
    assert_eq!(submits.len(), 1);
    let form = &submits[0];
    assert_eq!(form.field("serial"), Some("C02X"));
    assert_eq!(form.field("key"), Some("bu-key"));
    let expected_hash = sha256_bytes(b"<plist>apps</plist>");
    assert_eq!(form.field("sha256hash"), Some(expected_hash.as_str()));
    let body = form.field("base64bz2inventory").expect("body field");
    assert_eq!(decode_body(body), b"<plist>apps</plist>");
}

#[test]
fn test_stale_profiles_are_submitted() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("profiles.plist");
    write_file(&path, b"profiles v2");
    let server = FakeServer::new();
    server.respond("GET", "profiles/hash/C02X", 200, sha256_bytes(b"profiles v1"));
    server.respond("POST", "profiles/submit", 200, "");

    let outcome = send_profiles(&server, &LocalFs, &LocalFs, &path, ID);

    assert_eq!(outcome, ArtifactOutcome::Submitted);
    let submits = server.requests_to("profiles/submit");
    assert!(submits[0].field("base64bz2profiles").is_some());
}

#[test]
fn test_hash_query_failure_skips_without_submitting() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("inventory.plist");
    write_file(&path, b"inventory");

    for status in [None, Some(500)] {
        let server = FakeServer::new();
        match status {
            Some(code) => server.respond("GET", "inventory/hash/C02X", code, ""),
            None => server.unreachable("GET", "inventory/hash/C02X"),
        }

        let outcome = send_inventory(&server, &LocalFs, &LocalFs, &path, ID);

        assert!(matches!(outcome, ArtifactOutcome::Skipped(_)), "{status:?}: {outcome:?}");
        assert!(server.requests_to("inventory/submit").is_empty());
    }
}

#[test]
fn test_rejected_submission_is_failed() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("inventory.plist");
    write_file(&path, b"inventory");
    let server = FakeServer::new();
    server.respond("GET", "inventory/hash/C02X", 404, "");
    server.respond("POST", "inventory/submit", 403, "");

    let outcome = send_inventory(&server, &LocalFs, &LocalFs, &path, ID);

    assert_eq!(outcome, ArtifactOutcome::Failed("server returned HTTP 403".to_string()));
}

#[test]
fn test_missing_local_artifact_contacts_nobody() {
    let dir = TempDir::new().expect("tempdir");
    let server = FakeServer::new();

    let outcome = send_inventory(&server, &LocalFs, &LocalFs, &dir.path().join("absent"), ID);

    assert!(matches!(outcome, ArtifactOutcome::Skipped(_)));
    assert!(server.requests().is_empty());
}

#[test]
fn test_unhashable_artifact_contacts_nobody() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("inventory.plist");
    write_file(&path, b"inventory");
    let server = FakeServer::new();
    let mut hasher = MockHasher::new();
    hasher
        .expect_sha256_file()
        .times(1)
        .returning(|_| Err(anyhow::anyhow!("permission denied")));

    let outcome = send_inventory(&server, &LocalFs, &hasher, &path, ID);

    assert!(matches!(outcome, ArtifactOutcome::Skipped(_)));
    assert!(server.requests().is_empty());
}

// ── catalogs ─────────────────────────────────────────────────────────────────

fn catalog(name: &str, content: &[u8]) -> CatalogHash {
    CatalogHash {
        name: name.to_string(),
        sha256hash: sha256_bytes(content),
    }
}

#[test]
fn test_only_stale_catalogs_are_submitted() {
    let dir = TempDir::new().expect("tempdir");
    let catalogs = dir.path().join("catalogs");
    write_file(&catalogs.join("production"), b"prod");
    write_file(&catalogs.join("testing"), b"test v2");
    let server = FakeServer::new();
    let remote = encode_catalog_hashes(&[
        catalog("production", b"prod"),
        catalog("testing", b"test v1"),
    ])
    .expect("encode");
    server.respond("POST", "catalog/hash", 200, remote);
    server.respond("POST", "catalog/submit", 200, "");

    let outcomes = send_catalogs(&server, &LocalFs, &LocalFs, &catalogs, "bu-key");

    assert_eq!(
        outcomes,
        [
            ("production".to_string(), ArtifactOutcome::UpToDate),
            ("testing".to_string(), ArtifactOutcome::Submitted),
        ]
    );
    let query = &server.requests_to("catalog/hash")[0];
    let sent = decode_catalog_hashes(query.field("catalogs").expect("catalogs").as_bytes())
        .expect("plist");
    assert_eq!(sent, [catalog("production", b"prod"), catalog("testing", b"test v2")]);

    let submits = server.requests_to("catalog/submit");
    assert_eq!(submits.len(), 1);
    assert_eq!(submits[0].field("name"), Some("testing"));
    assert_eq!(submits[0].field("key"), Some("bu-key"));
    let body = submits[0].field("base64bz2catalog").expect("body");
    assert_eq!(decode_body(body), b"test v2");
}

#[test]
fn test_catalog_query_failure_submits_nothing() {
    let dir = TempDir::new().expect("tempdir");
    let catalogs = dir.path().join("catalogs");
    write_file(&catalogs.join("production"), b"prod");
    let server = FakeServer::new();
    server.unreachable("POST", "catalog/hash");

    let outcomes = send_catalogs(&server, &LocalFs, &LocalFs, &catalogs, "bu-key");

    assert_eq!(outcomes.len(), 1);
    assert!(matches!(outcomes[0].1, ArtifactOutcome::Skipped(_)));
    assert!(server.requests_to("catalog/submit").is_empty());
}

#[test]
fn test_missing_catalog_dir_contacts_nobody() {
    let dir = TempDir::new().expect("tempdir");
    let server = FakeServer::new();

    let outcomes = send_catalogs(&server, &LocalFs, &LocalFs, &dir.path().join("none"), "k");

    assert!(outcomes.is_empty());
    assert!(server.requests().is_empty());
}
