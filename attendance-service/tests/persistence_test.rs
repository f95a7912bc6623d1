use attendance_core::{
    canonical_json, canonical_timestamp, hash_data, AttendanceMetadata, Chain,
};
use attendance_service::{ChainStore, PersistenceError, FORMAT_VERSION};
use tempfile::TempDir;

fn metadata(teacher: &str, course: &str) -> AttendanceMetadata {
    AttendanceMetadata {
        teacher_name: teacher.to_string(),
        date: "2024-01-01".to_string(),
        course: course.to_string(),
        year: "2024".to_string(),
        class_id: None,
    }
}

fn roster(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

fn store_in(dir: &TempDir) -> ChainStore {
    ChainStore::new(
        dir.path().join("blockchain_data.json"),
        dir.path().join("blockchain_backups"),
    )
}

fn sample_chain() -> Chain {
    let mut chain = Chain::new();
    chain
        .append_attendance(metadata("Dr. Smith", "CS101"), roster(&["001", "002"]))
        .unwrap();
    chain
        .append_attendance(metadata("Dr. Jones", "CS102"), roster(&["003"]))
        .unwrap();
    chain
}

#[test]
fn save_then_load_roundtrip() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let chain = sample_chain();

    let receipt = store.save(&chain).unwrap();
    assert!(receipt.primary.exists());
    assert!(receipt.backup.exists());

    let loaded = store.load().unwrap();
    assert_eq!(loaded.len(), chain.len());
    for (original, reloaded) in chain.blocks().iter().zip(loaded.blocks()) {
        assert_eq!(reloaded.index(), original.index());
        assert_eq!(reloaded.data(), original.data());
        assert_eq!(reloaded.prev_hash(), original.prev_hash());
        assert_eq!(reloaded.hash(), original.hash());
        assert!(reloaded.verified_hash());
    }
    assert!(loaded.check_integrity().is_valid());
}

#[test]
fn save_writes_timestamped_backup() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    let receipt = store.save(&sample_chain()).unwrap();
    let name = receipt.backup.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("blockchain_backup_"));
    assert!(name.ends_with(".json"));

    let backups = store.list_backups().unwrap();
    assert_eq!(backups.len(), 1);
    assert_eq!(backups[0].filename, name);
    assert!(backups[0].size_bytes > 0);
}

#[test]
fn load_missing_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    match store.load() {
        Err(PersistenceError::NotFound(_)) => {}
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn load_rejects_malformed_document() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    std::fs::write(store.primary_path(), "not json at all").unwrap();
    match store.load() {
        Err(PersistenceError::Malformed(_)) => {}
        other => panic!("expected Malformed, got {other:?}"),
    }
}

fn tamper_primary(store: &ChainStore, edit: impl FnOnce(&mut serde_json::Value)) {
    let body = std::fs::read_to_string(store.primary_path()).unwrap();
    let mut document: serde_json::Value = serde_json::from_str(&body).unwrap();
    edit(&mut document);
    std::fs::write(
        store.primary_path(),
        serde_json::to_string_pretty(&document).unwrap(),
    )
    .unwrap();
}

#[test]
fn load_rejects_tampered_stored_hash() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.save(&sample_chain()).unwrap();

    tamper_primary(&store, |document| {
        document["blocks"][1]["hash"] = serde_json::json!("0".repeat(64));
    });

    match store.load() {
        Err(PersistenceError::HashMismatch { index: 1 }) => {}
        other => panic!("expected HashMismatch at index 1, got {other:?}"),
    }
}

#[test]
fn load_rejects_tampered_merkle_root() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.save(&sample_chain()).unwrap();

    tamper_primary(&store, |document| {
        document["blocks"][1]["merkle_root"] = serde_json::json!("0".repeat(64));
    });

    match store.load() {
        Err(PersistenceError::MerkleMismatch { index: 1 }) => {}
        other => panic!("expected MerkleMismatch at index 1, got {other:?}"),
    }
}

#[test]
fn load_rejects_tampered_payload() {
    // Stored digests intact, payload edited: the recomputed hash no longer
    // matches the stored one.
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.save(&sample_chain()).unwrap();

    tamper_primary(&store, |document| {
        document["blocks"][1]["data"]["teacher_name"] = serde_json::json!("Impostor");
    });

    match store.load() {
        Err(PersistenceError::HashMismatch { index: 1 }) => {}
        other => panic!("expected HashMismatch at index 1, got {other:?}"),
    }
}

#[test]
fn legacy_records_load_partially_verified() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    let mut chain = Chain::new();
    chain
        .append_attendance(metadata("Dr. Smith", "CS101"), roster(&["001", "002"]))
        .unwrap();
    store.save(&chain).unwrap();

    // Rewrite the tail block the way the pre-Merkle format stored it: no
    // merkle_root key, hash computed without the Merkle component.
    let tail = chain.tip().unwrap();
    let legacy_hash = hash_data(
        format!(
            "{}{}{}{}",
            tail.index(),
            canonical_timestamp(tail.timestamp()),
            canonical_json(tail.data()),
            tail.prev_hash(),
        )
        .as_bytes(),
    );
    tamper_primary(&store, |document| {
        let block = &mut document["blocks"][1];
        block.as_object_mut().unwrap().remove("merkle_root");
        block["hash"] = serde_json::json!(legacy_hash);
    });

    let loaded = store.load().unwrap();
    let legacy = &loaded.blocks()[1];
    assert!(!legacy.verified_hash());
    assert_eq!(legacy.hash(), legacy_hash);
    // Freshly recomputed Merkle root is present even though the document
    // predates it.
    assert!(legacy.merkle_root().is_some());

    let report = loaded.check_integrity();
    assert!(report.is_valid());
    assert!(report.to_string().contains("1 legacy blocks partially verified"));
}

#[test]
fn restore_is_durable() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    let chain = sample_chain();
    let receipt = store.save(&chain).unwrap();
    let backup_name = receipt
        .backup
        .file_name()
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();

    // Backup filenames have second precision; make sure the truncated
    // primary gets its own backup slot instead of overwriting ours.
    std::thread::sleep(std::time::Duration::from_millis(1100));
    store.save(&Chain::new()).unwrap();
    assert_eq!(store.load().unwrap().len(), 1);

    let restored = store.restore(&backup_name).unwrap();
    assert_eq!(restored.len(), 3);
    // Durable: the primary document was rewritten, not just the return value.
    assert_eq!(store.load().unwrap().len(), 3);
}

#[test]
fn restore_unknown_backup_fails() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.save(&sample_chain()).unwrap();

    match store.restore("blockchain_backup_19990101_000000.json") {
        Err(PersistenceError::BackupNotFound(_)) => {}
        other => panic!("expected BackupNotFound, got {other:?}"),
    }
}

#[test]
fn restore_rejects_traversal_names() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.save(&sample_chain()).unwrap();

    match store.restore("../blockchain_data.json") {
        Err(PersistenceError::BackupNotFound(_)) => {}
        other => panic!("expected BackupNotFound, got {other:?}"),
    }
}

fn write_fake_backups(store: &ChainStore, count: usize) {
    std::fs::create_dir_all(store.backup_dir()).unwrap();
    for i in 1..=count {
        let name = format!("blockchain_backup_20240101_00000{i}.json");
        std::fs::write(store.backup_dir().join(name), "{}").unwrap();
    }
}

#[test]
fn list_backups_newest_first() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    write_fake_backups(&store, 3);

    let backups = store.list_backups().unwrap();
    assert_eq!(backups.len(), 3);
    assert_eq!(backups[0].filename, "blockchain_backup_20240101_000003.json");
    assert_eq!(backups[2].filename, "blockchain_backup_20240101_000001.json");
}

#[test]
fn list_backups_ignores_foreign_files() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    write_fake_backups(&store, 1);
    std::fs::write(store.backup_dir().join("notes.txt"), "x").unwrap();
    std::fs::write(store.backup_dir().join("other.json"), "{}").unwrap();

    assert_eq!(store.list_backups().unwrap().len(), 1);
}

#[test]
fn cleanup_keeps_newest_backups() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    write_fake_backups(&store, 5);

    let removed = store.cleanup(2).unwrap();
    assert_eq!(removed, 3);

    let remaining = store.list_backups().unwrap();
    assert_eq!(remaining.len(), 2);
    assert_eq!(
        remaining[0].filename,
        "blockchain_backup_20240101_000005.json"
    );
    assert_eq!(
        remaining[1].filename,
        "blockchain_backup_20240101_000004.json"
    );
}

#[test]
fn cleanup_is_noop_when_under_limit() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    write_fake_backups(&store, 2);

    assert_eq!(store.cleanup(5).unwrap(), 0);
    assert_eq!(store.list_backups().unwrap().len(), 2);
}

#[test]
fn document_carries_metadata() {
    let chain = sample_chain();
    let body = ChainStore::document_json(&chain).unwrap();
    let document: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(document["metadata"]["version"], FORMAT_VERSION);
    assert_eq!(document["metadata"]["total_blocks"], 3);
    assert_eq!(document["blocks"].as_array().unwrap().len(), 3);
    // New documents always write the merkle_root key, null for genesis.
    assert!(document["blocks"][0]
        .as_object()
        .unwrap()
        .contains_key("merkle_root"));
    assert!(document["blocks"][0]["merkle_root"].is_null());
}
