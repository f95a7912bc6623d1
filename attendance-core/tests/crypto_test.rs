use attendance_core::{
    calculate_merkle_root, canonical_timestamp, generate_merkle_proof, hash_data, leaf_hash,
    verify_merkle_proof,
};
use chrono::{TimeZone, Utc};

fn salt() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap()
}

fn roster(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

#[test]
fn hash_data_consistency() {
    let a = hash_data(b"abc");
    let b = hash_data(b"abc");
    let c = hash_data(b"abcd");
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.len(), 64);
    assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
}

#[test]
fn canonical_timestamp_is_fixed_precision() {
    let rendered = canonical_timestamp(salt());
    assert_eq!(rendered, "2024-01-15T09:30:00.000000Z");
}

#[test]
fn merkle_root_empty_roster_is_none() {
    assert_eq!(calculate_merkle_root(&[], salt()), None);
}

#[test]
fn merkle_root_single_leaf_is_leaf_hash() {
    let ids = roster(&["CHEM-2021-01"]);
    let root = calculate_merkle_root(&ids, salt()).unwrap();
    assert_eq!(root, leaf_hash("CHEM-2021-01", salt()));
}

#[test]
fn merkle_root_is_deterministic() {
    let ids = roster(&["001", "002", "003"]);
    let a = calculate_merkle_root(&ids, salt()).unwrap();
    let b = calculate_merkle_root(&ids, salt()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn merkle_order_sensitivity() {
    let ab = calculate_merkle_root(&roster(&["a", "b"]), salt()).unwrap();
    let ba = calculate_merkle_root(&roster(&["b", "a"]), salt()).unwrap();
    assert_ne!(ab, ba);
}

#[test]
fn merkle_salt_changes_root() {
    let ids = roster(&["001", "002"]);
    let t1 = calculate_merkle_root(&ids, salt()).unwrap();
    let t2 =
        calculate_merkle_root(&ids, Utc.with_ymd_and_hms(2024, 1, 16, 9, 30, 0).unwrap()).unwrap();
    assert_ne!(t1, t2);
}

#[test]
fn merkle_odd_level_duplicates_last_node() {
    let three = calculate_merkle_root(&roster(&["a", "b", "c"]), salt()).unwrap();
    let padded = calculate_merkle_root(&roster(&["a", "b", "c", "c"]), salt()).unwrap();
    assert_eq!(three, padded);
}

#[test]
fn merkle_proof_roundtrip() {
    let ids = roster(&["001", "002", "003", "004", "005"]);
    let root = calculate_merkle_root(&ids, salt()).unwrap();
    for (idx, id) in ids.iter().enumerate() {
        let proof = generate_merkle_proof(&ids, salt(), idx).unwrap();
        assert!(verify_merkle_proof(&leaf_hash(id, salt()), &proof, &root));
    }
}

#[test]
fn merkle_proof_rejects_tampered_leaf() {
    let ids = roster(&["001", "002", "003"]);
    let root = calculate_merkle_root(&ids, salt()).unwrap();
    let proof = generate_merkle_proof(&ids, salt(), 0).unwrap();
    assert!(!verify_merkle_proof(&leaf_hash("999", salt()), &proof, &root));
}

#[test]
fn merkle_proof_out_of_range() {
    let ids = roster(&["001"]);
    assert!(generate_merkle_proof(&ids, salt(), 1).is_none());
    assert!(generate_merkle_proof(&[], salt(), 0).is_none());
}
