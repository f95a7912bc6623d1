use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

/// Hash arbitrary bytes with SHA-256 and return the lowercase hex digest.
pub fn hash_data(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// The single timestamp rendering used everywhere a timestamp enters a hash
/// preimage. Fixed microsecond precision with a `Z` offset so that a chain
/// serialized and reloaded in another process rehashes identically.
pub fn canonical_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Leaf node for one present student: the student id salted with the block
/// timestamp, so identical rosters in different sessions hash differently.
pub fn leaf_hash(student_id: &str, salt: DateTime<Utc>) -> String {
    hash_data(format!("{}:{}", student_id, canonical_timestamp(salt)).as_bytes())
}

/// Merkle root over an ordered list of present-student ids.
///
/// Empty input yields `None`. Each level pairs adjacent nodes by hashing the
/// concatenation of their hex digests; an odd-length level duplicates its
/// last node. The root is order-sensitive: permuting the input permutes the
/// leaves and changes the root. Inputs are never sorted or mutated.
pub fn calculate_merkle_root(student_ids: &[String], salt: DateTime<Utc>) -> Option<String> {
    if student_ids.is_empty() {
        return None;
    }

    let mut level: Vec<String> = student_ids
        .iter()
        .map(|id| leaf_hash(id, salt))
        .collect();

    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let left = &pair[0];
            let right = if pair.len() == 2 { &pair[1] } else { &pair[0] };
            next.push(hash_data(format!("{left}{right}").as_bytes()));
        }
        level = next;
    }

    level.pop()
}

/// One step of a Merkle inclusion proof.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleSibling {
    pub hash: String,
    pub is_left: bool,
}

/// Build the inclusion proof for the student at `index`.
///
/// Returns `None` for an empty roster or an out-of-range index.
pub fn generate_merkle_proof(
    student_ids: &[String],
    salt: DateTime<Utc>,
    index: usize,
) -> Option<Vec<MerkleSibling>> {
    if student_ids.is_empty() || index >= student_ids.len() {
        return None;
    }

    let mut layer: Vec<String> = student_ids
        .iter()
        .map(|id| leaf_hash(id, salt))
        .collect();
    let mut idx = index;
    let mut proof = Vec::new();

    while layer.len() > 1 {
        let is_right = idx % 2 == 1;
        let pair_idx = if is_right { idx - 1 } else { idx + 1 };
        let sibling = if pair_idx < layer.len() {
            layer[pair_idx].clone()
        } else {
            layer[idx].clone()
        };
        proof.push(MerkleSibling {
            hash: sibling,
            is_left: is_right, // if current is right child, sibling is left
        });

        let mut next = Vec::with_capacity(layer.len().div_ceil(2));
        for pair in layer.chunks(2) {
            let left = &pair[0];
            let right = if pair.len() == 2 { &pair[1] } else { &pair[0] };
            next.push(hash_data(format!("{left}{right}").as_bytes()));
        }

        layer = next;
        idx /= 2;
    }

    Some(proof)
}

/// Walk a proof from a leaf digest up to the expected root.
pub fn verify_merkle_proof(leaf_hash: &str, proof: &[MerkleSibling], root: &str) -> bool {
    if proof.is_empty() {
        return leaf_hash == root;
    }

    let mut current = leaf_hash.to_string();
    for sib in proof {
        current = if sib.is_left {
            hash_data(format!("{}{}", sib.hash, current).as_bytes())
        } else {
            hash_data(format!("{}{}", current, sib.hash).as_bytes())
        };
    }
    current == root
}
