use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{calculate_merkle_root, canonical_timestamp, hash_data};
use crate::types::IntegrityError;

/// Sentinel predecessor digest carried by the genesis block.
pub const GENESIS_PREV_HASH: &str = "0";

/// One attendance session: who taught what, when, and the ordered list of
/// students marked present. Submission order is part of the integrity
/// surface (it feeds the Merkle leaves) and is never sorted.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub teacher_name: String,
    pub date: String,
    pub course: String,
    pub year: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_id: Option<String>,
    pub present_students: Vec<String>,
}

/// Block payload, tagged the way the persisted documents spell it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockData {
    Genesis { message: String, creator: String },
    Attendance(AttendanceRecord),
}

impl BlockData {
    pub fn is_attendance(&self) -> bool {
        matches!(self, BlockData::Attendance(_))
    }

    pub fn as_attendance(&self) -> Option<&AttendanceRecord> {
        match self {
            BlockData::Attendance(record) => Some(record),
            BlockData::Genesis { .. } => None,
        }
    }

    fn present_students(&self) -> &[String] {
        match self {
            BlockData::Attendance(record) => &record.present_students,
            BlockData::Genesis { .. } => &[],
        }
    }
}

/// Canonical payload encoding used in hash preimages: JSON with object keys
/// sorted, stable across processes regardless of field declaration order.
pub fn canonical_json(data: &BlockData) -> String {
    // Round-trip through Value: serde_json's default map is ordered by key.
    let value = serde_json::to_value(data).unwrap_or_default();
    serde_json::to_string(&value).unwrap_or_default()
}

/// An immutable ledger entry. Every field is fixed at construction; the
/// final hash commits to all of them, so there is no mutating accessor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    index: u64,
    timestamp: DateTime<Utc>,
    data: BlockData,
    prev_hash: String,
    merkle_root: Option<String>,
    hash: String,
    verified_hash: bool,
}

impl Block {
    /// Build a block, computing its Merkle root (for non-empty attendance
    /// payloads) and its hash over all other fields.
    pub fn new(
        index: u64,
        timestamp: DateTime<Utc>,
        data: BlockData,
        prev_hash: impl Into<String>,
    ) -> Self {
        let prev_hash = prev_hash.into();
        let merkle_root = calculate_merkle_root(data.present_students(), timestamp);
        let hash = compute_block_hash(index, timestamp, &data, &prev_hash, merkle_root.as_deref());
        Block {
            index,
            timestamp,
            data,
            prev_hash,
            merkle_root,
            hash,
            verified_hash: true,
        }
    }

    /// Rebuild a block from stored fields, recomputing digests instead of
    /// trusting them.
    ///
    /// `stored_merkle_root` distinguishes a document that wrote
    /// `"merkle_root": null` (`Some(None)`) from one predating Merkle
    /// hashing entirely (`None`). A recomputed-vs-stored Merkle mismatch is
    /// always fatal. A stored hash that cannot be reproduced is tolerated
    /// only for the legacy shape: the block keeps its stored hash so
    /// successor links stay intact, and carries `verified_hash == false`.
    pub fn reconstruct(
        index: u64,
        timestamp: DateTime<Utc>,
        data: BlockData,
        prev_hash: String,
        stored_merkle_root: Option<Option<String>>,
        stored_hash: String,
    ) -> Result<Self, IntegrityError> {
        let rebuilt = Block::new(index, timestamp, data, prev_hash);

        if let Some(stored) = &stored_merkle_root {
            if *stored != rebuilt.merkle_root {
                return Err(IntegrityError::MerkleMismatch { index });
            }
        }

        if rebuilt.hash == stored_hash {
            return Ok(rebuilt);
        }

        if stored_merkle_root.is_none() {
            // Record predates Merkle hashing: keep the stored digest,
            // flag the block as not independently verified.
            return Ok(Block {
                hash: stored_hash,
                verified_hash: false,
                ..rebuilt
            });
        }

        Err(IntegrityError::BadHash { index })
    }

    /// Assemble a block from raw stored fields without recomputing anything.
    ///
    /// The digests are taken as-is, so the result may be inconsistent; this
    /// exists for integrity tooling that must represent forged or corrupted
    /// blocks in order to detect them. Run `is_valid` or a full
    /// `check_integrity` walk before trusting the block.
    pub fn from_untrusted_parts(
        index: u64,
        timestamp: DateTime<Utc>,
        data: BlockData,
        prev_hash: String,
        merkle_root: Option<String>,
        hash: String,
    ) -> Self {
        Block {
            index,
            timestamp,
            data,
            prev_hash,
            merkle_root,
            hash,
            verified_hash: true,
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn data(&self) -> &BlockData {
        &self.data
    }

    pub fn prev_hash(&self) -> &str {
        &self.prev_hash
    }

    pub fn merkle_root(&self) -> Option<&str> {
        self.merkle_root.as_deref()
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Whether the stored hash was reproduced from the block's own fields.
    /// False only for blocks loaded from documents predating Merkle hashing.
    pub fn verified_hash(&self) -> bool {
        self.verified_hash
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    /// Recompute the hash and, when present, the Merkle root, comparing both
    /// against the stored values. Pure predicate, not an error path. Legacy
    /// blocks skip the hash recomputation (their stored digest is by
    /// definition not reproducible) but still get the Merkle check.
    pub fn is_valid(&self) -> bool {
        if self.verified_hash {
            let expected = compute_block_hash(
                self.index,
                self.timestamp,
                &self.data,
                &self.prev_hash,
                self.merkle_root.as_deref(),
            );
            if self.hash != expected {
                return false;
            }
        }

        if self.merkle_root.is_some() || !self.data.present_students().is_empty() {
            let expected = calculate_merkle_root(self.data.present_students(), self.timestamp);
            if self.merkle_root != expected {
                return false;
            }
        }

        true
    }
}

/// Hash preimage layout: index ‖ canonical timestamp ‖ canonical payload
/// JSON ‖ previous hash ‖ Merkle root (empty string when absent).
fn compute_block_hash(
    index: u64,
    timestamp: DateTime<Utc>,
    data: &BlockData,
    prev_hash: &str,
    merkle_root: Option<&str>,
) -> String {
    let preimage = format!(
        "{}{}{}{}{}",
        index,
        canonical_timestamp(timestamp),
        canonical_json(data),
        prev_hash,
        merkle_root.unwrap_or("")
    );
    hash_data(preimage.as_bytes())
}
