//! Tamper-evident attendance ledger primitives: hash-linked blocks over
//! Merkle-summarized presence lists, with append-only chains and full
//! integrity re-validation.

pub mod block;
pub mod chain;
pub mod crypto;
pub mod types;

pub use crate::block::{canonical_json, AttendanceRecord, Block, BlockData, GENESIS_PREV_HASH};
pub use crate::chain::{
    genesis_block, next_block, validate_against_predecessor, Chain, IntegrityReport,
};
pub use crate::crypto::{
    calculate_merkle_root, canonical_timestamp, generate_merkle_proof, hash_data, leaf_hash,
    verify_merkle_proof, MerkleSibling,
};
pub use crate::types::{
    AppendOutcome, AttendanceMetadata, ChainError, IntegrityError,
};
