use std::fmt;

use chrono::Utc;

use crate::block::{Block, BlockData, GENESIS_PREV_HASH};
use crate::types::{AppendOutcome, AttendanceMetadata, ChainError, IntegrityError};

/// Fixed-content root block at index 0.
pub fn genesis_block() -> Block {
    Block::new(
        0,
        Utc::now(),
        BlockData::Genesis {
            message: "Genesis Block - Ledger Initialized".to_string(),
            creator: "Attendance Ledger".to_string(),
        },
        GENESIS_PREV_HASH,
    )
}

/// Derive the successor of `previous` carrying `data`.
///
/// Fails with `InvalidPredecessor` when no previous block is supplied.
pub fn next_block(previous: Option<&Block>, data: BlockData) -> Result<Block, ChainError> {
    let previous = previous.ok_or(ChainError::InvalidPredecessor)?;
    let index = previous
        .index()
        .checked_add(1)
        .ok_or(ChainError::IndexOverflow)?;
    Ok(Block::new(
        index,
        Utc::now(),
        data,
        previous.hash().to_string(),
    ))
}

/// Per-block rule usable incrementally on append: self-consistency plus, for
/// non-genesis blocks, the link and index relations to the predecessor.
pub fn validate_against_predecessor(
    block: &Block,
    previous: Option<&Block>,
) -> Result<(), IntegrityError> {
    if !block.is_valid() {
        return Err(classify_self_inconsistency(block, block.index()));
    }

    if let Some(previous) = previous {
        if block.prev_hash() != previous.hash() {
            return Err(IntegrityError::BrokenLink {
                index: block.index(),
            });
        }
        let expected = previous.index().checked_add(1);
        if Some(block.index()) != expected {
            return Err(IntegrityError::BadIndex {
                index: block.index(),
                expected: expected.unwrap_or(u64::MAX),
                found: block.index(),
            });
        }
    } else if block.index() != 0 {
        return Err(IntegrityError::BadIndex {
            index: block.index(),
            expected: 0,
            found: block.index(),
        });
    }

    Ok(())
}

/// Name the broken rule for a block that failed `is_valid`, reported at
/// `position` in the chain walk.
fn classify_self_inconsistency(block: &Block, position: u64) -> IntegrityError {
    let students = block
        .data()
        .as_attendance()
        .map(|record| record.present_students.as_slice())
        .unwrap_or(&[]);
    let expected = crate::crypto::calculate_merkle_root(students, block.timestamp());
    if block.merkle_root() != expected.as_deref() {
        IntegrityError::MerkleMismatch { index: position }
    } else {
        IntegrityError::BadHash { index: position }
    }
}

/// Result of a full integrity walk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IntegrityReport {
    Valid {
        blocks: usize,
        /// Blocks loaded from documents predating Merkle hashing whose
        /// stored hash could not be independently reproduced.
        legacy_blocks: usize,
    },
    Invalid(IntegrityError),
}

impl IntegrityReport {
    pub fn is_valid(&self) -> bool {
        matches!(self, IntegrityReport::Valid { .. })
    }
}

impl fmt::Display for IntegrityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityReport::Valid {
                blocks: 1,
                legacy_blocks: 0,
            } => write!(
                f,
                "Blockchain integrity verified: Only genesis block present"
            ),
            IntegrityReport::Valid {
                blocks,
                legacy_blocks: 0,
            } => write!(
                f,
                "Blockchain integrity verified: All {blocks} blocks are valid and properly linked"
            ),
            IntegrityReport::Valid {
                blocks,
                legacy_blocks,
            } => write!(
                f,
                "Blockchain integrity verified: All {blocks} blocks are properly linked \
                 ({legacy_blocks} legacy blocks partially verified)"
            ),
            IntegrityReport::Invalid(err) => write!(f, "Error: {err}"),
        }
    }
}

/// Ordered, append-only sequence of blocks rooted at genesis.
///
/// The backing vector is private: the only mutation is appending one
/// validated block to the tail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chain {
    blocks: Vec<Block>,
}

impl Chain {
    /// A fresh chain holding only the genesis block.
    pub fn new() -> Self {
        Chain {
            blocks: vec![genesis_block()],
        }
    }

    /// Rebuild a chain from deserialized blocks, e.g. a loaded document.
    ///
    /// Only non-emptiness is enforced here; a loaded chain may still be
    /// internally inconsistent and is judged by `check_integrity`.
    pub fn from_blocks(blocks: Vec<Block>) -> Result<Self, ChainError> {
        if blocks.is_empty() {
            return Err(ChainError::EmptyChain);
        }
        Ok(Chain { blocks })
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn tip(&self) -> Option<&Block> {
        self.blocks.last()
    }

    pub fn get(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    /// Derive the next block from the current tip.
    pub fn build_next(&self, data: BlockData) -> Result<Block, ChainError> {
        if self.blocks.is_empty() {
            return Err(ChainError::EmptyChain);
        }
        next_block(self.tip(), data)
    }

    /// Append one block after validating it against the tip. The sole
    /// mutation this type offers.
    pub fn append(&mut self, block: Block) -> Result<(), IntegrityError> {
        validate_against_predecessor(&block, self.tip())?;
        self.blocks.push(block);
        Ok(())
    }

    /// Build, validate and append an attendance block.
    ///
    /// `present_students` is the already-extracted, ordered roster; an empty
    /// list is a user error (`NoStudentsPresent`), while a freshly built
    /// block failing validation is an internal invariant failure
    /// (`BlockConstructionFailed`).
    pub fn append_attendance(
        &mut self,
        metadata: AttendanceMetadata,
        present_students: Vec<String>,
    ) -> Result<AppendOutcome, ChainError> {
        if present_students.is_empty() {
            return Err(ChainError::NoStudentsPresent);
        }
        if self.blocks.is_empty() {
            return Err(ChainError::EmptyChain);
        }

        let students_count = present_students.len();
        let data = BlockData::Attendance(crate::block::AttendanceRecord {
            teacher_name: metadata.teacher_name,
            date: metadata.date,
            course: metadata.course,
            year: metadata.year,
            class_id: metadata.class_id,
            present_students,
        });

        let block = self.build_next(data)?;
        if !block.is_valid() {
            return Err(ChainError::BlockConstructionFailed);
        }
        let index = block.index();
        self.append(block)
            .map_err(|_| ChainError::BlockConstructionFailed)?;

        Ok(AppendOutcome {
            index,
            students_count,
        })
    }

    /// Full O(n) integrity walk.
    ///
    /// Every block's hash and Merkle root are recomputed independently;
    /// link-only checking is insufficient, since a forged interior block can
    /// hide behind a valid-looking successor. The first violation
    /// short-circuits, naming the offending index and broken rule.
    pub fn check_integrity(&self) -> IntegrityReport {
        if self.blocks.is_empty() {
            return IntegrityReport::Invalid(IntegrityError::EmptyChain);
        }

        let mut legacy_blocks = 0;
        for (i, block) in self.blocks.iter().enumerate() {
            let position = i as u64;
            if !block.is_valid() {
                return IntegrityReport::Invalid(classify_self_inconsistency(block, position));
            }

            if i > 0 {
                let previous = &self.blocks[i - 1];
                if block.prev_hash() != previous.hash() {
                    return IntegrityReport::Invalid(IntegrityError::BrokenLink {
                        index: position,
                    });
                }
                let expected = previous.index().checked_add(1);
                if Some(block.index()) != expected {
                    return IntegrityReport::Invalid(IntegrityError::BadIndex {
                        index: position,
                        expected: expected.unwrap_or(u64::MAX),
                        found: block.index(),
                    });
                }
            } else if block.index() != 0 {
                return IntegrityReport::Invalid(IntegrityError::BadIndex {
                    index: position,
                    expected: 0,
                    found: block.index(),
                });
            }

            if !block.verified_hash() {
                legacy_blocks += 1;
            }
        }

        IntegrityReport::Valid {
            blocks: self.blocks.len(),
            legacy_blocks,
        }
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}
