// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the Attendance Ledger project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Session metadata accompanying one attendance submission. Normalized at
/// the service boundary before it reaches the chain builder.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttendanceMetadata {
    pub teacher_name: String,
    pub date: String,
    pub course: String,
    pub year: String,
    pub class_id: Option<String>,
}

/// Outcome of a successful attendance append.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppendOutcome {
    pub index: u64,
    pub students_count: usize,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("chain is empty")]
    EmptyChain,
    #[error("no students marked present")]
    NoStudentsPresent,
    #[error("previous block is missing")]
    InvalidPredecessor,
    #[error("freshly built block failed validation")]
    BlockConstructionFailed,
    #[error("block index overflow")]
    IndexOverflow,
}

/// Integrity violations always name the offending block index; the first
/// violation found short-circuits a full-chain walk.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("chain is empty")]
    EmptyChain,
    #[error("block #{index} has invalid hash")]
    BadHash { index: u64 },
    #[error("block #{index} has invalid Merkle root")]
    MerkleMismatch { index: u64 },
    #[error("block #{index} is not properly linked to previous block")]
    BrokenLink { index: u64 },
    #[error("block #{index} has incorrect index: expected {expected}, got {found}")]
    BadIndex {
        index: u64,
        expected: u64,
        found: u64,
    },
}
