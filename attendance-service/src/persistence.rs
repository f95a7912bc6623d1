// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the Attendance Ledger project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.

//! Durable storage for the chain: a primary JSON document plus timestamped
//! backup copies, restore, and retention pruning. Owns on-disk
//! representations only; the live chain belongs to the service facade.

use std::path::{Path, PathBuf};

use attendance_core::{Block, BlockData, Chain, IntegrityError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const FORMAT_VERSION: &str = "1.0";

const BACKUP_PREFIX: &str = "blockchain_backup_";
const BACKUP_SUFFIX: &str = ".json";

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("blockchain file not found: {0}")]
    NotFound(PathBuf),
    #[error("malformed blockchain document: {0}")]
    Malformed(String),
    #[error("Merkle root mismatch in block #{index}")]
    MerkleMismatch { index: u64 },
    #[error("hash mismatch in block #{index}")]
    HashMismatch { index: u64 },
    #[error("backup not found: {0}")]
    BackupNotFound(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub created: String,
    pub total_blocks: usize,
    pub version: String,
}

/// On-disk block shape. `merkle_root` is a double option: the outer level
/// distinguishes a document written before Merkle hashing existed (key
/// absent) from one that recorded "no root" (`null`). New documents always
/// write the key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredBlock {
    pub index: u64,
    pub timestamp: DateTime<Utc>,
    pub data: BlockData,
    pub prev_hash: String,
    #[serde(
        default,
        deserialize_with = "present_or_absent",
        skip_serializing_if = "Option::is_none"
    )]
    pub merkle_root: Option<Option<String>>,
    pub hash: String,
}

fn present_or_absent<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl From<&Block> for StoredBlock {
    fn from(block: &Block) -> Self {
        StoredBlock {
            index: block.index(),
            timestamp: block.timestamp(),
            data: block.data().clone(),
            prev_hash: block.prev_hash().to_string(),
            merkle_root: Some(block.merkle_root().map(str::to_string)),
            hash: block.hash().to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChainDocument {
    pub metadata: DocumentMetadata,
    pub blocks: Vec<StoredBlock>,
}

impl ChainDocument {
    pub fn from_chain(chain: &Chain) -> Self {
        ChainDocument {
            metadata: DocumentMetadata {
                created: Utc::now().to_rfc3339(),
                total_blocks: chain.len(),
                version: FORMAT_VERSION.to_string(),
            },
            blocks: chain.blocks().iter().map(StoredBlock::from).collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct BackupInfo {
    pub filename: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct SaveReceipt {
    pub primary: PathBuf,
    pub backup: PathBuf,
}

/// Filesystem owner of the chain document and its backup directory.
#[derive(Clone, Debug)]
pub struct ChainStore {
    primary_path: PathBuf,
    backup_dir: PathBuf,
}

impl ChainStore {
    pub fn new(primary_path: PathBuf, backup_dir: PathBuf) -> Self {
        ChainStore {
            primary_path,
            backup_dir,
        }
    }

    pub fn primary_path(&self) -> &Path {
        &self.primary_path
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Serialize the chain to the primary file, then copy the same document
    /// into the backup directory under a timestamped name. Write-then-copy:
    /// history survives even if the next primary write fails halfway.
    pub fn save(&self, chain: &Chain) -> Result<SaveReceipt, PersistenceError> {
        let document = ChainDocument::from_chain(chain);
        let body = serde_json::to_string_pretty(&document)
            .map_err(|err| PersistenceError::Malformed(err.to_string()))?;

        if let Some(parent) = self.primary_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.primary_path, &body)?;

        std::fs::create_dir_all(&self.backup_dir)?;
        let backup_name = format!(
            "{BACKUP_PREFIX}{}{BACKUP_SUFFIX}",
            Utc::now().format("%Y%m%d_%H%M%S")
        );
        let backup_path = self.backup_dir.join(&backup_name);
        std::fs::write(&backup_path, &body)?;

        debug!(
            primary = %self.primary_path.display(),
            backup = %backup_path.display(),
            blocks = chain.len(),
            "chain persisted"
        );

        Ok(SaveReceipt {
            primary: self.primary_path.clone(),
            backup: backup_path,
        })
    }

    /// Load the primary document, recomputing every block's digests rather
    /// than trusting the stored values.
    pub fn load(&self) -> Result<Chain, PersistenceError> {
        self.load_path(&self.primary_path)
    }

    fn load_path(&self, path: &Path) -> Result<Chain, PersistenceError> {
        if !path.exists() {
            return Err(PersistenceError::NotFound(path.to_path_buf()));
        }

        let body = std::fs::read_to_string(path)?;
        let document: ChainDocument = serde_json::from_str(&body)
            .map_err(|err| PersistenceError::Malformed(err.to_string()))?;

        let mut blocks = Vec::with_capacity(document.blocks.len());
        for stored in document.blocks {
            let block = Block::reconstruct(
                stored.index,
                stored.timestamp,
                stored.data,
                stored.prev_hash,
                stored.merkle_root,
                stored.hash,
            )
            .map_err(|err| match err {
                IntegrityError::MerkleMismatch { index } => {
                    PersistenceError::MerkleMismatch { index }
                }
                IntegrityError::BadHash { index } => PersistenceError::HashMismatch { index },
                other => PersistenceError::Malformed(other.to_string()),
            })?;
            blocks.push(block);
        }

        let chain = Chain::from_blocks(blocks)
            .map_err(|_| PersistenceError::Malformed("document contains no blocks".to_string()))?;

        debug!(path = %path.display(), blocks = chain.len(), "chain loaded");
        Ok(chain)
    }

    /// Enumerate backups, newest first.
    pub fn list_backups(&self) -> Result<Vec<BackupInfo>, PersistenceError> {
        if !self.backup_dir.exists() {
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();
        for entry in std::fs::read_dir(&self.backup_dir)? {
            let entry = entry?;
            let filename = entry.file_name().to_string_lossy().to_string();
            if !filename.starts_with(BACKUP_PREFIX) || !filename.ends_with(BACKUP_SUFFIX) {
                continue;
            }
            let metadata = entry.metadata()?;
            let created_at = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            backups.push(BackupInfo {
                path: entry.path(),
                size_bytes: metadata.len(),
                created_at,
                filename,
            });
        }

        backups.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.filename.cmp(&a.filename))
        });
        Ok(backups)
    }

    /// Load the named backup without touching the primary document.
    pub fn load_backup(&self, backup_name: &str) -> Result<Chain, PersistenceError> {
        // The name must be a bare filename inside the backup directory.
        if Path::new(backup_name).file_name().and_then(|n| n.to_str()) != Some(backup_name) {
            return Err(PersistenceError::BackupNotFound(backup_name.to_string()));
        }

        let backup_path = self.backup_dir.join(backup_name);
        if !backup_path.exists() {
            return Err(PersistenceError::BackupNotFound(backup_name.to_string()));
        }

        self.load_path(&backup_path)
    }

    /// Load the named backup and, on success, re-save it as the primary
    /// document; a restore is durable, not just an in-memory swap.
    pub fn restore(&self, backup_name: &str) -> Result<Chain, PersistenceError> {
        let chain = self.load_backup(backup_name)?;
        self.save(&chain)?;
        info!(backup = backup_name, blocks = chain.len(), "chain restored from backup");
        Ok(chain)
    }

    /// Delete all but the `keep_count` most recent backups. Returns the
    /// number removed; keeping fewer than `keep_count` is a successful no-op.
    pub fn cleanup(&self, keep_count: usize) -> Result<usize, PersistenceError> {
        let backups = self.list_backups()?;
        if backups.len() <= keep_count {
            return Ok(0);
        }

        let mut removed = 0;
        for backup in &backups[keep_count..] {
            match std::fs::remove_file(&backup.path) {
                Ok(()) => removed += 1,
                Err(err) => {
                    warn!(
                        backup = %backup.path.display(),
                        error = %err,
                        "failed to remove old backup"
                    );
                    return Err(err.into());
                }
            }
        }
        debug!(removed, kept = keep_count, "pruned old backups");
        Ok(removed)
    }

    /// The primary document rendered as pretty JSON, for content export.
    pub fn document_json(chain: &Chain) -> Result<String, PersistenceError> {
        serde_json::to_string_pretty(&ChainDocument::from_chain(chain))
            .map_err(|err| PersistenceError::Malformed(err.to_string()))
    }
}
