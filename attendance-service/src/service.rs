// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the Attendance Ledger project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.

//! The concurrency-safe facade owning the live chain. One mutex guards
//! every read-modify-write; read operations copy a snapshot under the lock
//! and project over it lock-free. The in-memory chain is the source of
//! truth; persistence mirrors it, best-effort.

use std::collections::HashMap;

use attendance_core::{
    AppendOutcome, AttendanceMetadata, Chain, ChainError, IntegrityError, IntegrityReport,
};
use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::analytics::{attendance_analytics, generate_report, AttendanceAnalytics, ReportFormat};
use crate::config::ServiceConfig;
use crate::export::{export_content, ExportContent, ExportFormat};
use crate::persistence::{BackupInfo, ChainStore, PersistenceError};
use crate::records::{all_records, search_by_student, stats, AttendanceRow, ChainStats, StudentRow};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("unknown export format: {0}")]
    UnknownExportFormat(String),
    #[error("unknown report format: {0}")]
    UnknownReportFormat(String),
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    /// Normal operation.
    Ready,
    /// Only a fresh genesis survived a failed or partial load.
    Degraded,
}

/// Session metadata as submitted by collaborators. The legacy positional
/// shape (`[teacher, date, course, year]`) and the structured shape both
/// normalize into one `AttendanceMetadata` before reaching the core.
#[derive(Clone, Debug)]
pub enum MetadataInput {
    Structured(AttendanceMetadata),
    LegacyPositional(Vec<String>),
}

impl MetadataInput {
    pub fn normalize(self) -> AttendanceMetadata {
        match self {
            MetadataInput::Structured(metadata) => metadata,
            MetadataInput::LegacyPositional(fields) => {
                let field = |i: usize| fields.get(i).cloned().unwrap_or_default();
                AttendanceMetadata {
                    teacher_name: field(0),
                    date: field(1),
                    course: field(2),
                    year: field(3),
                    class_id: None,
                }
            }
        }
    }
}

/// Pull the ordered present-student list out of positional form fields:
/// `roll_no1`, `roll_no2`, … stopping at the first missing key. Values are
/// trimmed; blank entries are dropped without breaking the sequence.
pub fn extract_present_students(form: &HashMap<String, String>) -> Vec<String> {
    let mut present = Vec::new();
    let mut i = 1usize;
    while let Some(value) = form.get(&format!("roll_no{i}")) {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            present.push(trimmed.to_string());
        }
        i += 1;
    }
    present
}

#[derive(Clone, Debug, Serialize)]
pub struct ServiceHealth {
    pub healthy: bool,
    pub state: ServiceState,
    pub total_blocks: usize,
    pub attendance_blocks: usize,
    pub latest_block_age_secs: i64,
}

pub struct LedgerService {
    chain: Mutex<Chain>,
    state: Mutex<ServiceState>,
    store: ChainStore,
    backup_keep_count: usize,
}

impl LedgerService {
    /// Boot against the configured paths: load the primary document, fall
    /// back to the newest usable backup, or bootstrap a fresh genesis chain.
    pub fn bootstrap(config: &ServiceConfig) -> Self {
        let store = ChainStore::new(config.primary_path(), config.backup_dir_path());
        Self::with_store(store, config.backup_keep_count)
    }

    pub fn with_store(store: ChainStore, backup_keep_count: usize) -> Self {
        let (chain, state) = Self::boot(&store);
        LedgerService {
            chain: Mutex::new(chain),
            state: Mutex::new(state),
            store,
            backup_keep_count,
        }
    }

    fn boot(store: &ChainStore) -> (Chain, ServiceState) {
        match store.load() {
            Ok(chain) if chain.len() > 1 => {
                info!(blocks = chain.len(), "loaded existing chain");
                (chain, ServiceState::Ready)
            }
            Ok(chain) => {
                // A genesis-only primary is suspicious: history may have
                // been lost to a truncated write. Prefer a longer backup.
                warn!("primary chain only has genesis block, scanning backups");
                match Self::scan_backups(store) {
                    Some(restored) => (restored, ServiceState::Ready),
                    None => {
                        warn!("no usable backup found, keeping genesis-only chain");
                        (chain, ServiceState::Ready)
                    }
                }
            }
            Err(err) => {
                let fresh_install = matches!(err, PersistenceError::NotFound(_))
                    && store
                        .list_backups()
                        .map(|backups| backups.is_empty())
                        .unwrap_or(false);
                if fresh_install {
                    info!("no chain on disk, bootstrapping genesis");
                } else {
                    warn!(error = %err, "failed to load primary chain, scanning backups");
                }

                if let Some(restored) = Self::scan_backups(store) {
                    return (restored, ServiceState::Ready);
                }

                let chain = Chain::new();
                if let Err(save_err) = store.save(&chain) {
                    warn!(error = %save_err, "failed to persist bootstrapped chain");
                }
                if fresh_install {
                    (chain, ServiceState::Ready)
                } else {
                    warn!("unrecoverable chain state, bootstrapped fresh genesis");
                    (chain, ServiceState::Degraded)
                }
            }
        }
    }

    /// Newest-first scan accepting the first backup whose chain has real
    /// history and passes a full integrity walk; the accepted chain is
    /// re-persisted as the primary document.
    fn scan_backups(store: &ChainStore) -> Option<Chain> {
        let backups = match store.list_backups() {
            Ok(backups) => backups,
            Err(err) => {
                warn!(error = %err, "failed to enumerate backups");
                return None;
            }
        };

        for backup in backups {
            match store.load_backup(&backup.filename) {
                Ok(chain) if chain.len() > 1 && chain.check_integrity().is_valid() => {
                    info!(
                        backup = %backup.filename,
                        blocks = chain.len(),
                        "restored chain from backup"
                    );
                    if let Err(err) = store.save(&chain) {
                        warn!(error = %err, "failed to re-persist restored chain");
                    }
                    return Some(chain);
                }
                Ok(chain) => {
                    warn!(
                        backup = %backup.filename,
                        blocks = chain.len(),
                        "backup unusable, trying next"
                    );
                }
                Err(err) => {
                    warn!(backup = %backup.filename, error = %err, "backup unreadable, trying next");
                }
            }
        }
        None
    }

    pub fn state(&self) -> ServiceState {
        *self.state.lock()
    }

    pub fn len(&self) -> usize {
        self.chain.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.lock().is_empty()
    }

    fn snapshot(&self) -> Chain {
        self.chain.lock().clone()
    }

    /// Append one attendance block. Under the lock: normalize, build,
    /// validate, append, persist. A persistence failure is logged but does
    /// not roll back the in-memory append: the chain in memory remains the
    /// source of truth and a later save can catch the mirror up.
    pub fn add_attendance(
        &self,
        present_students: Vec<String>,
        metadata: MetadataInput,
    ) -> Result<AppendOutcome, ServiceError> {
        let metadata = metadata.normalize();
        let mut chain = self.chain.lock();
        let outcome = chain.append_attendance(metadata, present_students)?;

        match self.store.save(&chain) {
            Ok(_) => {
                if let Err(err) = self.store.cleanup(self.backup_keep_count) {
                    warn!(error = %err, "backup retention cleanup failed");
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to persist chain after append");
            }
        }

        info!(
            index = outcome.index,
            students = outcome.students_count,
            "attendance block appended"
        );
        Ok(outcome)
    }

    /// Boundary wrapper: extract the roster from positional form fields
    /// before appending.
    pub fn add_attendance_form(
        &self,
        form: &HashMap<String, String>,
        metadata: MetadataInput,
    ) -> Result<AppendOutcome, ServiceError> {
        self.add_attendance(extract_present_students(form), metadata)
    }

    pub fn all_records(&self) -> Vec<AttendanceRow> {
        all_records(&self.snapshot())
    }

    pub fn search_by_student(&self, roll_no: &str) -> Vec<StudentRow> {
        search_by_student(&self.snapshot(), roll_no)
    }

    pub fn stats(&self) -> ChainStats {
        stats(&self.snapshot())
    }

    pub fn analytics(&self) -> AttendanceAnalytics {
        attendance_analytics(&self.snapshot())
    }

    pub fn check_integrity(&self) -> IntegrityReport {
        self.snapshot().check_integrity()
    }

    pub fn report(&self, format: &str) -> Result<String, ServiceError> {
        let format: ReportFormat = format
            .parse()
            .map_err(ServiceError::UnknownReportFormat)?;
        Ok(generate_report(&self.snapshot(), format))
    }

    pub fn export_content(&self, format: &str) -> Result<ExportContent, ServiceError> {
        let format: ExportFormat = format
            .parse()
            .map_err(ServiceError::UnknownExportFormat)?;
        Ok(export_content(&self.snapshot(), format)?)
    }

    pub fn health(&self) -> ServiceHealth {
        let snapshot = self.snapshot();
        let stats = stats(&snapshot);
        let latest_block_age_secs = snapshot
            .tip()
            .map(|tip| (Utc::now() - tip.timestamp()).num_seconds())
            .unwrap_or(-1);
        ServiceHealth {
            healthy: snapshot.check_integrity().is_valid(),
            state: self.state(),
            total_blocks: stats.total_blocks,
            attendance_blocks: stats.attendance_blocks,
            latest_block_age_secs,
        }
    }

    /// Replace the in-memory chain with the primary document's contents.
    pub fn reload(&self) -> Result<usize, ServiceError> {
        let mut chain = self.chain.lock();
        let loaded = self.store.load()?;
        info!(blocks = loaded.len(), "chain reloaded from disk");
        *chain = loaded;
        Ok(chain.len())
    }

    pub fn list_backups(&self) -> Result<Vec<BackupInfo>, ServiceError> {
        Ok(self.store.list_backups()?)
    }

    /// Restore the named backup: swaps the in-memory chain and durably
    /// rewrites the primary document.
    pub fn restore_backup(&self, backup_name: &str) -> Result<usize, ServiceError> {
        let mut chain = self.chain.lock();
        let restored = self.store.restore(backup_name)?;
        *chain = restored;
        *self.state.lock() = ServiceState::Ready;
        Ok(chain.len())
    }

    pub fn cleanup_backups(&self, keep_count: usize) -> Result<usize, ServiceError> {
        Ok(self.store.cleanup(keep_count)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn extraction_preserves_order_and_trims() {
        let form = form(&[
            ("roll_no1", "  001 "),
            ("roll_no2", "002"),
            ("roll_no3", "003"),
        ]);
        assert_eq!(extract_present_students(&form), vec!["001", "002", "003"]);
    }

    #[test]
    fn extraction_stops_at_first_gap() {
        let form = form(&[("roll_no1", "001"), ("roll_no2", "002"), ("roll_no4", "004")]);
        assert_eq!(extract_present_students(&form), vec!["001", "002"]);
    }

    #[test]
    fn extraction_drops_blank_entries_without_breaking_sequence() {
        let form = form(&[("roll_no1", "001"), ("roll_no2", "   "), ("roll_no3", "003")]);
        assert_eq!(extract_present_students(&form), vec!["001", "003"]);
    }

    #[test]
    fn legacy_positional_metadata_normalizes() {
        let metadata = MetadataInput::LegacyPositional(vec![
            "Dr. Smith".to_string(),
            "2024-01-01".to_string(),
            "CS101".to_string(),
            "2024".to_string(),
        ])
        .normalize();
        assert_eq!(metadata.teacher_name, "Dr. Smith");
        assert_eq!(metadata.date, "2024-01-01");
        assert_eq!(metadata.course, "CS101");
        assert_eq!(metadata.year, "2024");
        assert_eq!(metadata.class_id, None);
    }

    #[test]
    fn short_legacy_tuple_fills_empty_fields() {
        let metadata =
            MetadataInput::LegacyPositional(vec!["Dr. Smith".to_string()]).normalize();
        assert_eq!(metadata.teacher_name, "Dr. Smith");
        assert_eq!(metadata.date, "");
        assert_eq!(metadata.course, "");
        assert_eq!(metadata.year, "");
    }
}
