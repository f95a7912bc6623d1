//! Persistence, backups and the lock-guarded service facade for the
//! attendance ledger. `attendance-core` owns the in-memory primitives; this
//! crate owns everything that touches disk and the single entry point the
//! rest of an application talks to.

pub mod analytics;
pub mod config;
pub mod export;
pub mod persistence;
pub mod records;
pub mod service;

pub use crate::analytics::{
    attendance_analytics, generate_report, AnalyticsOverview, AttendanceAnalytics, GroupBreakdown,
    ReportFormat,
};
pub use crate::config::ServiceConfig;
pub use crate::export::{export_content, ExportContent, ExportFormat};
pub use crate::persistence::{
    BackupInfo, ChainDocument, ChainStore, DocumentMetadata, PersistenceError, SaveReceipt,
    StoredBlock, FORMAT_VERSION,
};
pub use crate::records::{
    all_records, search_by_student, stats, AttendanceRow, ChainStats, StudentRow,
};
pub use crate::service::{
    extract_present_students, LedgerService, MetadataInput, ServiceError, ServiceHealth,
    ServiceState,
};
