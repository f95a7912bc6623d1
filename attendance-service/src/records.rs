//! Read-only projections over a chain snapshot. Nothing here mutates the
//! chain; every function walks the blocks and builds rows.

use attendance_core::Chain;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::persistence::StoredBlock;

/// One attendance session, flattened for listing.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct AttendanceRow {
    pub block_index: u64,
    pub timestamp: DateTime<Utc>,
    pub teacher_name: String,
    pub date: String,
    pub course: String,
    pub year: String,
    pub present_students: Vec<String>,
    pub student_count: usize,
}

/// All attendance sessions in chain order.
pub fn all_records(chain: &Chain) -> Vec<AttendanceRow> {
    chain
        .blocks()
        .iter()
        .filter(|block| block.index() > 0)
        .filter_map(|block| {
            block.data().as_attendance().map(|record| AttendanceRow {
                block_index: block.index(),
                timestamp: block.timestamp(),
                teacher_name: record.teacher_name.clone(),
                date: record.date.clone(),
                course: record.course.clone(),
                year: record.year.clone(),
                present_students: record.present_students.clone(),
                student_count: record.present_students.len(),
            })
        })
        .collect()
}

/// One session a given student attended.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct StudentRow {
    pub date: String,
    pub course: String,
    pub year: String,
    pub teacher_name: String,
}

/// Every session where `roll_no` appears in the present list.
pub fn search_by_student(chain: &Chain, roll_no: &str) -> Vec<StudentRow> {
    chain
        .blocks()
        .iter()
        .filter(|block| block.index() > 0)
        .filter_map(|block| block.data().as_attendance())
        .filter(|record| record.present_students.iter().any(|id| id == roll_no))
        .map(|record| StudentRow {
            date: record.date.clone(),
            course: record.course.clone(),
            year: record.year.clone(),
            teacher_name: record.teacher_name.clone(),
        })
        .collect()
}

#[derive(Clone, Debug, Serialize)]
pub struct ChainStats {
    pub total_blocks: usize,
    pub genesis_block: Option<StoredBlock>,
    pub latest_block: Option<StoredBlock>,
    pub attendance_blocks: usize,
    pub total_attendance_records: usize,
}

/// Summary counters plus the first and last block.
pub fn stats(chain: &Chain) -> ChainStats {
    let mut attendance_blocks = 0;
    let mut total_attendance_records = 0;
    for block in chain.blocks() {
        if block.index() > 0 {
            if let Some(record) = block.data().as_attendance() {
                attendance_blocks += 1;
                total_attendance_records += record.present_students.len();
            }
        }
    }

    ChainStats {
        total_blocks: chain.len(),
        genesis_block: chain.get(0).map(StoredBlock::from),
        latest_block: chain.tip().map(StoredBlock::from),
        attendance_blocks,
        total_attendance_records,
    }
}
