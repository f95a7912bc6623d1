//! Content export: the chain rendered as CSV rows, the primary document
//! JSON, or the analytics summary. Returns bytes plus transport metadata so
//! outer layers can serve downloads without knowing the formats.

use std::str::FromStr;

use attendance_core::{canonical_timestamp, Chain};

use crate::analytics::attendance_analytics;
use crate::persistence::{ChainStore, PersistenceError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    Analytics,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "analytics" => Ok(ExportFormat::Analytics),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExportContent {
    pub body: String,
    pub mime_type: &'static str,
    pub filename: &'static str,
}

pub fn export_content(
    chain: &Chain,
    format: ExportFormat,
) -> Result<ExportContent, PersistenceError> {
    match format {
        ExportFormat::Csv => Ok(ExportContent {
            body: chain_csv(chain),
            mime_type: "text/csv",
            filename: "blockchain_export.csv",
        }),
        ExportFormat::Json => Ok(ExportContent {
            body: ChainStore::document_json(chain)?,
            mime_type: "application/json",
            filename: "blockchain_export.json",
        }),
        ExportFormat::Analytics => {
            let analytics = attendance_analytics(chain);
            let body = serde_json::to_string_pretty(&analytics)
                .map_err(|err| PersistenceError::Malformed(err.to_string()))?;
            Ok(ExportContent {
                body,
                mime_type: "application/json",
                filename: "blockchain_analytics.json",
            })
        }
    }
}

const CSV_HEADER: &str =
    "block_index,timestamp,type,teacher_name,course,year,date,students_present,prev_hash,hash";

fn chain_csv(chain: &Chain) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');

    for block in chain.blocks() {
        let timestamp = canonical_timestamp(block.timestamp());
        match block.data().as_attendance() {
            Some(record) => {
                let row = [
                    block.index().to_string(),
                    timestamp,
                    "attendance".to_string(),
                    record.teacher_name.clone(),
                    record.course.clone(),
                    record.year.clone(),
                    record.date.clone(),
                    record.present_students.join(";"),
                    block.prev_hash().to_string(),
                    block.hash().to_string(),
                ];
                push_csv_row(&mut out, &row);
            }
            None => {
                let row = [
                    block.index().to_string(),
                    timestamp,
                    "genesis".to_string(),
                    String::new(),
                    String::new(),
                    String::new(),
                    String::new(),
                    String::new(),
                    block.prev_hash().to_string(),
                    block.hash().to_string(),
                ];
                push_csv_row(&mut out, &row);
            }
        }
    }

    out
}

fn push_csv_row(out: &mut String, fields: &[String]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&csv_field(field));
    }
    out.push('\n');
}

fn csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
