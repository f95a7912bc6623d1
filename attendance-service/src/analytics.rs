//! Aggregate views over the attendance history: overview counters and
//! per-teacher / per-course breakdowns, plus the formatted report.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::str::FromStr;

use attendance_core::Chain;
use chrono::Utc;
use serde::Serialize;

use crate::records::{all_records, AttendanceRow};

#[derive(Clone, Debug, Serialize)]
pub struct AnalyticsOverview {
    pub total_sessions: usize,
    pub total_attendance_records: usize,
    pub unique_students: usize,
    pub average_attendance: f64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct GroupBreakdown {
    pub sessions: usize,
    pub students_marked: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct AttendanceAnalytics {
    pub overview: AnalyticsOverview,
    pub by_teacher: BTreeMap<String, GroupBreakdown>,
    pub by_course: BTreeMap<String, GroupBreakdown>,
}

pub fn attendance_analytics(chain: &Chain) -> AttendanceAnalytics {
    let records = all_records(chain);
    analytics_from_rows(&records)
}

fn analytics_from_rows(records: &[AttendanceRow]) -> AttendanceAnalytics {
    let mut unique_students = BTreeSet::new();
    let mut by_teacher: BTreeMap<String, GroupBreakdown> = BTreeMap::new();
    let mut by_course: BTreeMap<String, GroupBreakdown> = BTreeMap::new();
    let mut total_attendance_records = 0;

    for row in records {
        total_attendance_records += row.student_count;
        for student in &row.present_students {
            unique_students.insert(student.clone());
        }

        let teacher = by_teacher.entry(row.teacher_name.clone()).or_default();
        teacher.sessions += 1;
        teacher.students_marked += row.student_count;

        let course = by_course.entry(row.course.clone()).or_default();
        course.sessions += 1;
        course.students_marked += row.student_count;
    }

    let average_attendance = if records.is_empty() {
        0.0
    } else {
        total_attendance_records as f64 / records.len() as f64
    };

    AttendanceAnalytics {
        overview: AnalyticsOverview {
            total_sessions: records.len(),
            total_attendance_records,
            unique_students: unique_students.len(),
            average_attendance,
        },
        by_teacher,
        by_course,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            other => Err(other.to_string()),
        }
    }
}

pub fn generate_report(chain: &Chain, format: ReportFormat) -> String {
    let analytics = attendance_analytics(chain);
    match format {
        ReportFormat::Json => {
            serde_json::to_string_pretty(&analytics).unwrap_or_else(|_| "{}".to_string())
        }
        ReportFormat::Text => render_text_report(&analytics),
    }
}

fn render_text_report(analytics: &AttendanceAnalytics) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Attendance Report");
    let _ = writeln!(out, "Generated: {}", Utc::now().to_rfc3339());
    let _ = writeln!(out);
    let _ = writeln!(out, "Total sessions: {}", analytics.overview.total_sessions);
    let _ = writeln!(
        out,
        "Total attendance records: {}",
        analytics.overview.total_attendance_records
    );
    let _ = writeln!(
        out,
        "Unique students: {}",
        analytics.overview.unique_students
    );
    let _ = writeln!(
        out,
        "Average attendance per session: {:.1}",
        analytics.overview.average_attendance
    );

    let _ = writeln!(out);
    let _ = writeln!(out, "By course:");
    for (course, breakdown) in &analytics.by_course {
        let _ = writeln!(
            out,
            "  {}: {} sessions, {} students marked",
            course, breakdown.sessions, breakdown.students_marked
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "By teacher:");
    for (teacher, breakdown) in &analytics.by_teacher {
        let _ = writeln!(
            out,
            "  {}: {} sessions, {} students marked",
            teacher, breakdown.sessions, breakdown.students_marked
        );
    }

    out
}
