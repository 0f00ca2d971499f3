//! Persistence collaborator contract.
//!
//! The reconciler never touches storage directly: everything it needs is
//! expressed by [`Backend`]. `SqliteBackend` is the workspace implementation;
//! tests substitute an in-memory fake.

mod sqlite;

pub use sqlite::SqliteBackend;

use crate::session::model::{AttendanceStatus, ExamKey, Gender, RosterEntry};
use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum BackendError {
    /// Storage or transport failure. Nothing was applied.
    #[error("collaborator unreachable: {0}")]
    Unreachable(String),
    /// The collaborator refused the request; the message is user-facing.
    #[error("{0}")]
    Rejected(String),
}

impl From<rusqlite::Error> for BackendError {
    fn from(e: rusqlite::Error) -> Self {
        BackendError::Unreachable(e.to_string())
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub admission_no: String,
    /// Joined from the roster on read; never persisted with the record.
    #[serde(skip)]
    pub gender: Gender,
    pub student_name: String,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredAttendance {
    pub session_id: String,
    pub records: Vec<AttendanceRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAttendance {
    pub class_id: String,
    pub batch_id: String,
    pub date: NaiveDate,
    pub created_by: String,
    pub records: Vec<AttendanceRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarksEntry {
    pub id: String,
    pub class_id: String,
    pub batch_id: String,
    pub subject: String,
    pub term: String,
    pub exam_name: String,
    pub max_mark: f64,
    pub academic_year: String,
    pub school_name: String,
    pub created_at: String,
}

impl MarksEntry {
    pub fn exam_key(&self) -> ExamKey {
        ExamKey {
            subject: self.subject.clone(),
            term: self.term.clone(),
            exam_name: self.exam_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkRecord {
    pub admission_no: String,
    #[serde(skip)]
    pub gender: Gender,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub scored_mark: Option<f64>,
    pub is_absent: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMarksEntry {
    pub class_id: String,
    pub batch_id: String,
    pub subject: String,
    pub term: String,
    pub exam_name: String,
    pub max_mark: f64,
    pub academic_year: String,
    pub school_name: String,
    pub created_by: String,
    pub marks: Vec<MarkRecord>,
}

/// Scored value on the marks update path.
///
/// `Unchanged` leaves the stored mark alone and is omitted from the payload,
/// `Cleared` is an explicit null (student absent), `Value` overwrites.
/// The create path has no `Unchanged`: every row carries a value or null.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarkPatch {
    Unchanged,
    Cleared,
    Value(f64),
}

impl MarkPatch {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, MarkPatch::Unchanged)
    }
}

impl Serialize for MarkPatch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MarkPatch::Value(v) => serializer.serialize_f64(*v),
            MarkPatch::Unchanged | MarkPatch::Cleared => serializer.serialize_none(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkUpdate {
    pub admission_no: String,
    #[serde(skip_serializing_if = "MarkPatch::is_unchanged")]
    pub scored_mark: MarkPatch,
    pub is_absent: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarksUpdate {
    pub entry_id: String,
    pub max_mark: f64,
    pub marks: Vec<MarkUpdate>,
}

/// Listing filter for marks entries. Empty or `All` values match everything.
#[derive(Debug, Clone, Default)]
pub struct MarksEntryFilter {
    pub class_id: Option<String>,
    pub term: Option<String>,
    pub search: Option<String>,
}

impl MarksEntryFilter {
    pub fn matches(&self, entry: &MarksEntry) -> bool {
        fn wildcard(v: &Option<String>) -> Option<&str> {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("all"))
        }
        if let Some(class_id) = wildcard(&self.class_id) {
            if entry.class_id != class_id {
                return false;
            }
        }
        if let Some(term) = wildcard(&self.term) {
            if entry.term != term {
                return false;
            }
        }
        let needle = self
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_default();
        if needle.is_empty() {
            return true;
        }
        [
            &entry.exam_name,
            &entry.class_id,
            &entry.batch_id,
            &entry.subject,
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
    }
}

pub trait Backend {
    /// Ordered as stored; callers must not re-sort.
    fn fetch_roster(&self, class_id: &str, batch_id: &str) -> BackendResult<Vec<RosterEntry>>;
    fn fetch_classes(&self) -> BackendResult<Vec<String>>;
    fn fetch_batches(&self, class_id: &str) -> BackendResult<Vec<String>>;

    fn resolve_attendance(
        &self,
        class_id: &str,
        batch_id: &str,
        date: NaiveDate,
    ) -> BackendResult<Option<StoredAttendance>>;
    /// Returns the new session identifier.
    fn create_attendance(&self, new: &NewAttendance) -> BackendResult<String>;
    fn update_attendance(&self, session_id: &str, records: &[AttendanceRecord])
        -> BackendResult<()>;
    fn delete_attendance(&self, session_id: &str) -> BackendResult<()>;

    fn marks_entry(&self, entry_id: &str) -> BackendResult<Option<MarksEntry>>;
    fn find_marks_entry(
        &self,
        class_id: &str,
        batch_id: &str,
        exam: &ExamKey,
    ) -> BackendResult<Option<MarksEntry>>;
    fn fetch_marks(&self, entry_id: &str, term: &str) -> BackendResult<Vec<MarkRecord>>;
    /// Returns the new entry identifier.
    fn create_marks_entry(&self, new: &NewMarksEntry) -> BackendResult<String>;
    fn update_marks_entry(&self, update: &MarksUpdate) -> BackendResult<()>;
    fn list_marks_entries(&self) -> BackendResult<Vec<MarksEntry>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(class_id: &str, term: &str, exam_name: &str) -> MarksEntry {
        MarksEntry {
            id: "e1".to_string(),
            class_id: class_id.to_string(),
            batch_id: "A".to_string(),
            subject: "Maths".to_string(),
            term: term.to_string(),
            exam_name: exam_name.to_string(),
            max_mark: 50.0,
            academic_year: "2024-25".to_string(),
            school_name: "My School".to_string(),
            created_at: String::new(),
        }
    }

    #[test]
    fn mark_update_payload_distinguishes_three_states() {
        let rows = vec![
            MarkUpdate {
                admission_no: "1".to_string(),
                scored_mark: MarkPatch::Value(42.0),
                is_absent: false,
            },
            MarkUpdate {
                admission_no: "2".to_string(),
                scored_mark: MarkPatch::Cleared,
                is_absent: true,
            },
            MarkUpdate {
                admission_no: "3".to_string(),
                scored_mark: MarkPatch::Unchanged,
                is_absent: false,
            },
        ];
        let v = serde_json::to_value(&rows).expect("serialize");
        assert_eq!(v[0], json!({ "admissionNo": "1", "scoredMark": 42.0, "isAbsent": false }));
        assert_eq!(v[1], json!({ "admissionNo": "2", "scoredMark": null, "isAbsent": true }));
        assert_eq!(v[2], json!({ "admissionNo": "3", "isAbsent": false }));
    }

    #[test]
    fn entry_filter_treats_all_as_wildcard_and_searches_case_insensitively() {
        let e = entry("7", "Term 1", "Midterm");
        assert!(MarksEntryFilter::default().matches(&e));
        let all = MarksEntryFilter {
            class_id: Some("All".to_string()),
            term: Some("ALL".to_string()),
            search: Some("  ".to_string()),
        };
        assert!(all.matches(&e));
        let by_term = MarksEntryFilter {
            term: Some("Term 2".to_string()),
            ..Default::default()
        };
        assert!(!by_term.matches(&e));
        let search = MarksEntryFilter {
            search: Some("MATH".to_string()),
            ..Default::default()
        };
        assert!(search.matches(&e));
        let miss = MarksEntryFilter {
            search: Some("science".to_string()),
            ..Default::default()
        };
        assert!(!miss.matches(&e));
    }
}
