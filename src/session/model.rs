use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    #[default]
    #[serde(other)]
    Unspecified,
}

impl Gender {
    pub fn parse(raw: &str) -> Gender {
        match raw.trim().to_ascii_lowercase().as_str() {
            "m" | "male" | "boy" => Gender::Male,
            "f" | "female" | "girl" => Gender::Female,
            _ => Gender::Unspecified,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Unspecified => "unspecified",
        }
    }
}

/// One enrolled student. Immutable for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub admission_no: String,
    pub name: String,
    #[serde(default)]
    pub gender: Gender,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    pub fn parse(raw: &str) -> Option<AttendanceStatus> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "present" | "p" => Some(AttendanceStatus::Present),
            "absent" | "a" => Some(AttendanceStatus::Absent),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
        }
    }

    pub fn toggled(self) -> AttendanceStatus {
        match self {
            AttendanceStatus::Present => AttendanceStatus::Absent,
            AttendanceStatus::Absent => AttendanceStatus::Present,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Attendance,
    Marks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditMode {
    #[default]
    Edit,
    View,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamKey {
    pub subject: String,
    pub term: String,
    pub exam_name: String,
}

impl ExamKey {
    fn is_complete(&self) -> bool {
        !self.subject.trim().is_empty()
            && !self.term.trim().is_empty()
            && !self.exam_name.trim().is_empty()
    }
}

/// Temporal part of a session key: a calendar date for attendance, an exam
/// for marks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum Discriminator {
    Date { date: NaiveDate },
    Exam(ExamKey),
}

/// Composite selection identifying one attendance or marks record set.
/// Equality is component-wise and exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionKey {
    pub kind: SessionKind,
    pub class_id: String,
    pub batch_id: String,
    pub discriminator: Option<Discriminator>,
}

impl SessionKey {
    pub fn attendance(class_id: &str, batch_id: &str, date: Option<NaiveDate>) -> SessionKey {
        SessionKey {
            kind: SessionKind::Attendance,
            class_id: class_id.to_string(),
            batch_id: batch_id.to_string(),
            discriminator: date.map(|date| Discriminator::Date { date }),
        }
    }

    pub fn marks(class_id: &str, batch_id: &str, exam: Option<ExamKey>) -> SessionKey {
        SessionKey {
            kind: SessionKind::Marks,
            class_id: class_id.to_string(),
            batch_id: batch_id.to_string(),
            discriminator: exam.map(Discriminator::Exam),
        }
    }

    pub fn has_roster_filter(&self) -> bool {
        !self.class_id.trim().is_empty() && !self.batch_id.trim().is_empty()
    }

    /// A key is complete when class, batch and a discriminator of the right
    /// kind are all present.
    pub fn is_complete(&self) -> bool {
        if !self.has_roster_filter() {
            return false;
        }
        match (&self.kind, &self.discriminator) {
            (SessionKind::Attendance, Some(Discriminator::Date { .. })) => true,
            (SessionKind::Marks, Some(Discriminator::Exam(exam))) => exam.is_complete(),
            _ => false,
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match &self.discriminator {
            Some(Discriminator::Date { date }) => Some(*date),
            _ => None,
        }
    }

    pub fn exam(&self) -> Option<&ExamKey> {
        match &self.discriminator {
            Some(Discriminator::Exam(exam)) => Some(exam),
            _ => None,
        }
    }

    pub fn clear_discriminator(&mut self) {
        self.discriminator = None;
    }
}

/// Per-row editable value. Marks keep the raw text the user typed so that
/// validation can report non-numeric input.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Status(AttendanceStatus),
    Mark { raw: Option<String>, absent: bool },
}

impl FieldValue {
    pub fn default_for(kind: SessionKind) -> FieldValue {
        match kind {
            SessionKind::Attendance => FieldValue::Status(AttendanceStatus::Present),
            SessionKind::Marks => FieldValue::Mark {
                raw: None,
                absent: false,
            },
        }
    }
}

/// Value supplied by `set_field`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldInput {
    Status(AttendanceStatus),
    Mark(Option<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub admission_no: String,
    pub name: String,
    pub gender: Gender,
    pub value: FieldValue,
    /// Value as loaded or last persisted; a row is dirty when it differs.
    pub baseline: FieldValue,
    pub error: Option<String>,
}

impl Row {
    pub fn from_roster(entry: &RosterEntry, kind: SessionKind) -> Row {
        Row::loaded(
            &entry.admission_no,
            &entry.name,
            entry.gender,
            FieldValue::default_for(kind),
        )
    }

    pub fn loaded(admission_no: &str, name: &str, gender: Gender, value: FieldValue) -> Row {
        Row {
            admission_no: admission_no.to_string(),
            name: name.to_string(),
            gender,
            baseline: value.clone(),
            value,
            error: None,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.value != self.baseline
    }

    pub fn is_absent(&self) -> bool {
        match &self.value {
            FieldValue::Status(status) => *status == AttendanceStatus::Absent,
            FieldValue::Mark { absent, .. } => *absent,
        }
    }
}

/// Exam metadata carried alongside a marks session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarksMeta {
    pub max_mark: Option<f64>,
    pub academic_year: String,
    pub school_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionRecord {
    Absent {
        key: SessionKey,
        rows: Vec<Row>,
    },
    Existing {
        key: SessionKey,
        session_id: String,
        rows: Vec<Row>,
    },
}

impl SessionRecord {
    pub fn key(&self) -> &SessionKey {
        match self {
            SessionRecord::Absent { key, .. } | SessionRecord::Existing { key, .. } => key,
        }
    }

    pub fn rows(&self) -> &[Row] {
        match self {
            SessionRecord::Absent { rows, .. } | SessionRecord::Existing { rows, .. } => rows,
        }
    }

    pub fn rows_mut(&mut self) -> &mut Vec<Row> {
        match self {
            SessionRecord::Absent { rows, .. } | SessionRecord::Existing { rows, .. } => rows,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            SessionRecord::Absent { .. } => None,
            SessionRecord::Existing { session_id, .. } => Some(session_id),
        }
    }
}
