use super::model::{EditMode, FieldValue, MarksMeta, Row, SessionKey, SessionKind, SessionRecord};
use super::{RowIssue, SessionError, SessionState};
use crate::backend::{
    AttendanceRecord, Backend, BackendResult, MarkPatch, MarkRecord, MarkUpdate, MarksUpdate,
    NewAttendance, NewMarksEntry,
};
use chrono::NaiveDate;

pub const MISSING_MARK: &str = "Please Enter Marks";

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitRequest {
    CreateAttendance(NewAttendance),
    UpdateAttendance {
        session_id: String,
        records: Vec<AttendanceRecord>,
    },
    DeleteAttendance {
        session_id: String,
    },
    CreateMarks(NewMarksEntry),
    UpdateMarks(MarksUpdate),
}

impl SubmitRequest {
    fn label(&self) -> &'static str {
        match self {
            SubmitRequest::CreateAttendance(_) => "attendance.create",
            SubmitRequest::UpdateAttendance { .. } => "attendance.update",
            SubmitRequest::DeleteAttendance { .. } => "attendance.delete",
            SubmitRequest::CreateMarks(_) => "marks.create",
            SubmitRequest::UpdateMarks(_) => "marks.update",
        }
    }
}

/// A validated persistence operation, tagged with the selection it was
/// prepared for. Holding one means the saving guard is set.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    seq: u64,
    pub request: SubmitRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Created { session_id: String },
    Updated,
    Deleted,
}

fn parse_mark(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn is_academic_year(value: &str) -> bool {
    let b = value.as_bytes();
    b.len() == 7
        && b[4] == b'-'
        && b[..4].iter().all(u8::is_ascii_digit)
        && b[5..].iter().all(u8::is_ascii_digit)
}

/// Per-row completeness and range checks. Absent rows are skipped.
pub fn validate_rows(rows: &[Row], max_mark: Option<f64>) -> Vec<RowIssue> {
    let mut issues = Vec::new();
    for row in rows {
        if row.is_absent() {
            continue;
        }
        let FieldValue::Mark { raw, .. } = &row.value else {
            continue;
        };
        let message = match raw.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => Some(MISSING_MARK.to_string()),
            Some(text) => match parse_mark(text) {
                None => Some("Marks must be a number".to_string()),
                Some(v) => match max_mark {
                    Some(max) if v < 0.0 || v > max => {
                        Some(format!("Marks must be between 0 and {max}"))
                    }
                    _ => None,
                },
            },
        };
        if let Some(message) = message {
            issues.push(RowIssue {
                admission_no: row.admission_no.clone(),
                message,
            });
        }
    }
    issues
}

fn attendance_records(rows: &[Row], only_dirty: bool) -> Vec<AttendanceRecord> {
    rows.iter()
        .filter(|r| !only_dirty || r.is_dirty())
        .filter_map(|r| match r.value {
            FieldValue::Status(status) => Some(AttendanceRecord {
                admission_no: r.admission_no.clone(),
                gender: r.gender,
                student_name: r.name.clone(),
                status,
            }),
            FieldValue::Mark { .. } => None,
        })
        .collect()
}

fn mark_records(rows: &[Row]) -> Vec<MarkRecord> {
    rows.iter()
        .filter_map(|r| match &r.value {
            FieldValue::Mark { raw, absent } => Some(MarkRecord {
                admission_no: r.admission_no.clone(),
                gender: r.gender,
                name: None,
                scored_mark: if *absent {
                    None
                } else {
                    raw.as_deref().and_then(parse_mark)
                },
                is_absent: *absent,
            }),
            FieldValue::Status(_) => None,
        })
        .collect()
}

fn mark_updates(rows: &[Row]) -> Vec<MarkUpdate> {
    rows.iter()
        .filter(|r| r.is_dirty())
        .filter_map(|r| {
            let (FieldValue::Mark { raw, absent }, FieldValue::Mark { raw: before, .. }) =
                (&r.value, &r.baseline)
            else {
                return None;
            };
            let scored_mark = if *absent {
                MarkPatch::Cleared
            } else if raw == before {
                MarkPatch::Unchanged
            } else {
                match raw.as_deref().and_then(parse_mark) {
                    Some(v) => MarkPatch::Value(v),
                    None => MarkPatch::Unchanged,
                }
            };
            Some(MarkUpdate {
                admission_no: r.admission_no.clone(),
                scored_mark,
                is_absent: *absent,
            })
        })
        .collect()
}

fn build_request(
    record: &SessionRecord,
    meta: Option<&MarksMeta>,
    created_by: &str,
    today: NaiveDate,
) -> Result<SubmitRequest, SessionError> {
    let key: &SessionKey = record.key();
    match (key.kind, record) {
        (SessionKind::Attendance, SessionRecord::Absent { rows, .. }) => {
            let Some(date) = key.date() else {
                return Err(SessionError::BadInput("select a date first".to_string()));
            };
            if date > today {
                return Err(SessionError::BadInput(
                    "attendance cannot be recorded for a future date".to_string(),
                ));
            }
            Ok(SubmitRequest::CreateAttendance(NewAttendance {
                class_id: key.class_id.clone(),
                batch_id: key.batch_id.clone(),
                date,
                created_by: created_by.to_string(),
                records: attendance_records(rows, false),
            }))
        }
        (SessionKind::Attendance, SessionRecord::Existing { session_id, rows, .. }) => {
            Ok(SubmitRequest::UpdateAttendance {
                session_id: session_id.clone(),
                records: attendance_records(rows, true),
            })
        }
        (SessionKind::Marks, _) => {
            let Some(meta) = meta else {
                return Err(SessionError::NoSession);
            };
            let Some(max_mark) = meta.max_mark else {
                return Err(SessionError::BadInput(
                    "maxMark must be a positive number".to_string(),
                ));
            };
            match record {
                SessionRecord::Absent { rows, .. } => {
                    let Some(exam) = key.exam() else {
                        return Err(SessionError::BadInput("select an exam first".to_string()));
                    };
                    if !is_academic_year(&meta.academic_year) {
                        return Err(SessionError::BadInput(
                            "academicYear must look like 2024-25".to_string(),
                        ));
                    }
                    Ok(SubmitRequest::CreateMarks(NewMarksEntry {
                        class_id: key.class_id.clone(),
                        batch_id: key.batch_id.clone(),
                        subject: exam.subject.clone(),
                        term: exam.term.clone(),
                        exam_name: exam.exam_name.clone(),
                        max_mark,
                        academic_year: meta.academic_year.clone(),
                        school_name: meta.school_name.clone(),
                        created_by: created_by.to_string(),
                        marks: mark_records(rows),
                    }))
                }
                SessionRecord::Existing {
                    session_id, rows, ..
                } => Ok(SubmitRequest::UpdateMarks(MarksUpdate {
                    entry_id: session_id.clone(),
                    max_mark,
                    marks: mark_updates(rows),
                })),
            }
        }
    }
}

impl SessionState {
    fn check_gate_open(&self) -> Result<(), SessionError> {
        if self.mode == EditMode::View {
            return Err(SessionError::ReadOnly);
        }
        if self.saving {
            return Err(SessionError::Busy);
        }
        if self.pending.is_some() || self.record.is_none() {
            return Err(SessionError::NoSession);
        }
        Ok(())
    }

    /// Validates the working set and, if it is complete, builds the create or
    /// update request and raises the saving guard. Nothing is sent on
    /// failure; per-row errors are stored on the rows.
    pub fn prepare_submit(
        &mut self,
        created_by: &str,
        today: NaiveDate,
    ) -> Result<Submission, SessionError> {
        self.check_gate_open()?;
        let max_mark = self.meta.as_ref().and_then(|m| m.max_mark);
        let Some(record) = self.record.as_mut() else {
            return Err(SessionError::NoSession);
        };
        if record.key().kind == SessionKind::Marks && max_mark.is_none() {
            return Err(SessionError::BadInput(
                "maxMark must be a positive number".to_string(),
            ));
        }
        let issues = validate_rows(record.rows(), max_mark);
        for row in record.rows_mut() {
            row.error = issues
                .iter()
                .find(|i| i.admission_no == row.admission_no)
                .map(|i| i.message.clone());
        }
        if !issues.is_empty() {
            tracing::info!(rows = issues.len(), "submission blocked by validation");
            return Err(SessionError::Validation(issues));
        }
        let request = build_request(record, self.meta.as_ref(), created_by, today)?;
        self.saving = true;
        Ok(Submission {
            seq: self.seq,
            request,
        })
    }

    /// Builds a delete for an existing attendance session. Requires explicit
    /// confirmation.
    pub fn prepare_delete(&mut self, confirmed: bool) -> Result<Submission, SessionError> {
        self.check_gate_open()?;
        let Some(SessionRecord::Existing {
            key, session_id, ..
        }) = self.record.as_ref()
        else {
            return Err(SessionError::NoSession);
        };
        if key.kind == SessionKind::Marks {
            return Err(SessionError::BadInput(
                "marks entries cannot be deleted".to_string(),
            ));
        }
        if !confirmed {
            return Err(SessionError::ConfirmationRequired);
        }
        let request = SubmitRequest::DeleteAttendance {
            session_id: session_id.clone(),
        };
        self.saving = true;
        Ok(Submission {
            seq: self.seq,
            request,
        })
    }

    /// Releases the saving guard and applies the outcome. If the selection
    /// changed while the request was in flight the outcome is reported but
    /// not applied.
    pub fn complete_submission(
        &mut self,
        submission: Submission,
        result: BackendResult<SubmitOutcome>,
    ) -> Result<SubmitOutcome, SessionError> {
        self.saving = false;
        let label = submission.request.label();
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(op = label, error = %e, "submission failed");
                return Err(e.into());
            }
        };
        if submission.seq != self.seq {
            tracing::debug!(op = label, "selection changed during save, not applying");
            return Ok(outcome);
        }
        tracing::info!(op = label, "submission applied");
        match &outcome {
            SubmitOutcome::Created { session_id } => {
                if let Some(SessionRecord::Absent { key, rows }) = self.record.take() {
                    self.record = Some(SessionRecord::Existing {
                        key,
                        session_id: session_id.clone(),
                        rows,
                    });
                }
                self.settle_rows();
            }
            SubmitOutcome::Updated => self.settle_rows(),
            SubmitOutcome::Deleted => self.reset_discriminator(),
        }
        Ok(outcome)
    }

    fn settle_rows(&mut self) {
        if let Some(record) = self.record.as_mut() {
            for row in record.rows_mut() {
                row.baseline = row.value.clone();
                row.error = None;
            }
        }
    }
}

/// Sends a prepared request to the collaborator.
pub fn execute<B: Backend + ?Sized>(
    backend: &B,
    request: &SubmitRequest,
) -> BackendResult<SubmitOutcome> {
    match request {
        SubmitRequest::CreateAttendance(new) => backend
            .create_attendance(new)
            .map(|session_id| SubmitOutcome::Created { session_id }),
        SubmitRequest::UpdateAttendance {
            session_id,
            records,
        } => backend
            .update_attendance(session_id, records)
            .map(|_| SubmitOutcome::Updated),
        SubmitRequest::DeleteAttendance { session_id } => backend
            .delete_attendance(session_id)
            .map(|_| SubmitOutcome::Deleted),
        SubmitRequest::CreateMarks(new) => backend
            .create_marks_entry(new)
            .map(|session_id| SubmitOutcome::Created { session_id }),
        SubmitRequest::UpdateMarks(update) => backend
            .update_marks_entry(update)
            .map(|_| SubmitOutcome::Updated),
    }
}

pub fn submit<B: Backend + ?Sized>(
    state: &mut SessionState,
    backend: &B,
    created_by: &str,
    today: NaiveDate,
) -> Result<SubmitOutcome, SessionError> {
    let submission = state.prepare_submit(created_by, today)?;
    let result = execute(backend, &submission.request);
    state.complete_submission(submission, result)
}

pub fn delete<B: Backend + ?Sized>(
    state: &mut SessionState,
    backend: &B,
    confirmed: bool,
) -> Result<SubmitOutcome, SessionError> {
    let submission = state.prepare_delete(confirmed)?;
    let result = execute(backend, &submission.request);
    state.complete_submission(submission, result)
}
