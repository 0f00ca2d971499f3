use super::model::{
    EditMode, FieldValue, MarksMeta, Row, RosterEntry, SessionKey, SessionKind, SessionRecord,
};
use super::roster::load_roster;
use super::{Phase, SessionError, SessionState, Ticket};
use crate::backend::{Backend, BackendError, MarkRecord};

/// What the persistence layer knows about a key.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Stored rows are authoritative; the roster is not consulted.
    Found {
        session_id: String,
        rows: Vec<Row>,
        meta: Option<MarksMeta>,
    },
    /// Nothing stored; rows are built from the current roster.
    NotFound { roster: Vec<RosterEntry> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Current(Phase),
    /// A newer selection superseded the request; state untouched.
    Stale,
}

fn mark_row(m: &MarkRecord) -> Row {
    Row::loaded(
        &m.admission_no,
        m.name.as_deref().unwrap_or_default(),
        m.gender,
        FieldValue::Mark {
            raw: m.scored_mark.map(|v| v.to_string()),
            absent: m.is_absent,
        },
    )
}

/// Queries the collaborator for `key`. Runs no request for an incomplete key.
pub fn resolve<B: Backend + ?Sized>(
    backend: &B,
    key: &SessionKey,
) -> Result<Resolution, BackendError> {
    if !key.is_complete() {
        return Ok(Resolution::NotFound { roster: Vec::new() });
    }
    match key.kind {
        SessionKind::Attendance => {
            let Some(date) = key.date() else {
                return Ok(Resolution::NotFound { roster: Vec::new() });
            };
            if let Some(stored) = backend.resolve_attendance(&key.class_id, &key.batch_id, date)? {
                let rows = stored
                    .records
                    .iter()
                    .map(|r| {
                        Row::loaded(
                            &r.admission_no,
                            &r.student_name,
                            r.gender,
                            FieldValue::Status(r.status),
                        )
                    })
                    .collect();
                return Ok(Resolution::Found {
                    session_id: stored.session_id,
                    rows,
                    meta: None,
                });
            }
        }
        SessionKind::Marks => {
            let Some(exam) = key.exam() else {
                return Ok(Resolution::NotFound { roster: Vec::new() });
            };
            if let Some(entry) = backend.find_marks_entry(&key.class_id, &key.batch_id, exam)? {
                let marks = backend.fetch_marks(&entry.id, &entry.term)?;
                return Ok(Resolution::Found {
                    rows: marks.iter().map(mark_row).collect(),
                    meta: Some(MarksMeta {
                        max_mark: Some(entry.max_mark),
                        academic_year: entry.academic_year,
                        school_name: entry.school_name,
                    }),
                    session_id: entry.id,
                });
            }
        }
    }
    let load = load_roster(backend, &key.class_id, &key.batch_id);
    match load.error {
        Some(e) => Err(e),
        None => Ok(Resolution::NotFound {
            roster: load.roster,
        }),
    }
}

impl SessionState {
    /// Applies a resolution result if `ticket` is still current; otherwise
    /// the result is discarded.
    pub fn apply_resolution(
        &mut self,
        ticket: Ticket,
        result: Result<Resolution, BackendError>,
    ) -> Result<Applied, SessionError> {
        if !self.is_current(&ticket) {
            tracing::debug!(
                seq = ticket.seq,
                current = self.seq,
                "discarding stale resolution"
            );
            return Ok(Applied::Stale);
        }
        self.pending = None;
        let key = ticket.key;
        match result {
            Ok(Resolution::Found {
                session_id,
                rows,
                meta,
            }) => {
                tracing::info!(session_id = %session_id, rows = rows.len(), "resolved existing session");
                if key.kind == SessionKind::Marks {
                    self.meta = Some(meta.unwrap_or_else(|| self.meta_defaults.clone()));
                }
                self.record = Some(SessionRecord::Existing {
                    key,
                    session_id,
                    rows,
                });
                Ok(Applied::Current(Phase::Existing))
            }
            Ok(Resolution::NotFound { roster }) => {
                tracing::info!(students = roster.len(), "no stored session, starting from roster");
                let rows = roster.iter().map(|e| Row::from_roster(e, key.kind)).collect();
                if key.kind == SessionKind::Marks {
                    self.meta = Some(self.meta_defaults.clone());
                }
                self.roster = roster;
                self.record = Some(SessionRecord::Absent { key, rows });
                Ok(Applied::Current(Phase::Absent))
            }
            Err(e) => {
                tracing::warn!(error = %e, "session resolution failed");
                self.roster.clear();
                Err(e.into())
            }
        }
    }
}

/// Selects `key` and resolves it synchronously through the same ticketed
/// path an asynchronous caller would use.
pub fn select_and_resolve<B: Backend + ?Sized>(
    state: &mut SessionState,
    backend: &B,
    key: SessionKey,
    mode: EditMode,
) -> Result<Phase, SessionError> {
    let Some(ticket) = state.select(key, mode) else {
        return Ok(state.phase());
    };
    let result = resolve(backend, ticket.key());
    match state.apply_resolution(ticket, result)? {
        Applied::Current(phase) => Ok(phase),
        Applied::Stale => Ok(state.phase()),
    }
}
