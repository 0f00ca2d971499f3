use crate::backend::SqliteBackend;
use crate::ipc::error::{reply, HandlerErr};
use crate::ipc::helpers::{
    get_filter_str, get_optional_f64, get_optional_str, get_required_str, parse_date, parse_kind,
    parse_mode, require_db, snapshot,
};
use crate::ipc::types::{AppState, Request};
use crate::session::gate::{self, SubmitOutcome};
use crate::session::model::{AttendanceStatus, ExamKey, FieldInput, SessionKey, SessionKind};
use crate::session::resolver::select_and_resolve;
use crate::session::SessionError;
use serde_json::json;

fn key_from_params(params: &serde_json::Value) -> Result<SessionKey, HandlerErr> {
    let kind = parse_kind(&get_required_str(params, "kind")?)?;
    let class_id = get_filter_str(params, "classId")?;
    let batch_id = get_filter_str(params, "batchId")?;
    match kind {
        SessionKind::Attendance => {
            let date = get_filter_str(params, "date")?;
            let date = if date.is_empty() {
                None
            } else {
                Some(parse_date(&date)?)
            };
            Ok(SessionKey::attendance(&class_id, &batch_id, date))
        }
        SessionKind::Marks => {
            let subject = get_filter_str(params, "subject")?;
            let term = get_filter_str(params, "term")?;
            let exam_name = get_filter_str(params, "examName")?;
            // A partially chosen exam is just an incomplete key.
            let exam = if subject.is_empty() && term.is_empty() && exam_name.is_empty() {
                None
            } else {
                Some(ExamKey {
                    subject,
                    term,
                    exam_name,
                })
            };
            Ok(SessionKey::marks(&class_id, &batch_id, exam))
        }
    }
}

fn handle_select(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(&state.db)?;
    let key = key_from_params(&req.params)?;
    let mode = parse_mode(&req.params)?;
    let backend = SqliteBackend::new(conn);
    let phase = select_and_resolve(&mut state.session, &backend, key, mode)?;
    tracing::debug!(?phase, "session selected");
    Ok(snapshot(&state.session))
}

fn field_input(kind: SessionKind, value: Option<&serde_json::Value>) -> Result<FieldInput, HandlerErr> {
    match kind {
        SessionKind::Attendance => value
            .and_then(|v| v.as_str())
            .and_then(AttendanceStatus::parse)
            .map(FieldInput::Status)
            .ok_or_else(|| HandlerErr::bad_params("value must be Present or Absent")),
        SessionKind::Marks => match value {
            None | Some(serde_json::Value::Null) => Ok(FieldInput::Mark(None)),
            Some(serde_json::Value::String(s)) => Ok(FieldInput::Mark(Some(s.clone()))),
            Some(serde_json::Value::Number(n)) => Ok(FieldInput::Mark(Some(n.to_string()))),
            Some(_) => Err(HandlerErr::bad_params("value must be a string, number or null")),
        },
    }
}

fn handle_set_field(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let admission_no = get_required_str(&req.params, "admissionNo")?;
    let Some(kind) = state.session.kind() else {
        return Err(SessionError::NoSession.into());
    };
    let input = field_input(kind, req.params.get("value"))?;
    let changed = state.session.set_field(&admission_no, input)?;
    Ok(json!({
        "changed": changed,
        "session": snapshot(&state.session),
    }))
}

fn handle_toggle_absent(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let admission_no = get_required_str(&req.params, "admissionNo")?;
    let changed = state.session.toggle_absent(&admission_no)?;
    Ok(json!({
        "changed": changed,
        "session": snapshot(&state.session),
    }))
}

fn handle_set_marks_meta(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let max_mark = get_optional_f64(&req.params, "maxMark")?;
    let academic_year = get_optional_str(&req.params, "academicYear")?;
    let school_name = get_optional_str(&req.params, "schoolName")?;
    state
        .session
        .set_marks_meta(max_mark, academic_year, school_name)?;
    Ok(snapshot(&state.session))
}

fn outcome_json(outcome: &SubmitOutcome) -> serde_json::Value {
    match outcome {
        SubmitOutcome::Created { session_id } => {
            json!({ "outcome": "created", "sessionId": session_id })
        }
        SubmitOutcome::Updated => json!({ "outcome": "updated" }),
        SubmitOutcome::Deleted => json!({ "outcome": "deleted" }),
    }
}

fn handle_submit(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(&state.db)?;
    let created_by = get_optional_str(&req.params, "createdBy")?
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| state.config.user.clone());
    let today = chrono::Local::now().date_naive();
    let backend = SqliteBackend::new(conn);
    let outcome = gate::submit(&mut state.session, &backend, &created_by, today)?;
    let mut out = outcome_json(&outcome);
    out["session"] = snapshot(&state.session);
    Ok(out)
}

fn handle_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(&state.db)?;
    let confirmed = req
        .params
        .get("confirm")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let backend = SqliteBackend::new(conn);
    let outcome = gate::delete(&mut state.session, &backend, confirmed)?;
    let mut out = outcome_json(&outcome);
    out["session"] = snapshot(&state.session);
    Ok(out)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "session.select" => handle_select(state, req),
        "session.get" => Ok(snapshot(&state.session)),
        "session.setField" => handle_set_field(state, req),
        "session.toggleAbsent" => handle_toggle_absent(state, req),
        "session.setMarksMeta" => handle_set_marks_meta(state, req),
        "session.submit" => handle_submit(state, req),
        "session.delete" => handle_delete(state, req),
        _ => return None,
    };
    Some(reply(&req.id, result))
}
