use crate::ipc::error::HandlerErr;
use crate::session::model::{EditMode, FieldValue, Row, SessionKind};
use crate::session::SessionState;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::json;

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Missing and null both read as `None`; any other non-string is rejected.
pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be a string", key))),
    }
}

/// Trimmed optional string; missing reads as empty.
pub fn get_filter_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    Ok(get_optional_str(params, key)?
        .map(|s| s.trim().to_string())
        .unwrap_or_default())
}

pub fn get_optional_f64(params: &serde_json::Value, key: &str) -> Result<Option<f64>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a number", key))),
    }
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, HandlerErr> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| HandlerErr::bad_params(format!("date must be YYYY-MM-DD, got {:?}", raw)))
}

pub fn parse_kind(raw: &str) -> Result<SessionKind, HandlerErr> {
    match raw.trim() {
        "attendance" => Ok(SessionKind::Attendance),
        "marks" => Ok(SessionKind::Marks),
        other => Err(HandlerErr::bad_params(format!(
            "kind must be attendance or marks, got {:?}",
            other
        ))),
    }
}

pub fn parse_mode(params: &serde_json::Value) -> Result<EditMode, HandlerErr> {
    match get_optional_str(params, "mode")?.as_deref().map(str::trim) {
        None | Some("") | Some("edit") => Ok(EditMode::Edit),
        Some("view") => Ok(EditMode::View),
        Some(other) => Err(HandlerErr::bad_params(format!(
            "mode must be edit or view, got {:?}",
            other
        ))),
    }
}

pub fn require_db(db: &Option<Connection>) -> Result<&Connection, HandlerErr> {
    db.as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

fn row_json(row: &Row) -> serde_json::Value {
    let mut out = json!({
        "admissionNo": row.admission_no,
        "name": row.name,
        "gender": row.gender.as_str(),
        "absent": row.is_absent(),
        "dirty": row.is_dirty(),
        "error": row.error,
    });
    match &row.value {
        FieldValue::Status(status) => out["status"] = json!(status.as_str()),
        FieldValue::Mark { raw, .. } => out["mark"] = json!(raw),
    }
    out
}

/// Renders the full observable session state.
pub fn snapshot(session: &SessionState) -> serde_json::Value {
    let rows: Vec<serde_json::Value> = session
        .record()
        .map(|r| r.rows().iter().map(row_json).collect())
        .unwrap_or_default();
    let mut out = json!({
        "phase": session.phase(),
        "kind": session.kind(),
        "mode": session.mode(),
        "key": session.key(),
        "sessionId": session.record().and_then(|r| r.session_id()),
        "saving": session.is_saving(),
        "rows": rows,
    });
    if let Some(meta) = session.meta() {
        out["marksMeta"] = json!(meta);
    }
    out
}
