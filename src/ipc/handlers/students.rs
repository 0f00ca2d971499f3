use crate::backend::SqliteBackend;
use crate::ipc::error::{reply, HandlerErr};
use crate::ipc::helpers::{get_filter_str, get_optional_str, get_required_str, require_db, snapshot};
use crate::ipc::types::{AppState, Request};
use crate::session::model::{Gender, RosterEntry};
use serde_json::json;

fn handle_students_add(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(&state.db)?;
    let class_id = get_required_str(&req.params, "classId")?;
    let batch_id = get_required_str(&req.params, "batchId")?;
    let admission_no = get_required_str(&req.params, "admissionNo")?;
    let name = get_required_str(&req.params, "name")?;
    let gender = get_optional_str(&req.params, "gender")?
        .map(|g| Gender::parse(&g))
        .unwrap_or_default();

    for (key, value) in [
        ("classId", &class_id),
        ("batchId", &batch_id),
        ("admissionNo", &admission_no),
        ("name", &name),
    ] {
        if value.trim().is_empty() {
            return Err(HandlerErr::bad_params(format!("{} must not be empty", key)));
        }
    }

    let entry = RosterEntry {
        admission_no: admission_no.trim().to_string(),
        name: name.trim().to_string(),
        gender,
    };
    SqliteBackend::new(conn).add_student(class_id.trim(), batch_id.trim(), &entry)?;
    tracing::debug!(class = %class_id, batch = %batch_id, admission_no = %entry.admission_no, "student added");
    Ok(json!({ "admissionNo": entry.admission_no }))
}

fn handle_students_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(&state.db)?;
    let class_id = get_filter_str(&req.params, "classId")?;
    let batch_id = get_filter_str(&req.params, "batchId")?;
    let backend = SqliteBackend::new(conn);
    state.session.load_roster(&backend, &class_id, &batch_id)?;
    Ok(json!({
        "students": state.session.roster(),
        "session": snapshot(&state.session),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.add" => handle_students_add(state, req),
        "students.list" => handle_students_list(state, req),
        _ => return None,
    };
    Some(reply(&req.id, result))
}
