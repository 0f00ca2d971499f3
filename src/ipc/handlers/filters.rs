use crate::backend::{Backend, SqliteBackend};
use crate::ipc::error::{reply, HandlerErr};
use crate::ipc::helpers::{get_required_str, require_db};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_classes(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(&state.db)?;
    let classes = SqliteBackend::new(conn).fetch_classes()?;
    Ok(json!({ "classes": classes }))
}

fn handle_batches(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(&state.db)?;
    let class_id = get_required_str(&req.params, "classId")?;
    if class_id.trim().is_empty() {
        return Ok(json!({ "batches": [] }));
    }
    let batches = SqliteBackend::new(conn).fetch_batches(class_id.trim())?;
    Ok(json!({ "batches": batches }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "filters.classes" => handle_classes(state),
        "filters.batches" => handle_batches(state, req),
        _ => return None,
    };
    Some(reply(&req.id, result))
}
