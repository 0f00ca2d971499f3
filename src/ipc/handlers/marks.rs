use crate::backend::{Backend, MarksEntryFilter, SqliteBackend};
use crate::ipc::error::{reply, HandlerErr};
use crate::ipc::helpers::{get_optional_str, get_required_str, parse_mode, require_db, snapshot};
use crate::ipc::types::{AppState, Request};
use crate::session::model::SessionKey;
use crate::session::resolver::select_and_resolve;
use serde_json::json;

fn handle_entries_list(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(&state.db)?;
    let filter = MarksEntryFilter {
        class_id: get_optional_str(&req.params, "classId")?,
        term: get_optional_str(&req.params, "term")?,
        search: get_optional_str(&req.params, "search")?,
    };
    let entries: Vec<_> = SqliteBackend::new(conn)
        .list_marks_entries()?
        .into_iter()
        .filter(|e| filter.matches(e))
        .collect();
    Ok(json!({ "entries": entries }))
}

fn handle_entries_open(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(&state.db)?;
    let entry_id = get_required_str(&req.params, "entryId")?;
    let mode = parse_mode(&req.params)?;
    let backend = SqliteBackend::new(conn);
    let Some(entry) = backend.marks_entry(&entry_id)? else {
        return Err(HandlerErr::new(
            "not_found",
            format!("exam entry {} not found", entry_id),
        ));
    };
    let key = SessionKey::marks(&entry.class_id, &entry.batch_id, Some(entry.exam_key()));
    select_and_resolve(&mut state.session, &backend, key, mode)?;
    Ok(snapshot(&state.session))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "marks.entries.list" => handle_entries_list(state, req),
        "marks.entries.open" => handle_entries_open(state, req),
        _ => return None,
    };
    Some(reply(&req.id, result))
}
