use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_rollbookd");
    let mut child = Command::new(exe)
        .env_remove("ROLLBOOKD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn rollbookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_default()
}

fn error_code(value: &serde_json::Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

fn open_workspace_with_roster(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &PathBuf,
) {
    request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    for (i, (adm, name)) in [("201", "Meera"), ("202", "Kiran")].iter().enumerate() {
        request_ok(
            stdin,
            reader,
            &format!("seed-{}", i),
            "students.add",
            json!({ "classId": "7", "batchId": "B", "admissionNo": adm, "name": name }),
        );
    }
}

fn unit_test_key() -> serde_json::Value {
    json!({
        "kind": "marks",
        "classId": "7",
        "batchId": "B",
        "subject": "Maths",
        "term": "Term 1",
        "examName": "Unit Test 1",
    })
}

#[test]
fn out_of_range_mark_blocks_submission_and_flags_row() {
    let workspace = temp_dir("rollbook-marks-validation");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    open_workspace_with_roster(&mut stdin, &mut reader, &workspace);

    let snap = request_ok(&mut stdin, &mut reader, "1", "session.select", unit_test_key());
    assert_eq!(snap["phase"], "absent");
    assert_eq!(snap["marksMeta"]["academicYear"], "2024-25");
    assert_eq!(snap["marksMeta"]["schoolName"], "My School");
    assert!(snap["marksMeta"]["maxMark"].is_null());

    let no_max = request(&mut stdin, &mut reader, "2", "session.submit", json!({}));
    assert_eq!(error_code(&no_max), "bad_params");

    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "session.setMarksMeta",
        json!({ "maxMark": 100 }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "session.setField",
        json!({ "admissionNo": "201", "value": "150" }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "session.toggleAbsent",
        json!({ "admissionNo": "202" }),
    );

    let resp = request(&mut stdin, &mut reader, "6", "session.submit", json!({}));
    assert_eq!(resp["ok"], false);
    assert_eq!(error_code(&resp), "validation_failed");
    let issues = resp["error"]["details"]["rows"].as_array().expect("rows");
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0]["admissionNo"], "201");
    assert_eq!(issues[0]["message"], "Marks must be between 0 and 100");

    let after = request_ok(&mut stdin, &mut reader, "7", "session.get", json!({}));
    assert_eq!(after["phase"], "absent");
    assert_eq!(after["saving"], false);
    assert_eq!(after["rows"][0]["error"], "Marks must be between 0 and 100");
    assert!(after["rows"][1]["error"].is_null());

    let _ = child.kill();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn marks_entry_is_created_listed_updated_and_reopened() {
    let workspace = temp_dir("rollbook-marks-lifecycle");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    open_workspace_with_roster(&mut stdin, &mut reader, &workspace);

    request_ok(&mut stdin, &mut reader, "1", "session.select", unit_test_key());
    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "session.setMarksMeta",
        json!({ "maxMark": 100, "schoolName": "Hillside School" }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "session.setField",
        json!({ "admissionNo": "201", "value": 85 }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "session.toggleAbsent",
        json!({ "admissionNo": "202" }),
    );
    let created = request_ok(&mut stdin, &mut reader, "5", "session.submit", json!({}));
    assert_eq!(created["outcome"], "created");
    let entry_id = created["sessionId"].as_str().expect("entry id").to_string();
    assert_eq!(created["session"]["phase"], "existing");

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "marks.entries.list",
        json!({ "classId": "All", "search": "unit" }),
    );
    let entries = listed["entries"].as_array().expect("entries");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["id"], entry_id.as_str());
    assert_eq!(entries[0]["examName"], "Unit Test 1");
    assert_eq!(entries[0]["schoolName"], "Hillside School");

    let other_term = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "marks.entries.list",
        json!({ "term": "Term 2" }),
    );
    assert_eq!(other_term["entries"].as_array().map(|e| e.len()), Some(0));

    request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "session.setField",
        json!({ "admissionNo": "201", "value": "90" }),
    );
    let updated = request_ok(&mut stdin, &mut reader, "9", "session.submit", json!({}));
    assert_eq!(updated["outcome"], "updated");

    let reopened = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "marks.entries.open",
        json!({ "entryId": entry_id, "mode": "view" }),
    );
    assert_eq!(reopened["phase"], "existing");
    assert_eq!(reopened["mode"], "view");
    assert_eq!(reopened["sessionId"], entry_id.as_str());
    assert_eq!(reopened["marksMeta"]["maxMark"], 100.0);
    assert_eq!(reopened["rows"][0]["mark"], "90");
    assert_eq!(reopened["rows"][1]["absent"], true);
    assert!(reopened["rows"][1]["mark"].is_null());

    let edit = request(
        &mut stdin,
        &mut reader,
        "11",
        "session.setField",
        json!({ "admissionNo": "201", "value": "10" }),
    );
    assert_eq!(error_code(&edit), "read_only");

    let missing = request(
        &mut stdin,
        &mut reader,
        "12",
        "marks.entries.open",
        json!({ "entryId": "no-such-entry" }),
    );
    assert_eq!(error_code(&missing), "not_found");

    let _ = child.kill();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn marks_entries_cannot_be_deleted() {
    let workspace = temp_dir("rollbook-marks-delete");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    open_workspace_with_roster(&mut stdin, &mut reader, &workspace);

    request_ok(&mut stdin, &mut reader, "1", "session.select", unit_test_key());
    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "session.setMarksMeta",
        json!({ "maxMark": 50 }),
    );
    for (i, adm) in ["201", "202"].iter().enumerate() {
        request_ok(
            &mut stdin,
            &mut reader,
            &format!("mark-{}", i),
            "session.setField",
            json!({ "admissionNo": adm, "value": "40" }),
        );
    }
    request_ok(&mut stdin, &mut reader, "3", "session.submit", json!({}));

    let resp = request(
        &mut stdin,
        &mut reader,
        "4",
        "session.delete",
        json!({ "confirm": true }),
    );
    assert_eq!(error_code(&resp), "bad_params");
    let after = request_ok(&mut stdin, &mut reader, "5", "session.get", json!({}));
    assert_eq!(after["phase"], "existing");

    let renamed = request(
        &mut stdin,
        &mut reader,
        "6",
        "session.setMarksMeta",
        json!({ "schoolName": "Other School" }),
    );
    assert_eq!(error_code(&renamed), "bad_params");
    let kept = request_ok(&mut stdin, &mut reader, "7", "session.get", json!({}));
    assert_eq!(kept["marksMeta"]["schoolName"], "My School");

    let _ = child.kill();
    let _ = std::fs::remove_dir_all(workspace);
}
