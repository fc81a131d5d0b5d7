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
    let exe = env!("CARGO_BIN_EXE_gradebookd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradebookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_ok(
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
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn table_rows(result: &serde_json::Value) -> Vec<serde_json::Value> {
    result
        .get("table")
        .and_then(|t| t.get("rows"))
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
}

#[test]
fn submit_then_list_shows_entry_newest_first() {
    let workspace = temp_dir("gradebook-submit-list");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let empty = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "view.navigate",
        json!({ "view": "listing" }),
    );
    let rows = table_rows(&empty);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("type").and_then(|v| v.as_str()), Some("notice"));
    assert_eq!(rows[0].get("kind").and_then(|v| v.as_str()), Some("empty"));

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "grades.submit",
        json!({
            "fullName": "Ana",
            "studentId": "1001",
            "course": "CS101 - Intro",
            "score": "87.5"
        }),
    );
    assert_eq!(first.get("saved").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(
        first
            .get("grade")
            .and_then(|g| g.get("courseCode"))
            .and_then(|v| v.as_str()),
        Some("CS101")
    );
    assert_eq!(
        first.get("form").and_then(|f| f.get("fullName")).and_then(|v| v.as_str()),
        Some("")
    );
    // Listing view is current, so the save refreshed the table.
    assert_eq!(table_rows(&first).len(), 1);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "grades.submit",
        json!({
            "fullName": "Budi",
            "studentId": "1002",
            "course": "MA201",
            "score": "100"
        }),
    );

    let listed = request_ok(&mut stdin, &mut reader, "5", "grades.list", json!({}));
    assert_eq!(listed.get("rendered").and_then(|v| v.as_bool()), Some(true));
    let rows = table_rows(&listed);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("no").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(rows[0].get("name").and_then(|v| v.as_str()), Some("Budi"));
    assert_eq!(rows[0].get("courseCode").and_then(|v| v.as_str()), Some("MA201"));
    assert_eq!(rows[0].get("score").and_then(|v| v.as_str()), Some("100.00"));
    assert_eq!(rows[1].get("no").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(rows[1].get("name").and_then(|v| v.as_str()), Some("Ana"));
    assert_eq!(rows[1].get("studentId").and_then(|v| v.as_str()), Some("1001"));
    assert_eq!(rows[1].get("score").and_then(|v| v.as_str()), Some("87.50"));

    let again = request_ok(&mut stdin, &mut reader, "6", "grades.list", json!({}));
    assert_eq!(again.get("table"), listed.get("table"));
}

#[test]
fn rejected_submission_keeps_form_and_stores_nothing() {
    let workspace = temp_dir("gradebook-rejected");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let cases = [
        ("2", json!({ "fullName": "Ana", "studentId": "10A1", "course": "CS101", "score": "80" }), "invalid_student_id"),
        ("3", json!({ "fullName": "Ana", "studentId": "1001", "course": "CS101", "score": "150" }), "score_out_of_range"),
        ("4", json!({ "fullName": "", "studentId": "1001", "course": "CS101", "score": "80" }), "missing_fields"),
    ];
    for (id, params, category) in cases {
        let res = request_ok(&mut stdin, &mut reader, id, "grades.submit", params.clone());
        assert_eq!(res.get("saved").and_then(|v| v.as_bool()), Some(false));
        assert_eq!(res.get("rejected").and_then(|v| v.as_str()), Some(category));
        let notes = res
            .get("notifications")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].get("level").and_then(|v| v.as_str()), Some("error"));
        assert_eq!(res.get("form"), Some(&params));
    }

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "view.navigate",
        json!({ "view": "listing" }),
    );
    let rows = table_rows(&listed);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("kind").and_then(|v| v.as_str()), Some("empty"));
}

#[test]
fn data_survives_sidecar_restart() {
    let workspace = temp_dir("gradebook-restart");
    {
        let (mut child, mut stdin, mut reader) = spawn_sidecar();
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            "1",
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            "2",
            "grades.submit",
            json!({
                "fullName": "Cici",
                "studentId": "2001",
                "course": "PH101 - Physics",
                "score": "0"
            }),
        );
        drop(stdin);
        let _ = child.wait();
    }

    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "view.navigate",
        json!({ "view": "listing" }),
    );
    let rows = table_rows(&listed);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name").and_then(|v| v.as_str()), Some("Cici"));
    assert_eq!(rows[0].get("courseCode").and_then(|v| v.as_str()), Some("PH101"));
    assert_eq!(rows[0].get("score").and_then(|v| v.as_str()), Some("0.00"));
}
