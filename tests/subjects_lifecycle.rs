use rusqlite::Connection;
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
    let exe = env!("CARGO_BIN_EXE_edustatd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn edustatd");
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

fn error_code(value: &serde_json::Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

#[test]
fn subject_requests_need_workspace_and_session() {
    let workspace = temp_dir("edustat-subjects-gate");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let resp = request(&mut stdin, &mut reader, "1", "subjects.list", json!({}));
    assert_eq!(error_code(&resp), "no_workspace");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let resp = request(&mut stdin, &mut reader, "3", "subjects.list", json!({}));
    assert_eq!(error_code(&resp), "not_signed_in");

    let resp = request(&mut stdin, &mut reader, "4", "session.signIn", json!({ "uid": "  " }));
    assert_eq!(error_code(&resp), "bad_params");

    let signed = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "session.signIn",
        json!({ "uid": "u-1", "displayName": "" }),
    );
    assert_eq!(
        signed.get("greetingName").and_then(|v| v.as_str()),
        Some("User")
    );
    let listed = request_ok(&mut stdin, &mut reader, "6", "subjects.list", json!({}));
    assert_eq!(
        listed.get("subjects").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(0)
    );

    let out = request_ok(&mut stdin, &mut reader, "7", "session.signOut", json!({}));
    assert_eq!(out.get("signedOut").and_then(|v| v.as_bool()), Some(true));
    let current = request_ok(&mut stdin, &mut reader, "8", "session.current", json!({}));
    assert!(current.get("session").expect("session").is_null());

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn create_validates_completeness_weights_and_duplicates() {
    let workspace = temp_dir("edustat-subjects-create");
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
        "session.signIn",
        json!({ "uid": "tutor", "displayName": "Sam" }),
    );

    let resp = request(
        &mut stdin,
        &mut reader,
        "3",
        "subjects.create",
        json!({ "name": "", "categories": [{ "name": "Quiz", "weight": 100 }] }),
    );
    assert_eq!(error_code(&resp), "bad_params");

    let resp = request(
        &mut stdin,
        &mut reader,
        "4",
        "subjects.create",
        json!({ "name": "Math", "categories": [{ "name": "Quiz", "weight": "" }] }),
    );
    assert_eq!(error_code(&resp), "bad_params");
    assert_eq!(
        resp.get("error")
            .and_then(|e| e.get("details"))
            .and_then(|d| d.get("field"))
            .and_then(|v| v.as_str()),
        Some("categories[0].weight")
    );

    let resp = request(
        &mut stdin,
        &mut reader,
        "5",
        "subjects.create",
        json!({
            "name": "Math",
            "categories": [{ "name": "Quiz", "weight": 40 }, { "name": "Exam", "weight": 50 }]
        }),
    );
    assert_eq!(error_code(&resp), "weights_invalid");

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "subjects.create",
        json!({
            "name": "  Math ",
            "categories": [{ "name": "Quiz", "weight": "40" }, { "name": "Exam", "weight": 60 }]
        }),
    );
    let subject = created.get("subject").expect("subject");
    assert_eq!(subject.get("name").and_then(|v| v.as_str()), Some("Math"));
    let categories = subject
        .get("categories")
        .and_then(|v| v.as_array())
        .expect("categories");
    assert_eq!(categories.len(), 2);
    assert_eq!(
        categories[0].get("weightPercent").and_then(|v| v.as_f64()),
        Some(40.0)
    );
    assert_ne!(
        categories[0].get("categoryId"),
        categories[1].get("categoryId")
    );

    let resp = request(
        &mut stdin,
        &mut reader,
        "7",
        "subjects.create",
        json!({ "name": "MATH", "categories": [{ "name": "All", "weight": 100 }] }),
    );
    assert_eq!(error_code(&resp), "duplicate_name");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn delete_removes_subject_categories_and_records() {
    let workspace = temp_dir("edustat-subjects-delete");
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
        "session.signIn",
        json!({ "uid": "owner" }),
    );
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "subjects.create",
        json!({ "name": "Drama", "categories": [{ "name": "Scenes", "weight": 100 }] }),
    );
    let subject_id = created
        .pointer("/subject/subjectId")
        .and_then(|v| v.as_str())
        .expect("subjectId")
        .to_string();
    let category_id = created
        .pointer("/subject/categories/0/categoryId")
        .and_then(|v| v.as_str())
        .expect("categoryId")
        .to_string();
    for (i, score) in [7, 9].iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("4{i}"),
            "records.add",
            json!({ "categoryId": category_id, "name": format!("Scene {i}"), "item": 10, "score": score }),
        );
    }

    // Another user cannot remove it.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "session.signIn",
        json!({ "uid": "intruder" }),
    );
    let resp = request(
        &mut stdin,
        &mut reader,
        "6",
        "subjects.delete",
        json!({ "subjectId": subject_id }),
    );
    assert_eq!(error_code(&resp), "not_found");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "session.signIn",
        json!({ "uid": "owner" }),
    );
    let deleted = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "subjects.delete",
        json!({ "subjectId": subject_id }),
    );
    assert_eq!(
        deleted.get("removedRecords").and_then(|v| v.as_u64()),
        Some(2)
    );

    let resp = request(
        &mut stdin,
        &mut reader,
        "9",
        "records.list",
        json!({ "categoryId": category_id }),
    );
    assert_eq!(error_code(&resp), "not_found");

    drop(stdin);
    let _ = child.wait();

    let conn = Connection::open(workspace.join("edustat.sqlite3")).expect("open db");
    let leftover: i64 = conn
        .query_row(
            "SELECT (SELECT COUNT(*) FROM records) + (SELECT COUNT(*) FROM categories)",
            [],
            |r| r.get(0),
        )
        .expect("count rows");
    assert_eq!(leftover, 0);
}
