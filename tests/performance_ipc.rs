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
    let exe = env!("CARGO_BIN_EXE_recordsd");
    let mut child = Command::new(exe)
        .env_remove("RECORDSD_WORKSPACE")
        .env_remove("RECORDSD_LOG_DIR")
        .env_remove("RECORDSD_LOG_LEVEL")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn recordsd");
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

fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded",
        method
    );
    value.get("error").cloned().expect("error object")
}

#[test]
fn performance_summary_over_valid_students() {
    let workspace = temp_dir("recordsd-performance");
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
        "subjects.update",
        json!({ "department": "civil", "semester": 5, "subjects": [ { "name": "Surveying" } ] }),
    );

    let sel = |extra: serde_json::Value| {
        let mut p = json!({ "batch": "2021-2025", "department": "civil", "semester": 5 });
        if let (Some(base), Some(more)) = (p.as_object_mut(), extra.as_object()) {
            for (k, v) in more {
                base.insert(k.clone(), v.clone());
            }
        }
        p
    };

    let marks: [(&str, &[(&str, i64)]); 3] = [
        (
            "C1",
            &[
                ("theoryMidSem", 20),
                ("theoryEndSem", 70),
                ("practicalEndSem", 30),
                ("practicalLabWork", 20),
            ],
        ),
        ("C2", &[]),
        ("C3", &[("theoryMidSem", 20), ("theoryEndSem", 70)]),
    ];
    for (i, (id, components)) in marks.iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("create-{i}"),
            "students.create",
            sel(json!({ "student": { "name": format!("Student {id}"), "enrollmentNo": id } })),
        );
        for (j, (component, value)) in components.iter().enumerate() {
            let _ = request_ok(
                &mut stdin,
                &mut reader,
                &format!("mark-{i}-{j}"),
                "students.setMark",
                sel(json!({ "studentId": id, "subjectName": "Surveying", "component": component, "value": value })),
            );
        }
    }

    let data = request_ok(&mut stdin, &mut reader, "3", "performance.get", sel(json!({})));
    assert_eq!(data["maxMarks"], 150.0);
    let avg = data["averagePercentage"].as_f64().expect("average");
    assert!((avg - 76.67).abs() < 0.01, "average was {avg}");
    assert_eq!(data["passPercentage"], 100.0);
    let rows = data["students"].as_array().expect("students");
    let order: Vec<&str> = rows.iter().map(|s| s["id"].as_str().unwrap_or("")).collect();
    assert_eq!(order, vec!["C1", "C3", "C2"]);
    assert_eq!(rows[0]["totalMarks"], 140.0);
    assert_eq!(rows[0]["grade"], "A");
    assert_eq!(rows[1]["grade"], "D");
    assert_eq!(rows[2]["grade"], "F");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "profile.update",
        json!({
            "batch": "2021-2025", "department": "civil", "studentId": "C3",
            "op": "setSubjectGrade", "semester": 5, "subjectName": "Surveying", "grade": "F"
        }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "profile.update",
        json!({
            "batch": "2021-2025", "department": "civil", "studentId": "C1",
            "op": "setManualAggregate", "semester": 5, "field": "sgpa", "value": 9.4
        }),
    );

    let failed = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "performance.get",
        sel(json!({ "view": "failed" })),
    );
    let rows = failed["students"].as_array().expect("students");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], "C3");
    assert_eq!(failed["passPercentage"], 100.0);

    let all = request_ok(&mut stdin, &mut reader, "7", "performance.get", sel(json!({ "view": "all" })));
    assert_eq!(all["students"][0]["sgpa"], 9.4);
    assert!(all["students"][1].get("sgpa").is_none());

    let err = request_err(
        &mut stdin,
        &mut reader,
        "8",
        "performance.get",
        sel(json!({ "view": "passed" })),
    );
    assert_eq!(err["code"], "bad_params");
    let err = request_err(
        &mut stdin,
        &mut reader,
        "9",
        "performance.get",
        sel(json!({ "semester": 0 })),
    );
    assert_eq!(err["code"], "invalid_input");

    let empty = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "performance.get",
        json!({ "batch": "2021-2025", "department": "civil", "semester": 6 }),
    );
    assert_eq!(empty["maxMarks"], 0.0);
    assert_eq!(empty["averagePercentage"], 0.0);
    assert_eq!(empty["passPercentage"], 0.0);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
