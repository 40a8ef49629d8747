use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradebookd");
    let mut child = Command::new(exe)
        .env_remove("GRADEBOOKD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradebookd");
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

fn preview(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let res = request_ok(stdin, reader, id, "grades.preview", params);
    res.get("computed").cloned().expect("computed")
}

#[test]
fn preview_matches_worked_examples() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let c = preview(
        &mut stdin,
        &mut reader,
        "1",
        json!({
            "courseType": "Theoretical100",
            "assignment1": 80,
            "assignment2": 90,
            "courseWork": 70
        }),
    );
    assert!((c["totalScore"].as_f64().expect("total") - 76.0).abs() < 1e-9);
    assert!((c["percentage"].as_f64().expect("pct") - 76.0).abs() < 1e-9);
    assert_eq!(c["symbolicGrade"], "Very Good");
    assert_eq!(c["leniencyApplied"], false);
    assert_eq!(c["status"], "Complete");
    assert!(c["gradedAt"].is_string());

    let c = preview(
        &mut stdin,
        &mut reader,
        "2",
        json!({
            "courseType": "Practical100",
            "assignment1": 60,
            "assignment2": 70,
            "courseWork": 60,
            "finalExam": 58
        }),
    );
    assert!((c["totalScore"].as_f64().expect("total") - 62.4).abs() < 1e-9);
    assert_eq!(c["symbolicGrade"], "Pass");
    assert_eq!(c["leniencyApplied"], false);

    // 70*0.2 + 62*0.3 + 89*0.2 + 82*0.3 lands exactly on the Very Good line.
    let c = preview(
        &mut stdin,
        &mut reader,
        "3",
        json!({
            "courseType": "Practical100",
            "assignment1": 70,
            "assignment2": 62,
            "courseWork": 89,
            "finalExam": 82
        }),
    );
    assert_eq!(c["totalScore"].as_f64(), Some(75.0));
    assert_eq!(c["symbolicGrade"], "Very Good");

    let _ = child.kill();
}

#[test]
fn preview_applies_leniency_on_near_miss_with_improvement() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    // 70*0.2 + 80*0.2 + 90*0.6 = 84.0, one point short of Excellent.
    let c = preview(
        &mut stdin,
        &mut reader,
        "1",
        json!({
            "courseType": "Theoretical100",
            "assignment1": 70,
            "assignment2": 80,
            "courseWork": 90
        }),
    );
    assert_eq!(c["symbolicGrade"], "Excellent");
    assert_eq!(c["leniencyApplied"], true);

    // Same total without an improving trend keeps the base grade.
    let c = preview(
        &mut stdin,
        &mut reader,
        "2",
        json!({
            "courseType": "Theoretical100",
            "assignment1": 80,
            "assignment2": 70,
            "courseWork": 90
        }),
    );
    assert_eq!(c["symbolicGrade"], "Very Good");
    assert_eq!(c["leniencyApplied"], false);

    let _ = child.kill();
}

#[test]
fn preview_practical150_normalises_to_percentage() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let res = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "grades.preview",
        json!({
            "courseType": "Practical150",
            "assignment1": 100,
            "assignment2": 100,
            "courseWork": 100,
            "finalExam": 100
        }),
    );
    assert_eq!(res["maxDegree"].as_f64(), Some(150.0));
    let c = &res["computed"];
    assert!((c["totalScore"].as_f64().expect("total") - 100.0).abs() < 1e-9);
    assert!((c["percentage"].as_f64().expect("pct") - 200.0 / 3.0).abs() < 1e-9);
    assert_eq!(c["symbolicGrade"], "Good");

    let _ = child.kill();
}

#[test]
fn preview_incomplete_scores_are_ungraded() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let c = preview(
        &mut stdin,
        &mut reader,
        "1",
        json!({
            "courseType": "Practical100",
            "assignment1": 90,
            "assignment2": 95,
            "courseWork": 88,
            "finalExam": null
        }),
    );
    assert!(c["totalScore"].is_null());
    assert!(c["percentage"].is_null());
    assert!(c["symbolicGrade"].is_null());
    assert!(c["gradedAt"].is_null());
    assert_eq!(c["leniencyApplied"], false);
    assert_eq!(c["status"], "Incomplete");
    assert_eq!(c["color"], "#A0A0A0");

    // Zero is a score, not a missing component.
    let c = preview(
        &mut stdin,
        &mut reader,
        "2",
        json!({
            "courseType": "Theoretical100",
            "assignment1": 0,
            "assignment2": 0,
            "courseWork": 0
        }),
    );
    assert_eq!(c["totalScore"].as_f64(), Some(0.0));
    assert_eq!(c["symbolicGrade"], "Fail");

    let _ = child.kill();
}

#[test]
fn preview_rejects_bad_input() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let cases = [
        json!({ "courseType": "Theoretical100", "assignment1": 101 }),
        json!({ "courseType": "Theoretical100", "assignment2": -0.5 }),
        json!({ "courseType": "Theoretical100", "courseWork": "ninety" }),
        json!({ "courseType": "Lab200", "assignment1": 50 }),
        json!({ "assignment1": 50 }),
    ];
    for (i, params) in cases.into_iter().enumerate() {
        let id = format!("bad-{}", i);
        let res = request(&mut stdin, &mut reader, &id, "grades.preview", params);
        assert_eq!(res["ok"], false);
        assert_eq!(error_code(&res), "bad_params", "case {}: {}", i, res);
    }

    // Resolving a course by id needs an open workspace.
    let res = request(
        &mut stdin,
        &mut reader,
        "ws",
        "grades.preview",
        json!({ "courseId": "c1", "assignment1": 50 }),
    );
    assert_eq!(error_code(&res), "no_workspace");

    let _ = child.kill();
}
