use rusqlite::Connection;
use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
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

fn db_path(workspace: &Path) -> PathBuf {
    workspace.join("gradebook.sqlite3")
}

fn write_old_workspace(workspace: &Path) {
    let conn = Connection::open(db_path(workspace)).expect("create old db");
    conn.execute_batch(
        "CREATE TABLE courses(
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            course_type TEXT NOT NULL,
            credits INTEGER NOT NULL DEFAULT 3,
            year_level INTEGER NOT NULL DEFAULT 1
        );
        CREATE TABLE students(
            id TEXT PRIMARY KEY,
            student_no TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            year_level INTEGER NOT NULL DEFAULT 1,
            active INTEGER NOT NULL DEFAULT 1
        );
        CREATE TABLE grades(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            assignment1 REAL,
            assignment2 REAL,
            course_work REAL,
            final_exam REAL,
            total_score REAL,
            symbolic_grade TEXT,
            leniency_applied INTEGER NOT NULL DEFAULT 0,
            graded_at TEXT,
            UNIQUE(student_id, course_id)
        );
        INSERT INTO courses(id, code, name, course_type) VALUES('c-old', 'HIS110', 'World History', 'Theoretical100');
        INSERT INTO students(id, student_no, name) VALUES('s-old', 'NCT00500', 'Omar Saleh');
        INSERT INTO grades(id, student_id, course_id, assignment1, assignment2, course_work,
                           total_score, symbolic_grade, leniency_applied, graded_at)
            VALUES('g-old', 's-old', 'c-old', 70, 75, 80, 77.0, 'M', 0, '2019-06-01T08:00:00Z');",
    )
    .expect("old schema");
}

fn grades_columns(conn: &Connection) -> Vec<String> {
    let mut stmt = conn.prepare("PRAGMA table_info(grades)").expect("table_info");
    let cols = stmt
        .query_map([], |r| r.get::<_, String>(1))
        .expect("query columns")
        .collect::<Result<Vec<_>, _>>()
        .expect("columns");
    cols
}

#[test]
fn opening_an_old_workspace_adds_graded_by_and_keeps_rows() {
    let workspace = temp_dir("gradebook-migration");
    write_old_workspace(&workspace);
    {
        let conn = Connection::open(db_path(&workspace)).expect("open old db");
        assert!(!grades_columns(&conn).iter().any(|c| c == "graded_by"));
    }

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let conn = Connection::open(db_path(&workspace)).expect("open migrated db");
    let cols = grades_columns(&conn);
    assert_eq!(cols.iter().filter(|c| *c == "graded_by").count(), 1);

    // Rows written before the migration come through untouched.
    let listed = request_ok(&mut stdin, &mut reader, "2", "grades.list", json!({}));
    let grades = listed["grades"].as_array().expect("grades");
    assert_eq!(grades.len(), 1);
    assert_eq!(grades[0]["gradeId"], "g-old");
    assert_eq!(grades[0]["symbolicGrade"], "M");
    assert!(grades[0]["gradedBy"].is_null());

    let res = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "grades.upsert",
        json!({
            "studentId": "s-old",
            "courseId": "c-old",
            "assignment1": 70,
            "assignment2": 75,
            "courseWork": 80,
            "gradedBy": "registrar"
        }),
    );
    assert_eq!(res["gradeId"], "g-old");
    assert_eq!(res["computed"]["symbolicGrade"], "Very Good");

    let graded_by: Option<String> = conn
        .query_row(
            "SELECT graded_by FROM grades WHERE id = 'g-old'",
            [],
            |r| r.get(0),
        )
        .expect("graded_by");
    assert_eq!(graded_by.as_deref(), Some("registrar"));

    let _ = child.kill();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn reopening_a_migrated_workspace_is_a_no_op() {
    let workspace = temp_dir("gradebook-migration-reopen");
    write_old_workspace(&workspace);

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    for id in ["1", "2"] {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            id,
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
    }

    let conn = Connection::open(db_path(&workspace)).expect("open migrated db");
    let cols = grades_columns(&conn);
    assert_eq!(cols.iter().filter(|c| *c == "graded_by").count(), 1);

    let _ = child.kill();
    let _ = std::fs::remove_dir_all(workspace);
}
