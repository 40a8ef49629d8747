use crate::grading::{ComputedGrade, CourseType, RawScoreSet};
use crate::report::GradeRecord;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use uuid::Uuid;

pub const DB_FILE_NAME: &str = "gradebook.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            course_type TEXT NOT NULL,
            credits INTEGER NOT NULL DEFAULT 3,
            year_level INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            student_no TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            year_level INTEGER NOT NULL DEFAULT 1,
            active INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
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
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(course_id) REFERENCES courses(id),
            UNIQUE(student_id, course_id)
        )",
        [],
    )?;
    // Workspaces created before audit stamps existed lack graded_by.
    ensure_grades_graded_by(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_course ON grades(course_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_student ON grades(student_id)",
        [],
    )?;

    Ok(conn)
}

fn ensure_grades_graded_by(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "grades", "graded_by")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE grades ADD COLUMN graded_by TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[derive(Debug, Clone)]
pub struct CourseRow {
    pub id: String,
    pub code: String,
    pub name: String,
    /// Raw stored value; rows with an unknown type cannot be graded.
    pub course_type: String,
    pub credits: i64,
    pub year_level: i64,
}

#[derive(Debug, Clone)]
pub struct StudentRow {
    pub id: String,
    pub student_no: String,
    pub name: String,
    pub year_level: i64,
    pub active: bool,
}

pub fn insert_course(
    conn: &Connection,
    code: &str,
    name: &str,
    course_type: CourseType,
    credits: i64,
    year_level: i64,
) -> anyhow::Result<String> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO courses(id, code, name, course_type, credits, year_level)
         VALUES(?, ?, ?, ?, ?, ?)",
        (&id, code, name, course_type.as_str(), credits, year_level),
    )?;
    Ok(id)
}

pub fn course_code_exists(conn: &Connection, code: &str) -> anyhow::Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM courses WHERE code = ?", [code], |r| r.get(0))
        .optional()?;
    Ok(found.is_some())
}

pub fn list_courses(conn: &Connection) -> anyhow::Result<Vec<CourseRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, code, name, course_type, credits, year_level
         FROM courses
         ORDER BY code",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(CourseRow {
                id: r.get(0)?,
                code: r.get(1)?,
                name: r.get(2)?,
                course_type: r.get(3)?,
                credits: r.get(4)?,
                year_level: r.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn course_type_of(conn: &Connection, course_id: &str) -> anyhow::Result<Option<String>> {
    let t = conn
        .query_row(
            "SELECT course_type FROM courses WHERE id = ?",
            [course_id],
            |r| r.get(0),
        )
        .optional()?;
    Ok(t)
}

pub fn insert_student(
    conn: &Connection,
    student_no: &str,
    name: &str,
    year_level: i64,
    active: bool,
) -> anyhow::Result<String> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(id, student_no, name, year_level, active)
         VALUES(?, ?, ?, ?, ?)",
        (&id, student_no, name, year_level, active as i64),
    )?;
    Ok(id)
}

pub fn student_no_exists(conn: &Connection, student_no: &str) -> anyhow::Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM students WHERE student_no = ?",
            [student_no],
            |r| r.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn list_students(conn: &Connection) -> anyhow::Result<Vec<StudentRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, student_no, name, year_level, active
         FROM students
         ORDER BY name",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(StudentRow {
                id: r.get(0)?,
                student_no: r.get(1)?,
                name: r.get(2)?,
                year_level: r.get(3)?,
                active: r.get::<_, i64>(4)? != 0,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn student_exists(conn: &Connection, student_id: &str) -> anyhow::Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM students WHERE id = ?", [student_id], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(found.is_some())
}

/// Stores raw component scores for a (student, course) pair, creating the
/// grade row on first use. Returns the grade id.
pub fn upsert_grade_scores(
    conn: &Connection,
    student_id: &str,
    course_id: &str,
    scores: &RawScoreSet,
) -> anyhow::Result<String> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM grades WHERE student_id = ? AND course_id = ?",
            (student_id, course_id),
            |r| r.get(0),
        )
        .optional()?;

    match existing {
        Some(id) => {
            conn.execute(
                "UPDATE grades
                 SET assignment1 = ?, assignment2 = ?, course_work = ?, final_exam = ?
                 WHERE id = ?",
                (
                    scores.assignment1,
                    scores.assignment2,
                    scores.course_work,
                    scores.final_exam,
                    &id,
                ),
            )?;
            Ok(id)
        }
        None => {
            let id = Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO grades(id, student_id, course_id, assignment1, assignment2, course_work, final_exam)
                 VALUES(?, ?, ?, ?, ?, ?, ?)",
                (
                    &id,
                    student_id,
                    course_id,
                    scores.assignment1,
                    scores.assignment2,
                    scores.course_work,
                    scores.final_exam,
                ),
            )?;
            Ok(id)
        }
    }
}

/// Replaces every computed column together. An ungraded result clears them.
pub fn write_computed_grade(
    conn: &Connection,
    grade_id: &str,
    computed: &ComputedGrade,
) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE grades
         SET total_score = ?, symbolic_grade = ?, leniency_applied = ?, graded_at = ?, graded_by = ?
         WHERE id = ?",
        (
            computed.total_score,
            computed.symbolic_grade.map(|g| g.label()),
            computed.leniency_applied as i64,
            computed.graded_at.map(|t| t.to_rfc3339()),
            computed.graded_by.as_deref(),
            grade_id,
        ),
    )?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct GradeInput {
    pub grade_id: String,
    /// Raw stored type; `None` when the course row is gone.
    pub course_type: Option<String>,
    pub scores: RawScoreSet,
}

pub fn load_grade_inputs(conn: &Connection) -> anyhow::Result<Vec<GradeInput>> {
    let mut stmt = conn.prepare(
        "SELECT g.id, c.course_type, g.assignment1, g.assignment2, g.course_work, g.final_exam
         FROM grades g
         LEFT JOIN courses c ON c.id = g.course_id
         ORDER BY g.id",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(GradeInput {
                grade_id: r.get(0)?,
                course_type: r.get(1)?,
                scores: RawScoreSet {
                    assignment1: r.get(2)?,
                    assignment2: r.get(3)?,
                    course_work: r.get(4)?,
                    final_exam: r.get(5)?,
                },
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[derive(Debug, Clone, Default)]
pub struct GradeFilter {
    pub course_id: Option<String>,
    pub student_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StoredGrade {
    pub grade_id: String,
    pub scores: RawScoreSet,
    pub graded_at: Option<String>,
    pub graded_by: Option<String>,
    pub record: GradeRecord,
}

pub fn load_stored_grades(
    conn: &Connection,
    filter: &GradeFilter,
) -> anyhow::Result<Vec<StoredGrade>> {
    let mut stmt = conn.prepare(
        "SELECT g.id, g.assignment1, g.assignment2, g.course_work, g.final_exam,
                g.total_score, g.symbolic_grade, g.leniency_applied, g.graded_at, g.graded_by,
                s.id, s.name, s.year_level,
                c.id, c.code, c.name, c.course_type
         FROM grades g
         JOIN students s ON s.id = g.student_id
         JOIN courses c ON c.id = g.course_id
         WHERE (?1 IS NULL OR g.course_id = ?1)
           AND (?2 IS NULL OR g.student_id = ?2)
         ORDER BY s.name, c.code",
    )?;
    let rows = stmt
        .query_map(
            (filter.course_id.as_deref(), filter.student_id.as_deref()),
            |r| {
                let course_type: String = r.get(16)?;
                Ok(StoredGrade {
                    grade_id: r.get(0)?,
                    scores: RawScoreSet {
                        assignment1: r.get(1)?,
                        assignment2: r.get(2)?,
                        course_work: r.get(3)?,
                        final_exam: r.get(4)?,
                    },
                    graded_at: r.get(8)?,
                    graded_by: r.get(9)?,
                    record: GradeRecord {
                        student_id: r.get(10)?,
                        student_name: r.get(11)?,
                        year_level: r.get(12)?,
                        course_id: r.get(13)?,
                        course_code: r.get(14)?,
                        course_name: r.get(15)?,
                        course_type: CourseType::parse(&course_type),
                        total_score: r.get(5)?,
                        symbolic_grade: r.get(6)?,
                        leniency_applied: r.get::<_, i64>(7)? != 0,
                    },
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn load_grade_records(
    conn: &Connection,
    filter: &GradeFilter,
) -> anyhow::Result<Vec<GradeRecord>> {
    Ok(load_stored_grades(conn, filter)?
        .into_iter()
        .map(|g| g.record)
        .collect())
}
