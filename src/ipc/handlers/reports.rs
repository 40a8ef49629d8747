use crate::db::{self, GradeFilter};
use crate::ipc::error::{respond, HandlerError};
use crate::ipc::helpers::{db_conn, optional_i64, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::report::{self, GradeRecord};
use serde_json::json;

const TOP_STUDENTS_DEFAULT: i64 = 10;
const TOP_STUDENTS_MAX: i64 = 500;

fn to_json<T: serde::Serialize>(v: &T) -> Result<serde_json::Value, HandlerError> {
    serde_json::to_value(v).map_err(|e| HandlerError::Db(e.into()))
}

fn parse_filter(req: &Request) -> Result<GradeFilter, HandlerError> {
    Ok(GradeFilter {
        course_id: optional_str(req, "courseId")?,
        student_id: optional_str(req, "studentId")?,
    })
}

fn load_records(state: &AppState, req: &Request) -> Result<Vec<GradeRecord>, HandlerError> {
    let conn = db_conn(state)?;
    Ok(db::load_grade_records(conn, &parse_filter(req)?)?)
}

fn report_grade_distribution(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerError> {
    let records = load_records(state, req)?;
    to_json(&report::grade_distribution(&records))
}

fn report_course_performance(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerError> {
    let records = load_records(state, req)?;
    Ok(json!({ "courses": to_json(&report::course_performance(&records))? }))
}

fn report_student_gpa(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerError> {
    let student_id = required_str(req, "studentId")?;
    let conn = db_conn(state)?;
    let records = db::load_grade_records(
        conn,
        &GradeFilter {
            course_id: None,
            student_id: Some(student_id.clone()),
        },
    )?;
    let completed = records
        .iter()
        .filter(|r| r.total_score.is_some() && r.symbolic_grade.is_some())
        .count();
    Ok(json!({
        "studentId": student_id,
        "gpa": report::student_gpa(&records),
        "completedCourses": completed,
    }))
}

fn report_leniency_stats(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerError> {
    let records = load_records(state, req)?;
    to_json(&report::leniency_stats(&records))
}

fn report_top_students(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerError> {
    let count = optional_i64(req, "count", TOP_STUDENTS_DEFAULT)?;
    if !(1..=TOP_STUDENTS_MAX).contains(&count) {
        return Err(HandlerError::bad_params_with(
            format!("count must be between 1 and {}", TOP_STUDENTS_MAX),
            json!({ "count": count }),
        ));
    }
    let records = load_records(state, req)?;
    Ok(json!({
        "students": to_json(&report::top_students(&records, count as usize))?
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "reports.gradeDistribution" => report_grade_distribution(state, req),
        "reports.coursePerformance" => report_course_performance(state, req),
        "reports.studentGpa" => report_student_gpa(state, req),
        "reports.leniencyStats" => report_leniency_stats(state, req),
        "reports.topStudents" => report_top_students(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
