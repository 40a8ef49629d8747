use crate::db;
use crate::grading::{
    calculate_grade_for, ComputedGrade, CourseType, GradingContext, GradingScheme, RawScoreSet,
    SymbolicGrade,
};
use crate::ipc::error::{respond, HandlerError};
use crate::ipc::helpers::{db_conn, db_conn_mut, optional_score, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn parse_scores(req: &Request) -> Result<RawScoreSet, HandlerError> {
    Ok(RawScoreSet {
        assignment1: optional_score(req, "assignment1")?,
        assignment2: optional_score(req, "assignment2")?,
        course_work: optional_score(req, "courseWork")?,
        final_exam: optional_score(req, "finalExam")?,
    })
}

fn scores_json(scores: &RawScoreSet) -> serde_json::Value {
    json!({
        "assignment1": scores.assignment1,
        "assignment2": scores.assignment2,
        "courseWork": scores.course_work,
        "finalExam": scores.final_exam,
    })
}

fn computed_json(computed: &ComputedGrade) -> serde_json::Value {
    json!({
        "totalScore": computed.total_score,
        "percentage": computed.percentage,
        "symbolicGrade": computed.symbolic_grade.map(|g| g.label()),
        "leniencyApplied": computed.leniency_applied,
        "gradedAt": computed.graded_at.map(|t| t.to_rfc3339()),
        "gradedBy": computed.graded_by,
        "status": computed.status_display(),
        "color": SymbolicGrade::display_color(computed.symbolic_grade),
    })
}

fn scheme_for_stored_type(raw: &str) -> Option<GradingScheme> {
    let scheme = CourseType::parse(raw).map(GradingScheme::new);
    if scheme.is_none() {
        tracing::warn!(course_type = raw, "unknown course type; grade left ungraded");
    }
    scheme
}

/// Live preview for the grade entry form; nothing is written.
fn grades_preview(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerError> {
    let scheme = if let Some(raw) = optional_str(req, "courseType")? {
        let ct = CourseType::parse(&raw).ok_or_else(|| {
            HandlerError::bad_params_with(
                "courseType must be one of: Practical150, Practical100, Theoretical100",
                json!({ "courseType": raw }),
            )
        })?;
        Some(GradingScheme::new(ct))
    } else {
        let course_id = required_str(req, "courseId")?;
        let conn = db_conn(state)?;
        match db::course_type_of(conn, &course_id)? {
            Some(raw) => scheme_for_stored_type(&raw),
            None => None,
        }
    };

    let scores = parse_scores(req)?;
    let ctx = GradingContext::now(optional_str(req, "gradedBy")?);
    let computed = calculate_grade_for(scheme.as_ref(), &scores, &ctx);
    Ok(json!({
        "courseType": scheme.map(|s| s.course_type.as_str()),
        "maxDegree": scheme.map(|s| s.max_degree()),
        "computed": computed_json(&computed),
    }))
}

fn grades_upsert(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerError> {
    let student_id = required_str(req, "studentId")?;
    let course_id = required_str(req, "courseId")?;
    let scores = parse_scores(req)?;
    let graded_by = optional_str(req, "gradedBy")?;

    let conn = db_conn_mut(state)?;
    let tx = conn.transaction()?;
    if !db::student_exists(&tx, &student_id)? {
        return Err(HandlerError::NotFound("student"));
    }
    let Some(raw_type) = db::course_type_of(&tx, &course_id)? else {
        return Err(HandlerError::NotFound("course"));
    };

    let grade_id = db::upsert_grade_scores(&tx, &student_id, &course_id, &scores)?;
    let scheme = scheme_for_stored_type(&raw_type);
    let computed = calculate_grade_for(scheme.as_ref(), &scores, &GradingContext::now(graded_by));
    db::write_computed_grade(&tx, &grade_id, &computed)?;
    tx.commit()?;

    tracing::debug!(
        grade = %grade_id,
        status = computed.status_display(),
        leniency = computed.leniency_applied,
        "grade stored"
    );
    Ok(json!({
        "gradeId": grade_id,
        "scores": scores_json(&scores),
        "computed": computed_json(&computed),
    }))
}

fn grades_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerError> {
    let conn = db_conn(state)?;
    let filter = db::GradeFilter {
        course_id: optional_str(req, "courseId")?,
        student_id: optional_str(req, "studentId")?,
    };
    let grades: Vec<serde_json::Value> = db::load_stored_grades(conn, &filter)?
        .into_iter()
        .map(|g| {
            let r = &g.record;
            json!({
                "gradeId": g.grade_id,
                "studentId": r.student_id,
                "studentName": r.student_name,
                "courseId": r.course_id,
                "courseCode": r.course_code,
                "courseType": r.course_type.map(|t| t.as_str()),
                "scores": scores_json(&g.scores),
                "totalScore": r.total_score,
                "symbolicGrade": r.symbolic_grade,
                "leniencyApplied": r.leniency_applied,
                "gradedAt": g.graded_at,
                "gradedBy": g.graded_by,
                "status": r.status_display(),
            })
        })
        .collect();
    Ok(json!({ "grades": grades }))
}

/// Re-grades every stored record in one transaction. A failure rolls the
/// whole pass back; callers retry it as a unit.
fn grades_recalculate_all(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerError> {
    let ctx = GradingContext::now(optional_str(req, "gradedBy")?);
    let conn = db_conn_mut(state)?;
    let tx = conn.transaction()?;

    let inputs = db::load_grade_inputs(&tx)?;
    let mut graded = 0_usize;
    let mut incomplete = 0_usize;
    let mut leniency = 0_usize;
    for input in &inputs {
        let raw_type = input.course_type.as_deref();
        let scheme = raw_type.and_then(CourseType::parse).map(GradingScheme::new);
        if scheme.is_none() {
            tracing::warn!(
                grade = %input.grade_id,
                course_type = raw_type.unwrap_or("<missing course>"),
                "unknown course type; grade left ungraded"
            );
        }
        let computed = calculate_grade_for(scheme.as_ref(), &input.scores, &ctx);
        if computed.is_graded() {
            graded += 1;
        } else {
            incomplete += 1;
        }
        if computed.leniency_applied {
            leniency += 1;
        }
        db::write_computed_grade(&tx, &input.grade_id, &computed)?;
    }
    tx.commit()?;

    tracing::info!(
        total = inputs.len(),
        graded,
        incomplete,
        leniency,
        "recalculated all grades"
    );
    Ok(json!({
        "recalculated": inputs.len(),
        "graded": graded,
        "incomplete": incomplete,
        "leniencyApplied": leniency,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "grades.preview" => grades_preview(state, req),
        "grades.upsert" => grades_upsert(state, req),
        "grades.list" => grades_list(state, req),
        "grades.recalculateAll" => grades_recalculate_all(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
