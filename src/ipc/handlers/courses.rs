use crate::db;
use crate::grading::{CourseType, GradingScheme};
use crate::ipc::error::{respond, HandlerError};
use crate::ipc::helpers::{db_conn, optional_i64, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn parse_course_type(req: &Request) -> Result<CourseType, HandlerError> {
    let raw = required_str(req, "courseType")?;
    CourseType::parse(&raw).ok_or_else(|| {
        HandlerError::bad_params_with(
            "courseType must be one of: Practical150, Practical100, Theoretical100",
            json!({ "courseType": raw }),
        )
    })
}

fn courses_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerError> {
    let conn = db_conn(state)?;
    let code = required_str(req, "code")?.to_ascii_uppercase();
    let name = required_str(req, "name")?;
    let course_type = parse_course_type(req)?;
    let credits = optional_i64(req, "credits", 3)?;
    let year_level = optional_i64(req, "yearLevel", 1)?;
    if !(1..=4).contains(&year_level) {
        return Err(HandlerError::bad_params_with(
            "yearLevel must be between 1 and 4",
            json!({ "yearLevel": year_level }),
        ));
    }

    if db::course_code_exists(conn, &code)? {
        return Err(HandlerError::bad_params_with(
            "course code already exists",
            json!({ "code": code }),
        ));
    }

    let course_id = db::insert_course(conn, &code, &name, course_type, credits, year_level)?;
    tracing::debug!(course = %course_id, code = %code, "course created");
    Ok(json!({
        "courseId": course_id,
        "code": code,
        "courseType": course_type.as_str(),
        "maxDegree": course_type.max_degree(),
    }))
}

fn courses_list(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerError> {
    let Some(conn) = state.db.as_ref() else {
        return Ok(json!({ "courses": [] }));
    };
    let courses: Vec<serde_json::Value> = db::list_courses(conn)?
        .into_iter()
        .map(|c| {
            let scheme = CourseType::parse(&c.course_type).map(GradingScheme::new);
            json!({
                "id": c.id,
                "code": c.code,
                "name": c.name,
                "courseType": c.course_type,
                "maxDegree": scheme.map(|s| s.max_degree()),
                "credits": c.credits,
                "yearLevel": c.year_level,
            })
        })
        .collect();
    Ok(json!({ "courses": courses }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "courses.create" => courses_create(state, req),
        "courses.list" => courses_list(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
