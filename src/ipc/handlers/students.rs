use crate::db;
use crate::ipc::error::{respond, HandlerError};
use crate::ipc::helpers::{db_conn, optional_bool, optional_i64, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn students_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerError> {
    let conn = db_conn(state)?;
    let student_no = required_str(req, "studentNo")?;
    let name = required_str(req, "name")?;
    let year_level = optional_i64(req, "yearLevel", 1)?;
    if !(1..=4).contains(&year_level) {
        return Err(HandlerError::bad_params_with(
            "yearLevel must be between 1 and 4",
            json!({ "yearLevel": year_level }),
        ));
    }
    let active = optional_bool(req, "active", true)?;
    if db::student_no_exists(conn, &student_no)? {
        return Err(HandlerError::bad_params_with(
            "studentNo already exists",
            json!({ "studentNo": student_no }),
        ));
    }

    let student_id = db::insert_student(conn, &student_no, &name, year_level, active)?;
    Ok(json!({ "studentId": student_id, "studentNo": student_no }))
}

fn students_list(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerError> {
    let Some(conn) = state.db.as_ref() else {
        return Ok(json!({ "students": [] }));
    };
    let students: Vec<serde_json::Value> = db::list_students(conn)?
        .into_iter()
        .map(|s| {
            json!({
                "id": s.id,
                "studentNo": s.student_no,
                "name": s.name,
                "yearLevel": s.year_level,
                "active": s.active,
            })
        })
        .collect();
    Ok(json!({ "students": students }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.create" => students_create(state, req),
        "students.list" => students_list(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
