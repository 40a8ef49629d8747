use crate::ipc::error::HandlerError;
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

pub fn db_conn<'a>(state: &'a AppState) -> Result<&'a Connection, HandlerError> {
    state.db.as_ref().ok_or(HandlerError::NoWorkspace)
}

pub fn db_conn_mut<'a>(state: &'a mut AppState) -> Result<&'a mut Connection, HandlerError> {
    state.db.as_mut().ok_or(HandlerError::NoWorkspace)
}

pub fn required_str(req: &Request, key: &str) -> Result<String, HandlerError> {
    let v = req
        .params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .ok_or_else(|| HandlerError::bad_params(format!("missing {}", key)))?;
    if v.is_empty() {
        return Err(HandlerError::bad_params(format!("{} must not be empty", key)));
    }
    Ok(v)
}

pub fn optional_str(req: &Request, key: &str) -> Result<Option<String>, HandlerError> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            let Some(s) = v.as_str() else {
                return Err(HandlerError::bad_params(format!(
                    "{} must be string or null",
                    key
                )));
            };
            let t = s.trim();
            Ok(if t.is_empty() { None } else { Some(t.to_string()) })
        }
    }
}

pub fn optional_i64(req: &Request, key: &str, default: i64) -> Result<i64, HandlerError> {
    match req.params.get(key) {
        None => Ok(default),
        Some(v) if v.is_null() => Ok(default),
        Some(v) => v
            .as_i64()
            .ok_or_else(|| HandlerError::bad_params(format!("{} must be an integer", key))),
    }
}

pub fn optional_bool(req: &Request, key: &str, default: bool) -> Result<bool, HandlerError> {
    match req.params.get(key) {
        None => Ok(default),
        Some(v) if v.is_null() => Ok(default),
        Some(v) => v
            .as_bool()
            .ok_or_else(|| HandlerError::bad_params(format!("{} must be a boolean", key))),
    }
}

/// A raw component score from the input layer: absent/null means "not yet
/// entered"; anything present must be a finite number in [0, 100].
pub fn optional_score(req: &Request, key: &str) -> Result<Option<f64>, HandlerError> {
    let v = match req.params.get(key) {
        None => return Ok(None),
        Some(v) if v.is_null() => return Ok(None),
        Some(v) => v,
    };
    let Some(n) = v.as_f64() else {
        return Err(HandlerError::bad_params_with(
            format!("{} must be a number or null", key),
            json!({ "field": key }),
        ));
    };
    if !n.is_finite() || !(MIN_SCORE..=MAX_SCORE).contains(&n) {
        return Err(HandlerError::bad_params_with(
            format!("{} must be between 0 and 100", key),
            json!({ "field": key, "value": n }),
        ));
    }
    Ok(Some(n))
}
