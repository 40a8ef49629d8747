use crate::db;
use crate::ipc::error::{respond, HandlerError};
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::{Path, PathBuf};

/// Opens (creating if needed) the workspace database and makes it current.
/// The previous workspace stays selected if this fails.
pub fn open_workspace(state: &mut AppState, path: &Path) -> Result<(), HandlerError> {
    let conn = db::open_db(path).map_err(HandlerError::DbOpen)?;
    state.workspace = Some(path.to_path_buf());
    state.db = Some(conn);
    tracing::info!(workspace = %path.display(), "workspace opened");
    Ok(())
}

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(
        &req.id,
        Ok(json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        })),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = required_str(req, "path").and_then(|p| {
        let path = PathBuf::from(p);
        open_workspace(state, &path)?;
        Ok(json!({ "workspacePath": path.to_string_lossy() }))
    });
    respond(&req.id, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
