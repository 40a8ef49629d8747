use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

#[derive(thiserror::Error, Debug)]
pub enum HandlerError {
    #[error("{message}")]
    BadParams {
        message: String,
        details: Option<serde_json::Value>,
    },
    #[error("select a workspace first")]
    NoWorkspace,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("failed to open workspace: {0:#}")]
    DbOpen(anyhow::Error),
    #[error(transparent)]
    Db(#[from] anyhow::Error),
    #[error(transparent)]
    Sql(#[from] rusqlite::Error),
}

impl HandlerError {
    pub fn bad_params(message: impl Into<String>) -> Self {
        HandlerError::BadParams {
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params_with(message: impl Into<String>, details: serde_json::Value) -> Self {
        HandlerError::BadParams {
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            HandlerError::BadParams { .. } => "bad_params",
            HandlerError::NoWorkspace => "no_workspace",
            HandlerError::NotFound(_) => "not_found",
            HandlerError::DbOpen(_) => "db_open_failed",
            HandlerError::Db(_) | HandlerError::Sql(_) => "db_query_failed",
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        let code = self.code();
        let message = self.to_string();
        let details = match self {
            HandlerError::BadParams { details, .. } => details,
            _ => None,
        };
        err(id, code, message, details)
    }
}

/// Collapses a handler result into the response envelope.
pub fn respond(id: &str, result: Result<serde_json::Value, HandlerError>) -> serde_json::Value {
    match result {
        Ok(v) => ok(id, v),
        Err(e) => {
            tracing::warn!(request = id, code = e.code(), error = %e, "request failed");
            e.response(id)
        }
    }
}
