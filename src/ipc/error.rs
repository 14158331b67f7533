use serde_json::json;
use thiserror::Error;

/// Failure of a single request. Each variant maps to a stable wire code.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("select a workspace first")]
    NoWorkspace,
    #[error("{0}")]
    BadParams(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{message}")]
    Conflict {
        message: String,
        details: Option<serde_json::Value>,
    },
    #[error("{message}")]
    Db {
        code: &'static str,
        message: String,
    },
    #[error("{0}")]
    Internal(String),
}

impl HandlerError {
    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::BadParams(message.into())
    }

    pub fn db(code: &'static str, e: impl std::fmt::Display) -> Self {
        Self::Db {
            code,
            message: e.to_string(),
        }
    }

    pub fn internal(e: impl std::fmt::Display) -> Self {
        Self::Internal(e.to_string())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::NoWorkspace => "no_workspace",
            Self::BadParams(_) => "bad_params",
            Self::NotFound(_) => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Db { code, .. } => *code,
            Self::Internal(_) => "internal",
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Conflict { details, .. } => details.clone(),
            _ => None,
        }
    }
}

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

pub fn respond(id: &str, result: Result<serde_json::Value, HandlerError>) -> serde_json::Value {
    match result {
        Ok(v) => ok(id, v),
        Err(e) => err(id, e.code(), e.to_string(), e.details()),
    }
}
