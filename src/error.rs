use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("path escapes sandbox: {0}")]
    PathEscape(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("destination already exists: {0}")]
    MoveConflict(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("apply stopped after {moved} move(s): {source}")]
    PartialApply {
        moved: usize,
        #[source]
        source: Box<AppError>,
    },
}

impl AppError {
    /// Maps an IO failure on `path` to `NotFound` when the entry is missing.
    pub fn from_io(err: std::io::Error, path: &str) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path.to_string())
        } else {
            Self::Io(err)
        }
    }

    /// The innermost error, looking through `PartialApply`.
    pub fn cause(&self) -> &AppError {
        match self {
            Self::PartialApply { source, .. } => source.cause(),
            other => other,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::PathEscape(_) => "path_escape",
            Self::NotFound(_) => "not_found",
            Self::Io(_) => "io_error",
            Self::MoveConflict(_) => "move_conflict",
            Self::ExternalService(_) => "external_service",
            Self::Serde(_) => "invalid_json",
            Self::PartialApply { source, .. } => source.code(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::PartialApply { source, .. } => source.status(),
            Self::PathEscape(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MoveConflict(_) => StatusCode::CONFLICT,
            Self::Serde(_) => StatusCode::BAD_REQUEST,
            Self::ExternalService(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn capture(self) -> Self {
        if self.status().is_server_error() {
            tracing::error!(code = self.code(), "{self}");
        } else {
            tracing::warn!(code = self.code(), "{self}");
        }
        self
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let err = self.capture();
        let mut body = serde_json::json!({
            "ok": false,
            "error": &err,
            "code": err.code(),
        });
        if let AppError::PartialApply { moved, .. } = &err {
            body["moved"] = serde_json::json!(moved);
        }
        (err.status(), Json(body)).into_response()
    }
}
