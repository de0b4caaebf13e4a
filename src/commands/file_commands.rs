use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::commands::{blocking, parse_body};
use crate::error::AppError;
use crate::services::{garbage_service, snapshot_service};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ScanRequest {
    #[serde(default)]
    pub dir: Option<String>,
}

async fn tree_response(state: Arc<AppState>, dir: String) -> Result<Json<Value>, AppError> {
    let tree = blocking(move || snapshot_service::snapshot(&state.sandbox, &dir)).await?;
    Ok(Json(json!({"ok": true, "tree": tree})))
}

/// `GET /filesystem/*path`
pub async fn browse(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<Json<Value>, AppError> {
    tree_response(state, path).await
}

/// `GET /filesystem`
pub async fn browse_root(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    tree_response(state, "/".to_string()).await
}

/// `POST /scan {dir?}`
pub async fn scan(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let req: ScanRequest = parse_body(&body)?;
    let dir = req
        .dir
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| "/".to_string());
    tree_response(state, dir).await
}

/// `POST /detect-garbage`
pub async fn detect_garbage(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let suggestions = blocking(move || {
        let tree = snapshot_service::snapshot(&state.sandbox, "/")?;
        garbage_service::detect(&state.sandbox, &tree)
    })
    .await?;
    tracing::info!(suggestions = suggestions.len(), "garbage detection finished");
    Ok(Json(json!({"ok": true, "suggestions": suggestions})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::test_app;
    use std::fs;

    #[tokio::test]
    async fn scan_defaults_to_root() {
        let app = test_app();
        fs::create_dir(app.sandbox_dir.path().join("b")).unwrap();
        fs::write(app.sandbox_dir.path().join("b/c.log"), b"12345").unwrap();

        for body in ["", "{}", r#"{"dir": ""}"#] {
            let Json(value) = scan(State(app.state.clone()), Bytes::from(body)).await.unwrap();
            assert_eq!(value["ok"], true);
            assert_eq!(value["tree"]["path"], "/");
        }

        let Json(value) = scan(State(app.state.clone()), Bytes::from(r#"{"dir":"b"}"#))
            .await
            .unwrap();
        assert_eq!(value["tree"]["path"], "/b");
        assert_eq!(value["tree"]["children"][0]["size"], 5);
        assert_eq!(value["tree"]["children"][0]["ext"], "log");
    }

    #[tokio::test]
    async fn browse_rejects_escape_and_missing() {
        let app = test_app();

        let err = browse(State(app.state.clone()), Path("../../etc".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "path_escape");

        let err = browse(State(app.state.clone()), Path("missing".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "not_found");

        let Json(value) = browse_root(State(app.state.clone())).await.unwrap();
        assert_eq!(value["tree"]["type"], "dir");
    }

    #[tokio::test]
    async fn detect_garbage_lists_suggestions() {
        let app = test_app();
        fs::write(app.sandbox_dir.path().join("notes.bak"), b"x").unwrap();

        let Json(value) = detect_garbage(State(app.state.clone())).await.unwrap();

        assert_eq!(value["ok"], true);
        assert_eq!(value["suggestions"][0]["file"], "/notes.bak");
        assert_eq!(value["suggestions"][0]["confidence"], "high");
        assert_eq!(value["suggestions"][0]["safeToDelete"], true);
    }
}
