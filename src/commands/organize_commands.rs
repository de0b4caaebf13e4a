use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::commands::{blocking, parse_body};
use crate::error::AppError;
use crate::services::{file_service, garbage_service, preview_service, snapshot_service};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OrganizeRequest {
    pub instructions: String,
}

/// `POST /organize {instructions}`: synthesizes a plan and makes it current.
pub async fn organize(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let req: OrganizeRequest = parse_body(&body)?;

    let st = state.clone();
    let tree = blocking(move || snapshot_service::snapshot(&st.sandbox, "/")).await?;

    let mut plan = state.synthesizer.synthesize(&tree, &req.instructions).await;

    let st = state.clone();
    plan.deletions = blocking(move || garbage_service::detect(&st.sandbox, &tree)).await?;

    let version = state.plans.replace(plan.clone());
    tracing::info!(
        version,
        moves = plan.moves.len(),
        deletions = plan.deletions.len(),
        "current plan replaced"
    );
    Ok(Json(json!({"ok": true, "plan": plan})))
}

/// `POST /preview`
pub async fn preview(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let (_, plan) = state.plans.current();
    let preview_plan = plan.clone();
    let views = blocking(move || preview_service::preview(&state.sandbox, &preview_plan)).await?;
    Ok(Json(json!({"ok": true, "plan": plan, "views": views})))
}

/// `POST /apply`: executes the current plan, then clears it.
///
/// On failure the plan is kept and the error reports how many moves landed.
pub async fn apply(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let _guard = state.write_lock.lock().await;
    let (version, plan) = state.plans.current();

    let st = state.clone();
    let result = blocking(move || file_service::apply_plan(&st.sandbox, &plan)).await?;

    if !state.plans.clear_if_current(version) {
        tracing::info!("plan replaced during apply, keeping the newer one");
    }
    tracing::info!(moved = result.moved, "plan applied");
    Ok(Json(json!({"ok": true, "result": result})))
}

/// `POST /reset`: re-seeds the sandbox from the template and clears the plan.
pub async fn reset(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let _guard = state.write_lock.lock().await;

    let st = state.clone();
    blocking(move || file_service::reset_sandbox(&st.sandbox, &st.template_dir)).await?;
    state.plans.clear();
    Ok(Json(json!({"ok": true})))
}
