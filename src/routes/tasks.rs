// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Routes that act on a single checklist task.
//!
//! Membership is checked against the session the task belongs to, so these
//! paths do not carry the wedding id.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{Task, TaskUpdate};
use crate::AppState;
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    routing::{patch, put},
    Extension, Router,
};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tasks/{id}", patch(update_task).delete(delete_task))
        .route("/api/tasks/{id}/completion", put(set_completion))
}

async fn update_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(update): Json<TaskUpdate>,
) -> Result<Json<Task>> {
    let task = state.tasks.update_task(&id, &user.uid, update).await?;
    Ok(Json(task))
}

#[derive(Deserialize)]
struct CompletionRequest {
    completed: bool,
}

/// Checkbox toggle.
async fn set_completion(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(request): Json<CompletionRequest>,
) -> Result<Json<Task>> {
    let task = state
        .tasks
        .set_completed(&id, &user.uid, request.completed)
        .await?;
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.tasks.delete_task(&id, &user.uid).await?;
    Ok(StatusCode::NO_CONTENT)
}
