// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Wedding session routes: create, join, leave and the per-session views.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{
    CreateWeddingRequest, JoinWeddingRequest, NewTask, SessionUpdate, Task, TaskFilter, TaskView,
    UserProfile, WeddingSession,
};
use crate::services::{CalendarDay, Dashboard};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/weddings", post(create_wedding))
        .route("/api/weddings/active", get(get_active_wedding))
        .route("/api/weddings/join", post(join_wedding))
        .route("/api/weddings/by-code/{code}", get(get_by_share_code))
        .route(
            "/api/weddings/{id}",
            get(get_wedding).patch(update_wedding).delete(delete_wedding),
        )
        .route("/api/weddings/{id}/leave", post(leave_wedding))
        .route("/api/weddings/{id}/members", get(get_members))
        .route("/api/weddings/{id}/dashboard", get(get_dashboard))
        .route("/api/weddings/{id}/calendar", get(get_calendar))
        .route(
            "/api/weddings/{id}/tasks",
            get(list_tasks).post(create_task),
        )
}

// ─── Membership ──────────────────────────────────────────────

async fn create_wedding(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateWeddingRequest>,
) -> Result<(StatusCode, Json<WeddingSession>)> {
    let session = state
        .sessions
        .create_session(&user.uid, request.wedding_date)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// The session the caller's profile points at; 404 when there is none.
async fn get_active_wedding(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<WeddingSession>> {
    state
        .sessions
        .active_session(&user.uid)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No active wedding".to_string()))
}

async fn join_wedding(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<JoinWeddingRequest>,
) -> Result<Json<WeddingSession>> {
    let session = state.sessions.join_by_share_code(request, &user.uid).await?;
    Ok(Json(session))
}

async fn get_by_share_code(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<WeddingSession>> {
    state
        .sessions
        .find_by_share_code(&code)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Invalid share code".to_string()))
}

async fn get_wedding(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<WeddingSession>> {
    Ok(Json(state.sessions.require_member(&id, &user.uid).await?))
}

async fn update_wedding(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(update): Json<SessionUpdate>,
) -> Result<Json<WeddingSession>> {
    let session = state.sessions.update_session(&id, &user.uid, update).await?;
    Ok(Json(session))
}

async fn delete_wedding(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.sessions.delete_session(&id, &user.uid).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn leave_wedding(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.sessions.leave_session(&id, &user.uid).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Profiles of the session's members, in join order.
async fn get_members(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Vec<UserProfile>>> {
    let session = state.sessions.require_member(&id, &user.uid).await?;
    let profiles = state.profiles.get_profiles(&session.partner_ids).await?;
    Ok(Json(profiles))
}

// ─── Views ───────────────────────────────────────────────────

async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Dashboard>> {
    let dashboard = state.tasks.dashboard(&id, &user.uid, Utc::now()).await?;
    Ok(Json(dashboard))
}

#[derive(Deserialize)]
struct CalendarQuery {
    /// Day to list; defaults to today (UTC)
    date: Option<NaiveDate>,
}

async fn get_calendar(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<CalendarDay>> {
    let now = Utc::now();
    let date = query.date.unwrap_or_else(|| now.date_naive());
    let calendar = state.tasks.calendar(&id, &user.uid, date, now).await?;
    Ok(Json(calendar))
}

// ─── Tasks ───────────────────────────────────────────────────

#[derive(Deserialize)]
struct TaskListQuery {
    #[serde(default)]
    filter: TaskFilter,
}

async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Query(query): Query<TaskListQuery>,
) -> Result<Json<Vec<TaskView>>> {
    let now = Utc::now();
    let tasks = state.tasks.list_tasks(&id, &user.uid).await?;
    let views = query
        .filter
        .apply(&tasks, &user.uid, now)
        .into_iter()
        .map(|task| TaskView::new(task.clone(), now))
        .collect();
    Ok(Json(views))
}

async fn create_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(new_task): Json<NewTask>,
) -> Result<(StatusCode, Json<Task>)> {
    let task = state.tasks.create_task(&id, &user.uid, new_task).await?;
    Ok((StatusCode::CREATED, Json(task)))
}
