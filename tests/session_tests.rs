// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Wedding session membership tests.
//!
//! These run against the in-memory store and cover the membership rules:
//! the two-member cap, idempotent joins, owner-only deletion and the
//! active-session pointer kept in step with membership.

use axum::http::StatusCode;
use chrono::{TimeZone, Utc};
use serde_json::json;
use wedding_planner::error::AppError;
use wedding_planner::models::{JoinWeddingRequest, NewTask, TaskStatus};

mod common;
use common::{create_test_app, profile, send, sign_up};

fn wedding_date() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════
// SERVICE LEVEL
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_third_member_rejected_and_members_unchanged() {
    let (_, state) = create_test_app();
    for uid in ["u1", "u2", "u3"] {
        sign_up(&state, uid).await;
    }

    let session = state
        .sessions
        .create_session("u1", wedding_date())
        .await
        .unwrap();
    state.sessions.join_session(&session.id, "u2").await.unwrap();

    let err = state
        .sessions
        .join_session(&session.id, "u3")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::SessionFull));

    let stored = state.sessions.get_session(&session.id).await.unwrap().unwrap();
    assert_eq!(stored.partner_ids, vec!["u1", "u2"]);
    assert_eq!(profile(&state, "u3").await.active_wedding_id, None);
}

#[tokio::test]
async fn test_repeated_join_is_idempotent() {
    let (_, state) = create_test_app();
    sign_up(&state, "u1").await;
    sign_up(&state, "u2").await;

    let session = state
        .sessions
        .create_session("u1", wedding_date())
        .await
        .unwrap();

    let first = state.sessions.join_session(&session.id, "u2").await.unwrap();
    let second = state.sessions.join_session(&session.id, "u2").await.unwrap();
    assert_eq!(first.partner_ids, vec!["u1", "u2"]);
    assert_eq!(second.partner_ids, vec!["u1", "u2"]);

    // The owner re-joining is also a no-op for membership
    let again = state.sessions.join_session(&session.id, "u1").await.unwrap();
    assert_eq!(again.partner_ids, vec!["u1", "u2"]);
}

#[tokio::test]
async fn test_rejoin_restores_cleared_pointer() {
    let (_, state) = create_test_app();
    sign_up(&state, "u1").await;

    let first = state
        .sessions
        .create_session("u1", wedding_date())
        .await
        .unwrap();
    let second = state
        .sessions
        .create_session("u1", wedding_date())
        .await
        .unwrap();
    assert_eq!(
        profile(&state, "u1").await.active_wedding_id,
        Some(second.id.clone())
    );

    state.sessions.join_session(&first.id, "u1").await.unwrap();
    assert_eq!(profile(&state, "u1").await.active_wedding_id, Some(first.id));
}

#[tokio::test]
async fn test_owner_cannot_leave() {
    let (_, state) = create_test_app();
    sign_up(&state, "u1").await;
    sign_up(&state, "u2").await;

    let session = state
        .sessions
        .create_session("u1", wedding_date())
        .await
        .unwrap();
    state.sessions.join_session(&session.id, "u2").await.unwrap();

    let err = state
        .sessions
        .leave_session(&session.id, "u1")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let stored = state.sessions.get_session(&session.id).await.unwrap().unwrap();
    assert_eq!(stored.partner_ids, vec!["u1", "u2"]);
    assert_eq!(
        profile(&state, "u1").await.active_wedding_id,
        Some(session.id)
    );
}

#[tokio::test]
async fn test_delete_clears_every_member_pointer() {
    let (_, state) = create_test_app();
    sign_up(&state, "u1").await;
    sign_up(&state, "u2").await;

    let session = state
        .sessions
        .create_session("u1", wedding_date())
        .await
        .unwrap();
    state.sessions.join_session(&session.id, "u2").await.unwrap();

    let err = state
        .sessions
        .delete_session(&session.id, "u2")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    state
        .sessions
        .delete_session(&session.id, "u1")
        .await
        .unwrap();

    assert!(state.sessions.get_session(&session.id).await.unwrap().is_none());
    assert_eq!(profile(&state, "u1").await.active_wedding_id, None);
    assert_eq!(profile(&state, "u2").await.active_wedding_id, None);

    let err = state
        .sessions
        .delete_session(&session.id, "u1")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_delete_removes_session_tasks() {
    let (_, state) = create_test_app();
    sign_up(&state, "u1").await;

    let session = state
        .sessions
        .create_session("u1", wedding_date())
        .await
        .unwrap();
    let task = state
        .tasks
        .create_task(
            &session.id,
            "u1",
            NewTask {
                title: "Book venue".to_string(),
                description: None,
                deadline: Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
                assigned_to: vec!["u1".to_string()],
                status: TaskStatus::Pending,
            },
        )
        .await
        .unwrap();

    state
        .sessions
        .delete_session(&session.id, "u1")
        .await
        .unwrap();

    assert!(state.db.get_task(&task.id).await.unwrap().is_none());
    assert!(state.db.list_tasks(&session.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_keeps_pointer_moved_elsewhere() {
    let (_, state) = create_test_app();
    sign_up(&state, "u1").await;
    sign_up(&state, "u2").await;

    let shared = state
        .sessions
        .create_session("u1", wedding_date())
        .await
        .unwrap();
    state.sessions.join_session(&shared.id, "u2").await.unwrap();

    // u2 starts planning elsewhere while still listed as a member
    let own = state
        .sessions
        .create_session("u2", wedding_date())
        .await
        .unwrap();

    state.sessions.delete_session(&shared.id, "u1").await.unwrap();
    assert_eq!(profile(&state, "u2").await.active_wedding_id, Some(own.id));
}

#[tokio::test]
async fn test_share_code_lookup_is_case_insensitive() {
    let (_, state) = create_test_app();
    sign_up(&state, "u1").await;

    let session = state
        .sessions
        .create_session("u1", wedding_date())
        .await
        .unwrap();
    assert!(session
        .share_code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));

    let exact = state
        .sessions
        .find_by_share_code(&session.share_code)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(exact.id, session.id);

    let lower = format!("  {}  ", session.share_code.to_lowercase());
    let found = state
        .sessions
        .find_by_share_code(&lower)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, session.id);

    assert!(state
        .sessions
        .find_by_share_code("ZZZZZZZZ")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_join_by_share_code_validates_length() {
    let (_, state) = create_test_app();
    sign_up(&state, "u2").await;

    let err = state
        .sessions
        .join_by_share_code(
            JoinWeddingRequest {
                share_code: "abc".to_string(),
            },
            "u2",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = state
        .sessions
        .join_by_share_code(
            JoinWeddingRequest {
                share_code: "NOPE00".to_string(),
            },
            "u2",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

/// Full walk through a couple's session lifecycle.
#[tokio::test]
async fn test_couple_lifecycle() {
    let (_, state) = create_test_app();
    sign_up(&state, "U1").await;
    sign_up(&state, "U2").await;

    let session = state
        .sessions
        .create_session("U1", wedding_date())
        .await
        .unwrap();
    assert_eq!(session.partner_ids, vec!["U1"]);

    let found = state
        .sessions
        .find_by_share_code(&session.share_code.to_lowercase())
        .await
        .unwrap()
        .unwrap();
    let joined = state.sessions.join_session(&found.id, "U2").await.unwrap();
    assert_eq!(joined.partner_ids, vec!["U1", "U2"]);

    let task = state
        .tasks
        .create_task(
            &session.id,
            "U1",
            NewTask {
                title: "Book venue".to_string(),
                description: None,
                deadline: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
                assigned_to: vec!["U1".to_string()],
                status: TaskStatus::Pending,
            },
        )
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.display_status(Utc::now()), TaskStatus::Overdue);

    state.sessions.leave_session(&session.id, "U2").await.unwrap();
    let after_leave = state.sessions.get_session(&session.id).await.unwrap().unwrap();
    assert_eq!(after_leave.partner_ids, vec!["U1"]);
    assert_eq!(profile(&state, "U2").await.active_wedding_id, None);

    state.sessions.delete_session(&session.id, "U1").await.unwrap();
    assert!(state.sessions.get_session(&session.id).await.unwrap().is_none());
    assert_eq!(profile(&state, "U1").await.active_wedding_id, None);
}

// ═══════════════════════════════════════════════════════════════════════════
// HTTP
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_session_routes() {
    let (app, state) = create_test_app();
    let owner = sign_up(&state, "u1").await;
    let partner = sign_up(&state, "u2").await;
    let outsider = sign_up(&state, "u3").await;

    let (status, _) = send(&app, "GET", "/api/weddings/active", Some(&owner), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, created) = send(
        &app,
        "POST",
        "/api/weddings",
        Some(&owner),
        Some(json!({ "weddingDate": "2026-06-01T00:00:00Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();
    let code = created["shareCode"].as_str().unwrap().to_lowercase();
    assert_eq!(created["weddingDate"], "2026-06-01T00:00:00Z");

    let (status, active) = send(&app, "GET", "/api/weddings/active", Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(active["id"], id.as_str());

    let (status, by_code) = send(
        &app,
        "GET",
        &format!("/api/weddings/by-code/{code}"),
        Some(&partner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_code["id"], id.as_str());

    let (status, joined) = send(
        &app,
        "POST",
        "/api/weddings/join",
        Some(&partner),
        Some(json!({ "shareCode": code })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(joined["partnerIds"], json!(["u1", "u2"]));

    let (status, body) = send(
        &app,
        "POST",
        "/api/weddings/join",
        Some(&outsider),
        Some(json!({ "shareCode": code })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "session_full");

    let (status, _) = send(&app, "GET", &format!("/api/weddings/{id}"), Some(&outsider), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, members) = send(
        &app,
        "GET",
        &format!("/api/weddings/{id}/members"),
        Some(&partner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let uids: Vec<&str> = members
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["uid"].as_str().unwrap())
        .collect();
    assert_eq!(uids, vec!["u1", "u2"]);

    let (status, updated) = send(
        &app,
        "PATCH",
        &format!("/api/weddings/{id}"),
        Some(&partner),
        Some(json!({ "weddingDate": "2026-07-04T15:30:00Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["weddingDate"], "2026-07-04T15:30:00Z");
    assert_eq!(updated["partnerIds"], json!(["u1", "u2"]));

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/weddings/{id}/leave"),
        Some(&owner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/weddings/{id}/leave"),
        Some(&partner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "DELETE", &format!("/api/weddings/{id}"), Some(&owner), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, "GET", &format!("/api/weddings/{id}"), Some(&owner), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}
