// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Server-sent events feed of the caller's active wedding.
//!
//! Each event carries the full current view. The underlying subscription
//! lives as long as the response stream, so a client disconnect releases it.

use crate::middleware::auth::AuthUser;
use crate::models::{TaskView, UserProfile, WeddingSession};
use crate::services::{ActiveWedding, Snapshot};
use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Extension, Router,
};
use chrono::{DateTime, Utc};
use futures_util::stream::{self, Stream};
use serde::Serialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/live", get(live_feed))
}

/// Active wedding as sent to the browser, with task status derived at send time.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LiveWedding {
    profile: Option<UserProfile>,
    session: Option<WeddingSession>,
    tasks: Vec<TaskView>,
}

impl LiveWedding {
    fn new(active: ActiveWedding, now: DateTime<Utc>) -> Self {
        Self {
            profile: active.profile,
            session: active.session,
            tasks: active
                .tasks
                .into_iter()
                .map(|task| TaskView::new(task, now))
                .collect(),
        }
    }
}

fn snapshot_event(snapshot: Snapshot<ActiveWedding>) -> Result<Event, axum::Error> {
    let snapshot = snapshot.map(|active| LiveWedding::new(active, Utc::now()));
    Event::default().event("snapshot").json_data(&snapshot)
}

async fn live_feed(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    tracing::debug!(uid = %user.uid, "Live feed opened");
    let subscription = state.live.watch_active_wedding(&user.uid);

    let events = stream::unfold((subscription, true), |(mut subscription, first)| async move {
        if !first {
            // Publisher gone: end the stream
            subscription.changed().await.ok()?;
        }
        let event = snapshot_event(subscription.latest());
        Some((event, (subscription, false)))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
