// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live subscriptions over the change feed.
//!
//! A [`Subscription`] owns a background task that reloads its view whenever
//! a relevant document changes and publishes the result as a [`Snapshot`].
//! Dropping the subscription stops the task.

use crate::db::{Change, Db};
use crate::error::AppError;
use crate::models::{Task, UserProfile, WeddingSession};
use serde::Serialize;
use std::future::Future;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Latest state published by a subscription.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "lowercase")]
pub enum Snapshot<T> {
    /// Nothing loaded yet.
    Loading,
    Ready(T),
    /// The last load failed; see logs.
    Unavailable,
}

impl<T> Snapshot<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Snapshot<U> {
        match self {
            Snapshot::Loading => Snapshot::Loading,
            Snapshot::Ready(value) => Snapshot::Ready(f(value)),
            Snapshot::Unavailable => Snapshot::Unavailable,
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Snapshot::Ready(value) => Some(value),
            _ => None,
        }
    }
}

/// Handle to a live view; the view stops updating when this is dropped.
pub struct Subscription<T> {
    rx: watch::Receiver<Snapshot<T>>,
    task: JoinHandle<()>,
}

impl<T: Clone> Subscription<T> {
    /// Latest snapshot, marking it as seen.
    pub fn latest(&mut self) -> Snapshot<T> {
        self.rx.borrow_and_update().clone()
    }

    /// Wait until a snapshot newer than the last one seen is published.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.rx.changed().await
    }

    /// An extra receiver; it stops receiving once this handle is dropped.
    pub fn receiver(&self) -> watch::Receiver<Snapshot<T>> {
        self.rx.clone()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// What a signed-in user is currently planning.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveWedding {
    pub profile: Option<UserProfile>,
    pub session: Option<WeddingSession>,
    pub tasks: Vec<Task>,
}

impl ActiveWedding {
    fn without_session(profile: Option<UserProfile>) -> Self {
        Self {
            profile,
            session: None,
            tasks: Vec::new(),
        }
    }
}

/// Opens live views of profiles, sessions and task lists.
#[derive(Clone)]
pub struct LiveService {
    db: Db,
}

fn publish<T>(tx: &watch::Sender<Snapshot<T>>, result: Result<T, AppError>, view: &str) {
    match result {
        Ok(value) => {
            tx.send_replace(Snapshot::Ready(value));
        }
        Err(e) => {
            tracing::warn!(error = %e, view, "Live view reload failed");
            tx.send_replace(Snapshot::Unavailable);
        }
    }
}

/// Discard queued changes; the reload that follows covers them.
fn drain(changes: &mut broadcast::Receiver<Change>) {
    loop {
        match changes.try_recv() {
            Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
}

impl LiveService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    fn spawn_view<T, L, Fut, R>(&self, view: &'static str, relevant: R, load: L) -> Subscription<T>
    where
        T: Send + Sync + 'static,
        L: Fn(Db) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, AppError>> + Send,
        R: Fn(&Change) -> bool + Send + 'static,
    {
        let (tx, rx) = watch::channel(Snapshot::Loading);
        // Subscribe before the first load so no change slips between them.
        let mut changes = self.db.subscribe();
        let db = self.db.clone();

        let task = tokio::spawn(async move {
            publish(&tx, load(db.clone()).await, view);
            loop {
                match changes.recv().await {
                    Ok(change) if relevant(&change) => {}
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, view, "Live view lagged, reloading");
                    }
                    Err(RecvError::Closed) => break,
                }
                drain(&mut changes);
                publish(&tx, load(db.clone()).await, view);
            }
        });

        Subscription { rx, task }
    }

    pub fn watch_profile(&self, uid: &str) -> Subscription<Option<UserProfile>> {
        let uid = uid.to_string();
        let key = uid.clone();
        self.spawn_view(
            "profile",
            move |change| matches!(change, Change::Profile(id) if *id == key),
            move |db| {
                let uid = uid.clone();
                async move { db.get_profile(&uid).await }
            },
        )
    }

    pub fn watch_session(&self, wedding_id: &str) -> Subscription<Option<WeddingSession>> {
        let wedding_id = wedding_id.to_string();
        let key = wedding_id.clone();
        self.spawn_view(
            "session",
            move |change| matches!(change, Change::Session(id) if *id == key),
            move |db| {
                let wedding_id = wedding_id.clone();
                async move { db.get_session(&wedding_id).await }
            },
        )
    }

    /// Task list of one session in feed order.
    pub fn watch_tasks(&self, wedding_id: &str) -> Subscription<Vec<Task>> {
        let wedding_id = wedding_id.to_string();
        let key = wedding_id.clone();
        self.spawn_view(
            "tasks",
            move |change| {
                matches!(change, Change::Task { wedding_id: w, .. } if *w == key)
            },
            move |db| {
                let wedding_id = wedding_id.clone();
                async move { db.list_tasks(&wedding_id).await }
            },
        )
    }

    /// Follow whatever session `uid`'s profile points at.
    ///
    /// When the pointer changes, the views of the previous session are
    /// released before views of the new one are opened.
    pub fn watch_active_wedding(&self, uid: &str) -> Subscription<ActiveWedding> {
        let (tx, rx) = watch::channel(Snapshot::Loading);
        let live = self.clone();
        let uid = uid.to_string();

        let task = tokio::spawn(async move {
            let mut profile_view = live.watch_profile(&uid);
            let mut current: Option<String> = None;
            let mut session_views: Option<(
                Subscription<Option<WeddingSession>>,
                Subscription<Vec<Task>>,
            )> = None;

            loop {
                let profile = profile_view.latest();
                let wanted = match &profile {
                    Snapshot::Ready(Some(p)) => p.active_wedding_id.clone(),
                    _ => None,
                };

                if wanted != current {
                    // Release first, then acquire.
                    drop(session_views.take());
                    session_views = wanted
                        .as_deref()
                        .map(|id| (live.watch_session(id), live.watch_tasks(id)));
                    tracing::debug!(
                        uid = %uid,
                        from = ?current,
                        to = ?wanted,
                        "Active wedding switched"
                    );
                    current = wanted;
                }

                let snapshot = match (profile, session_views.as_mut()) {
                    (Snapshot::Loading, _) => Snapshot::Loading,
                    (Snapshot::Unavailable, _) => Snapshot::Unavailable,
                    (Snapshot::Ready(profile), None) => {
                        Snapshot::Ready(ActiveWedding::without_session(profile))
                    }
                    (Snapshot::Ready(profile), Some((session_view, tasks_view))) => {
                        compose(&uid, profile, session_view.latest(), tasks_view.latest())
                    }
                };
                tx.send_replace(snapshot);

                let closed = match session_views.as_mut() {
                    Some((session_view, tasks_view)) => tokio::select! {
                        r = profile_view.changed() => r.is_err(),
                        r = session_view.changed() => r.is_err(),
                        r = tasks_view.changed() => r.is_err(),
                    },
                    None => profile_view.changed().await.is_err(),
                };
                if closed {
                    break;
                }
            }
        });

        Subscription { rx, task }
    }
}

fn compose(
    uid: &str,
    profile: Option<UserProfile>,
    session: Snapshot<Option<WeddingSession>>,
    tasks: Snapshot<Vec<Task>>,
) -> Snapshot<ActiveWedding> {
    match (session, tasks) {
        (Snapshot::Unavailable, _) | (_, Snapshot::Unavailable) => Snapshot::Unavailable,
        (Snapshot::Loading, _) | (_, Snapshot::Loading) => Snapshot::Loading,
        // Deleted, or the user is no longer a member.
        (Snapshot::Ready(session), Snapshot::Ready(_))
            if !session.as_ref().is_some_and(|s| s.is_member(uid)) =>
        {
            Snapshot::Ready(ActiveWedding::without_session(profile))
        }
        (Snapshot::Ready(session), Snapshot::Ready(tasks)) => Snapshot::Ready(ActiveWedding {
            profile,
            session,
            tasks,
        }),
    }
}
