// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session manager: wedding sessions, share codes and membership.
//!
//! Every operation that reads and then rewrites a session document holds
//! that session's lock for the duration, and every multi-document change is
//! committed as one write batch. The lock only orders requests within this
//! process; each batch that rewrites membership also carries a
//! `RequireMembers` check so the store rejects it if another instance
//! changed the members first.

use crate::config::{MAX_SESSION_MEMBERS, SHARE_CODE_LENGTH};
use crate::db::{Db, Write, MAX_BATCH_WRITES};
use crate::error::AppError;
use crate::models::wedding::normalize_share_code;
use crate::models::{JoinWeddingRequest, SessionUpdate, WeddingSession};
use crate::services::ids;
use crate::time_utils::truncate_to_secs;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use ring::rand::SystemRandom;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use validator::Validate;

/// Attempts at drawing an unused share code before giving up.
const MAX_SHARE_CODE_ATTEMPTS: usize = 5;

/// Per-session membership locks, holding only sessions in use.
pub type SessionLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Held session lock. The table entry is dropped with the last holder.
pub(crate) struct SessionGuard {
    locks: SessionLocks,
    session_id: String,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        // Two handles left (table and this guard) means nobody is waiting.
        self.locks
            .remove_if(self.session_id.as_str(), |_, lock| Arc::strong_count(lock) <= 2);
    }
}

/// Batch check that the stored members are still `session`'s.
fn require_members(session: &WeddingSession) -> Write {
    Write::RequireMembers {
        wedding_id: session.id.clone(),
        partner_ids: session.partner_ids.clone(),
    }
}

/// Creates sessions and manages who belongs to them.
#[derive(Clone)]
pub struct SessionService {
    db: Db,
    rng: SystemRandom,
    locks: SessionLocks,
}

impl SessionService {
    pub fn new(db: Db) -> Self {
        Self {
            db,
            rng: SystemRandom::new(),
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Serialize membership changes to one session within this process.
    pub(crate) async fn lock(&self, session_id: &str) -> SessionGuard {
        let lock = self
            .locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        SessionGuard {
            locks: self.locks.clone(),
            session_id: session_id.to_string(),
            _guard: lock.lock_owned().await,
        }
    }

    async fn load(&self, session_id: &str) -> Result<WeddingSession, AppError> {
        self.db
            .get_session(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Wedding not found".to_string()))
    }

    async fn require_profile(&self, uid: &str) -> Result<(), AppError> {
        match self.db.get_profile(uid).await? {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound("Profile not found".to_string())),
        }
    }

    async fn unused_share_code(&self) -> Result<String, AppError> {
        for attempt in 1..=MAX_SHARE_CODE_ATTEMPTS {
            let code = ids::new_share_code(&self.rng, SHARE_CODE_LENGTH)?;
            if self.db.find_session_by_share_code(&code).await?.is_none() {
                return Ok(code);
            }
            tracing::warn!(attempt, "Share code collision, drawing again");
        }
        Err(anyhow::anyhow!("no unused share code after {MAX_SHARE_CODE_ATTEMPTS} attempts").into())
    }

    /// Create a session owned by `owner_id` and make it their active one.
    pub async fn create_session(
        &self,
        owner_id: &str,
        wedding_date: DateTime<Utc>,
    ) -> Result<WeddingSession, AppError> {
        self.require_profile(owner_id).await?;

        let session = WeddingSession {
            id: ids::new_document_id(&self.rng)?,
            owner_id: owner_id.to_string(),
            partner_ids: vec![owner_id.to_string()],
            wedding_date: truncate_to_secs(wedding_date),
            share_code: self.unused_share_code().await?,
            created_at: truncate_to_secs(Utc::now()),
        };

        let _guard = self.lock(&session.id).await;

        self.db
            .commit(vec![
                Write::PutSession(session.clone()),
                Write::SetActiveWedding {
                    uid: owner_id.to_string(),
                    wedding_id: Some(session.id.clone()),
                },
            ])
            .await?;

        tracing::info!(
            wedding_id = %session.id,
            owner_id,
            "Wedding session created"
        );
        Ok(session)
    }

    /// Case-insensitive share code lookup.
    pub async fn find_by_share_code(
        &self,
        code: &str,
    ) -> Result<Option<WeddingSession>, AppError> {
        let code = normalize_share_code(code);
        if code.is_empty() {
            return Ok(None);
        }
        self.db.find_session_by_share_code(&code).await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<WeddingSession>, AppError> {
        self.db.get_session(session_id).await
    }

    /// The session `uid` currently plans in, if the pointer resolves to a
    /// session they still belong to.
    pub async fn active_session(&self, uid: &str) -> Result<Option<WeddingSession>, AppError> {
        let Some(wedding_id) = self
            .db
            .get_profile(uid)
            .await?
            .and_then(|profile| profile.active_wedding_id)
        else {
            return Ok(None);
        };

        let session = self.db.get_session(&wedding_id).await?;
        if session.is_none() {
            tracing::debug!(uid, wedding_id = %wedding_id, "Active wedding pointer is dangling");
        }
        Ok(session.filter(|s| s.is_member(uid)))
    }

    /// Load a session the caller belongs to.
    pub async fn require_member(
        &self,
        session_id: &str,
        uid: &str,
    ) -> Result<WeddingSession, AppError> {
        let session = self.load(session_id).await?;
        if !session.is_member(uid) {
            return Err(AppError::Forbidden(
                "Not a member of this wedding".to_string(),
            ));
        }
        Ok(session)
    }

    /// Add `user_id` to the session and point their profile at it.
    ///
    /// Joining a session one already belongs to only re-points the profile.
    pub async fn join_session(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<WeddingSession, AppError> {
        self.require_profile(user_id).await?;

        let _guard = self.lock(session_id).await;

        let mut session = self.load(session_id).await?;
        let pointer = Write::SetActiveWedding {
            uid: user_id.to_string(),
            wedding_id: Some(session.id.clone()),
        };

        if session.is_member(user_id) {
            self.db.commit(vec![pointer]).await?;
            tracing::debug!(wedding_id = session_id, user_id, "Re-joined wedding");
            return Ok(session);
        }

        if session.is_full() {
            tracing::info!(
                wedding_id = session_id,
                user_id,
                max_members = MAX_SESSION_MEMBERS,
                "Join rejected, wedding is full"
            );
            return Err(AppError::SessionFull);
        }

        let check = require_members(&session);
        session.partner_ids.push(user_id.to_string());
        self.db
            .commit(vec![check, Write::PutSession(session.clone()), pointer])
            .await?;

        tracing::info!(wedding_id = session_id, user_id, "Partner joined wedding");
        Ok(session)
    }

    /// Validate a user-entered share code, look it up and join.
    pub async fn join_by_share_code(
        &self,
        request: JoinWeddingRequest,
        user_id: &str,
    ) -> Result<WeddingSession, AppError> {
        let request = request.normalized();
        request.validate()?;

        let session = self
            .db
            .find_session_by_share_code(&request.share_code)
            .await?
            .ok_or_else(|| {
                AppError::NotFound("No wedding found with that share code".to_string())
            })?;

        self.join_session(&session.id, user_id).await
    }

    /// Remove a non-owner member and clear their pointer.
    pub async fn leave_session(&self, session_id: &str, user_id: &str) -> Result<(), AppError> {
        let _guard = self.lock(session_id).await;

        let mut session = self.load(session_id).await?;
        if session.is_owner(user_id) {
            return Err(AppError::Forbidden(
                "The owner cannot leave; delete the wedding instead".to_string(),
            ));
        }
        if !session.is_member(user_id) {
            return Err(AppError::Forbidden(
                "Not a member of this wedding".to_string(),
            ));
        }

        let check = require_members(&session);
        session.partner_ids.retain(|id| id != user_id);
        let mut writes = vec![check, Write::PutSession(session)];
        writes.extend(self.pointer_clears(session_id, &[user_id.to_string()]).await?);
        self.db.commit(writes).await?;

        tracing::info!(wedding_id = session_id, user_id, "Partner left wedding");
        Ok(())
    }

    /// Delete a session, its tasks and every member's pointer to it.
    ///
    /// Tasks that do not fit in the final batch are deleted in earlier
    /// batches; if one of those fails the session survives with fewer tasks
    /// and the delete can be repeated.
    pub async fn delete_session(
        &self,
        session_id: &str,
        requester_id: &str,
    ) -> Result<(), AppError> {
        let _guard = self.lock(session_id).await;

        let session = self.load(session_id).await?;
        if !session.is_owner(requester_id) {
            return Err(AppError::Forbidden(
                "Only the owner can delete this wedding".to_string(),
            ));
        }

        let tasks = self.db.list_tasks(session_id).await?;
        let task_count = tasks.len();

        let mut task_deletes: Vec<Write> = tasks
            .into_iter()
            .map(|task| Write::DeleteTask {
                id: task.id,
                wedding_id: task.wedding_id,
            })
            .collect();

        let mut writes = vec![
            require_members(&session),
            Write::DeleteSession(session.id.clone()),
        ];
        writes.extend(self.pointer_clears(session_id, &session.partner_ids).await?);

        let room = MAX_BATCH_WRITES.saturating_sub(writes.len() - 1);
        let overflow = task_deletes.len().saturating_sub(room);
        let early: Vec<Write> = task_deletes.drain(..overflow).collect();
        for chunk in early.chunks(MAX_BATCH_WRITES) {
            self.db.commit(chunk.to_vec()).await?;
        }
        writes.extend(task_deletes);
        self.db.commit(writes).await?;

        tracing::info!(
            wedding_id = session_id,
            members = session.partner_ids.len(),
            task_count,
            "Wedding session deleted"
        );
        Ok(())
    }

    /// Merge editable session fields; membership is untouched.
    pub async fn update_session(
        &self,
        session_id: &str,
        requester_id: &str,
        update: SessionUpdate,
    ) -> Result<WeddingSession, AppError> {
        let _guard = self.lock(session_id).await;

        let mut session = self.require_member(session_id, requester_id).await?;
        let check = require_members(&session);
        update.apply_to(&mut session);
        self.db
            .commit(vec![check, Write::PutSession(session.clone())])
            .await?;

        tracing::debug!(wedding_id = session_id, "Wedding session updated");
        Ok(session)
    }

    /// Pointer resets for those of `uids` whose profile still references
    /// `session_id`.
    async fn pointer_clears(
        &self,
        session_id: &str,
        uids: &[String],
    ) -> Result<Vec<Write>, AppError> {
        Ok(self
            .db
            .get_profiles(uids)
            .await?
            .into_iter()
            .filter(|profile| profile.active_wedding_id.as_deref() == Some(session_id))
            .map(|profile| Write::SetActiveWedding {
                uid: profile.uid,
                wedding_id: None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VerifiedIdentity;
    use crate::services::ProfileService;
    use chrono::TimeZone;

    async fn setup(uids: &[&str]) -> (Db, SessionService) {
        let db = Db::in_memory();
        let profiles = ProfileService::new(db.clone());
        for uid in uids {
            profiles
                .create_or_get_profile(&VerifiedIdentity {
                    uid: uid.to_string(),
                    email: None,
                    display_name: None,
                    photo_url: None,
                })
                .await
                .unwrap();
        }
        (db.clone(), SessionService::new(db))
    }

    fn date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap()
    }

    async fn pointer(db: &Db, uid: &str) -> Option<String> {
        db.get_profile(uid).await.unwrap().unwrap().active_wedding_id
    }

    #[tokio::test]
    async fn test_create_sets_owner_pointer() {
        let (db, sessions) = setup(&["u1"]).await;
        let session = sessions.create_session("u1", date()).await.unwrap();

        assert_eq!(session.partner_ids, vec!["u1".to_string()]);
        assert_eq!(session.share_code.len(), SHARE_CODE_LENGTH);
        assert_eq!(pointer(&db, "u1").await, Some(session.id.clone()));
    }

    #[tokio::test]
    async fn test_create_without_profile_fails() {
        let (_, sessions) = setup(&[]).await;
        let err = sessions.create_session("ghost", date()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_keeps_membership() {
        let (_, sessions) = setup(&["u1", "u2"]).await;
        let session = sessions.create_session("u1", date()).await.unwrap();
        sessions.join_session(&session.id, "u2").await.unwrap();

        let new_date = Utc.with_ymd_and_hms(2026, 7, 4, 15, 30, 0).unwrap();
        let updated = sessions
            .update_session(
                &session.id,
                "u2",
                SessionUpdate {
                    wedding_date: Some(new_date),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.wedding_date, new_date);
        assert_eq!(updated.partner_ids.len(), 2);
    }

    #[tokio::test]
    async fn test_update_by_outsider_forbidden() {
        let (_, sessions) = setup(&["u1", "u3"]).await;
        let session = sessions.create_session("u1", date()).await.unwrap();
        let err = sessions
            .update_session(&session.id, "u3", SessionUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_leave_keeps_pointer_to_other_session() {
        let (db, sessions) = setup(&["u1", "u2"]).await;
        let first = sessions.create_session("u1", date()).await.unwrap();
        sessions.join_session(&first.id, "u2").await.unwrap();
        // u2 starts their own plan, then leaves the first one
        let own = sessions.create_session("u2", date()).await.unwrap();

        sessions.leave_session(&first.id, "u2").await.unwrap();
        assert_eq!(pointer(&db, "u2").await, Some(own.id));
    }

    #[tokio::test]
    async fn test_leave_by_non_member_forbidden() {
        let (_, sessions) = setup(&["u1", "u3"]).await;
        let session = sessions.create_session("u1", date()).await.unwrap();
        let err = sessions.leave_session(&session.id, "u3").await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_active_session_ignores_dangling_pointer() {
        let (db, sessions) = setup(&["u1"]).await;
        db.commit(vec![Write::SetActiveWedding {
            uid: "u1".to_string(),
            wedding_id: Some("gone".to_string()),
        }])
        .await
        .unwrap();
        assert!(sessions.active_session("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_joins_admit_one_partner() {
        let (_, sessions) = setup(&["u1", "u2", "u3"]).await;
        let session = sessions.create_session("u1", date()).await.unwrap();

        let (a, b) = tokio::join!(
            sessions.join_session(&session.id, "u2"),
            sessions.join_session(&session.id, "u3"),
        );
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);

        let stored = sessions.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(stored.partner_ids.len(), MAX_SESSION_MEMBERS);
    }

    #[tokio::test]
    async fn test_failed_requests_leave_no_lock_entries() {
        let (_, sessions) = setup(&["u1", "u2"]).await;
        for i in 0..200 {
            let joined = sessions.join_session(&format!("bogus-{i}"), "u2").await;
            assert!(matches!(joined, Err(AppError::NotFound(_))));
            let left = sessions.leave_session(&format!("nope-{i}"), "u2").await;
            assert!(matches!(left, Err(AppError::NotFound(_))));
        }
        assert!(sessions.locks.is_empty());

        let session = sessions.create_session("u1", date()).await.unwrap();
        sessions.join_session(&session.id, "u2").await.unwrap();
        assert!(sessions.locks.is_empty());
    }

    /// Memory store whose session reads take a while, widening the window
    /// between a membership read and its commit.
    struct SlowSessionReads(crate::db::MemoryStore);

    #[async_trait::async_trait]
    impl crate::db::DocumentStore for SlowSessionReads {
        async fn get_profile(
            &self,
            uid: &str,
        ) -> Result<Option<crate::models::UserProfile>, AppError> {
            self.0.get_profile(uid).await
        }
        async fn get_profiles(
            &self,
            uids: &[String],
        ) -> Result<Vec<crate::models::UserProfile>, AppError> {
            self.0.get_profiles(uids).await
        }
        async fn create_profile_if_absent(
            &self,
            profile: &crate::models::UserProfile,
        ) -> Result<(crate::models::UserProfile, bool), AppError> {
            self.0.create_profile_if_absent(profile).await
        }
        async fn get_session(&self, id: &str) -> Result<Option<WeddingSession>, AppError> {
            let session = self.0.get_session(id).await;
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            session
        }
        async fn find_session_by_share_code(
            &self,
            code: &str,
        ) -> Result<Option<WeddingSession>, AppError> {
            self.0.find_session_by_share_code(code).await
        }
        async fn get_task(&self, id: &str) -> Result<Option<crate::models::Task>, AppError> {
            self.0.get_task(id).await
        }
        async fn list_tasks(
            &self,
            wedding_id: &str,
        ) -> Result<Vec<crate::models::Task>, AppError> {
            self.0.list_tasks(wedding_id).await
        }
        async fn commit(&self, writes: Vec<Write>) -> Result<(), AppError> {
            self.0.commit(writes).await
        }
    }

    #[tokio::test]
    async fn test_instances_with_separate_locks_admit_one_partner() {
        let db = Db::new(Arc::new(SlowSessionReads(crate::db::MemoryStore::new())));
        let profiles = ProfileService::new(db.clone());
        for uid in ["u1", "u2", "u3"] {
            profiles
                .create_or_get_profile(&VerifiedIdentity {
                    uid: uid.to_string(),
                    email: None,
                    display_name: None,
                    photo_url: None,
                })
                .await
                .unwrap();
        }

        // Two service instances share the store but not their lock tables
        let node_a = SessionService::new(db.clone());
        let node_b = SessionService::new(db.clone());
        let session = node_a.create_session("u1", date()).await.unwrap();

        let (a, b) = tokio::join!(
            node_a.join_session(&session.id, "u2"),
            node_b.join_session(&session.id, "u3"),
        );
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        let rejected = if a.is_ok() { b } else { a };
        assert!(matches!(rejected, Err(AppError::Database(_))));

        let stored = db.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(stored.partner_ids.len(), MAX_SESSION_MEMBERS);
    }

    #[tokio::test]
    async fn test_delete_session_with_more_tasks_than_one_batch() {
        let (db, sessions) = setup(&["u1"]).await;
        let session = sessions.create_session("u1", date()).await.unwrap();

        let task_count = MAX_BATCH_WRITES + 25;
        let tasks: Vec<Write> = (0..task_count)
            .map(|i| {
                Write::PutTask(crate::models::Task {
                    id: format!("t{i:04}"),
                    wedding_id: session.id.clone(),
                    title: format!("Task {i}"),
                    description: None,
                    assigned_to: vec!["u1".to_string()],
                    deadline: date(),
                    status: crate::models::TaskStatus::Pending,
                    created_by: "u1".to_string(),
                    created_at: date(),
                    last_updated_at: date(),
                })
            })
            .collect();
        for chunk in tasks.chunks(MAX_BATCH_WRITES) {
            db.commit(chunk.to_vec()).await.unwrap();
        }
        assert_eq!(db.list_tasks(&session.id).await.unwrap().len(), task_count);

        sessions.delete_session(&session.id, "u1").await.unwrap();

        assert!(db.get_session(&session.id).await.unwrap().is_none());
        assert!(db.list_tasks(&session.id).await.unwrap().is_empty());
        assert_eq!(pointer(&db, "u1").await, None);
    }
}
