// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process document store.
//!
//! Used for local development (`STORE_BACKEND=memory`) and tests. State is
//! lost on restart. A write batch is validated in full before any of it is
//! applied, under one write lock, with the same size limit and
//! preconditions as the Firestore backend.

use crate::db::{DocumentStore, Write, MAX_BATCH_WRITES};
use crate::error::AppError;
use crate::models::task::sort_for_feed;
use crate::models::{Task, UserProfile, WeddingSession};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Copy the named stored fields from `from` into `task`.
fn merge_task_fields(task: &mut Task, from: Task, fields: &[&str]) {
    for field in fields {
        match *field {
            "title" => task.title = from.title.clone(),
            "description" => task.description = from.description.clone(),
            "deadline" => task.deadline = from.deadline,
            "assignedTo" => task.assigned_to = from.assigned_to.clone(),
            "status" => task.status = from.status,
            "lastUpdatedAt" => task.last_updated_at = from.last_updated_at,
            other => tracing::warn!(field = other, "Ignoring unknown task field"),
        }
    }
}

#[derive(Default)]
struct Collections {
    users: HashMap<String, UserProfile>,
    weddings: HashMap<String, WeddingSession>,
    tasks: HashMap<String, Task>,
}

/// Document store kept in process memory.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>, AppError> {
        Ok(self.inner.read().await.users.get(uid).cloned())
    }

    async fn get_profiles(&self, uids: &[String]) -> Result<Vec<UserProfile>, AppError> {
        let inner = self.inner.read().await;
        Ok(uids
            .iter()
            .filter_map(|uid| inner.users.get(uid).cloned())
            .collect())
    }

    async fn create_profile_if_absent(
        &self,
        profile: &UserProfile,
    ) -> Result<(UserProfile, bool), AppError> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.users.get(&profile.uid) {
            return Ok((existing.clone(), false));
        }
        inner.users.insert(profile.uid.clone(), profile.clone());
        Ok((profile.clone(), true))
    }

    async fn get_session(&self, id: &str) -> Result<Option<WeddingSession>, AppError> {
        Ok(self.inner.read().await.weddings.get(id).cloned())
    }

    async fn find_session_by_share_code(
        &self,
        code: &str,
    ) -> Result<Option<WeddingSession>, AppError> {
        Ok(self
            .inner
            .read()
            .await
            .weddings
            .values()
            .find(|session| session.share_code == code)
            .cloned())
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>, AppError> {
        Ok(self.inner.read().await.tasks.get(id).cloned())
    }

    async fn list_tasks(&self, wedding_id: &str) -> Result<Vec<Task>, AppError> {
        let mut tasks: Vec<Task> = self
            .inner
            .read()
            .await
            .tasks
            .values()
            .filter(|task| task.wedding_id == wedding_id)
            .cloned()
            .collect();
        sort_for_feed(&mut tasks);
        Ok(tasks)
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<(), AppError> {
        let document_writes = writes.iter().filter(|w| w.is_document_write()).count();
        if document_writes > MAX_BATCH_WRITES {
            return Err(AppError::Database(format!(
                "batch of {document_writes} writes exceeds limit of {MAX_BATCH_WRITES}"
            )));
        }

        let mut inner = self.inner.write().await;

        // Field-level updates require the document to exist, as with a
        // Firestore `exists` precondition.
        for write in &writes {
            match write {
                Write::UpdateProfileDetails(UserProfile { uid, .. })
                | Write::SetActiveWedding { uid, .. } => {
                    if !inner.users.contains_key(uid) {
                        return Err(AppError::Database(format!(
                            "precondition failed: users/{uid} does not exist"
                        )));
                    }
                }
                Write::UpdateTaskFields { task, .. } => {
                    if !inner.tasks.contains_key(&task.id) {
                        return Err(AppError::Database(format!(
                            "precondition failed: tasks/{} does not exist",
                            task.id
                        )));
                    }
                }
                Write::RequireMembers {
                    wedding_id,
                    partner_ids,
                } => {
                    let current = inner.weddings.get(wedding_id).map(|s| &s.partner_ids);
                    if current != Some(partner_ids) {
                        return Err(AppError::Database(format!(
                            "weddings/{wedding_id} membership changed concurrently"
                        )));
                    }
                }
                _ => {}
            }
        }

        for write in writes {
            match write {
                Write::UpdateProfileDetails(update) => {
                    if let Some(profile) = inner.users.get_mut(&update.uid) {
                        profile.display_name = update.display_name;
                        profile.photo_url = update.photo_url;
                    }
                }
                Write::SetActiveWedding { uid, wedding_id } => {
                    if let Some(profile) = inner.users.get_mut(&uid) {
                        profile.active_wedding_id = wedding_id;
                    }
                }
                Write::PutSession(session) => {
                    inner.weddings.insert(session.id.clone(), session);
                }
                Write::DeleteSession(id) => {
                    inner.weddings.remove(&id);
                }
                Write::PutTask(task) => {
                    inner.tasks.insert(task.id.clone(), task);
                }
                Write::UpdateTaskFields { task, fields } => {
                    if let Some(stored) = inner.tasks.get_mut(&task.id) {
                        merge_task_fields(stored, task, &fields);
                    }
                }
                Write::DeleteTask { id, .. } => {
                    inner.tasks.remove(&id);
                }
                Write::RequireMembers { .. } => {}
            }
        }
        Ok(())
    }
}
