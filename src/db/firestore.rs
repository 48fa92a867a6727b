// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed document store.
//!
//! Collections:
//! - `users/{uid}` (profiles)
//! - `weddings/{id}` (sessions)
//! - `tasks/{id}` (checklist tasks, queried by `weddingId`)

use crate::db::{collections, DocumentStore, Write, MAX_BATCH_WRITES};
use crate::error::AppError;
use crate::models::task::sort_for_feed;
use crate::models::{Task, UserProfile, WeddingSession};
use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use serde::{Deserialize, Serialize};

const MAX_CONCURRENT_DB_OPS: usize = 50;

/// Profile fields written by a pointer update.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActiveWeddingPointer {
    active_wedding_id: Option<String>,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreStore {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreStore {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // Emulator: unauthenticated connection, no local credentials needed.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline client; every operation fails with a database error.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    /// Check every `RequireMembers` entry against a read made inside
    /// `transaction`, so a concurrent membership change aborts the commit.
    async fn check_members(
        &self,
        client: &firestore::FirestoreDb,
        transaction: &firestore::FirestoreTransaction<'_>,
        writes: &[Write],
    ) -> Result<(), AppError> {
        let reader = client.clone_with_consistency_selector(
            firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ),
        );

        for write in writes {
            let Write::RequireMembers {
                wedding_id,
                partner_ids,
            } = write
            else {
                continue;
            };

            let stored: Option<WeddingSession> = reader
                .fluent()
                .select()
                .by_id_in(collections::WEDDINGS)
                .obj()
                .one(wedding_id)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

            if stored.map(|s| s.partner_ids).as_ref() != Some(partner_ids) {
                return Err(AppError::Database(format!(
                    "weddings/{wedding_id} membership changed concurrently"
                )));
            }
        }
        Ok(())
    }

    async fn insert_profile(&self, profile: &UserProfile) -> Result<bool, AppError> {
        let result: Result<(), firestore::errors::FirestoreError> = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::USERS)
            .document_id(&profile.uid)
            .object(profile)
            .execute()
            .await;

        match result {
            Ok(()) => Ok(true),
            // Lost a race with a concurrent first sign-in.
            Err(firestore::errors::FirestoreError::DataConflictError(_)) => Ok(false),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(uid)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn get_profiles(&self, uids: &[String]) -> Result<Vec<UserProfile>, AppError> {
        let found = stream::iter(uids.iter().cloned())
            .map(|uid| async move { self.get_profile(&uid).await })
            .buffered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<Option<UserProfile>, AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<Option<UserProfile>>, AppError>>()?;

        Ok(found.into_iter().flatten().collect())
    }

    async fn create_profile_if_absent(
        &self,
        profile: &UserProfile,
    ) -> Result<(UserProfile, bool), AppError> {
        if let Some(existing) = self.get_profile(&profile.uid).await? {
            return Ok((existing, false));
        }

        if self.insert_profile(profile).await? {
            tracing::info!(uid = %profile.uid, "Created user profile");
            return Ok((profile.clone(), true));
        }

        let existing = self.get_profile(&profile.uid).await?.ok_or_else(|| {
            AppError::Database(format!("users/{} vanished after insert conflict", profile.uid))
        })?;
        Ok((existing, false))
    }

    async fn get_session(&self, id: &str) -> Result<Option<WeddingSession>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::WEDDINGS)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_session_by_share_code(
        &self,
        code: &str,
    ) -> Result<Option<WeddingSession>, AppError> {
        let code = code.to_string();
        let mut sessions: Vec<WeddingSession> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::WEDDINGS)
            .filter(move |q| q.for_all([q.field("shareCode").eq(code.clone())]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(sessions.pop())
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::TASKS)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_tasks(&self, wedding_id: &str) -> Result<Vec<Task>, AppError> {
        let wedding_id = wedding_id.to_string();
        // Sorted here rather than with order_by to avoid a composite index.
        let mut tasks: Vec<Task> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::TASKS)
            .filter(move |q| q.for_all([q.field("weddingId").eq(wedding_id.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        sort_for_feed(&mut tasks);
        Ok(tasks)
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<(), AppError> {
        let client = self.get_client()?;
        let write_count = writes.iter().filter(|w| w.is_document_write()).count();
        if write_count > MAX_BATCH_WRITES {
            return Err(AppError::Database(format!(
                "batch of {write_count} writes exceeds limit of {MAX_BATCH_WRITES}"
            )));
        }

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        // Reads must precede every write in a Firestore transaction.
        if writes.iter().any(|w| !w.is_document_write()) {
            if let Err(e) = self.check_members(client, &transaction, &writes).await {
                let _ = transaction.rollback().await;
                return Err(e);
            }
        }

        for write in &writes {
            let added = match write {
                Write::UpdateProfileDetails(profile) => client
                    .fluent()
                    .update()
                    .fields(["displayName", "photoURL"])
                    .in_col(collections::USERS)
                    .precondition(firestore::FirestoreWritePrecondition::Exists(true))
                    .document_id(&profile.uid)
                    .object(profile)
                    .add_to_transaction(&mut transaction)
                    .map(|_| ()),
                Write::SetActiveWedding { uid, wedding_id } => client
                    .fluent()
                    .update()
                    .fields(["activeWeddingId"])
                    .in_col(collections::USERS)
                    .precondition(firestore::FirestoreWritePrecondition::Exists(true))
                    .document_id(uid)
                    .object(&ActiveWeddingPointer {
                        active_wedding_id: wedding_id.clone(),
                    })
                    .add_to_transaction(&mut transaction)
                    .map(|_| ()),
                Write::PutSession(session) => client
                    .fluent()
                    .update()
                    .in_col(collections::WEDDINGS)
                    .document_id(&session.id)
                    .object(session)
                    .add_to_transaction(&mut transaction)
                    .map(|_| ()),
                Write::DeleteSession(id) => client
                    .fluent()
                    .delete()
                    .from(collections::WEDDINGS)
                    .document_id(id)
                    .add_to_transaction(&mut transaction)
                    .map(|_| ()),
                Write::PutTask(task) => client
                    .fluent()
                    .update()
                    .in_col(collections::TASKS)
                    .document_id(&task.id)
                    .object(task)
                    .add_to_transaction(&mut transaction)
                    .map(|_| ()),
                Write::UpdateTaskFields { task, fields } => client
                    .fluent()
                    .update()
                    .fields(fields.iter().copied())
                    .in_col(collections::TASKS)
                    .precondition(firestore::FirestoreWritePrecondition::Exists(true))
                    .document_id(&task.id)
                    .object(task)
                    .add_to_transaction(&mut transaction)
                    .map(|_| ()),
                Write::RequireMembers { .. } => Ok(()),
                Write::DeleteTask { id, .. } => client
                    .fluent()
                    .delete()
                    .from(collections::TASKS)
                    .document_id(id)
                    .add_to_transaction(&mut transaction)
                    .map(|_| ()),
            };

            if let Err(e) = added {
                let _ = transaction.rollback().await;
                return Err(AppError::Database(format!(
                    "Failed to add write to transaction: {}",
                    e
                )));
            }
        }

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::debug!(write_count, "Committed write batch");
        Ok(())
    }
}
