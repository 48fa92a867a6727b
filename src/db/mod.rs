//! Database layer.
//!
//! Documents live in three collections (`users`, `weddings`, `tasks`).
//! Services talk to a [`DocumentStore`] through [`Db`], which also
//! publishes a [`Change`] for every document touched by a committed batch.

pub mod firestore;
pub mod memory;

pub use self::firestore::FirestoreStore;
pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::{Task, UserProfile, WeddingSession};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const WEDDINGS: &str = "weddings";
    pub const TASKS: &str = "tasks";
}

/// Capacity of the in-process change feed.
const CHANGE_FEED_CAPACITY: usize = 1024;

/// Most document writes one batch may carry (Firestore allows 500).
pub const MAX_BATCH_WRITES: usize = 450;

/// One mutation inside an atomic write batch.
#[derive(Debug, Clone)]
pub enum Write {
    /// Set only `displayName` and `photoURL` on an existing profile.
    UpdateProfileDetails(UserProfile),
    /// Set only `activeWeddingId` on an existing profile.
    SetActiveWedding {
        uid: String,
        wedding_id: Option<String>,
    },
    PutSession(WeddingSession),
    DeleteSession(String),
    PutTask(Task),
    /// Set only the named fields of an existing task, taking their values
    /// from `task`.
    UpdateTaskFields {
        task: Task,
        fields: Vec<&'static str>,
    },
    DeleteTask { id: String, wedding_id: String },
    /// Fail the whole batch unless the session exists with exactly these
    /// members. Writes nothing.
    RequireMembers {
        wedding_id: String,
        partner_ids: Vec<String>,
    },
}

impl Write {
    fn change(&self) -> Option<Change> {
        let change = match self {
            Write::UpdateProfileDetails(profile) => Change::Profile(profile.uid.clone()),
            Write::SetActiveWedding { uid, .. } => Change::Profile(uid.clone()),
            Write::PutSession(session) => Change::Session(session.id.clone()),
            Write::DeleteSession(id) => Change::Session(id.clone()),
            Write::PutTask(task) | Write::UpdateTaskFields { task, .. } => Change::Task {
                id: task.id.clone(),
                wedding_id: task.wedding_id.clone(),
            },
            Write::DeleteTask { id, wedding_id } => Change::Task {
                id: id.clone(),
                wedding_id: wedding_id.clone(),
            },
            Write::RequireMembers { .. } => return None,
        };
        Some(change)
    }

    /// Whether this entry writes a document.
    pub fn is_document_write(&self) -> bool {
        !matches!(self, Write::RequireMembers { .. })
    }
}

/// Document touched by a committed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Profile(String),
    Session(String),
    Task { id: String, wedding_id: String },
}

/// Storage backend for profiles, sessions and tasks.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>, AppError>;

    /// Profiles for the given uids, skipping any that do not exist.
    async fn get_profiles(&self, uids: &[String]) -> Result<Vec<UserProfile>, AppError>;

    /// Insert `profile` unless one already exists for its uid.
    ///
    /// Returns the stored profile and whether it was created.
    async fn create_profile_if_absent(
        &self,
        profile: &UserProfile,
    ) -> Result<(UserProfile, bool), AppError>;

    async fn get_session(&self, id: &str) -> Result<Option<WeddingSession>, AppError>;

    /// Look up a session by its (already normalized) share code.
    async fn find_session_by_share_code(
        &self,
        code: &str,
    ) -> Result<Option<WeddingSession>, AppError>;

    async fn get_task(&self, id: &str) -> Result<Option<Task>, AppError>;

    /// All tasks of one session, in feed order.
    async fn list_tasks(&self, wedding_id: &str) -> Result<Vec<Task>, AppError>;

    /// Apply every write or none of them.
    ///
    /// Batches above [`MAX_BATCH_WRITES`] document writes are rejected.
    async fn commit(&self, writes: Vec<Write>) -> Result<(), AppError>;
}

/// Store handle shared by the services.
#[derive(Clone)]
pub struct Db {
    store: Arc<dyn DocumentStore>,
    changes: broadcast::Sender<Change>,
}

impl Db {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { store, changes }
    }

    /// In-process store, for local runs and tests.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Receive changes committed after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.changes.subscribe()
    }

    pub async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>, AppError> {
        self.store.get_profile(uid).await
    }

    pub async fn get_profiles(&self, uids: &[String]) -> Result<Vec<UserProfile>, AppError> {
        self.store.get_profiles(uids).await
    }

    pub async fn create_profile_if_absent(
        &self,
        profile: &UserProfile,
    ) -> Result<UserProfile, AppError> {
        let (stored, created) = self.store.create_profile_if_absent(profile).await?;
        if created {
            self.publish(Change::Profile(stored.uid.clone()));
        }
        Ok(stored)
    }

    pub async fn get_session(&self, id: &str) -> Result<Option<WeddingSession>, AppError> {
        self.store.get_session(id).await
    }

    pub async fn find_session_by_share_code(
        &self,
        code: &str,
    ) -> Result<Option<WeddingSession>, AppError> {
        self.store.find_session_by_share_code(code).await
    }

    pub async fn get_task(&self, id: &str) -> Result<Option<Task>, AppError> {
        self.store.get_task(id).await
    }

    pub async fn list_tasks(&self, wedding_id: &str) -> Result<Vec<Task>, AppError> {
        self.store.list_tasks(wedding_id).await
    }

    /// Commit a write batch atomically, then announce what it touched.
    pub async fn commit(&self, writes: Vec<Write>) -> Result<(), AppError> {
        if writes.is_empty() {
            return Ok(());
        }
        let changes: Vec<Change> = writes.iter().filter_map(Write::change).collect();
        self.store.commit(writes).await?;
        for change in changes {
            self.publish(change);
        }
        Ok(())
    }

    fn publish(&self, change: Change) {
        // No receivers is fine: nobody is watching.
        let _ = self.changes.send(change);
    }
}
