// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile manager: one profile per authenticated identity.

use crate::db::{Db, Write};
use crate::error::AppError;
use crate::models::{ProfileUpdate, UserProfile, VerifiedIdentity};
use validator::Validate;

/// Creates, reads and edits user profiles.
#[derive(Clone)]
pub struct ProfileService {
    db: Db,
}

impl ProfileService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Return the caller's profile, creating it on first sign-in.
    ///
    /// An existing profile is returned as stored; in particular its
    /// `activeWeddingId` is never reset by signing in again.
    pub async fn create_or_get_profile(
        &self,
        identity: &VerifiedIdentity,
    ) -> Result<UserProfile, AppError> {
        self.db
            .create_profile_if_absent(&UserProfile::from_identity(identity))
            .await
    }

    pub async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>, AppError> {
        self.db.get_profile(uid).await
    }

    /// Profiles for `uids`; unknown uids are skipped.
    pub async fn get_profiles(&self, uids: &[String]) -> Result<Vec<UserProfile>, AppError> {
        self.db.get_profiles(uids).await
    }

    /// Merge display name / photo edits into the caller's profile.
    pub async fn update_profile(
        &self,
        uid: &str,
        update: ProfileUpdate,
    ) -> Result<UserProfile, AppError> {
        let update = update.normalized();
        update.validate()?;

        let mut profile = self
            .db
            .get_profile(uid)
            .await?
            .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

        update.apply_to(&mut profile);
        self.db
            .commit(vec![Write::UpdateProfileDetails(profile.clone())])
            .await?;

        tracing::debug!(uid, "Profile updated");
        Ok(profile)
    }
}
