// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Wedding session model: one couple's shared plan.

use crate::config::{MAX_SESSION_MEMBERS, SHARE_CODE_MAX_INPUT, SHARE_CODE_MIN_INPUT};
use crate::time_utils::rfc3339_secs;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Wedding session stored in Firestore (`weddings/{id}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct WeddingSession {
    /// Generated session ID (also used as document ID)
    pub id: String,
    /// Creating user; the only member allowed to delete the session
    pub owner_id: String,
    /// Members in join order; always starts with the owner
    pub partner_ids: Vec<String>,
    #[serde(with = "rfc3339_secs")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub wedding_date: DateTime<Utc>,
    /// Uppercase join token
    pub share_code: String,
    #[serde(with = "rfc3339_secs")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
}

impl WeddingSession {
    pub fn is_member(&self, uid: &str) -> bool {
        self.partner_ids.iter().any(|id| id == uid)
    }

    pub fn is_owner(&self, uid: &str) -> bool {
        self.owner_id == uid
    }

    pub fn is_full(&self) -> bool {
        self.partner_ids.len() >= MAX_SESSION_MEMBERS
    }
}

/// Normalize user-entered share code for lookup and storage.
pub fn normalize_share_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// Request to create a wedding session.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWeddingRequest {
    pub wedding_date: DateTime<Utc>,
}

// `validator` length bounds are typed as u64.
const SHARE_CODE_MIN_INPUT_U64: u64 = SHARE_CODE_MIN_INPUT as u64;
const SHARE_CODE_MAX_INPUT_U64: u64 = SHARE_CODE_MAX_INPUT as u64;

/// Request to join a session by share code.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JoinWeddingRequest {
    #[validate(length(
        min = SHARE_CODE_MIN_INPUT_U64,
        max = SHARE_CODE_MAX_INPUT_U64,
        message = "Share code must be 6-10 characters."
    ))]
    pub share_code: String,
}

impl JoinWeddingRequest {
    pub fn normalized(mut self) -> Self {
        self.share_code = normalize_share_code(&self.share_code);
        self
    }
}

/// Partial session update; membership is never changed here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdate {
    pub wedding_date: Option<DateTime<Utc>>,
}

impl SessionUpdate {
    pub fn apply_to(&self, session: &mut WeddingSession) {
        if let Some(date) = self.wedding_date {
            session.wedding_date = crate::time_utils::truncate_to_secs(date);
        }
    }
}
