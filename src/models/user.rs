//! User profile model for storage and API.

use serde::{Deserialize, Serialize};
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// User profile stored in Firestore (`users/{uid}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserProfile {
    /// Identity provider uid (also used as document ID)
    pub uid: String,
    /// Email address (may be None for federated accounts without one)
    #[serde(default)]
    pub email: Option<String>,
    /// Display name
    #[serde(default)]
    pub display_name: Option<String>,
    /// Profile picture URL
    #[serde(default, rename = "photoURL")]
    pub photo_url: Option<String>,
    /// Session this user currently plans in
    #[serde(default)]
    pub active_wedding_id: Option<String>,
}

impl UserProfile {
    /// Fresh profile for a first sign-in; no active session yet.
    pub fn from_identity(identity: &VerifiedIdentity) -> Self {
        Self {
            uid: identity.uid.clone(),
            email: identity.email.clone(),
            display_name: identity.display_name.clone(),
            photo_url: identity.photo_url.clone(),
            active_wedding_id: None,
        }
    }
}

/// Identity attested by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

/// Partial profile update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[validate(length(min = 1, max = 80, message = "Display name must be 1-80 characters."))]
    pub display_name: Option<String>,
    #[serde(rename = "photoURL")]
    #[validate(url(message = "Photo URL must be a valid URL."))]
    pub photo_url: Option<String>,
}

impl ProfileUpdate {
    /// Trim text fields so validation sees what will be stored.
    pub fn normalized(mut self) -> Self {
        self.display_name = self.display_name.map(|n| n.trim().to_string());
        self.photo_url = self.photo_url.map(|u| u.trim().to_string());
        self
    }

    pub fn apply_to(&self, profile: &mut UserProfile) {
        if let Some(name) = &self.display_name {
            profile.display_name = Some(name.clone());
        }
        if let Some(url) = &self.photo_url {
            profile.photo_url = Some(url.clone());
        }
    }
}
