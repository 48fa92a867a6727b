// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Vendor suggestion request and response shapes.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

fn validate_required_text(value: &str) -> Result<(), ValidationError> {
    if value.trim().chars().count() < 3 {
        let mut err = ValidationError::new("too_short");
        err.message = Some("Must be at least 3 characters.".into());
        return Err(err);
    }
    Ok(())
}

/// Criteria for a vendor search.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct VendorQuery {
    /// City/region of the wedding
    #[validate(custom(function = "validate_required_text"))]
    pub location: String,
    /// Photographer, florist, caterer, ...
    #[validate(custom(function = "validate_required_text"))]
    pub vendor_type: String,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub budget: Option<String>,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub style: Option<String>,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub additional_criteria: Option<String>,
}

impl VendorQuery {
    /// Trim fields; blank optionals become absent.
    pub fn normalized(self) -> Self {
        fn opt(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }
        Self {
            location: self.location.trim().to_string(),
            vendor_type: self.vendor_type.trim().to_string(),
            budget: opt(self.budget),
            style: opt(self.style),
            additional_criteria: opt(self.additional_criteria),
        }
    }
}

/// One suggested vendor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Vendor {
    pub name: String,
    pub description: String,
    pub contact_info: String,
}

/// Model output: `{"vendors": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct VendorSuggestions {
    pub vendors: Vec<Vendor>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_requires_location_and_type() {
        let query = VendorQuery {
            location: "  NY ".to_string(),
            vendor_type: "florist".to_string(),
            ..VendorQuery::default()
        }
        .normalized();
        let err = query.validate().unwrap_err();
        assert!(err.field_errors().contains_key("location"));
        assert!(!err.field_errors().contains_key("vendor_type"));
    }

    #[test]
    fn test_blank_optionals_dropped() {
        let query = VendorQuery {
            location: "Austin, TX".to_string(),
            vendor_type: "photographer".to_string(),
            budget: Some("  ".to_string()),
            style: Some(" rustic ".to_string()),
            additional_criteria: None,
        }
        .normalized();
        assert!(query.validate().is_ok());
        assert_eq!(query.budget, None);
        assert_eq!(query.style.as_deref(), Some("rustic"));
    }

    #[test]
    fn test_oversized_optional_rejected() {
        let query = VendorQuery {
            location: "Austin, TX".to_string(),
            vendor_type: "photographer".to_string(),
            additional_criteria: Some("x".repeat(501)),
            ..VendorQuery::default()
        };
        assert!(query.validate().is_err());
    }

    #[test]
    fn test_suggestions_reject_unexpected_shape() {
        let ok: Result<VendorSuggestions, _> = serde_json::from_str(
            r#"{"vendors":[{"name":"A","description":"B","contactInfo":"C"}]}"#,
        );
        assert!(ok.is_ok());

        let missing: Result<VendorSuggestions, _> =
            serde_json::from_str(r#"{"vendors":[{"name":"A","description":"B"}]}"#);
        assert!(missing.is_err());
    }
}
