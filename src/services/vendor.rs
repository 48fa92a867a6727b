// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Vendor suggestions from a generative model.
//!
//! The model is asked for JSON matching a fixed schema. Its answer is
//! accepted only if it parses into [`VendorSuggestions`] with every field
//! filled in; anything else fails the whole call.

use crate::error::AppError;
use crate::models::{VendorQuery, VendorSuggestions};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const GEMINI_TIMEOUT: Duration = Duration::from_secs(30);

/// Number of suggestions the prompt asks for.
pub const MIN_SUGGESTED_VENDORS: usize = 3;

/// A text model that can be constrained to a JSON response schema.
#[async_trait]
pub trait VendorModel: Send + Sync {
    /// Return the raw text the model produced for `prompt`.
    async fn generate(&self, prompt: &str, response_schema: &Value) -> Result<String, AppError>;
}

/// Output schema in the OpenAPI subset Gemini accepts.
pub fn response_schema() -> Value {
    let text = |description: &str| json!({ "type": "STRING", "description": description });
    json!({
        "type": "OBJECT",
        "properties": {
            "vendors": {
                "type": "ARRAY",
                "description": "A list of suggested vendors.",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": text("The name of the vendor."),
                        "description": text("A brief description of the vendor."),
                        "contactInfo": text("The contact information for the vendor."),
                    },
                    "required": ["name", "description", "contactInfo"],
                },
            },
        },
        "required": ["vendors"],
    })
}

/// Render the fixed prompt for a (normalized) query.
pub fn render_prompt(query: &VendorQuery) -> String {
    let or_unspecified = |value: &Option<String>| -> String {
        value.clone().unwrap_or_else(|| "not specified".to_string())
    };
    format!(
        "You are a wedding planning assistant. Suggest vendors based on the following criteria:\n\
         \n\
         Location: {}\n\
         Vendor Type: {}\n\
         Budget: {}\n\
         Style: {}\n\
         Additional Criteria: {}\n\
         \n\
         Suggest at least {} vendors.",
        query.location,
        query.vendor_type,
        or_unspecified(&query.budget),
        or_unspecified(&query.style),
        or_unspecified(&query.additional_criteria),
        MIN_SUGGESTED_VENDORS,
    )
}

/// Parse model output, rejecting anything outside the schema.
pub fn parse_suggestions(raw: &str) -> Result<VendorSuggestions, AppError> {
    let suggestions: VendorSuggestions = serde_json::from_str(raw.trim()).map_err(|e| {
        AppError::ExternalService(format!("Vendor suggestions did not match schema: {e}"))
    })?;

    for (index, vendor) in suggestions.vendors.iter().enumerate() {
        let fields = [
            ("name", &vendor.name),
            ("description", &vendor.description),
            ("contactInfo", &vendor.contact_info),
        ];
        if let Some((field, _)) = fields.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(AppError::ExternalService(format!(
                "Vendor suggestions did not match schema: vendors[{index}].{field} is empty"
            )));
        }
    }

    Ok(suggestions)
}

/// Suggestion gateway.
#[derive(Clone)]
pub struct VendorService {
    model: Option<Arc<dyn VendorModel>>,
}

impl VendorService {
    pub fn new(model: Arc<dyn VendorModel>) -> Self {
        Self { model: Some(model) }
    }

    /// Gateway without a model; every call fails as an external error.
    pub fn unconfigured() -> Self {
        Self { model: None }
    }

    pub async fn suggest_vendors(&self, query: VendorQuery) -> Result<VendorSuggestions, AppError> {
        let query = query.normalized();
        query.validate()?;

        let model = self.model.as_ref().ok_or_else(|| {
            AppError::ExternalService("Vendor suggestions are not configured".to_string())
        })?;

        let raw = model
            .generate(&render_prompt(&query), &response_schema())
            .await?;
        let suggestions = parse_suggestions(&raw)?;

        if suggestions.vendors.len() < MIN_SUGGESTED_VENDORS {
            tracing::info!(
                count = suggestions.vendors.len(),
                vendor_type = %query.vendor_type,
                "Model returned fewer vendors than requested"
            );
        }

        tracing::debug!(count = suggestions.vendors.len(), "Vendor suggestions generated");
        Ok(suggestions)
    }
}

/// Gemini `generateContent` client.
pub struct GeminiModel {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiModel {
    pub fn new(api_key: String, model: String) -> anyhow::Result<Self> {
        Self::with_base_url(api_key, model, GEMINI_BASE_URL.to_string())
    }

    /// Client against a different endpoint (tests, proxies).
    pub fn with_base_url(api_key: String, model: String, base_url: String) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(GEMINI_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl VendorModel for GeminiModel {
    async fn generate(&self, prompt: &str, response_schema: &Value) -> Result<String, AppError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": response_schema,
            },
        });

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %detail, "Gemini returned an error");
            return Err(AppError::ExternalService(format!(
                "Gemini returned status {status}"
            )));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("Invalid Gemini response: {}", e)))?;

        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| AppError::ExternalService("Gemini returned no candidates".to_string()))?;

        let text: String = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(AppError::ExternalService(format!(
                "Gemini returned no text (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }
        Ok(text)
    }
}
