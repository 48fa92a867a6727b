// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Vendor suggestion route.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{VendorQuery, VendorSuggestions};
use crate::AppState;
use axum::{extract::State, routing::post, Extension, Json, Router};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/vendors/suggestions", post(suggest_vendors))
}

async fn suggest_vendors(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(query): Json<VendorQuery>,
) -> Result<Json<VendorSuggestions>> {
    tracing::debug!(uid = %user.uid, vendor_type = %query.vendor_type, "Vendor suggestions requested");
    let suggestions = state.vendors.suggest_vendors(query).await?;
    Ok(Json(suggestions))
}
