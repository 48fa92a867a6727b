// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sign-in and sign-out routes.
//!
//! The browser signs in with Firebase Authentication and trades the resulting
//! ID token for an app session token, delivered both as an HttpOnly cookie
//! and in the response body for non-browser clients.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::config::{AUTH_COOKIE_NAME, AUTH_HINT_COOKIE_NAME};
use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, SESSION_TTL_SECS};
use crate::models::UserProfile;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/session", post(sign_in))
        .route("/auth/logout", post(logout))
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    #[validate(length(min = 1, message = "ID token is required."))]
    id_token: String,
}

#[derive(Serialize)]
pub struct SignInResponse {
    pub token: String,
    pub profile: UserProfile,
}

fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE_NAME, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(secure)
        .max_age(time::Duration::seconds(SESSION_TTL_SECS as i64))
        .build()
}

fn hint_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((AUTH_HINT_COOKIE_NAME, "1"))
        .same_site(SameSite::Lax)
        .path("/")
        .secure(secure)
        .max_age(time::Duration::seconds(SESSION_TTL_SECS as i64))
        .build()
}

/// Exchange a Firebase ID token for an app session.
async fn sign_in(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<SignInRequest>,
) -> Result<(CookieJar, Json<SignInResponse>)> {
    request.validate()?;

    let identity = state.identity.verify(request.id_token.trim()).await?;
    let profile = state.profiles.create_or_get_profile(&identity).await?;

    let token = create_jwt(&profile.uid, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    tracing::info!(uid = %profile.uid, "User signed in");

    let secure = state.config.secure_cookies();
    let jar = jar
        .add(session_cookie(token.clone(), secure))
        .add(hint_cookie(secure));
    Ok((jar, Json(SignInResponse { token, profile })))
}

/// Clear the session cookies, with the attributes they were set with.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (StatusCode, CookieJar) {
    let secure = state.config.secure_cookies();
    let token = Cookie::build(AUTH_COOKIE_NAME)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure);
    let hint = Cookie::build(AUTH_HINT_COOKIE_NAME)
        .path("/")
        .same_site(SameSite::Lax)
        .secure(secure);
    (StatusCode::NO_CONTENT, jar.remove(token).remove(hint))
}
