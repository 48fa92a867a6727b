// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header};
use serde_json::Value;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;
use wedding_planner::config::Config;
use wedding_planner::db::{Db, DocumentStore, FirestoreStore, MemoryStore, Write};
use wedding_planner::error::AppError;
use wedding_planner::middleware::auth::create_jwt;
use wedding_planner::models::{Task, UserProfile, VerifiedIdentity, WeddingSession};
use wedding_planner::routes::create_router;
use wedding_planner::services::{FirebaseTokenVerifier, VendorModel, VendorService};
use wedding_planner::AppState;

/// Key id the test verifier accepts.
#[allow(dead_code)]
pub const TEST_KID: &str = "test-kid";

const TEST_PRIVATE_KEY: &str = include_str!("../fixtures/firebase_test_key.pem");
const TEST_PUBLIC_KEY: &str = include_str!("../fixtures/firebase_test_key.pub.pem");

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> Db {
    let store = FirestoreStore::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator");
    Db::new(Arc::new(store))
}

/// Create a database whose every operation fails (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> Db {
    Db::new(Arc::new(FirestoreStore::new_mock()))
}

/// In-memory store that pauses after each task read, so concurrent
/// read-modify-write requests overlap.
#[allow(dead_code)]
#[derive(Default)]
pub struct SlowTaskReads(MemoryStore);

#[async_trait::async_trait]
impl DocumentStore for SlowTaskReads {
    async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>, AppError> {
        self.0.get_profile(uid).await
    }

    async fn get_profiles(&self, uids: &[String]) -> Result<Vec<UserProfile>, AppError> {
        self.0.get_profiles(uids).await
    }

    async fn create_profile_if_absent(
        &self,
        profile: &UserProfile,
    ) -> Result<(UserProfile, bool), AppError> {
        self.0.create_profile_if_absent(profile).await
    }

    async fn get_session(&self, id: &str) -> Result<Option<WeddingSession>, AppError> {
        self.0.get_session(id).await
    }

    async fn find_session_by_share_code(
        &self,
        code: &str,
    ) -> Result<Option<WeddingSession>, AppError> {
        self.0.find_session_by_share_code(code).await
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>, AppError> {
        let task = self.0.get_task(id).await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        task
    }

    async fn list_tasks(&self, wedding_id: &str) -> Result<Vec<Task>, AppError> {
        let tasks = self.0.list_tasks(wedding_id).await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        tasks
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<(), AppError> {
        self.0.commit(writes).await
    }
}

fn test_verifier(config: &Config) -> Arc<FirebaseTokenVerifier> {
    let key = DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY.as_bytes()).unwrap();
    Arc::new(FirebaseTokenVerifier::new_with_static_key(config, TEST_KID, key).unwrap())
}

fn build_app(config: Config, db: Db, vendors: VendorService) -> (axum::Router, Arc<AppState>) {
    let identity = test_verifier(&config);
    let state = Arc::new(AppState::new(config, db, vendors, identity));
    (create_router(state.clone()), state)
}

/// Create a test app on an in-memory store.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    build_app(
        Config::test_default(),
        Db::in_memory(),
        VendorService::unconfigured(),
    )
}

#[allow(dead_code)]
pub async fn create_test_app_with_frontend_url(
    frontend_url: &str,
) -> (axum::Router, Arc<AppState>) {
    let mut config = Config::test_default();
    config.frontend_url = frontend_url.to_string();
    build_app(config, Db::in_memory(), VendorService::unconfigured())
}

#[allow(dead_code)]
pub fn create_test_app_with_db(db: Db) -> (axum::Router, Arc<AppState>) {
    build_app(Config::test_default(), db, VendorService::unconfigured())
}

#[allow(dead_code)]
pub fn create_test_app_with_model(model: Arc<dyn VendorModel>) -> (axum::Router, Arc<AppState>) {
    build_app(
        Config::test_default(),
        Db::in_memory(),
        VendorService::new(model),
    )
}

/// App session token for `uid`.
#[allow(dead_code)]
pub fn create_test_jwt(uid: &str) -> String {
    create_jwt(uid, &Config::test_default().jwt_signing_key).unwrap()
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Firebase-style ID token claims, valid for `test-project`.
#[allow(dead_code)]
pub fn id_token_claims(uid: &str) -> Value {
    let now = now_secs();
    serde_json::json!({
        "iss": "https://securetoken.google.com/test-project",
        "aud": "test-project",
        "sub": uid,
        "iat": now,
        "auth_time": now,
        "exp": now + 3600,
        "email": format!("{uid}@example.com"),
        "name": format!("User {uid}"),
    })
}

/// Sign arbitrary claims with the test key.
#[allow(dead_code)]
pub fn sign_id_token(claims: &Value, kid: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(TEST_PRIVATE_KEY.as_bytes()).unwrap();
    jsonwebtoken::encode(&header, claims, &key).unwrap()
}

#[allow(dead_code)]
pub fn create_id_token(uid: &str) -> String {
    sign_id_token(&id_token_claims(uid), TEST_KID)
}

/// Create a profile for `uid` and return an app token for it.
#[allow(dead_code)]
pub async fn sign_up(state: &AppState, uid: &str) -> String {
    state
        .profiles
        .create_or_get_profile(&VerifiedIdentity {
            uid: uid.to_string(),
            email: Some(format!("{uid}@example.com")),
            display_name: Some(format!("User {uid}")),
            photo_url: None,
        })
        .await
        .unwrap();
    create_test_jwt(uid)
}

#[allow(dead_code)]
pub async fn profile(state: &AppState, uid: &str) -> UserProfile {
    state.profiles.get_profile(uid).await.unwrap().unwrap()
}

/// Send a JSON request with an optional bearer token; returns status and body.
#[allow(dead_code)]
pub async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}
