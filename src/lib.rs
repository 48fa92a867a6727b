// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Wedding Planner: shared planning sessions for couples.
//!
//! This crate provides the backend API: profiles, wedding sessions joined by
//! share code, the task checklist, live updates and vendor suggestions.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Db;
use services::{
    FirebaseTokenVerifier, LiveService, ProfileService, SessionService, TaskService,
    VendorService,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Db,
    pub profiles: ProfileService,
    pub sessions: SessionService,
    pub tasks: TaskService,
    pub vendors: VendorService,
    pub live: LiveService,
    pub identity: Arc<FirebaseTokenVerifier>,
}

impl AppState {
    /// Wire the managers on top of one store handle.
    pub fn new(
        config: Config,
        db: Db,
        vendors: VendorService,
        identity: Arc<FirebaseTokenVerifier>,
    ) -> Self {
        let sessions = SessionService::new(db.clone());
        Self {
            profiles: ProfileService::new(db.clone()),
            tasks: TaskService::new(db.clone(), sessions.clone()),
            live: LiveService::new(db.clone()),
            sessions,
            vendors,
            identity,
            config,
            db,
        }
    }
}
