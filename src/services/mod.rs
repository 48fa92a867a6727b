// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod identity;
pub mod ids;
pub mod live;
pub mod profile;
pub mod session;
pub mod task;
pub mod vendor;

pub use identity::{FirebaseTokenVerifier, IdentityError};
pub use live::{ActiveWedding, LiveService, Snapshot, Subscription};
pub use profile::ProfileService;
pub use session::SessionService;
pub use task::{CalendarDay, Dashboard, TaskService};
pub use vendor::{GeminiModel, VendorModel, VendorService};
