// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod task;
pub mod user;
pub mod vendor;
pub mod wedding;

pub use task::{NewTask, Task, TaskFilter, TaskStatus, TaskSummary, TaskUpdate, TaskView};
pub use user::{ProfileUpdate, UserProfile, VerifiedIdentity};
pub use vendor::{Vendor, VendorQuery, VendorSuggestions};
pub use wedding::{CreateWeddingRequest, JoinWeddingRequest, SessionUpdate, WeddingSession};
