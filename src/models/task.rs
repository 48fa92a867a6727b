// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Checklist task model and its derived presentation state.
//!
//! `overdue` is never written by this service: the stored status is
//! `pending` or `completed`, and overdue is computed from the deadline at
//! read time. Documents written by older clients may still carry a literal
//! `overdue`; those are read as pending work and re-derived the same way.

use crate::config::TASK_TITLE_MIN_LEN;
use crate::time_utils::{days_until, rfc3339_secs, same_day};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use validator::{Validate, ValidationError};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Task status as stored and as presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum TaskStatus {
    #[default]
    Pending,
    Completed,
    Overdue,
}

/// Checklist task stored in Firestore (`tasks/{id}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Task {
    /// Generated task ID (also used as document ID)
    pub id: String,
    /// Owning session; immutable after creation
    pub wedding_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Member uids responsible for the task
    pub assigned_to: Vec<String>,
    #[serde(with = "rfc3339_secs")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub deadline: DateTime<Utc>,
    /// Stored status (`pending` or `completed`; `overdue` only in legacy data)
    #[serde(default)]
    pub status: TaskStatus,
    pub created_by: String,
    #[serde(with = "rfc3339_secs")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
    #[serde(with = "rfc3339_secs")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub last_updated_at: DateTime<Utc>,
}

impl Task {
    /// Status every consumer presents at instant `now`.
    ///
    /// Completed stays completed; any other task whose deadline has passed
    /// is overdue; everything else is pending. A legacy stored `overdue`
    /// whose deadline has since moved into the future is pending.
    pub fn display_status(&self, now: DateTime<Utc>) -> TaskStatus {
        match self.status {
            TaskStatus::Completed => TaskStatus::Completed,
            TaskStatus::Pending | TaskStatus::Overdue if self.deadline < now => {
                TaskStatus::Overdue
            }
            TaskStatus::Pending | TaskStatus::Overdue => TaskStatus::Pending,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    pub fn is_assigned_to(&self, uid: &str) -> bool {
        self.assigned_to.iter().any(|id| id == uid)
    }

    /// Sort key for the canonical task feed.
    pub fn feed_order(a: &Task, b: &Task) -> std::cmp::Ordering {
        a.deadline
            .cmp(&b.deadline)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    }
}

/// Sort tasks into feed order (ascending deadline).
pub fn sort_for_feed(tasks: &mut [Task]) {
    tasks.sort_by(Task::feed_order);
}

/// Presentation-level task list filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskFilter {
    #[default]
    All,
    MyTasks,
    Completed,
    Pending,
    Overdue,
}

impl TaskFilter {
    pub fn matches(self, task: &Task, viewer: &str, now: DateTime<Utc>) -> bool {
        match self {
            TaskFilter::All => true,
            TaskFilter::MyTasks => task.is_assigned_to(viewer),
            TaskFilter::Completed => task.is_completed(),
            TaskFilter::Pending => task.display_status(now) == TaskStatus::Pending,
            TaskFilter::Overdue => task.display_status(now) == TaskStatus::Overdue,
        }
    }

    /// Keep feed order while dropping non-matching tasks.
    pub fn apply<'a>(
        self,
        tasks: &'a [Task],
        viewer: &str,
        now: DateTime<Utc>,
    ) -> Vec<&'a Task> {
        tasks
            .iter()
            .filter(|task| self.matches(task, viewer, now))
            .collect()
    }
}

fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().chars().count() < TASK_TITLE_MIN_LEN {
        let mut err = ValidationError::new("title_too_short");
        err.message = Some("Title must be at least 3 characters.".into());
        return Err(err);
    }
    Ok(())
}

fn validate_writable_status(status: &TaskStatus) -> Result<(), ValidationError> {
    if *status == TaskStatus::Overdue {
        let mut err = ValidationError::new("derived_status");
        err.message = Some("Overdue is derived from the deadline and cannot be set.".into());
        return Err(err);
    }
    Ok(())
}

/// Fields supplied when creating a task.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    #[validate(custom(function = "validate_title"))]
    pub title: String,
    #[validate(length(max = 2000, message = "Description is too long."))]
    #[serde(default)]
    pub description: Option<String>,
    pub deadline: DateTime<Utc>,
    #[validate(length(min = 1, message = "Assign task to at least one person."))]
    pub assigned_to: Vec<String>,
    #[validate(custom(function = "validate_writable_status"))]
    #[serde(default)]
    pub status: TaskStatus,
}

impl NewTask {
    /// Trim text, drop blank descriptions, collapse duplicate assignees.
    pub fn normalized(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self.description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        self.assigned_to = dedup_preserving_order(self.assigned_to);
        self
    }
}

/// Partial task update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    #[validate(custom(function = "validate_title"))]
    pub title: Option<String>,
    /// `Some(None)` clears the description.
    #[validate(length(max = 2000, message = "Description is too long."))]
    #[serde(default, with = "double_option")]
    pub description: Option<Option<String>>,
    pub deadline: Option<DateTime<Utc>>,
    #[validate(length(min = 1, message = "Assign task to at least one person."))]
    pub assigned_to: Option<Vec<String>>,
    #[validate(custom(function = "validate_writable_status"))]
    pub status: Option<TaskStatus>,
}

impl TaskUpdate {
    pub fn normalized(mut self) -> Self {
        self.title = self.title.map(|t| t.trim().to_string());
        self.description = self.description.map(|d| {
            d.map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
        });
        self.assigned_to = self.assigned_to.map(dedup_preserving_order);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.deadline.is_none()
            && self.assigned_to.is_none()
            && self.status.is_none()
    }

    /// Stored field names this update writes, `lastUpdatedAt` included.
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut fields = vec!["lastUpdatedAt"];
        if self.title.is_some() {
            fields.push("title");
        }
        if self.description.is_some() {
            fields.push("description");
        }
        if self.deadline.is_some() {
            fields.push("deadline");
        }
        if self.assigned_to.is_some() {
            fields.push("assignedTo");
        }
        if self.status.is_some() {
            fields.push("status");
        }
        fields
    }

    /// Merge supplied fields into `task` (timestamps handled by the caller).
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(deadline) = self.deadline {
            task.deadline = crate::time_utils::truncate_to_secs(deadline);
        }
        if let Some(assigned_to) = &self.assigned_to {
            task.assigned_to = assigned_to.clone();
        }
        if let Some(status) = self.status {
            task.status = status;
        }
    }
}

/// Distinguish an absent field from an explicit `null`.
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(d: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(d).map(Some)
    }
}

fn dedup_preserving_order(ids: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}

/// Task as presented to a viewer at a given instant.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TaskView {
    #[serde(flatten)]
    #[cfg_attr(feature = "binding-generation", ts(flatten))]
    pub task: Task,
    pub display_status: TaskStatus,
    /// Calendar days until the deadline (negative once passed)
    pub days_left: i64,
}

impl TaskView {
    pub fn new(task: Task, now: DateTime<Utc>) -> Self {
        let display_status = task.display_status(now);
        let days_left = days_until(task.deadline, now);
        Self {
            task,
            display_status,
            days_left,
        }
    }
}

/// Dashboard counters over a session's tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TaskSummary {
    pub total: u32,
    pub completed: u32,
    /// Overdue tasks, not counting those due later today
    pub overdue: u32,
}

impl TaskSummary {
    pub fn from_tasks(tasks: &[Task], now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        let mut summary = TaskSummary::default();
        for task in tasks {
            summary.total += 1;
            if task.is_completed() {
                summary.completed += 1;
            } else if task.display_status(now) == TaskStatus::Overdue
                && !same_day(task.deadline, today)
            {
                summary.overdue += 1;
            }
        }
        summary
    }
}

/// Incomplete tasks due on the current calendar day.
pub fn due_today(tasks: &[Task], now: DateTime<Utc>) -> Vec<&Task> {
    let today = now.date_naive();
    tasks
        .iter()
        .filter(|task| !task.is_completed() && same_day(task.deadline, today))
        .collect()
}

/// Tasks whose deadline falls on `day` (calendar view).
pub fn due_on(tasks: &[Task], day: NaiveDate) -> Vec<&Task> {
    tasks
        .iter()
        .filter(|task| same_day(task.deadline, day))
        .collect()
}

/// Distinct calendar days carrying at least one deadline, ascending.
pub fn deadline_days(tasks: &[Task]) -> Vec<NaiveDate> {
    tasks
        .iter()
        .map(|task| task.deadline.date_naive())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
