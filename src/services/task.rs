// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Task manager: checklist tasks scoped to one wedding session.

use crate::db::{Db, Write};
use crate::error::AppError;
use crate::models::task::{deadline_days, due_on, due_today};
use crate::models::{NewTask, Task, TaskStatus, TaskSummary, TaskUpdate, TaskView, WeddingSession};
use crate::services::{ids, SessionService};
use crate::time_utils::{days_until, truncate_to_secs};
use chrono::{DateTime, NaiveDate, Utc};
use ring::rand::SystemRandom;
use serde::Serialize;
use validator::Validate;

/// Dashboard data for one session at one instant.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub wedding_id: String,
    pub days_until_wedding: i64,
    #[serde(flatten)]
    pub summary: TaskSummary,
    pub today_tasks: Vec<TaskView>,
    /// Present while the session still has a free seat.
    pub share_code: Option<String>,
}

/// Calendar data: days with deadlines plus the tasks of one day.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub deadline_days: Vec<NaiveDate>,
    pub tasks: Vec<TaskView>,
}

/// Creates, edits and lists tasks on behalf of session members.
#[derive(Clone)]
pub struct TaskService {
    db: Db,
    sessions: SessionService,
    rng: SystemRandom,
}

/// Every assignee must currently belong to the session.
fn check_assignees(session: &WeddingSession, assigned_to: &[String]) -> Result<(), AppError> {
    match assigned_to.iter().find(|uid| !session.is_member(uid)) {
        Some(uid) => Err(AppError::Validation(format!(
            "assignedTo: {uid} is not a member of this wedding"
        ))),
        None => Ok(()),
    }
}

impl TaskService {
    pub fn new(db: Db, sessions: SessionService) -> Self {
        Self {
            db,
            sessions,
            rng: SystemRandom::new(),
        }
    }

    /// Load a task and the session it belongs to, checking membership.
    async fn load_for_member(
        &self,
        task_id: &str,
        requester: &str,
    ) -> Result<(Task, WeddingSession), AppError> {
        let task = self
            .db
            .get_task(task_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Task not found".to_string()))?;
        let session = self
            .sessions
            .require_member(&task.wedding_id, requester)
            .await?;
        Ok((task, session))
    }

    pub async fn create_task(
        &self,
        wedding_id: &str,
        requester: &str,
        new_task: NewTask,
    ) -> Result<Task, AppError> {
        let new_task = new_task.normalized();
        new_task.validate()?;

        // Held through the commit so a concurrent session delete cannot
        // miss this task.
        let _guard = self.sessions.lock(wedding_id).await;
        let session = self.sessions.require_member(wedding_id, requester).await?;
        check_assignees(&session, &new_task.assigned_to)?;

        let now = truncate_to_secs(Utc::now());
        let task = Task {
            id: ids::new_document_id(&self.rng)?,
            wedding_id: session.id.clone(),
            title: new_task.title,
            description: new_task.description,
            assigned_to: new_task.assigned_to,
            deadline: truncate_to_secs(new_task.deadline),
            status: new_task.status,
            created_by: requester.to_string(),
            created_at: now,
            last_updated_at: now,
        };

        self.db
            .commit(vec![
                Write::RequireMembers {
                    wedding_id: session.id.clone(),
                    partner_ids: session.partner_ids.clone(),
                },
                Write::PutTask(task.clone()),
            ])
            .await?;

        tracing::info!(
            task_id = %task.id,
            wedding_id,
            assignees = task.assigned_to.len(),
            "Task created"
        );
        Ok(task)
    }

    /// Write only the supplied fields, so concurrent edits to different
    /// fields of one task both survive. A new assignee list is checked
    /// against the current members; existing assignments are not revisited.
    pub async fn update_task(
        &self,
        task_id: &str,
        requester: &str,
        update: TaskUpdate,
    ) -> Result<Task, AppError> {
        let update = update.normalized();
        if update.is_empty() {
            return Err(AppError::Validation("No fields to update.".to_string()));
        }
        update.validate()?;

        let (mut task, session) = self.load_for_member(task_id, requester).await?;
        let mut writes = Vec::with_capacity(2);
        if let Some(assigned_to) = &update.assigned_to {
            check_assignees(&session, assigned_to)?;
            writes.push(Write::RequireMembers {
                wedding_id: session.id.clone(),
                partner_ids: session.partner_ids.clone(),
            });
        }

        update.apply_to(&mut task);
        task.last_updated_at = truncate_to_secs(Utc::now());
        writes.push(Write::UpdateTaskFields {
            task: task.clone(),
            fields: update.field_names(),
        });
        self.db.commit(writes).await?;

        tracing::debug!(task_id, fields = ?update.field_names(), "Task updated");

        // Fields written by others since our read are in the stored copy
        Ok(self.db.get_task(task_id).await?.unwrap_or(task))
    }

    /// Checkbox toggle: writes `completed` or `pending`.
    pub async fn set_completed(
        &self,
        task_id: &str,
        requester: &str,
        completed: bool,
    ) -> Result<Task, AppError> {
        let status = if completed {
            TaskStatus::Completed
        } else {
            TaskStatus::Pending
        };
        self.update_task(
            task_id,
            requester,
            TaskUpdate {
                status: Some(status),
                ..TaskUpdate::default()
            },
        )
        .await
    }

    pub async fn delete_task(&self, task_id: &str, requester: &str) -> Result<(), AppError> {
        let (task, _) = self.load_for_member(task_id, requester).await?;
        self.db
            .commit(vec![Write::DeleteTask {
                id: task.id,
                wedding_id: task.wedding_id,
            }])
            .await?;

        tracing::info!(task_id, "Task deleted");
        Ok(())
    }

    /// Tasks of a session, ascending by deadline.
    pub async fn list_tasks(&self, wedding_id: &str, requester: &str) -> Result<Vec<Task>, AppError> {
        self.sessions.require_member(wedding_id, requester).await?;
        self.db.list_tasks(wedding_id).await
    }

    pub async fn dashboard(
        &self,
        wedding_id: &str,
        requester: &str,
        now: DateTime<Utc>,
    ) -> Result<Dashboard, AppError> {
        let session = self.sessions.require_member(wedding_id, requester).await?;
        let tasks = self.db.list_tasks(wedding_id).await?;

        Ok(Dashboard {
            wedding_id: session.id.clone(),
            days_until_wedding: days_until(session.wedding_date, now),
            summary: TaskSummary::from_tasks(&tasks, now),
            today_tasks: due_today(&tasks, now)
                .into_iter()
                .map(|task| TaskView::new(task.clone(), now))
                .collect(),
            share_code: (!session.is_full()).then(|| session.share_code.clone()),
        })
    }

    pub async fn calendar(
        &self,
        wedding_id: &str,
        requester: &str,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<CalendarDay, AppError> {
        self.sessions.require_member(wedding_id, requester).await?;
        let tasks = self.db.list_tasks(wedding_id).await?;

        Ok(CalendarDay {
            date,
            deadline_days: deadline_days(&tasks),
            tasks: due_on(&tasks, date)
                .into_iter()
                .map(|task| TaskView::new(task.clone(), now))
                .collect(),
        })
    }
}
