use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

use crate::db;
use crate::models::{TaskRow, UserRow};
use crate::services::daily_reset::ClientDate;
use crate::services::points::{self as points_service, PointsError};
use shared::{CompleteTaskResponse, CreateTaskRequest, ErrorKind, Task, TaskStatusFilter, UpdateTaskRequest};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Task not found")]
    NotFound,
    #[error("Task title is required")]
    TitleRequired,
    #[error("Reward points cannot be negative")]
    NegativeRewardPoints,
    #[error("Assigned user not found")]
    AssignedUserNotFound,
    #[error("Points error: {0}")]
    PointsError(#[from] PointsError),
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl TaskError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TaskError::NotFound | TaskError::AssignedUserNotFound => ErrorKind::NotFound,
            TaskError::TitleRequired | TaskError::NegativeRewardPoints => ErrorKind::InvalidInput,
            TaskError::PointsError(e) => e.kind(),
            TaskError::DatabaseError(_) => ErrorKind::Internal,
        }
    }
}

pub async fn create_task(pool: &SqlitePool, request: &CreateTaskRequest) -> Result<Task, TaskError> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err(TaskError::TitleRequired);
    }

    let reward_points = request.reward_points.unwrap_or(0);
    if reward_points < 0 {
        return Err(TaskError::NegativeRewardPoints);
    }

    if let Some(user_id) = request.assigned_user_id {
        ensure_user_exists(pool, &user_id).await?;
    }

    let id = Uuid::new_v4();
    let now = Utc::now();
    let daily = request.daily.unwrap_or(false);
    let description = request.description.clone().unwrap_or_default();

    sqlx::query(
        r#"
        INSERT INTO tasks (id, title, description, completed, daily, last_completed_date, reward_points, assigned_user_id, created_at, updated_at)
        VALUES (?, ?, ?, 0, ?, NULL, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(title)
    .bind(&description)
    .bind(daily)
    .bind(reward_points)
    .bind(request.assigned_user_id.map(|u| u.to_string()))
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(Task {
        id,
        title: title.to_string(),
        description,
        completed: false,
        daily,
        last_completed_date: None,
        reward_points,
        assigned_user_id: request.assigned_user_id,
        created_at: now,
        updated_at: now,
    })
}

pub async fn get_task(pool: &SqlitePool, task_id: &Uuid) -> Result<Option<Task>, TaskError> {
    let task: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
        .bind(task_id.to_string())
        .fetch_optional(pool)
        .await?;

    Ok(task.map(|t| t.to_shared()))
}

/// List tasks, optionally restricted to those assigned to `user_id`
pub async fn list_tasks(
    pool: &SqlitePool,
    user_id: Option<&Uuid>,
    filter: TaskStatusFilter,
) -> Result<Vec<Task>, TaskError> {
    let status_clause = match filter {
        TaskStatusFilter::All => "",
        TaskStatusFilter::Incomplete => " AND completed = 0",
        TaskStatusFilter::Completed => " AND completed = 1",
    };

    let tasks: Vec<TaskRow> = match user_id {
        Some(user_id) => {
            let sql = format!(
                "SELECT * FROM tasks WHERE assigned_user_id = ?{} ORDER BY created_at DESC",
                status_clause
            );
            sqlx::query_as(&sql)
                .bind(user_id.to_string())
                .fetch_all(pool)
                .await?
        }
        None => {
            let sql = format!("SELECT * FROM tasks WHERE 1 = 1{} ORDER BY created_at DESC", status_clause);
            sqlx::query_as(&sql).fetch_all(pool).await?
        }
    };

    Ok(tasks.into_iter().map(|t| t.to_shared()).collect())
}

/// Edit task details. Completion state is owned by `complete_task` and the daily reset.
pub async fn update_task(
    pool: &SqlitePool,
    task_id: &Uuid,
    request: &UpdateTaskRequest,
) -> Result<Task, TaskError> {
    let mut task: TaskRow = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
        .bind(task_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or(TaskError::NotFound)?;

    if let Some(ref title) = request.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(TaskError::TitleRequired);
        }
        task.title = title.to_string();
    }
    if let Some(ref description) = request.description {
        task.description = description.clone();
    }
    if let Some(daily) = request.daily {
        task.daily = daily;
    }
    if let Some(reward_points) = request.reward_points {
        if reward_points < 0 {
            return Err(TaskError::NegativeRewardPoints);
        }
        task.reward_points = reward_points;
    }
    if let Some(assigned_user_id) = request.assigned_user_id {
        ensure_user_exists(pool, &assigned_user_id).await?;
        task.assigned_user_id = Some(assigned_user_id.to_string());
    }

    let now = Utc::now();
    task.updated_at = now;

    sqlx::query(
        r#"
        UPDATE tasks SET title = ?, description = ?, daily = ?, reward_points = ?, assigned_user_id = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.daily)
    .bind(task.reward_points)
    .bind(&task.assigned_user_id)
    .bind(now)
    .bind(task_id.to_string())
    .execute(pool)
    .await?;

    Ok(task.to_shared())
}

pub async fn delete_task(pool: &SqlitePool, task_id: &Uuid) -> Result<(), TaskError> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(task_id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(TaskError::NotFound);
    }

    Ok(())
}

/// Pick the completion date: a well-formed client date wins, anything else
/// falls back to the server's today.
pub fn resolve_completion_date(client_date: Option<&str>, today: NaiveDate) -> NaiveDate {
    client_date
        .filter(|raw| !raw.is_empty())
        .and_then(|raw| ClientDate::parse(raw).ok())
        .map(|d| d.date())
        .unwrap_or(today)
}

/// Complete a task and credit the assigned user.
///
/// A daily task already completed on the resolved date is left untouched.
/// Points are only credited when the task moves from incomplete to
/// completed, so confirming an already completed task again earns nothing.
pub async fn complete_task(
    pool: &SqlitePool,
    task_id: &Uuid,
    client_date: Option<&str>,
    today: NaiveDate,
) -> Result<CompleteTaskResponse, TaskError> {
    let completion_date = resolve_completion_date(client_date, today);

    let mut tx = db::begin_write(pool).await?;

    let task = fetch_task(&mut tx, task_id).await?;

    if task.is_completed_on(completion_date) {
        let points = assignee_balance(&mut tx, &task).await?;
        tx.commit().await?;
        return Ok(CompleteTaskResponse { task: task.to_shared(), points });
    }

    let was_completed = task.completed;

    sqlx::query("UPDATE tasks SET completed = 1, last_completed_date = ?, updated_at = ? WHERE id = ?")
        .bind(completion_date)
        .bind(Utc::now())
        .bind(task_id.to_string())
        .execute(&mut *tx)
        .await?;

    let task = fetch_task(&mut tx, task_id).await?;

    if !was_completed {
        if let (Some(user_id), Some(user)) = (task.assignee(), fetch_assignee(&mut tx, &task).await?) {
            if user.is_admin {
                log::debug!("Task {} is assigned to the administrator, no points credited", task.id);
            } else {
                let new_balance = points_service::credit(&mut tx, &user_id, task.reward_points).await?;
                log::info!(
                    "Task '{}' completed on {}: {} earned {} points (balance {})",
                    task.title,
                    completion_date,
                    user.username,
                    task.reward_points,
                    new_balance
                );
            }
        }
    }

    let points = assignee_balance(&mut tx, &task).await?;

    tx.commit().await?;

    Ok(CompleteTaskResponse { task: task.to_shared(), points })
}

async fn fetch_task(conn: &mut SqliteConnection, task_id: &Uuid) -> Result<TaskRow, TaskError> {
    sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
        .bind(task_id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(TaskError::NotFound)
}

/// Resolve the weak assignment reference; a dangling id yields `None`
async fn fetch_assignee(conn: &mut SqliteConnection, task: &TaskRow) -> Result<Option<UserRow>, TaskError> {
    let Some(user_id) = task.assignee() else {
        return Ok(None);
    };

    let user: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(user_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    Ok(user)
}

async fn assignee_balance(conn: &mut SqliteConnection, task: &TaskRow) -> Result<i64, TaskError> {
    Ok(fetch_assignee(conn, task).await?.map(|u| u.points).unwrap_or(0))
}

async fn ensure_user_exists(pool: &SqlitePool, user_id: &Uuid) -> Result<(), TaskError> {
    let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE id = ?")
        .bind(user_id.to_string())
        .fetch_one(pool)
        .await?;

    if exists == 0 {
        return Err(TaskError::AssignedUserNotFound);
    }

    Ok(())
}
