use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use sqlx::SqlitePool;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::db;
use crate::models::TaskRow;
use shared::ErrorKind;

#[derive(Debug, Error)]
pub enum DailyResetError {
    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl DailyResetError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DailyResetError::InvalidDate(_) => ErrorKind::InvalidInput,
            DailyResetError::DatabaseError(_) => ErrorKind::Internal,
        }
    }
}

/// A calendar date reported by a client.
///
/// Client dates are untrusted: they only ever decide which of the caller's
/// own daily tasks roll over, never a timestamp of record. Parsing accepts
/// exactly `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientDate(NaiveDate);

impl ClientDate {
    pub fn parse(raw: &str) -> Result<Self, DailyResetError> {
        let bytes = raw.as_bytes();
        let well_formed = bytes.len() == 10
            && bytes[4] == b'-'
            && bytes[7] == b'-'
            && bytes
                .iter()
                .enumerate()
                .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());

        if !well_formed {
            return Err(DailyResetError::InvalidDate(raw.to_string()));
        }

        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(ClientDate)
            .map_err(|_| DailyResetError::InvalidDate(raw.to_string()))
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl FromStr for ClientDate {
    type Err = DailyResetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClientDate::parse(s)
    }
}

impl fmt::Display for ClientDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// The current calendar date on the server
pub fn server_today(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

/// Whether a completed daily task belongs to a day the client has left behind
fn has_rolled_over(task: &TaskRow, client_date: ClientDate) -> bool {
    match task.last_completed_date {
        Some(last) => last != client_date.date(),
        // Completed without a date should not happen; leave it alone
        None => false,
    }
}

/// Mark every completed daily task incomplete again.
///
/// `last_completed_date` is kept as the record of the last completion.
pub async fn reset_all_daily(pool: &SqlitePool) -> Result<u64, DailyResetError> {
    let result = sqlx::query(
        "UPDATE tasks SET completed = 0, updated_at = ? WHERE daily = 1 AND completed = 1",
    )
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Reset the user's completed daily tasks whose completion date differs from
/// the date the client reports.
pub async fn reconcile_for_user(
    pool: &SqlitePool,
    user_id: &Uuid,
    client_date: ClientDate,
) -> Result<u64, DailyResetError> {
    let mut tx = db::begin_write(pool).await?;

    let tasks: Vec<TaskRow> = sqlx::query_as(
        "SELECT * FROM tasks WHERE assigned_user_id = ? AND daily = 1 AND completed = 1",
    )
    .bind(user_id.to_string())
    .fetch_all(&mut *tx)
    .await?;

    let now = Utc::now();
    let mut reset_count = 0;

    for task in tasks.iter().filter(|t| has_rolled_over(t, client_date)) {
        log::debug!(
            "Resetting daily task {} (last completed {:?}, client date {})",
            task.id,
            task.last_completed_date,
            client_date
        );

        let result = sqlx::query("UPDATE tasks SET completed = 0, updated_at = ? WHERE id = ? AND completed = 1")
            .bind(now)
            .bind(&task.id)
            .execute(&mut *tx)
            .await?;

        reset_count += result.rows_affected();
    }

    tx.commit().await?;

    Ok(reset_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::services::test_support::{date, file_pool, insert_task, insert_user, task_state, TaskFixture};

    #[test]
    fn test_client_date_parse() {
        let parsed = ClientDate::parse("2024-03-15").unwrap();
        assert_eq!(parsed.date(), date(2024, 3, 15));
        assert_eq!(parsed.to_string(), "2024-03-15");
    }

    #[test]
    fn test_client_date_rejects_loose_formats() {
        for raw in ["", "2024-3-15", "2024/03/15", " 2024-03-15", "2024-03-15T00:00:00", "15-03-2024", "2024-02-30", "tomorrow"] {
            assert!(
                matches!(ClientDate::parse(raw), Err(DailyResetError::InvalidDate(_))),
                "accepted {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_daily_reset_error_kind() {
        assert_eq!(DailyResetError::InvalidDate("x".to_string()).kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_reset_all_daily_on_empty_store() {
        let pool = test_pool().await;

        assert_eq!(reset_all_daily(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reset_all_daily_only_touches_completed_daily_tasks() {
        let pool = test_pool().await;
        let jan1 = date(2024, 1, 1);

        let daily_done = insert_task(&pool, TaskFixture { daily: true, completed: true, last_completed_date: Some(jan1), ..Default::default() }).await;
        let daily_open = insert_task(&pool, TaskFixture { daily: true, ..Default::default() }).await;
        let chore_done = insert_task(&pool, TaskFixture { completed: true, last_completed_date: Some(jan1), ..Default::default() }).await;

        assert_eq!(reset_all_daily(&pool).await.unwrap(), 1);

        assert_eq!(task_state(&pool, &daily_done).await, (false, Some(jan1)));
        assert_eq!(task_state(&pool, &daily_open).await, (false, None));
        assert_eq!(task_state(&pool, &chore_done).await, (true, Some(jan1)));

        // Running again finds nothing left to reset
        assert_eq!(reset_all_daily(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reconcile_same_day_resets_nothing() {
        let pool = test_pool().await;
        let user_id = insert_user(&pool, "ana", false, 0).await;
        let jan1 = date(2024, 1, 1);

        for _ in 0..2 {
            insert_task(&pool, TaskFixture { daily: true, completed: true, last_completed_date: Some(jan1), assigned_user_id: Some(user_id), ..Default::default() }).await;
        }

        let count = reconcile_for_user(&pool, &user_id, ClientDate(jan1)).await.unwrap();

        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_reconcile_new_day_resets_all() {
        let pool = test_pool().await;
        let user_id = insert_user(&pool, "ana", false, 0).await;
        let jan1 = date(2024, 1, 1);

        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(insert_task(&pool, TaskFixture { daily: true, completed: true, last_completed_date: Some(jan1), assigned_user_id: Some(user_id), ..Default::default() }).await);
        }

        let count = reconcile_for_user(&pool, &user_id, ClientDate::parse("2024-01-02").unwrap()).await.unwrap();

        assert_eq!(count, 3);
        for id in ids {
            assert_eq!(task_state(&pool, &id).await, (false, Some(jan1)));
        }
    }

    #[tokio::test]
    async fn test_reconcile_is_scoped_to_user() {
        let pool = test_pool().await;
        let ana = insert_user(&pool, "ana", false, 0).await;
        let leo = insert_user(&pool, "leo", false, 0).await;
        let jan1 = date(2024, 1, 1);

        let anas = insert_task(&pool, TaskFixture { daily: true, completed: true, last_completed_date: Some(jan1), assigned_user_id: Some(ana), ..Default::default() }).await;
        let leos = insert_task(&pool, TaskFixture { daily: true, completed: true, last_completed_date: Some(jan1), assigned_user_id: Some(leo), ..Default::default() }).await;
        let anas_chore = insert_task(&pool, TaskFixture { completed: true, last_completed_date: Some(jan1), assigned_user_id: Some(ana), ..Default::default() }).await;

        let count = reconcile_for_user(&pool, &ana, ClientDate(date(2024, 1, 2))).await.unwrap();

        assert_eq!(count, 1);
        assert!(!task_state(&pool, &anas).await.0);
        assert!(task_state(&pool, &leos).await.0);
        assert!(task_state(&pool, &anas_chore).await.0);
    }

    #[tokio::test]
    async fn test_reconcile_skips_tasks_without_completion_date() {
        let pool = test_pool().await;
        let user_id = insert_user(&pool, "ana", false, 0).await;

        let undated = insert_task(&pool, TaskFixture { daily: true, completed: true, assigned_user_id: Some(user_id), ..Default::default() }).await;

        let count = reconcile_for_user(&pool, &user_id, ClientDate(date(2024, 1, 2))).await.unwrap();

        assert_eq!(count, 0);
        assert_eq!(task_state(&pool, &undated).await, (true, None));
    }

    #[tokio::test]
    async fn test_reconcile_with_earlier_client_date_still_resets() {
        // A client behind the completion date has also "left" that day
        let pool = test_pool().await;
        let user_id = insert_user(&pool, "ana", false, 0).await;

        let task = insert_task(&pool, TaskFixture { daily: true, completed: true, last_completed_date: Some(date(2024, 1, 2)), assigned_user_id: Some(user_id), ..Default::default() }).await;

        let count = reconcile_for_user(&pool, &user_id, ClientDate(date(2024, 1, 1))).await.unwrap();

        assert_eq!(count, 1);
        assert!(!task_state(&pool, &task).await.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_reconcile_racing_global_sweep() {
        let (_dir, pool) = file_pool().await;
        let user_id = insert_user(&pool, "ana", false, 0).await;
        let jan1 = date(2024, 1, 1);

        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(insert_task(&pool, TaskFixture { daily: true, completed: true, last_completed_date: Some(jan1), assigned_user_id: Some(user_id), ..Default::default() }).await);
        }

        let sweep = {
            let pool = pool.clone();
            tokio::spawn(async move { reset_all_daily(&pool).await })
        };
        let reconciles: Vec<_> = (0..4)
            .map(|_| {
                let pool = pool.clone();
                tokio::spawn(async move { reconcile_for_user(&pool, &user_id, ClientDate(date(2024, 1, 2))).await })
            })
            .collect();

        let mut total = sweep.await.unwrap().unwrap();
        for handle in reconciles {
            total += handle.await.unwrap().unwrap();
        }

        // Each task is reset by exactly one of the racing calls
        assert_eq!(total, 5);
        for id in ids {
            assert!(!task_state(&pool, &id).await.0);
        }
    }
}
