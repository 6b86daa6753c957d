//! Fixtures for service tests running against the in-memory database.

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

use crate::db;

/// A migrated on-disk database, configured like the server's.
/// Keep the `TempDir` alive for as long as the pool is used.
pub async fn file_pool() -> (TempDir, SqlitePool) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("task_heroes.db").display());

    let pool = db::connect(&url).await.unwrap();
    db::migrate(&pool).await.unwrap();

    (dir, pool)
}

pub async fn insert_user(pool: &SqlitePool, username: &str, admin: bool, points: i64) -> Uuid {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO users (id, username, password_hash, is_admin, points, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(username)
    .bind(None::<String>)
    .bind(admin)
    .bind(points)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .unwrap();

    id
}

pub struct TaskFixture {
    pub daily: bool,
    pub completed: bool,
    pub last_completed_date: Option<NaiveDate>,
    pub reward_points: i64,
    pub assigned_user_id: Option<Uuid>,
}

impl Default for TaskFixture {
    fn default() -> Self {
        Self {
            daily: false,
            completed: false,
            last_completed_date: None,
            reward_points: 10,
            assigned_user_id: None,
        }
    }
}

pub async fn insert_task(pool: &SqlitePool, fixture: TaskFixture) -> Uuid {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO tasks (id, title, description, completed, daily, last_completed_date, reward_points, assigned_user_id, created_at, updated_at)
        VALUES (?, ?, '', ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(format!("Task {}", &id.to_string()[..8]))
    .bind(fixture.completed)
    .bind(fixture.daily)
    .bind(fixture.last_completed_date)
    .bind(fixture.reward_points)
    .bind(fixture.assigned_user_id.map(|u| u.to_string()))
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .unwrap();

    id
}

pub async fn insert_reward(pool: &SqlitePool, price: i64, redeemed: bool, assigned_user_id: Option<Uuid>) -> Uuid {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO rewards (id, title, description, price, redeemed, assigned_user_id, created_at, updated_at)
        VALUES (?, 'Reward', '', ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(price)
    .bind(redeemed)
    .bind(assigned_user_id.map(|u| u.to_string()))
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .unwrap();

    id
}

pub async fn user_points(pool: &SqlitePool, user_id: &Uuid) -> i64 {
    sqlx::query_scalar("SELECT points FROM users WHERE id = ?")
        .bind(user_id.to_string())
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn task_state(pool: &SqlitePool, task_id: &Uuid) -> (bool, Option<NaiveDate>) {
    sqlx::query_as("SELECT completed, last_completed_date FROM tasks WHERE id = ?")
        .bind(task_id.to_string())
        .fetch_one(pool)
        .await
        .unwrap()
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}
