use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

use crate::db;
use crate::models::UserRow;
use shared::{ErrorKind, User};

#[derive(Debug, Error)]
pub enum PointsError {
    #[error("User not found")]
    UserNotFound,
    #[error("Administrators cannot hold points")]
    AdminCannotHoldPoints,
    #[error("Points must be a positive number")]
    NonPositiveAmount,
    #[error("User does not have enough points")]
    InsufficientPoints,
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl PointsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PointsError::UserNotFound => ErrorKind::NotFound,
            PointsError::AdminCannotHoldPoints | PointsError::InsufficientPoints => ErrorKind::InvalidOperation,
            PointsError::NonPositiveAmount => ErrorKind::InvalidInput,
            PointsError::DatabaseError(_) => ErrorKind::Internal,
        }
    }
}

/// Current balance of a user
pub async fn balance(conn: &mut SqliteConnection, user_id: &Uuid) -> Result<i64, PointsError> {
    sqlx::query_scalar::<_, i64>("SELECT points FROM users WHERE id = ?")
        .bind(user_id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(PointsError::UserNotFound)
}

/// Add `amount` points to a user and return the new balance.
/// Non-positive amounts leave the balance untouched.
pub async fn credit(conn: &mut SqliteConnection, user_id: &Uuid, amount: i64) -> Result<i64, PointsError> {
    if amount <= 0 {
        return balance(conn, user_id).await;
    }

    let result = sqlx::query("UPDATE users SET points = points + ?, updated_at = ? WHERE id = ?")
        .bind(amount)
        .bind(Utc::now())
        .bind(user_id.to_string())
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(PointsError::UserNotFound);
    }

    balance(conn, user_id).await
}

/// Remove `amount` points from a user and return the new balance.
/// Non-positive amounts leave the balance untouched; the balance never drops below zero.
pub async fn debit(conn: &mut SqliteConnection, user_id: &Uuid, amount: i64) -> Result<i64, PointsError> {
    if amount <= 0 {
        return balance(conn, user_id).await;
    }

    let result = sqlx::query(
        "UPDATE users SET points = points - ?, updated_at = ? WHERE id = ? AND points >= ?",
    )
    .bind(amount)
    .bind(Utc::now())
    .bind(user_id.to_string())
    .bind(amount)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        // Either the user is gone or the balance is too low
        balance(conn, user_id).await?;
        return Err(PointsError::InsufficientPoints);
    }

    balance(conn, user_id).await
}

/// Administrative credit: only standard users may receive points
pub async fn add_points(pool: &SqlitePool, user_id: &Uuid, amount: i64) -> Result<User, PointsError> {
    if amount <= 0 {
        return Err(PointsError::NonPositiveAmount);
    }

    let mut tx = db::begin_write(pool).await?;

    let user = fetch_point_holder(&mut tx, user_id).await?;
    credit(&mut tx, user_id, amount).await?;
    let updated = fetch_point_holder(&mut tx, user_id).await?;

    tx.commit().await?;

    log::info!("Added {} points to {} (was {})", amount, updated.username, user.points);

    Ok(updated.to_shared())
}

/// Administrative debit: validates sufficiency before touching the ledger
pub async fn subtract_points(pool: &SqlitePool, user_id: &Uuid, amount: i64) -> Result<User, PointsError> {
    if amount <= 0 {
        return Err(PointsError::NonPositiveAmount);
    }

    let mut tx = db::begin_write(pool).await?;

    let user = fetch_point_holder(&mut tx, user_id).await?;
    if user.points < amount {
        return Err(PointsError::InsufficientPoints);
    }

    debit(&mut tx, user_id, amount).await?;
    let updated = fetch_point_holder(&mut tx, user_id).await?;

    tx.commit().await?;

    log::info!("Subtracted {} points from {} (was {})", amount, updated.username, user.points);

    Ok(updated.to_shared())
}

/// Load a user that is allowed to participate in the ledger
async fn fetch_point_holder(conn: &mut SqliteConnection, user_id: &Uuid) -> Result<UserRow, PointsError> {
    let user: UserRow = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(user_id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(PointsError::UserNotFound)?;

    if user.is_admin {
        return Err(PointsError::AdminCannotHoldPoints);
    }

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::services::test_support::{insert_user, user_points};

    #[test]
    fn test_points_error_kinds() {
        assert_eq!(PointsError::UserNotFound.kind(), ErrorKind::NotFound);
        assert_eq!(PointsError::InsufficientPoints.kind(), ErrorKind::InvalidOperation);
        assert_eq!(PointsError::AdminCannotHoldPoints.kind(), ErrorKind::InvalidOperation);
        assert_eq!(PointsError::NonPositiveAmount.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_credit_adds_points() {
        let pool = test_pool().await;
        let user_id = insert_user(&pool, "ana", false, 5).await;

        let mut conn = pool.acquire().await.unwrap();
        let new_balance = credit(&mut conn, &user_id, 10).await.unwrap();

        assert_eq!(new_balance, 15);
    }

    #[tokio::test]
    async fn test_credit_ignores_non_positive_amounts() {
        let pool = test_pool().await;
        let user_id = insert_user(&pool, "ana", false, 5).await;

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(credit(&mut conn, &user_id, 0).await.unwrap(), 5);
        assert_eq!(credit(&mut conn, &user_id, -3).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_debit_insufficient_leaves_balance() {
        let pool = test_pool().await;
        let user_id = insert_user(&pool, "ana", false, 5).await;

        {
            let mut conn = pool.acquire().await.unwrap();
            let result = debit(&mut conn, &user_id, 6).await;
            assert!(matches!(result, Err(PointsError::InsufficientPoints)));
            assert_eq!(debit(&mut conn, &user_id, 5).await.unwrap(), 0);
        }

        assert_eq!(user_points(&pool, &user_id).await, 0);
    }

    #[tokio::test]
    async fn test_debit_unknown_user() {
        let pool = test_pool().await;

        let mut conn = pool.acquire().await.unwrap();
        let result = debit(&mut conn, &Uuid::new_v4(), 1).await;

        assert!(matches!(result, Err(PointsError::UserNotFound)));
    }

    #[tokio::test]
    async fn test_add_points_to_standard_user() {
        let pool = test_pool().await;
        let user_id = insert_user(&pool, "ana", false, 0).await;

        let user = add_points(&pool, &user_id, 25).await.unwrap();

        assert_eq!(user.points, 25);
        assert_eq!(user_points(&pool, &user_id).await, 25);
    }

    #[tokio::test]
    async fn test_add_points_rejects_admin() {
        let pool = test_pool().await;
        let admin_id = insert_user(&pool, "admin", true, 0).await;

        let result = add_points(&pool, &admin_id, 10).await;

        assert!(matches!(result, Err(PointsError::AdminCannotHoldPoints)));
        assert_eq!(user_points(&pool, &admin_id).await, 0);
    }

    #[tokio::test]
    async fn test_add_points_rejects_non_positive() {
        let pool = test_pool().await;
        let user_id = insert_user(&pool, "ana", false, 0).await;

        assert!(matches!(add_points(&pool, &user_id, 0).await, Err(PointsError::NonPositiveAmount)));
        assert!(matches!(subtract_points(&pool, &user_id, -1).await, Err(PointsError::NonPositiveAmount)));
    }

    #[tokio::test]
    async fn test_subtract_more_than_balance_fails() {
        let pool = test_pool().await;
        let user_id = insert_user(&pool, "ana", false, 10).await;

        let result = subtract_points(&pool, &user_id, 11).await;

        assert!(matches!(result, Err(PointsError::InsufficientPoints)));
        assert_eq!(user_points(&pool, &user_id).await, 10);
    }

    #[tokio::test]
    async fn test_subtract_points() {
        let pool = test_pool().await;
        let user_id = insert_user(&pool, "ana", false, 10).await;

        let user = subtract_points(&pool, &user_id, 4).await.unwrap();

        assert_eq!(user.points, 6);
    }

    #[tokio::test]
    async fn test_subtract_points_unknown_user() {
        let pool = test_pool().await;

        let result = subtract_points(&pool, &Uuid::new_v4(), 4).await;

        assert!(matches!(result, Err(PointsError::UserNotFound)));
    }
}
