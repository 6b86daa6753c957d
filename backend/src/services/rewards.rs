use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

use crate::db;
use crate::models::{RewardRow, UserRow};
use crate::services::points::{self as points_service, PointsError};
use shared::{CreateRewardRequest, ErrorKind, RedeemRewardResponse, Reward, RewardStatusFilter, UpdateRewardRequest};

#[derive(Debug, Error)]
pub enum RewardError {
    #[error("Reward not found")]
    NotFound,
    #[error("Reward title is required")]
    TitleRequired,
    #[error("Reward price cannot be negative")]
    NegativePrice,
    #[error("Assigned user not found")]
    AssignedUserNotFound,
    #[error("Points error: {0}")]
    PointsError(#[from] PointsError),
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl RewardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RewardError::NotFound | RewardError::AssignedUserNotFound => ErrorKind::NotFound,
            RewardError::TitleRequired | RewardError::NegativePrice => ErrorKind::InvalidInput,
            RewardError::PointsError(e) => e.kind(),
            RewardError::DatabaseError(_) => ErrorKind::Internal,
        }
    }
}

pub async fn create_reward(pool: &SqlitePool, request: &CreateRewardRequest) -> Result<Reward, RewardError> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err(RewardError::TitleRequired);
    }
    if request.price < 0 {
        return Err(RewardError::NegativePrice);
    }
    if let Some(user_id) = request.assigned_user_id {
        ensure_user_exists(pool, &user_id).await?;
    }

    let id = Uuid::new_v4();
    let now = Utc::now();
    let description = request.description.clone().unwrap_or_default();

    sqlx::query(
        r#"
        INSERT INTO rewards (id, title, description, price, redeemed, assigned_user_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, 0, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(title)
    .bind(&description)
    .bind(request.price)
    .bind(request.assigned_user_id.map(|u| u.to_string()))
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(Reward {
        id,
        title: title.to_string(),
        description,
        price: request.price,
        redeemed: false,
        assigned_user_id: request.assigned_user_id,
        created_at: now,
        updated_at: now,
    })
}

pub async fn get_reward(pool: &SqlitePool, reward_id: &Uuid) -> Result<Option<Reward>, RewardError> {
    let reward: Option<RewardRow> = sqlx::query_as("SELECT * FROM rewards WHERE id = ?")
        .bind(reward_id.to_string())
        .fetch_optional(pool)
        .await?;

    Ok(reward.map(|r| r.to_shared()))
}

pub async fn list_rewards(
    pool: &SqlitePool,
    user_id: Option<&Uuid>,
    filter: RewardStatusFilter,
) -> Result<Vec<Reward>, RewardError> {
    let status_clause = match filter {
        RewardStatusFilter::All => "",
        RewardStatusFilter::Available => " AND redeemed = 0",
        RewardStatusFilter::Redeemed => " AND redeemed = 1",
    };

    let rewards: Vec<RewardRow> = match user_id {
        Some(user_id) => {
            let sql = format!(
                "SELECT * FROM rewards WHERE assigned_user_id = ?{} ORDER BY created_at DESC",
                status_clause
            );
            sqlx::query_as(&sql)
                .bind(user_id.to_string())
                .fetch_all(pool)
                .await?
        }
        None => {
            let sql = format!("SELECT * FROM rewards WHERE 1 = 1{} ORDER BY created_at DESC", status_clause);
            sqlx::query_as(&sql).fetch_all(pool).await?
        }
    };

    Ok(rewards.into_iter().map(|r| r.to_shared()).collect())
}

pub async fn update_reward(
    pool: &SqlitePool,
    reward_id: &Uuid,
    request: &UpdateRewardRequest,
) -> Result<Reward, RewardError> {
    let mut reward: RewardRow = sqlx::query_as("SELECT * FROM rewards WHERE id = ?")
        .bind(reward_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or(RewardError::NotFound)?;

    if let Some(ref title) = request.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(RewardError::TitleRequired);
        }
        reward.title = title.to_string();
    }
    if let Some(ref description) = request.description {
        reward.description = description.clone();
    }
    if let Some(price) = request.price {
        if price < 0 {
            return Err(RewardError::NegativePrice);
        }
        reward.price = price;
    }
    if let Some(assigned_user_id) = request.assigned_user_id {
        ensure_user_exists(pool, &assigned_user_id).await?;
        reward.assigned_user_id = Some(assigned_user_id.to_string());
    }

    let now = Utc::now();
    reward.updated_at = now;

    sqlx::query(
        "UPDATE rewards SET title = ?, description = ?, price = ?, assigned_user_id = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&reward.title)
    .bind(&reward.description)
    .bind(reward.price)
    .bind(&reward.assigned_user_id)
    .bind(now)
    .bind(reward_id.to_string())
    .execute(pool)
    .await?;

    Ok(reward.to_shared())
}

pub async fn delete_reward(pool: &SqlitePool, reward_id: &Uuid) -> Result<(), RewardError> {
    let result = sqlx::query("DELETE FROM rewards WHERE id = ?")
        .bind(reward_id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(RewardError::NotFound);
    }

    Ok(())
}

/// Redeem a reward on behalf of its assigned user.
///
/// Redeeming is one-shot: an already redeemed reward is returned unchanged
/// and nothing is charged. If the assigned user cannot afford the price the
/// reward is still marked redeemed and the balance is left alone.
pub async fn redeem_reward(pool: &SqlitePool, reward_id: &Uuid) -> Result<RedeemRewardResponse, RewardError> {
    let mut tx = db::begin_write(pool).await?;

    let reward = fetch_reward(&mut tx, reward_id).await?;
    let assignee = fetch_assignee(&mut tx, &reward).await?;

    if reward.redeemed {
        let points = assignee.map(|u| u.points).unwrap_or(0);
        tx.commit().await?;
        return Ok(RedeemRewardResponse { reward: reward.to_shared(), points });
    }

    let result = sqlx::query("UPDATE rewards SET redeemed = 1, updated_at = ? WHERE id = ? AND redeemed = 0")
        .bind(Utc::now())
        .bind(reward_id.to_string())
        .execute(&mut *tx)
        .await?;

    // Only the caller that flipped the flag pays
    if result.rows_affected() == 1 {
        if let (Some(user_id), Some(user)) = (reward.assignee(), assignee.as_ref()) {
            if user.is_admin {
                log::debug!("Reward {} is assigned to the administrator, nothing charged", reward.id);
            } else {
                match points_service::debit(&mut tx, &user_id, reward.price).await {
                    Ok(new_balance) => log::info!(
                        "Reward '{}' redeemed by {} for {} points (balance {})",
                        reward.title,
                        user.username,
                        reward.price,
                        new_balance
                    ),
                    Err(PointsError::InsufficientPoints) => log::warn!(
                        "Reward '{}' redeemed by {} without enough points ({} < {})",
                        reward.title,
                        user.username,
                        user.points,
                        reward.price
                    ),
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }

    let reward = fetch_reward(&mut tx, reward_id).await?;
    let points = fetch_assignee(&mut tx, &reward).await?.map(|u| u.points).unwrap_or(0);

    tx.commit().await?;

    Ok(RedeemRewardResponse { reward: reward.to_shared(), points })
}

async fn fetch_reward(conn: &mut SqliteConnection, reward_id: &Uuid) -> Result<RewardRow, RewardError> {
    sqlx::query_as("SELECT * FROM rewards WHERE id = ?")
        .bind(reward_id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(RewardError::NotFound)
}

async fn fetch_assignee(conn: &mut SqliteConnection, reward: &RewardRow) -> Result<Option<UserRow>, RewardError> {
    let Some(user_id) = reward.assignee() else {
        return Ok(None);
    };

    let user: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(user_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    Ok(user)
}

async fn ensure_user_exists(pool: &SqlitePool, user_id: &Uuid) -> Result<(), RewardError> {
    let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE id = ?")
        .bind(user_id.to_string())
        .fetch_one(pool)
        .await?;

    if exists == 0 {
        return Err(RewardError::AssignedUserNotFound);
    }

    Ok(())
}
