use chrono::Utc;
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::db;
use crate::models::UserRow;
use crate::services::auth::{hash_password, AuthError};
use shared::{ErrorKind, UpdateUserRequest, User};

#[derive(Debug, Error)]
pub enum UserError {
    #[error("User not found")]
    NotFound,
    #[error("Username is required")]
    UsernameRequired,
    #[error("Username is already taken")]
    UsernameTaken,
    #[error("An administrator already exists")]
    AdminAlreadyExists,
    #[error("The administrator account requires a password")]
    PasswordRequired,
    #[error("Only the administrator may set a password")]
    PasswordNotAllowed,
    #[error("User still holds points and cannot become administrator")]
    HasPoints,
    #[error("Password hashing error")]
    HashingError,
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl UserError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UserError::NotFound => ErrorKind::NotFound,
            UserError::UsernameRequired | UserError::PasswordRequired | UserError::PasswordNotAllowed => {
                ErrorKind::InvalidInput
            }
            UserError::UsernameTaken | UserError::AdminAlreadyExists | UserError::HasPoints => {
                ErrorKind::InvalidOperation
            }
            UserError::HashingError | UserError::DatabaseError(_) => ErrorKind::Internal,
        }
    }
}

impl From<AuthError> for UserError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::DatabaseError(e) => UserError::DatabaseError(e),
            _ => UserError::HashingError,
        }
    }
}

pub async fn get_user(pool: &SqlitePool, user_id: &Uuid) -> Result<Option<User>, UserError> {
    let user: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?;

    Ok(user.map(|u| u.to_shared()))
}

pub async fn list_users(pool: &SqlitePool) -> Result<Vec<User>, UserError> {
    let users: Vec<UserRow> = sqlx::query_as("SELECT * FROM users ORDER BY is_admin DESC, username ASC")
        .fetch_all(pool)
        .await?;

    Ok(users.into_iter().map(|u| u.to_shared()).collect())
}

/// Update name, role and password of a user.
///
/// The resulting role decides the password: administrators keep (or get) a
/// hashed password, standard users never have one.
pub async fn update_user(pool: &SqlitePool, user_id: &Uuid, request: &UpdateUserRequest) -> Result<User, UserError> {
    let mut tx = db::begin_write(pool).await?;

    let mut user: UserRow = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(user_id.to_string())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(UserError::NotFound)?;

    if let Some(ref username) = request.username {
        let username = username.trim();
        if username.is_empty() {
            return Err(UserError::UsernameRequired);
        }

        let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE username = ? AND id != ?")
            .bind(username)
            .bind(user_id.to_string())
            .fetch_one(&mut *tx)
            .await?;
        if existing > 0 {
            return Err(UserError::UsernameTaken);
        }

        user.username = username.to_string();
    }

    let becomes_admin = request.admin.unwrap_or(user.is_admin);
    let new_password = request.password.as_deref().filter(|p| !p.is_empty());

    if becomes_admin && !user.is_admin {
        let admins: Vec<String> = sqlx::query_scalar("SELECT id FROM users WHERE is_admin = 1")
            .fetch_all(&mut *tx)
            .await?;
        if admins.iter().any(|id| *id != user.id) {
            return Err(UserError::AdminAlreadyExists);
        }
        if user.points > 0 {
            return Err(UserError::HasPoints);
        }
        if new_password.is_none() {
            return Err(UserError::PasswordRequired);
        }
    }

    if becomes_admin {
        if let Some(password) = new_password {
            user.password_hash = Some(hash_password(password)?);
        }
    } else {
        if new_password.is_some() {
            return Err(UserError::PasswordNotAllowed);
        }
        user.password_hash = None;
    }

    if user.is_admin && !becomes_admin {
        log::info!("User '{}' is no longer administrator", user.username);
    } else if !user.is_admin && becomes_admin {
        log::info!("User '{}' promoted to administrator", user.username);
    }
    user.is_admin = becomes_admin;

    let now = Utc::now();
    user.updated_at = now;

    sqlx::query("UPDATE users SET username = ?, password_hash = ?, is_admin = ?, updated_at = ? WHERE id = ?")
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.is_admin)
        .bind(now)
        .bind(user_id.to_string())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(user.to_shared())
}

/// Delete a user; their tasks and rewards become unassigned
pub async fn delete_user(pool: &SqlitePool, user_id: &Uuid) -> Result<(), UserError> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(UserError::NotFound);
    }

    log::info!("Deleted user {}", user_id);

    Ok(())
}
