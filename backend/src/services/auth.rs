use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand_core::OsRng;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::db;
use crate::models::UserRow;
use shared::{CreateUserRequest, ErrorKind, LoginRequest, User};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Username is required")]
    UsernameRequired,
    #[error("Username is already taken")]
    UsernameTaken,
    #[error("The administrator account requires a password")]
    PasswordRequired,
    #[error("An administrator already exists")]
    AdminAlreadyExists,
    #[error("Only the administrator may set a password")]
    PasswordNotAllowed,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Password hashing error")]
    HashingError,
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::UsernameRequired | AuthError::PasswordRequired | AuthError::PasswordNotAllowed => {
                ErrorKind::InvalidInput
            }
            AuthError::UsernameTaken | AuthError::AdminAlreadyExists => ErrorKind::InvalidOperation,
            AuthError::InvalidCredentials | AuthError::JwtError(_) => ErrorKind::Unauthorized,
            AuthError::HashingError | AuthError::DatabaseError(_) => ErrorKind::Internal,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

/// Register a new user.
///
/// The very first account becomes the administrator and must carry a
/// password. Every later account is a standard, password-less user.
pub async fn register_user(pool: &SqlitePool, request: &CreateUserRequest) -> Result<User, AuthError> {
    let username = request.username.trim();
    if username.is_empty() {
        return Err(AuthError::UsernameRequired);
    }

    let mut tx = db::begin_write(pool).await?;

    let taken = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE username = ?")
        .bind(username)
        .fetch_one(&mut *tx)
        .await?;
    if taken > 0 {
        return Err(AuthError::UsernameTaken);
    }

    let user_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
        .fetch_one(&mut *tx)
        .await?;
    let is_admin = user_count == 0;

    let password_hash = if is_admin {
        match request.password.as_deref() {
            Some(password) if !password.is_empty() => Some(hash_password(password)?),
            _ => return Err(AuthError::PasswordRequired),
        }
    } else {
        if request.admin {
            return Err(AuthError::AdminAlreadyExists);
        }
        if request.password.as_deref().is_some_and(|p| !p.is_empty()) {
            return Err(AuthError::PasswordNotAllowed);
        }
        None
    };

    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO users (id, username, password_hash, is_admin, points, created_at, updated_at)
        VALUES (?, ?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(username)
    .bind(&password_hash)
    .bind(is_admin)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    log::info!("Registered {} '{}'", if is_admin { "administrator" } else { "user" }, username);

    Ok(User {
        id,
        username: username.to_string(),
        admin: is_admin,
        points: 0,
        created_at: now,
        updated_at: now,
    })
}

/// Administrators authenticate with their password, standard users by name alone
pub async fn login_user(pool: &SqlitePool, request: &LoginRequest) -> Result<User, AuthError> {
    let user: UserRow = sqlx::query_as("SELECT * FROM users WHERE username = ?")
        .bind(request.username.trim())
        .fetch_optional(pool)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    if user.is_admin {
        let password_hash = user.password_hash.as_ref().ok_or(AuthError::InvalidCredentials)?;
        let password = request.password.as_deref().ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, password_hash)?;
    }

    Ok(user.to_shared())
}

pub async fn get_user_by_id(pool: &SqlitePool, user_id: &Uuid) -> Result<Option<User>, AuthError> {
    let user: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?;

    Ok(user.map(|u| u.to_shared()))
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::HashingError)
}

fn verify_password(password: &str, password_hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(password_hash).map_err(|_| AuthError::InvalidCredentials)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

pub fn create_jwt(user_id: &Uuid, secret: &str, expiration_hours: i64) -> Result<String, AuthError> {
    let now = Utc::now();
    let exp = now + Duration::hours(expiration_hours);

    let claims = Claims {
        sub: user_id.to_string(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))?;

    Ok(token)
}

pub fn verify_jwt(token: &str, secret: &str) -> Result<Uuid, AuthError> {
    let token_data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())?;

    Uuid::parse_str(&token_data.claims.sub).map_err(|_| AuthError::InvalidCredentials)
}
