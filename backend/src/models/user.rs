use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database model for users
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password_hash: Option<String>,
    pub is_admin: bool,
    pub points: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    pub fn to_shared(&self) -> shared::User {
        shared::User {
            id: Uuid::parse_str(&self.id).unwrap_or_default(),
            username: self.username.clone(),
            admin: self.is_admin,
            points: self.points,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
