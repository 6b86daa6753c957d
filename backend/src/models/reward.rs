use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database model for rewards
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RewardRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: i64,
    pub redeemed: bool,
    pub assigned_user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RewardRow {
    pub fn to_shared(&self) -> shared::Reward {
        shared::Reward {
            id: Uuid::parse_str(&self.id).unwrap_or_default(),
            title: self.title.clone(),
            description: self.description.clone(),
            price: self.price,
            redeemed: self.redeemed,
            assigned_user_id: self.assignee(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn assignee(&self) -> Option<Uuid> {
        self.assigned_user_id.as_ref().and_then(|id| Uuid::parse_str(id).ok())
    }
}
