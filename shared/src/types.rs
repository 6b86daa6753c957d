use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// User Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub admin: bool,
    pub points: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    /// Only the first user (who becomes the admin) may set a password
    pub password: Option<String>,
    #[serde(default)]
    pub admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub admin: Option<bool>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsRequest {
    pub points: i64,
}

// ============================================================================
// Task Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub daily: bool,
    pub last_completed_date: Option<NaiveDate>,
    pub reward_points: i64,
    pub assigned_user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: Option<String>,
    /// Unset means "not daily"
    pub daily: Option<bool>,
    pub reward_points: Option<i64>,
    pub assigned_user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub daily: Option<bool>,
    pub reward_points: Option<i64>,
    pub assigned_user_id: Option<Uuid>,
}

/// Which slice of the task list a caller wants to see
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatusFilter {
    #[default]
    All,
    Incomplete,
    Completed,
}

impl TaskStatusFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatusFilter::All => "all",
            TaskStatusFilter::Incomplete => "incomplete",
            TaskStatusFilter::Completed => "completed",
        }
    }
}

impl FromStr for TaskStatusFilter {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(TaskStatusFilter::All),
            "incomplete" => Ok(TaskStatusFilter::Incomplete),
            "completed" => Ok(TaskStatusFilter::Completed),
            _ => Err(()),
        }
    }
}

/// Result of completing a task, with the assigned user's refreshed balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteTaskResponse {
    pub task: Task,
    pub points: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyCheckResponse {
    pub server_date: NaiveDate,
    pub client_date: NaiveDate,
    pub tasks_reset: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetDailyResponse {
    pub tasks_reset: u64,
}

// ============================================================================
// Reward Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub price: i64,
    pub redeemed: bool,
    pub assigned_user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateRewardRequest {
    pub title: String,
    pub description: Option<String>,
    pub price: i64,
    pub assigned_user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRewardRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub assigned_user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardStatusFilter {
    #[default]
    All,
    Available,
    Redeemed,
}

impl RewardStatusFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardStatusFilter::All => "all",
            RewardStatusFilter::Available => "available",
            RewardStatusFilter::Redeemed => "redeemed",
        }
    }
}

impl FromStr for RewardStatusFilter {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(RewardStatusFilter::All),
            "available" => Ok(RewardStatusFilter::Available),
            "redeemed" => Ok(RewardStatusFilter::Redeemed),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedeemRewardResponse {
    pub reward: Reward,
    pub points: i64,
}

// ============================================================================
// API Response Types
// ============================================================================

/// Coarse failure classes every service error maps onto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidOperation,
    InvalidInput,
    Unauthorized,
    Forbidden,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidOperation => "invalid_operation",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Internal => "internal_error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            error: kind.as_str().to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSuccess<T> {
    pub data: T,
}

impl<T> ApiSuccess<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_filter_from_str() {
        assert_eq!("all".parse(), Ok(TaskStatusFilter::All));
        assert_eq!("INCOMPLETE".parse(), Ok(TaskStatusFilter::Incomplete));
        assert_eq!("Completed".parse(), Ok(TaskStatusFilter::Completed));
        assert!("done".parse::<TaskStatusFilter>().is_err());
    }

    #[test]
    fn test_reward_status_filter_from_str() {
        assert_eq!("available".parse(), Ok(RewardStatusFilter::Available));
        assert_eq!("Redeemed".parse(), Ok(RewardStatusFilter::Redeemed));
        assert_eq!(RewardStatusFilter::default(), RewardStatusFilter::All);
        assert!("spent".parse::<RewardStatusFilter>().is_err());
    }

    #[test]
    fn test_error_kind_codes() {
        assert_eq!(ErrorKind::NotFound.as_str(), "not_found");
        assert_eq!(ErrorKind::InvalidOperation.as_str(), "invalid_operation");
        assert_eq!(ErrorKind::InvalidInput.as_str(), "invalid_input");
    }

    #[test]
    fn test_api_error_new() {
        let err = ApiError::new(ErrorKind::NotFound, "Task not found");
        assert_eq!(err.error, "not_found");
        assert_eq!(err.message, "Task not found");
    }

    #[test]
    fn test_create_task_request_daily_unset() {
        let request: CreateTaskRequest =
            serde_json::from_str(r#"{"title": "Feed the cat", "reward_points": 5}"#).unwrap();

        assert_eq!(request.daily, None);
        assert_eq!(request.reward_points, Some(5));
        assert!(request.assigned_user_id.is_none());
    }

    #[test]
    fn test_task_serializes_calendar_date() {
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            title: "Make the bed".to_string(),
            description: String::new(),
            completed: true,
            daily: true,
            last_completed_date: NaiveDate::from_ymd_opt(2024, 3, 15),
            reward_points: 10,
            assigned_user_id: None,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["last_completed_date"], "2024-03-15");
    }

    #[test]
    fn test_api_success() {
        let success = ApiSuccess::new("test data");
        assert_eq!(success.data, "test data");
    }
}
