use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database model for tasks
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TaskRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub daily: bool,
    pub last_completed_date: Option<NaiveDate>,
    pub reward_points: i64,
    pub assigned_user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRow {
    pub fn to_shared(&self) -> shared::Task {
        shared::Task {
            id: Uuid::parse_str(&self.id).unwrap_or_default(),
            title: self.title.clone(),
            description: self.description.clone(),
            completed: self.completed,
            daily: self.daily,
            last_completed_date: self.last_completed_date,
            reward_points: self.reward_points,
            assigned_user_id: self.assigned_user_id.as_ref().and_then(|id| Uuid::parse_str(id).ok()),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Assigned user as a parsed id, if any
    pub fn assignee(&self) -> Option<Uuid> {
        self.assigned_user_id.as_ref().and_then(|id| Uuid::parse_str(id).ok())
    }

    /// A daily task already completed on `date` must not be completed again
    pub fn is_completed_on(&self, date: NaiveDate) -> bool {
        self.daily && self.completed && self.last_completed_date == Some(date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_row(daily: bool, completed: bool, last_completed_date: Option<NaiveDate>) -> TaskRow {
        let now = Utc::now();

        TaskRow {
            id: Uuid::new_v4().to_string(),
            title: "Water the plants".to_string(),
            description: "".to_string(),
            completed,
            daily,
            last_completed_date,
            reward_points: 10,
            assigned_user_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_task_row_to_shared() {
        let user_id = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut row = test_row(true, true, Some(date));
        row.assigned_user_id = Some(user_id.to_string());

        let shared = row.to_shared();

        assert_eq!(shared.id.to_string(), row.id);
        assert_eq!(shared.title, "Water the plants");
        assert!(shared.completed);
        assert!(shared.daily);
        assert_eq!(shared.last_completed_date, Some(date));
        assert_eq!(shared.reward_points, 10);
        assert_eq!(shared.assigned_user_id, Some(user_id));
    }

    #[test]
    fn test_task_row_unassigned() {
        let row = test_row(false, false, None);

        assert!(row.assignee().is_none());
        assert!(row.to_shared().assigned_user_id.is_none());
    }

    #[test]
    fn test_is_completed_on_same_day() {
        let jan1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let jan2 = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();

        let row = test_row(true, true, Some(jan1));

        assert!(row.is_completed_on(jan1));
        assert!(!row.is_completed_on(jan2));
    }

    #[test]
    fn test_is_completed_on_ignores_non_daily_and_incomplete() {
        let jan1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        // Non-daily tasks never short-circuit on the date
        assert!(!test_row(false, true, Some(jan1)).is_completed_on(jan1));
        // A reset daily task keeps its date but is eligible again
        assert!(!test_row(true, false, Some(jan1)).is_completed_on(jan1));
    }
}
