use std::sync::Arc;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::middleware::LoginThrottle;

pub mod user;
pub mod task;
pub mod reward;

pub use user::*;
pub use task::*;
pub use reward::*;

/// Application state shared across all handlers
pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
    pub login_throttle: Arc<LoginThrottle>,
}
