use chrono_tz::Tz;
use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be a number")]
    NotANumber(&'static str),
    #[error("{name} must be between 0 and {max}")]
    OutOfRange { name: &'static str, max: u32 },
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub cors_origins: Vec<String>,
    /// Wall-clock time of the global daily reset
    pub daily_reset_hour: u32,
    pub daily_reset_minute: u32,
    /// Timezone that defines "today" for the server
    pub timezone: Tz,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let timezone_name = env::var("DAILY_RESET_TIMEZONE").unwrap_or_else(|_| "UTC".to_string());
        let timezone = timezone_name
            .parse::<Tz>()
            .map_err(|_| ConfigError::UnknownTimezone(timezone_name.clone()))?;

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("PORT", 8080)?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:task_heroes.db?mode=rwc".to_string()),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| "development-secret-key-change-in-production".to_string()),
            jwt_expiration_hours: parse_var("JWT_EXPIRATION_HOURS", 24)?,
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost".to_string())
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
            daily_reset_hour: parse_bounded("DAILY_RESET_HOUR", 0, 23)?,
            daily_reset_minute: parse_bounded("DAILY_RESET_MINUTE", 0, 59)?,
            timezone,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::NotANumber(name)),
        Err(_) => Ok(default),
    }
}

fn parse_bounded(name: &'static str, default: u32, max: u32) -> Result<u32, ConfigError> {
    let value = parse_var(name, default)?;
    if value > max {
        return Err(ConfigError::OutOfRange { name, max });
    }
    Ok(value)
}
