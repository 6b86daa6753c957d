use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use sqlx::SqlitePool;
use tokio::time;

use crate::config::Config;
use crate::services::daily_reset;

/// Configuration for the background job scheduler
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Hour of day to run the daily reset (0-23)
    pub reset_hour: u32,
    /// Minute of hour to run the reset (0-59)
    pub reset_minute: u32,
    /// Timezone the reset time is expressed in
    pub timezone: Tz,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            reset_hour: 0,
            reset_minute: 0,
            timezone: Tz::UTC,
        }
    }
}

impl JobConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            reset_hour: config.daily_reset_hour,
            reset_minute: config.daily_reset_minute,
            timezone: config.timezone,
        }
    }
}

/// Start the background job scheduler.
/// Runs forever, resetting all daily tasks once a day at the configured time.
pub async fn start_scheduler(pool: SqlitePool, config: JobConfig) {
    log::info!(
        "Background job scheduler started. Daily reset scheduled for {:02}:{:02} ({})",
        config.reset_hour,
        config.reset_minute,
        config.timezone
    );

    loop {
        let now = Utc::now();
        let next_run = next_run_after(now, &config);

        let sleep_duration = (next_run - now)
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(60));

        log::debug!("Next daily reset at {} (in {} seconds)", next_run, sleep_duration.as_secs());

        time::sleep(sleep_duration).await;

        match daily_reset::reset_all_daily(&pool).await {
            Ok(count) => log::info!("Daily reset complete: {} tasks marked incomplete", count),
            Err(e) => log::error!("Error running daily reset: {}", e),
        }
    }
}

/// The first scheduled reset strictly after `now`
pub fn next_run_after(now: DateTime<Utc>, config: &JobConfig) -> DateTime<Utc> {
    let today = now.with_timezone(&config.timezone).date_naive();

    let candidate = scheduled_instant(today, config);
    if candidate > now {
        return candidate;
    }

    let tomorrow = today.succ_opt().unwrap_or(today);
    scheduled_instant(tomorrow, config)
}

/// The reset instant on a local calendar date.
///
/// An ambiguous local time (clocks going back) resolves to its first
/// occurrence; a skipped one (clocks going forward) moves an hour later.
fn scheduled_instant(date: NaiveDate, config: &JobConfig) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(config.reset_hour, config.reset_minute, 0).unwrap_or(NaiveTime::MIN);
    let local = date.and_time(time);
    let tz = config.timezone;

    tz.from_local_datetime(&local)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(local + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&local))
}
