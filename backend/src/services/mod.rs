pub mod auth;
pub mod background_jobs;
pub mod daily_reset;
pub mod points;
pub mod rewards;
pub mod tasks;
pub mod users;

#[cfg(test)]
pub mod test_support;
