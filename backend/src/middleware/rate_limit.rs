use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

struct FailureRecord {
    count: u32,
    first_failure: Instant,
}

/// Tracks failed logins per username and locks a name out once it has
/// failed too often within the window.
pub struct LoginThrottle {
    failures: Mutex<HashMap<String, FailureRecord>>,
    max_failures: u32,
    window: Duration,
}

impl LoginThrottle {
    pub fn new(max_failures: u32, window: Duration) -> Self {
        Self {
            failures: Mutex::new(HashMap::new()),
            max_failures,
            window,
        }
    }

    /// Whether another login attempt for `username` may proceed
    pub fn check(&self, username: &str) -> bool {
        let mut failures = self.lock();
        let now = Instant::now();

        match failures.get(&key(username)) {
            Some(record) if now.duration_since(record.first_failure) >= self.window => {
                failures.remove(&key(username));
                true
            }
            Some(record) => record.count < self.max_failures,
            None => true,
        }
    }

    pub fn record_failure(&self, username: &str) {
        let mut failures = self.lock();
        let now = Instant::now();

        // Names that never come back would otherwise stay forever
        failures.retain(|_, r| now.duration_since(r.first_failure) < self.window);

        let record = failures.entry(key(username)).or_insert(FailureRecord { count: 0, first_failure: now });
        record.count += 1;

        if record.count == self.max_failures {
            log::warn!("Too many failed logins for '{}', locking for {:?}", username, self.window);
        }
    }

    /// Forget failures after a successful login
    pub fn clear(&self, username: &str) {
        self.lock().remove(&key(username));
    }

    // A panic while holding the lock leaves the map usable
    fn lock(&self) -> MutexGuard<'_, HashMap<String, FailureRecord>> {
        self.failures.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn key(username: &str) -> String {
    username.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_allows_until_limit() {
        let throttle = LoginThrottle::new(3, Duration::from_secs(60));

        assert!(throttle.check("mom"));
        throttle.record_failure("mom");
        throttle.record_failure("mom");
        assert!(throttle.check("mom"));
        throttle.record_failure("mom");
        assert!(!throttle.check("mom"));
    }

    #[test]
    fn test_usernames_are_normalized() {
        let throttle = LoginThrottle::new(1, Duration::from_secs(60));

        throttle.record_failure(" Mom ");

        assert!(!throttle.check("mom"));
        assert!(throttle.check("dad"));
    }

    #[test]
    fn test_lockout_expires() {
        let throttle = LoginThrottle::new(1, Duration::from_millis(50));

        throttle.record_failure("mom");
        assert!(!throttle.check("mom"));

        sleep(Duration::from_millis(100));

        assert!(throttle.check("mom"));
    }

    #[test]
    fn test_clear_after_success() {
        let throttle = LoginThrottle::new(2, Duration::from_secs(60));

        throttle.record_failure("mom");
        throttle.record_failure("mom");
        assert!(!throttle.check("mom"));

        throttle.clear("mom");
        assert!(throttle.check("mom"));
    }

    #[test]
    fn test_expired_records_are_pruned() {
        let throttle = LoginThrottle::new(3, Duration::from_millis(200));

        for i in 0..100 {
            throttle.record_failure(&format!("stranger-{}", i));
        }
        assert_eq!(throttle.lock().len(), 100);

        sleep(Duration::from_millis(300));
        throttle.record_failure("mom");

        assert_eq!(throttle.lock().len(), 1);
    }
}
