//! Log throttling utility
//!
//! Limits how often the same log message is recorded. The presence watcher
//! polls the probe several times a second, so a broken detect line would
//! otherwise flood the log with identical read failures.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Log throttler that limits how often the same message is logged
///
/// # Example
///
/// ```rust
/// use cardhost::utils::LogThrottler;
/// use std::time::Duration;
///
/// let throttler = LogThrottler::new(Duration::from_secs(5));
///
/// // First call returns true
/// assert!(throttler.should_log("probe_read"));
///
/// // Subsequent calls within 5 seconds return false
/// assert!(!throttler.should_log("probe_read"));
/// ```
pub struct LogThrottler {
    /// Map of message key to last log time
    last_logged: RwLock<HashMap<String, Instant>>,
    /// Throttle interval
    interval: Duration,
}

impl LogThrottler {
    /// Create a new log throttler with the specified interval
    pub fn new(interval: Duration) -> Self {
        Self {
            last_logged: RwLock::new(HashMap::new()),
            interval,
        }
    }

    /// Create a new log throttler with interval specified in seconds
    pub fn with_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Check if a message should be logged (not throttled)
    ///
    /// Returns `true` if the message should be logged, `false` if it should
    /// be suppressed. If `true` is returned, the internal timestamp is
    /// updated.
    pub fn should_log(&self, key: &str) -> bool {
        let now = Instant::now();

        // Fast path under the read lock
        {
            let map = self.last_logged.read();
            if let Some(last) = map.get(key) {
                if now.duration_since(*last) < self.interval {
                    return false;
                }
            }
        }

        let mut map = self.last_logged.write();
        // Re-check after acquiring the write lock
        if let Some(last) = map.get(key) {
            if now.duration_since(*last) < self.interval {
                return false;
            }
        }
        map.insert(key.to_string(), now);
        true
    }

    /// Clear throttle state for a specific key
    ///
    /// Called when an error condition recovers, so the next fault is logged
    /// immediately.
    pub fn clear(&self, key: &str) {
        self.last_logged.write().remove(key);
    }

    /// Clear all throttle state
    pub fn clear_all(&self) {
        self.last_logged.write().clear();
    }
}

impl Default for LogThrottler {
    /// Create a default log throttler with 5 second interval
    fn default() -> Self {
        Self::with_secs(5)
    }
}

/// Macro for throttled warning logging
///
/// # Example
///
/// ```rust
/// use cardhost::utils::LogThrottler;
/// use cardhost::warn_throttled;
///
/// let throttler = LogThrottler::default();
/// warn_throttled!(throttler, "probe_read", "Probe read failed: {}", "details");
/// ```
#[macro_export]
macro_rules! warn_throttled {
    ($throttler:expr, $key:expr, $($arg:tt)*) => {
        if $throttler.should_log($key) {
            tracing::warn!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_should_log_first_call() {
        let throttler = LogThrottler::with_secs(1);
        assert!(throttler.should_log("probe_read"));
    }

    #[test]
    fn test_throttling() {
        let throttler = LogThrottler::new(Duration::from_millis(100));

        assert!(throttler.should_log("probe_read"));
        assert!(!throttler.should_log("probe_read"));

        thread::sleep(Duration::from_millis(150));

        assert!(throttler.should_log("probe_read"));
    }

    #[test]
    fn test_different_keys() {
        let throttler = LogThrottler::with_secs(10);

        assert!(throttler.should_log("present_line"));
        assert!(throttler.should_log("protect_line"));
        assert!(!throttler.should_log("present_line"));
        assert!(!throttler.should_log("protect_line"));
    }

    #[test]
    fn test_clear() {
        let throttler = LogThrottler::with_secs(10);

        assert!(throttler.should_log("probe_read"));
        assert!(!throttler.should_log("probe_read"));

        throttler.clear("probe_read");

        assert!(throttler.should_log("probe_read"));
    }

    #[test]
    fn test_clear_all() {
        let throttler = LogThrottler::with_secs(10);

        assert!(throttler.should_log("key1"));
        assert!(throttler.should_log("key2"));

        throttler.clear_all();

        assert!(throttler.should_log("key1"));
        assert!(throttler.should_log("key2"));
    }
}
