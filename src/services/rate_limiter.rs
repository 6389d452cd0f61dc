use std::collections::{HashMap, VecDeque};

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Sliding-window admission control, one window per credential
///
/// Each key keeps the timestamps of its admitted requests inside the
/// trailing window. A request is admitted, and recorded, only while that
/// count is below the cap; denials are not recorded.
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub async fn allow(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        // drop keys whose whole log has aged out
        windows.retain(|_, log| {
            log.back()
                .is_some_and(|last| now.duration_since(*last) < self.window)
        });

        let log = windows.entry(key.to_string()).or_default();
        while log
            .front()
            .is_some_and(|first| now.duration_since(*first) >= self.window)
        {
            log.pop_front();
        }

        if log.len() >= self.max_requests {
            tracing::warn!(
                in_window = log.len(),
                cap = self.max_requests,
                window_secs = self.window.as_secs(),
                "Rate limit reached"
            );
            return false;
        }

        log.push_back(now);
        true
    }
}
