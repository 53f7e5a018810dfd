//! Fixed-window per-key rate limiting.
//!
//! Used for login attempts (keyed by email) and workspace start calls
//! (keyed by user id). A fixed window is adequate here: the limits exist to
//! blunt brute-forcing and accidental start-storms, not to provide exact
//! request shaping.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Window {
    started_at: Instant,
    count: u32,
}

pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(limit_per_minute: u32) -> Self {
        Self {
            limit: limit_per_minute,
            window: Duration::from_secs(60),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true if `key` is still under its limit for the current
    /// window, recording the attempt either way.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock().expect("rate limiter mutex poisoned");
        let entry = windows.entry(key.to_string()).or_insert_with(|| Window {
            started_at: now,
            count: 0,
        });

        if now.duration_since(entry.started_at) > self.window {
            entry.started_at = now;
            entry.count = 0;
        }

        entry.count += 1;
        entry.count <= self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_the_limit_then_blocks() {
        let limiter = RateLimiter::new(3);
        assert!(limiter.check("a@example.com"));
        assert!(limiter.check("a@example.com"));
        assert!(limiter.check("a@example.com"));
        assert!(!limiter.check("a@example.com"));
    }

    #[test]
    fn tracks_keys_independently() {
        let limiter = RateLimiter::new(1);
        assert!(limiter.check("a@example.com"));
        assert!(limiter.check("b@example.com"));
        assert!(!limiter.check("a@example.com"));
    }
}
