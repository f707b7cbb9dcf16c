use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Attempts {
    count: u32,
    last_attempt: Instant,
    banned_until: Option<Instant>,
}

/// Windowed attempt counter with a hard ban, used on the refresh endpoint.
///
/// A client gets `max_attempts` attempts; the count resets once `window`
/// passes without an attempt. Going over the limit bans the client for
/// `ban`, and while banned every attempt is rejected regardless of the
/// window.
pub struct RefreshThrottle {
    max_attempts: u32,
    window: Duration,
    ban: Duration,
    attempts: Mutex<HashMap<String, Attempts>>,
}

impl RefreshThrottle {
    pub fn new(max_attempts: u32, window: Duration, ban: Duration) -> Self {
        Self {
            max_attempts,
            window,
            ban,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Attempts>> {
        self.attempts.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Count one attempt. Returns `Err(seconds_until_retry)` when throttled.
    pub fn attempt(&self, key: &str) -> Result<(), u64> {
        let mut map = self.table();
        let now = Instant::now();

        let entry = map.entry(key.to_string()).or_insert(Attempts {
            count: 0,
            last_attempt: now,
            banned_until: None,
        });

        if let Some(until) = entry.banned_until {
            if now < until {
                return Err(until.duration_since(now).as_secs().max(1));
            }
            entry.banned_until = None;
            entry.count = 0;
        }

        if now.duration_since(entry.last_attempt) > self.window {
            entry.count = 0;
        }

        entry.count += 1;
        entry.last_attempt = now;

        if entry.count > self.max_attempts {
            entry.banned_until = Some(now + self.ban);
            tracing::warn!(client = key, attempts = entry.count, "refresh attempts exceeded, client banned");
            return Err(self.ban.as_secs().max(1));
        }

        Ok(())
    }

    pub fn is_banned(&self, key: &str) -> bool {
        let now = Instant::now();
        self.table()
            .get(key)
            .and_then(|a| a.banned_until)
            .is_some_and(|until| now < until)
    }

    /// Drop counters that are neither banned nor inside a live window.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let window = self.window;
        self.table().retain(|_, a| match a.banned_until {
            Some(until) => now < until,
            None => now.duration_since(a.last_attempt) <= window,
        });
    }

    pub fn tracked_keys(&self) -> usize {
        self.table().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn throttle() -> RefreshThrottle {
        RefreshThrottle::new(
            5,
            Duration::from_secs(15 * 60),
            Duration::from_secs(60 * 60),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn ban_outlasts_the_window() {
        let t = throttle();
        for _ in 0..5 {
            assert!(t.attempt("10.0.0.1").is_ok());
        }
        assert!(t.attempt("10.0.0.1").is_err());
        assert!(t.is_banned("10.0.0.1"));

        tokio::time::advance(Duration::from_secs(16 * 60)).await;
        assert!(t.attempt("10.0.0.1").is_err(), "ban is independent of the window");

        tokio::time::advance(Duration::from_secs(45 * 60)).await;
        assert!(t.attempt("10.0.0.1").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_window_resets_the_count() {
        let t = throttle();
        for _ in 0..5 {
            assert!(t.attempt("k").is_ok());
        }
        tokio::time::advance(Duration::from_secs(15 * 60 + 1)).await;
        for _ in 0..5 {
            assert!(t.attempt("k").is_ok());
        }
        assert!(t.attempt("k").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_keeps_banned_clients() {
        let t = RefreshThrottle::new(1, Duration::from_secs(10), Duration::from_secs(100));
        assert!(t.attempt("a").is_ok());
        assert!(t.attempt("b").is_ok());
        assert!(t.attempt("b").is_err());

        tokio::time::advance(Duration::from_secs(11)).await;
        t.cleanup();
        assert_eq!(t.tracked_keys(), 1);
        assert!(t.is_banned("b"));
    }
}
