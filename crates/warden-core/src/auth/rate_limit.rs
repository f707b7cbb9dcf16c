use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

/// In-memory sliding-window rate limiter.
///
/// Tracks request timestamps per key (e.g. client IP) and rejects when
/// `limit` requests already fall inside the trailing `window`. Rejected
/// requests are not recorded. One mutex guards the whole table.
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    requests: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    /// Create a new rate limiter.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            requests: Mutex::new(HashMap::new()),
        }
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, VecDeque<Instant>>> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Admit or reject one request for `key`.
    pub fn admit(&self, key: &str) -> bool {
        self.check(key).is_ok()
    }

    /// Returns `Ok(())` if allowed, or `Err(seconds_until_retry)` if limited.
    pub fn check(&self, key: &str) -> Result<(), u64> {
        let mut map = self.table();
        let now = Instant::now();

        let entries = map.entry(key.to_string()).or_default();
        prune(entries, now, self.window);

        if entries.len() >= self.limit as usize {
            let retry_after = entries
                .front()
                .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(self.window);
            return Err(retry_after.as_secs().max(1));
        }

        entries.push_back(now);
        Ok(())
    }

    /// Seconds until `key` may be admitted again; `None` if it may be now.
    pub fn retry_after(&self, key: &str) -> Option<u64> {
        let mut map = self.table();
        let now = Instant::now();
        let entries = map.get_mut(key)?;
        prune(entries, now, self.window);
        if entries.len() < self.limit as usize {
            return None;
        }
        let oldest = entries.front()?;
        Some(
            self.window
                .saturating_sub(now.duration_since(*oldest))
                .as_secs()
                .max(1),
        )
    }

    /// Requests currently counted against `key`.
    pub fn in_window(&self, key: &str) -> usize {
        let mut map = self.table();
        match map.get_mut(key) {
            Some(entries) => {
                prune(entries, Instant::now(), self.window);
                entries.len()
            }
            None => 0,
        }
    }

    /// Reset attempts for a key.
    pub fn reset(&self, key: &str) {
        self.table().remove(key);
    }

    /// Remove expired entries and empty keys to bound memory.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.table().retain(|_, entries| {
            prune(entries, now, self.window);
            !entries.is_empty()
        });
    }

    pub fn tracked_keys(&self) -> usize {
        self.table().len()
    }
}

fn prune(entries: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = entries.front() {
        if now.duration_since(*oldest) >= window {
            entries.pop_front();
        } else {
            break;
        }
    }
}
