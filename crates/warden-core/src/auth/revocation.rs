use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

/// In-memory revocation set for signed tokens.
///
/// Each entry lives until the revoked token's own expiry; past that point
/// the signature check rejects the token anyway, so the entry is dropped
/// lazily on read and by [`sweep`](Self::sweep).
#[derive(Default)]
pub struct RevocationList {
    entries: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl RevocationList {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, DateTime<Utc>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Revoke `token` until `until`. An existing later deadline is kept.
    pub fn revoke(&self, token: &str, until: DateTime<Utc>) {
        let mut map = self.table();
        let entry = map.entry(token.to_string()).or_insert(until);
        if *entry < until {
            *entry = until;
        }
    }

    /// Atomically revoke `token` unless it is already revoked.
    ///
    /// Returns `false` when another caller got there first.
    pub fn try_revoke(&self, token: &str, until: DateTime<Utc>) -> bool {
        let now = Utc::now();
        let mut map = self.table();
        match map.get(token) {
            Some(existing) if now < *existing => false,
            _ => {
                map.insert(token.to_string(), until);
                true
            }
        }
    }

    pub fn is_revoked(&self, token: &str) -> bool {
        let now = Utc::now();
        let mut map = self.table();
        match map.get(token) {
            Some(until) if now < *until => true,
            Some(_) => {
                map.remove(token);
                false
            }
            None => false,
        }
    }

    /// Drop entries whose deadline has passed. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Utc::now();
        let mut map = self.table();
        let before = map.len();
        map.retain(|_, until| now < *until);
        before - map.len()
    }

    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }
}
