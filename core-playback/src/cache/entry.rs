//! Cache entry model

use bridge_traits::AudioBuffer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How an entry got into the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryOrigin {
    /// Loaded ahead of time by the preload scheduler.
    Preload,
    /// Loaded because someone asked to play it.
    OnDemand,
}

/// One cached resource.
///
/// The entry exclusively owns `buffer`; removing the entry from the cache is
/// what releases it.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub url: String,
    pub buffer: AudioBuffer,
    /// Updated on every cache hit.
    pub last_used_at: DateTime<Utc>,
    /// Insertion time, the basis for expiry.
    pub cached_at: DateTime<Utc>,
    pub size_bytes: u64,
    pub origin: EntryOrigin,
}

impl CacheEntry {
    pub fn new(
        url: impl Into<String>,
        buffer: AudioBuffer,
        size_bytes: u64,
        origin: EntryOrigin,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            url: url.into(),
            buffer,
            last_used_at: now,
            cached_at: now,
            size_bytes,
            origin,
        }
    }

    pub fn is_preloaded(&self) -> bool {
        self.origin == EntryOrigin::Preload
    }

    /// Whether the entry was inserted more than `window` before `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, window: Duration) -> bool {
        match chrono::Duration::from_std(window) {
            Ok(window) => now - self.cached_at > window,
            Err(_) => false,
        }
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.last_used_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::DecodeMode;

    #[test]
    fn test_expiry_is_relative_to_insertion() {
        let now = Utc::now();
        let mut entry = CacheEntry::new(
            "a.mp3",
            AudioBuffer::new(None, DecodeMode::Full),
            100,
            EntryOrigin::Preload,
            now,
        );
        let window = Duration::from_secs(60);

        assert!(!entry.is_expired(now + chrono::Duration::seconds(60), window));
        assert!(entry.is_expired(now + chrono::Duration::seconds(61), window));

        // Touching does not extend the lifetime.
        entry.touch(now + chrono::Duration::seconds(59));
        assert!(entry.is_expired(now + chrono::Duration::seconds(61), window));
        assert!(entry.is_preloaded());
    }
}
