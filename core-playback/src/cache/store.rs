//! # Audio Cache Store
//!
//! Bounded URL → decoded-audio store with LRU eviction.
//!
//! All bookkeeping happens under one `parking_lot::Mutex` that is never held
//! across an `.await`, so `put` and `evict` cannot interleave. Buffers leaving
//! the cache are released after the lock is dropped; release failures are
//! logged and swallowed.

use crate::cache::{
    config::CacheConfig,
    entry::{CacheEntry, EntryOrigin},
    stats::CacheStats,
};
use bridge_traits::{AudioBackend, AudioBuffer, Clock};
use chrono::{DateTime, Utc};
use core_runtime::events::{CacheEvent, CoreEvent, EventBus, EvictionReason};
use core_runtime::logging::redact_url;
use lru::LruCache;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What an explicit [`AudioCache::evict`] should bring the cache down to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionTarget {
    /// Evict until the total size is at or below this many bytes.
    Bytes(u64),
    /// Evict until at most this many entries remain.
    Count(usize),
}

/// Result of [`AudioCache::put`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum PutOutcome {
    /// The cache now owns the buffer.
    Cached,
    /// The resource is larger than the whole byte budget. Ownership stays
    /// with the caller, who must release the buffer when done with it.
    Uncached(AudioBuffer),
}

impl PutOutcome {
    pub fn is_cached(&self) -> bool {
        matches!(self, PutOutcome::Cached)
    }
}

struct CacheInner {
    entries: LruCache<String, CacheEntry>,
    total_size: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
    expired: u64,
}

impl CacheInner {
    fn remove(&mut self, url: &str) -> Option<CacheEntry> {
        let entry = self.entries.pop(url)?;
        self.total_size = self.total_size.saturating_sub(entry.size_bytes);
        Some(entry)
    }

    fn pop_lru(&mut self) -> Option<CacheEntry> {
        let (_, entry) = self.entries.pop_lru()?;
        self.total_size = self.total_size.saturating_sub(entry.size_bytes);
        self.evictions += 1;
        Some(entry)
    }

    fn take_expired(&mut self, now: DateTime<Utc>, window: Duration) -> Vec<CacheEntry> {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now, window))
            .map(|(url, _)| url.clone())
            .collect();

        let expired: Vec<CacheEntry> = keys.iter().filter_map(|url| self.remove(url)).collect();
        self.expired += expired.len() as u64;
        expired
    }
}

type Released = Vec<(CacheEntry, EvictionReason)>;

/// In-memory cache of decoded pronunciation audio.
pub struct AudioCache {
    config: CacheConfig,
    backend: Arc<dyn AudioBackend>,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
    inner: Mutex<CacheInner>,
}

impl AudioCache {
    /// Create an empty cache. Limits come from `config`; evicted buffers are
    /// released through `backend`.
    pub fn new(config: CacheConfig, backend: Arc<dyn AudioBackend>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            backend,
            clock,
            event_bus: None,
            inner: Mutex::new(CacheInner {
                entries: LruCache::unbounded(),
                total_size: 0,
                hits: 0,
                misses: 0,
                evictions: 0,
                expired: 0,
            }),
        }
    }

    /// Publish cache events on `event_bus`.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up a resource and mark it most recently used.
    ///
    /// An expired entry is dropped on access and reported as a miss.
    pub fn get(&self, url: &str) -> Option<AudioBuffer> {
        let now = self.clock.now();
        let mut expired = None;

        let found = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;

            let is_expired = inner
                .entries
                .peek(url)
                .map(|entry| entry.is_expired(now, self.config.expiry_window));

            match is_expired {
                Some(false) => {
                    let buffer = inner.entries.get_mut(url).map(|entry| {
                        entry.touch(now);
                        entry.buffer.clone()
                    });
                    inner.hits += 1;
                    buffer
                }
                Some(true) => {
                    expired = inner.remove(url);
                    inner.expired += 1;
                    inner.misses += 1;
                    None
                }
                None => {
                    inner.misses += 1;
                    None
                }
            }
        };

        if let Some(entry) = expired {
            self.release(vec![(entry, EvictionReason::Expired)]);
        }

        found
    }

    /// Whether a live entry exists for `url`. Does not affect LRU order.
    pub fn contains(&self, url: &str) -> bool {
        let now = self.clock.now();
        self.inner
            .lock()
            .entries
            .peek(url)
            .is_some_and(|entry| !entry.is_expired(now, self.config.expiry_window))
    }

    /// Snapshot of an entry without touching it.
    pub fn peek(&self, url: &str) -> Option<CacheEntry> {
        self.inner.lock().entries.peek(url).cloned()
    }

    /// Insert a resource, evicting first if the insert would break a limit.
    ///
    /// Order of work: expired entries are swept, count pressure evicts LRU
    /// entries until there is room for one more, then size pressure evicts LRU
    /// entries down to the size target (or further, if the new entry still
    /// would not fit). Re-inserting a URL replaces the old entry and releases
    /// its buffer unless it is the same handle.
    pub fn put(
        &self,
        url: &str,
        buffer: AudioBuffer,
        size_bytes: u64,
        origin: EntryOrigin,
    ) -> PutOutcome {
        let max_size = self.config.max_cache_size_bytes;
        if size_bytes > max_size {
            warn!(
                url = %redact_url(url),
                size_bytes,
                max_size,
                "Resource exceeds cache budget, not caching"
            );
            return PutOutcome::Uncached(buffer);
        }

        let now = self.clock.now();
        let mut released: Released = Vec::new();
        let mut replaced = None;

        {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;

            if let Some(previous) = inner.remove(url) {
                if previous.buffer.id != buffer.id {
                    replaced = Some(previous.buffer);
                }
            }

            released.extend(
                inner
                    .take_expired(now, self.config.expiry_window)
                    .into_iter()
                    .map(|entry| (entry, EvictionReason::Expired)),
            );

            while inner.entries.len() >= self.config.max_cache_items {
                match inner.pop_lru() {
                    Some(entry) => released.push((entry, EvictionReason::Capacity)),
                    None => break,
                }
            }

            if inner.total_size + size_bytes > max_size {
                let target = self.config.size_target_bytes().min(max_size - size_bytes);
                while inner.total_size > target {
                    match inner.pop_lru() {
                        Some(entry) => released.push((entry, EvictionReason::Size)),
                        None => break,
                    }
                }
            }

            inner.total_size += size_bytes;
            inner
                .entries
                .put(url.to_string(), CacheEntry::new(url, buffer, size_bytes, origin, now));
        }

        if let Some(buffer) = replaced {
            self.release_buffer(url, &buffer);
        }
        self.release(released);

        debug!(url = %redact_url(url), size_bytes, ?origin, "Cached audio resource");
        self.emit(CacheEvent::Stored {
            url: url.to_string(),
            size_bytes,
        });

        PutOutcome::Cached
    }

    /// Evict least-recently-used entries until `target` is met.
    ///
    /// Returns the number of entries evicted.
    pub fn evict(&self, target: EvictionTarget) -> usize {
        let released: Released = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            let mut released = Vec::new();

            match target {
                EvictionTarget::Bytes(bytes) => {
                    while inner.total_size > bytes {
                        match inner.pop_lru() {
                            Some(entry) => released.push((entry, EvictionReason::Size)),
                            None => break,
                        }
                    }
                }
                EvictionTarget::Count(count) => {
                    while inner.entries.len() > count {
                        match inner.pop_lru() {
                            Some(entry) => released.push((entry, EvictionReason::Capacity)),
                            None => break,
                        }
                    }
                }
            }
            released
        };

        let evicted = released.len();
        self.release(released);
        evicted
    }

    /// Evict `fraction` of the current entries, least recently used first.
    ///
    /// The count rounds up, so any non-zero fraction of a non-empty cache
    /// evicts at least one entry.
    pub fn evict_fraction(&self, fraction: f64) -> usize {
        let fraction = fraction.clamp(0.0, 1.0);

        let released: Released = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            let count = (inner.entries.len() as f64 * fraction).ceil() as usize;

            (0..count)
                .filter_map(|_| inner.pop_lru())
                .map(|entry| (entry, EvictionReason::MemoryPressure))
                .collect()
        };

        let evicted = released.len();
        if evicted > 0 {
            info!(evicted, fraction, "Trimmed audio cache");
        }
        self.release(released);
        evicted
    }

    /// Remove every entry older than the expiry window.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let expired = self
            .inner
            .lock()
            .take_expired(now, self.config.expiry_window);

        let count = expired.len();
        if count > 0 {
            debug!(count, "Swept expired audio resources");
        }
        self.release(
            expired
                .into_iter()
                .map(|entry| (entry, EvictionReason::Expired))
                .collect(),
        );
        count
    }

    /// Remove a single entry. Returns `false` if it was not cached.
    pub fn remove(&self, url: &str) -> bool {
        let removed = self.inner.lock().remove(url);
        match removed {
            Some(entry) => {
                self.release(vec![(entry, EvictionReason::Removed)]);
                true
            }
            None => false,
        }
    }

    /// Release every cached resource. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let drained = {
            let mut inner = self.inner.lock();
            inner.total_size = 0;
            std::mem::replace(&mut inner.entries, LruCache::unbounded())
        };

        let mut cleared = 0;
        for (url, entry) in drained {
            self.release_buffer(&url, &entry.buffer);
            cleared += 1;
        }

        info!("Cleared {} audio resources from cache", cleared);
        self.emit(CacheEvent::Cleared { entries: cleared });
        cleared
    }

    /// Cached URLs, most recently used first.
    pub fn keys(&self) -> Vec<String> {
        self.inner
            .lock()
            .entries
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_size(&self) -> u64 {
        self.inner.lock().total_size
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            item_count: inner.entries.len(),
            total_size: inner.total_size,
            max_size: self.config.max_cache_size_bytes,
            max_items: self.config.max_cache_items,
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            expired: inner.expired,
        }
    }

    fn release(&self, released: Released) {
        for (entry, reason) in released {
            self.release_buffer(&entry.url, &entry.buffer);
            debug!(
                url = %redact_url(&entry.url),
                ?reason,
                size_bytes = entry.size_bytes,
                "Evicted audio resource"
            );
            self.emit(CacheEvent::Evicted {
                url: entry.url,
                reason,
            });
        }
    }

    fn release_buffer(&self, url: &str, buffer: &AudioBuffer) {
        if let Err(e) = self.backend.release_buffer(buffer) {
            warn!(url = %redact_url(url), error = %e, "Failed to release audio buffer");
        }
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Cache(event)).ok();
        }
    }
}

impl std::fmt::Debug for AudioCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("AudioCache")
            .field("entries", &inner.entries.len())
            .field("total_size", &inner.total_size)
            .field("config", &self.config)
            .finish()
    }
}
