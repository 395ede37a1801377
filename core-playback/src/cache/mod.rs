//! # Audio Resource Cache
//!
//! Memory-resident store of decoded pronunciation audio, keyed by source URL.
//!
//! ## Overview
//!
//! - Item-count and byte-size limits, both enforced on every insert
//! - LRU eviction; size pressure evicts down to a target ratio of the byte
//!   budget (80% by default) so inserts do not thrash at the boundary
//! - Time-based expiry (24h by default), swept before capacity checks
//! - Evicted buffers are released through the host audio engine
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │     AudioCache                         │
//! │  - get() / put()                       │
//! │  - evict() / evict_fraction()          │
//! │  - sweep_expired()                     │
//! └────────┬───────────────────────────────┘
//!          │
//!          ├──> LruCache<String, CacheEntry> (parking_lot::Mutex)
//!          ├──> AudioBackend (release_buffer)
//!          ├──> Clock (timestamps, expiry)
//!          └──> EventBus (optional)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::cache::{AudioCache, CacheConfig, EntryOrigin};
//!
//! let cache = AudioCache::new(CacheConfig::default(), backend, clock);
//! cache.put("https://cdn.example/hello.mp3", buffer, 24_000, EntryOrigin::OnDemand);
//!
//! if let Some(buffer) = cache.get("https://cdn.example/hello.mp3") {
//!     // play it
//! }
//! println!("{} entries", cache.stats().item_count);
//! ```

pub mod config;
pub mod entry;
pub mod stats;
pub mod store;

pub use config::CacheConfig;
pub use entry::{CacheEntry, EntryOrigin};
pub use stats::CacheStats;
pub use store::{AudioCache, EvictionTarget, PutOutcome};
