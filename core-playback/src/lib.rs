//! # Pronunciation Audio Core
//!
//! Audio resource cache and playback manager for the vocabulary flashcard
//! app.
//!
//! ## Overview
//!
//! This crate handles:
//! - A bounded, LRU-evicted cache of decoded pronunciation audio with expiry
//! - Priority-ordered, batched background preloading
//! - Fetch + decode with a single timeout and one error taxonomy
//! - Playback sessions with per-track exclusivity, fades and volume control
//! - Linear-backoff retries with a speech synthesis fallback
//! - Cache trimming on page hide and heap pressure
//!
//! ## Components
//!
//! ```text
//! AudioService
//!   ├── PreloadScheduler ──┐
//!   ├── SessionManager ────┼──> ResourceLoader ──> HttpClient / AudioBackend
//!   │        ▲             └──────────┬──────────> AudioCache
//!   ├── RetryCoordinator (wraps play) │
//!   └── MemoryMonitor ────────────────┘ (evict_fraction, sweep_expired)
//! ```
//!
//! Host capabilities arrive through [`core_runtime::config::CoreConfig`];
//! tunables through [`config::AudioConfig`].

pub mod cache;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod loader;
pub mod memory;
pub mod preload;
pub mod retry;
pub mod service;
pub mod session;

pub use cache::{AudioCache, CacheConfig, CacheStats, EntryOrigin};
pub use capabilities::SupportedCapabilities;
pub use config::AudioConfig;
pub use error::{LoadError, PlaybackError, Result};
pub use loader::{LoadStrategy, LoadedAudio, ResourceLoader};
pub use memory::{MemoryMonitor, MemoryPressureConfig};
pub use preload::{PreloadOptions, PreloadPriority, PreloadScheduler};
pub use retry::{Fallback, RetryCoordinator, RetryOutcome, RetryPolicy, SpeechFallback};
pub use service::AudioService;
pub use session::{
    PlayOptions, PlaySource, SessionManager, SessionSnapshot, SessionState, TrackClaim,
};
