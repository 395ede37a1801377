//! Facade crate for the vocabulary audio core.
//!
//! Re-exports the workspace crates so a host application can depend on
//! `vocab-audio` alone. The default `desktop-shims` feature supplies a
//! reqwest-backed `HttpClient` when none is injected.

pub use bridge_traits;
pub use core_playback;
pub use core_runtime;

pub use core_playback::{
    AudioConfig, AudioService, LoadError, PlayOptions, PlaybackError, PreloadOptions,
    PreloadPriority, RetryOutcome,
};
pub use core_runtime::config::CoreConfig;
pub use core_runtime::logging::{init_logging, LoggingConfig};
