//! # Host Bridge Traits
//!
//! Capabilities the audio core needs from its host but cannot implement
//! itself.
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Fetch raw audio bytes
//!
//! ### Audio
//! - [`AudioBackend`](playback::AudioBackend) - Decode bytes and drive a gain-controllable output graph
//! - [`SpeechSynthesizer`](speech::SpeechSynthesizer) - Text-to-speech fallback
//!
//! ### Platform Integration
//! - [`LifecycleObserver`](lifecycle::LifecycleObserver) - Page visibility transitions
//! - [`MemoryTelemetry`](lifecycle::MemoryTelemetry) - Optional heap usage sampling
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation | Status |
//! |----------|----------------|--------|
//! | Desktop  | `bridge-desktop` (HTTP, lifecycle) | ✅ |
//! | Web      | host-provided Web Audio / speechSynthesis adapters | 📋 Planned |
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Adapters should
//! translate platform failures into it with enough context (URL, codec) for the
//! core to classify them.
//!
//! ## Thread Safety
//!
//! Native builds require `Send + Sync` (see [`platform`]); `wasm32` builds drop
//! those bounds because browser handles are single-threaded.

pub mod error;
pub mod http;
pub mod lifecycle;
pub mod platform;
pub mod playback;
pub mod speech;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use lifecycle::{
    HeapUsage, LifecycleChangeStream, LifecycleObserver, LifecycleState, MemoryTelemetry,
};
pub use playback::{
    AudioBackend, AudioBuffer, BufferId, DecodeMode, StartedVoice, VoiceId, VoiceOutcome,
    VoiceParams,
};
pub use speech::{SpeechOptions, SpeechSynthesizer};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
