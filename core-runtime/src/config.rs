//! # Core Configuration Module
//!
//! Collects the host bridges the audio core runs on.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! holding every capability the audio service needs. Validation is fail-fast:
//! a missing required bridge is reported at build time with an actionable
//! message instead of surfacing as a failure on first playback.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - Fetches pronunciation audio (desktop default: reqwest)
//! - `AudioBackend` - Decodes and renders audio
//!
//! ## Optional Dependencies
//!
//! - `SpeechSynthesizer` - Text-to-speech, used for text playback and as the
//!   fallback when audio playback keeps failing
//! - `LifecycleObserver` - Page visibility, drives memory trimming
//! - `MemoryTelemetry` - Heap usage samples
//! - `Clock` - Time source (default: system clock)
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .http_client(Arc::new(MyFetch))
//!     .audio_backend(Arc::new(MyWebAudio))
//!     .speech_synthesizer(Arc::new(MySpeech))
//!     .enable_speech_fallback(true)
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // No audio backend: fails with CapabilityMissing
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing required bridges");
//! ```

use crate::error::{Error, Result};
use crate::events::EventBus;
use bridge_traits::{
    AudioBackend, Clock, HttpClient, LifecycleObserver, MemoryTelemetry, SpeechSynthesizer,
    SystemClock,
};
use std::sync::Arc;

/// Host capabilities and feature switches for the audio core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Network fetch (required)
    pub http_client: Arc<dyn HttpClient>,

    /// Decode and output engine (required)
    pub audio_backend: Arc<dyn AudioBackend>,

    /// Text-to-speech engine (optional)
    pub speech_synthesizer: Option<Arc<dyn SpeechSynthesizer>>,

    /// Page visibility transitions (optional)
    pub lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,

    /// Heap usage sampling (optional)
    pub memory_telemetry: Option<Arc<dyn MemoryTelemetry>>,

    /// Wall clock used for cache timestamps and expiry
    pub clock: Arc<dyn Clock>,

    /// Bus that components publish on
    pub event_bus: EventBus,

    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("http_client", &"HttpClient { ... }")
            .field("audio_backend", &"AudioBackend { ... }")
            .field(
                "speech_synthesizer",
                &self
                    .speech_synthesizer
                    .as_ref()
                    .map(|_| "SpeechSynthesizer { ... }"),
            )
            .field(
                "lifecycle_observer",
                &self
                    .lifecycle_observer
                    .as_ref()
                    .map(|_| "LifecycleObserver { ... }"),
            )
            .field(
                "memory_telemetry",
                &self
                    .memory_telemetry
                    .as_ref()
                    .map(|_| "MemoryTelemetry { ... }"),
            )
            .field("event_bus", &self.event_bus)
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional functionality.
///
/// Enabling a feature without the bridge it depends on fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureFlags {
    /// Speak the word when audio playback exhausts its retries
    /// (requires SpeechSynthesizer)
    pub enable_speech_fallback: bool,

    /// Trim the cache on visibility changes and heap pressure
    /// (requires LifecycleObserver)
    pub enable_memory_monitor: bool,
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Checks feature flags against the bridges that were provided.
    pub fn validate(&self) -> Result<()> {
        if self.features.enable_speech_fallback && self.speech_synthesizer.is_none() {
            return Err(Error::Config(
                "Speech fallback enabled but no SpeechSynthesizer provided. \
                 Disable the feature or inject a SpeechSynthesizer implementation."
                    .to_string(),
            ));
        }

        if self.features.enable_memory_monitor && self.lifecycle_observer.is_none() {
            return Err(Error::Config(
                "Memory monitor enabled but no LifecycleObserver provided. \
                 Disable the feature or inject a LifecycleObserver implementation."
                    .to_string(),
            ));
        }

        Ok(())
    }
}

fn audio_backend_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "AudioBackend".to_string(),
        message: "AudioBackend implementation is required to decode and play audio. \
                 Web: inject a Web Audio adapter (AudioContext + GainNode). \
                 Desktop: inject a native mixer adapter."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::new()
        .map_err(|e| Error::Internal(format!("Failed to create default HttpClient: {}", e)))?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required to fetch pronunciation audio. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default ReqwestHttpClient. \
                 Web: inject a fetch()-based client."
            .to_string(),
    })
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    http_client: Option<Arc<dyn HttpClient>>,
    audio_backend: Option<Arc<dyn AudioBackend>>,
    speech_synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,
    memory_telemetry: Option<Arc<dyn MemoryTelemetry>>,
    clock: Option<Arc<dyn Clock>>,
    event_bus: Option<EventBus>,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn audio_backend(mut self, backend: Arc<dyn AudioBackend>) -> Self {
        self.audio_backend = Some(backend);
        self
    }

    pub fn speech_synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.speech_synthesizer = Some(synthesizer);
        self
    }

    pub fn lifecycle_observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.lifecycle_observer = Some(observer);
        self
    }

    pub fn memory_telemetry(mut self, telemetry: Arc<dyn MemoryTelemetry>) -> Self {
        self.memory_telemetry = Some(telemetry);
        self
    }

    /// Overrides the wall clock. Tests use a manual clock to step past expiry
    /// windows.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Shares an existing event bus instead of creating a fresh one.
    pub fn event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn enable_speech_fallback(mut self, enabled: bool) -> Self {
        self.features.enable_speech_fallback = enabled;
        self
    }

    pub fn enable_memory_monitor(mut self, enabled: bool) -> Self {
        self.features.enable_memory_monitor = enabled;
        self
    }

    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// - `CapabilityMissing` when the audio backend (or, without
    ///   `desktop-shims`, the HTTP client) was not provided
    /// - `Config` when a feature flag lacks its bridge
    pub fn build(self) -> Result<CoreConfig> {
        let audio_backend = self.audio_backend.ok_or_else(audio_backend_missing_error)?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let config = CoreConfig {
            http_client,
            audio_backend,
            speech_synthesizer: self.speech_synthesizer,
            lifecycle_observer: self.lifecycle_observer,
            memory_telemetry: self.memory_telemetry,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            event_bus: self.event_bus.unwrap_or_default(),
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}
