//! Host capability negotiation.
//!
//! Probed once when the service is built; components consult the result
//! instead of feature-testing the host on every call.

use core_runtime::config::CoreConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

/// What the host can do beyond the required fetch and decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SupportedCapabilities {
    /// Scheduled gain ramps for fades. Without them fades become a single step.
    pub gain_ramps: bool,
    /// A usable speech synthesizer.
    pub speech: bool,
    /// Visibility change notifications.
    pub lifecycle_events: bool,
    /// Heap usage sampling.
    pub heap_telemetry: bool,
}

impl SupportedCapabilities {
    pub fn negotiate(config: &CoreConfig) -> Self {
        let capabilities = Self {
            gain_ramps: config.audio_backend.supports_gain_ramps(),
            speech: config
                .speech_synthesizer
                .as_ref()
                .is_some_and(|synth| synth.is_available()),
            lifecycle_events: config.lifecycle_observer.is_some(),
            heap_telemetry: config.memory_telemetry.is_some(),
        };

        info!(
            gain_ramps = capabilities.gain_ramps,
            speech = capabilities.speech,
            lifecycle_events = capabilities.lifecycle_events,
            heap_telemetry = capabilities.heap_telemetry,
            "Negotiated host audio capabilities"
        );

        capabilities
    }
}
