//! Speech synthesis bridge.
//!
//! Used as the last resort when a recorded pronunciation cannot be played.
//! Browsers expose this through `speechSynthesis`; voices differ per device,
//! so callers check language support before relying on it.

use crate::{error::Result, platform::PlatformSendSync};
use serde::{Deserialize, Serialize};

/// Utterance parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechOptions {
    /// BCP 47 language tag, e.g. `en-US`.
    pub lang: String,
    /// Speaking rate, 1.0 is normal speed.
    pub rate: f32,
    /// Voice pitch, 1.0 is the voice default.
    pub pitch: f32,
    /// Output volume in `0.0..=1.0`.
    pub volume: f32,
}

impl Default for SpeechOptions {
    fn default() -> Self {
        Self {
            lang: "en-US".to_string(),
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

impl SpeechOptions {
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch;
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume.clamp(0.0, 1.0);
        self
    }
}

/// Text-to-speech engine.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait SpeechSynthesizer: PlatformSendSync {
    /// Speak `text` and resolve once the utterance has finished.
    async fn speak(&self, text: &str, options: &SpeechOptions) -> Result<()>;

    /// Whether a voice exists for `lang`.
    fn is_language_supported(&self, lang: &str) -> bool;

    /// Whether the engine is usable at all on this host.
    fn is_available(&self) -> bool {
        true
    }

    /// Cancel the utterance in progress, if any.
    fn cancel(&self) {}
}
