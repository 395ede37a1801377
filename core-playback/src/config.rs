//! # Audio Configuration
//!
//! Tunables for the audio service. Every field has a serde default, so a host
//! can ship a partial JSON document and override only what it needs.
//!
//! ```
//! use core_playback::config::AudioConfig;
//!
//! let config = AudioConfig::from_json(r#"{ "cache": { "max_cache_items": 3 } }"#).unwrap();
//! assert_eq!(config.cache.max_cache_items, 3);
//! assert_eq!(config.preload_batch_size, 3);
//! ```

use crate::cache::CacheConfig;
use crate::error::{PlaybackError, Result};
use crate::memory::MemoryPressureConfig;
use crate::retry::RetryPolicy;
use bridge_traits::SpeechOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Audio service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default)]
    pub cache: CacheConfig,

    /// Deadline for fetch plus decode of a single resource.
    ///
    /// Default: 10 seconds.
    #[serde(default = "default_load_timeout", with = "duration_ms")]
    pub load_timeout: Duration,

    /// How many preloads run concurrently in one batch.
    ///
    /// Default: 3.
    #[serde(default = "default_preload_batch_size")]
    pub preload_batch_size: usize,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub memory: MemoryPressureConfig,

    /// Utterance settings for text playback and the speech fallback.
    #[serde(default)]
    pub speech: SpeechOptions,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            load_timeout: default_load_timeout(),
            preload_batch_size: default_preload_batch_size(),
            retry: RetryPolicy::default(),
            memory: MemoryPressureConfig::default(),
            speech: SpeechOptions::default(),
        }
    }
}

impl AudioConfig {
    /// Parse a (possibly partial) JSON document and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: AudioConfig = serde_json::from_str(json)
            .map_err(|e| PlaybackError::Config(format!("Invalid audio configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        self.cache.validate().map_err(PlaybackError::Config)?;
        self.retry.validate().map_err(PlaybackError::Config)?;
        self.memory.validate().map_err(PlaybackError::Config)?;

        if self.load_timeout.is_zero() {
            return Err(PlaybackError::Config(
                "load_timeout must be greater than 0".to_string(),
            ));
        }

        if self.preload_batch_size == 0 {
            return Err(PlaybackError::Config(
                "preload_batch_size must be at least 1".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.speech.volume) {
            return Err(PlaybackError::Config(
                "speech.volume must be between 0.0 and 1.0".to_string(),
            ));
        }

        Ok(())
    }
}

fn default_load_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_preload_batch_size() -> usize {
    3
}

/// Serialize `Duration` as integer milliseconds.
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
