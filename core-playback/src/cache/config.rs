//! Cache configuration and limits

use crate::config::duration_ms;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the audio resource cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum total size of cached resources in bytes (default: 50MB)
    #[serde(default = "default_max_cache_size_bytes")]
    pub max_cache_size_bytes: u64,

    /// Maximum number of cached resources (default: 100)
    #[serde(default = "default_max_cache_items")]
    pub max_cache_items: usize,

    /// Entries older than this are swept regardless of pressure (default: 24h)
    #[serde(default = "default_expiry_window", with = "duration_ms")]
    pub expiry_window: Duration,

    /// Fraction of the byte budget that size pressure evicts down to (default: 0.8)
    #[serde(default = "default_size_target_ratio")]
    pub size_target_ratio: f64,

    /// Bitrate used to estimate size when the transfer length is unknown
    /// (default: 128 kbps)
    #[serde(default = "default_assumed_bitrate_bps")]
    pub assumed_bitrate_bps: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_cache_size_bytes: default_max_cache_size_bytes(),
            max_cache_items: default_max_cache_items(),
            expiry_window: default_expiry_window(),
            size_target_ratio: default_size_target_ratio(),
            assumed_bitrate_bps: default_assumed_bitrate_bps(),
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum cache size.
    pub fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_cache_size_bytes = bytes;
        self
    }

    /// Set maximum number of entries.
    pub fn with_max_items(mut self, items: usize) -> Self {
        self.max_cache_items = items;
        self
    }

    /// Set expiry window.
    pub fn with_expiry_window(mut self, window: Duration) -> Self {
        self.expiry_window = window;
        self
    }

    /// Set the ratio size pressure evicts down to.
    pub fn with_size_target_ratio(mut self, ratio: f64) -> Self {
        self.size_target_ratio = ratio;
        self
    }

    pub fn with_assumed_bitrate(mut self, bits_per_second: u32) -> Self {
        self.assumed_bitrate_bps = bits_per_second;
        self
    }

    /// Byte level that size-pressure eviction aims for.
    pub fn size_target_bytes(&self) -> u64 {
        (self.max_cache_size_bytes as f64 * self.size_target_ratio) as u64
    }

    /// Estimate a resource's size from its duration: `duration × bitrate / 8`.
    pub fn estimate_size(&self, duration: Duration) -> u64 {
        (duration.as_secs_f64() * f64::from(self.assumed_bitrate_bps) / 8.0).ceil() as u64
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_cache_size_bytes == 0 {
            return Err("max_cache_size_bytes must be greater than 0".to_string());
        }

        if self.max_cache_items == 0 {
            return Err("max_cache_items must be at least 1".to_string());
        }

        if self.expiry_window.is_zero() {
            return Err("expiry_window must be greater than 0".to_string());
        }

        if !(self.size_target_ratio > 0.0 && self.size_target_ratio <= 1.0) {
            return Err("size_target_ratio must be in (0.0, 1.0]".to_string());
        }

        if self.assumed_bitrate_bps == 0 {
            return Err("assumed_bitrate_bps must be greater than 0".to_string());
        }

        Ok(())
    }
}

fn default_max_cache_size_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_max_cache_items() -> usize {
    100
}

fn default_expiry_window() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_size_target_ratio() -> f64 {
    0.8
}

fn default_assumed_bitrate_bps() -> u32 {
    128_000
}
