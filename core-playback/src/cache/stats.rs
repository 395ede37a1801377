//! Cache statistics and monitoring

use serde::{Deserialize, Serialize};

/// Point-in-time statistics about the audio cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cached resources
    pub item_count: usize,

    /// Total bytes accounted to cached resources
    pub total_size: u64,

    /// Byte budget
    pub max_size: u64,

    /// Item budget
    pub max_items: usize,

    pub hits: u64,
    pub misses: u64,

    /// Entries removed under count, size or memory pressure
    pub evictions: u64,

    /// Entries removed by the expiry sweep
    pub expired: u64,
}

impl CacheStats {
    /// Calculate cache usage as a percentage of max size.
    pub fn usage_percentage(&self) -> f64 {
        if self.max_size == 0 {
            return 0.0;
        }

        (self.total_size as f64 / self.max_size as f64) * 100.0
    }

    /// Returns true if the cache is near capacity (>90% of bytes or items).
    pub fn is_near_capacity(&self) -> bool {
        let items_ratio = if self.max_items == 0 {
            0.0
        } else {
            self.item_count as f64 / self.max_items as f64
        };
        self.usage_percentage() > 90.0 || items_ratio > 0.9
    }

    /// Fraction of lookups served from the cache.
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            return 0.0;
        }
        self.hits as f64 / lookups as f64
    }

    /// Returns average bytes per entry.
    pub fn average_entry_size(&self) -> u64 {
        if self.item_count == 0 {
            0
        } else {
            self.total_size / self.item_count as u64
        }
    }
}
