//! # Resource Loader
//!
//! The only component that performs I/O: fetch bytes, decode them, insert the
//! result into the cache. It never retries; every failure is reported once as
//! a [`LoadError`].

use crate::cache::{AudioCache, EntryOrigin, PutOutcome};
use crate::error::LoadError;
use bridge_traits::{AudioBackend, AudioBuffer, DecodeMode, HttpClient, HttpRequest};
use core_runtime::logging::redact_url;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// How far a load must progress before it resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStrategy {
    /// Resolve once fully fetched and decoded.
    #[default]
    Auto,
    /// Resolve once duration and playability are known.
    Metadata,
}

impl LoadStrategy {
    pub fn decode_mode(self) -> DecodeMode {
        match self {
            LoadStrategy::Auto => DecodeMode::Full,
            LoadStrategy::Metadata => DecodeMode::Metadata,
        }
    }
}

/// A resource handed back by the loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedAudio {
    pub buffer: AudioBuffer,
    pub size_bytes: u64,
    /// `false` when the resource was too large to cache; the holder then owns
    /// the buffer and must release it.
    pub cached: bool,
}

/// Fetches and decodes pronunciation audio.
pub struct ResourceLoader {
    http_client: Arc<dyn HttpClient>,
    backend: Arc<dyn AudioBackend>,
    cache: Arc<AudioCache>,
    timeout: Duration,
}

impl ResourceLoader {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        backend: Arc<dyn AudioBackend>,
        cache: Arc<AudioCache>,
        timeout: Duration,
    ) -> Self {
        Self {
            http_client,
            backend,
            cache,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch and decode `url`, then insert the result into the cache.
    ///
    /// The deadline covers fetch and decode together. A successful load is
    /// always inserted, even if an identical entry appeared meanwhile.
    #[instrument(skip(self, url), fields(url = %redact_url(url)))]
    pub async fn load(
        &self,
        url: &str,
        strategy: LoadStrategy,
        origin: EntryOrigin,
    ) -> Result<LoadedAudio, LoadError> {
        let (buffer, size_bytes) = tokio::time::timeout(self.timeout, self.fetch_and_decode(url, strategy))
            .await
            .map_err(|_| {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Audio load timed out");
                LoadError::Timeout {
                    url: url.to_string(),
                    timeout: self.timeout,
                }
            })??;

        let loaded = match self.cache.put(url, buffer.clone(), size_bytes, origin) {
            PutOutcome::Cached => LoadedAudio {
                buffer,
                size_bytes,
                cached: true,
            },
            PutOutcome::Uncached(buffer) => LoadedAudio {
                buffer,
                size_bytes,
                cached: false,
            },
        };

        debug!(size_bytes, cached = loaded.cached, ?strategy, "Audio loaded");
        Ok(loaded)
    }

    /// Serve `url` from the cache when it holds a buffer good enough for
    /// `strategy`, otherwise load it.
    ///
    /// A metadata-only entry does not satisfy [`LoadStrategy::Auto`]; the full
    /// load replaces it.
    pub async fn obtain(
        &self,
        url: &str,
        strategy: LoadStrategy,
        origin: EntryOrigin,
    ) -> Result<LoadedAudio, LoadError> {
        if let Some(buffer) = self.cache.get(url) {
            if strategy == LoadStrategy::Metadata || buffer.is_fully_decoded() {
                let size_bytes = self.cache.peek(url).map(|e| e.size_bytes).unwrap_or(0);
                return Ok(LoadedAudio {
                    buffer,
                    size_bytes,
                    cached: true,
                });
            }
            debug!(url = %redact_url(url), "Cached entry is metadata-only, loading full audio");
        }

        self.load(url, strategy, origin).await
    }

    async fn fetch_and_decode(
        &self,
        url: &str,
        strategy: LoadStrategy,
    ) -> Result<(AudioBuffer, u64), LoadError> {
        let request = HttpRequest::get(url)
            .header("Accept", "audio/*")
            .timeout(self.timeout);

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| LoadError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if !response.is_success() {
            return Err(LoadError::Network {
                url: url.to_string(),
                message: format!("HTTP {}", response.status),
            });
        }

        let transfer_length = response
            .content_length()
            .or_else(|| (!response.body.is_empty()).then_some(response.body.len() as u64));

        let buffer = self
            .backend
            .decode(response.body, strategy.decode_mode())
            .await
            .map_err(|e| LoadError::Decode {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let size_bytes = transfer_length
            .or_else(|| buffer.duration.map(|d| self.cache.config().estimate_size(d)))
            .unwrap_or(0);

        Ok((buffer, size_bytes))
    }
}
