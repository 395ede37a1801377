//! # Audio Service
//!
//! The surface the flashcard UI talks to. Wires the cache, loader, preload
//! scheduler, session manager, retry coordinator and memory monitor together
//! from an injected [`CoreConfig`] and [`AudioConfig`]. There is no global
//! instance; the host builds one and keeps it for the app's lifetime.
//!
//! ```ignore
//! let core = CoreConfig::builder()
//!     .http_client(Arc::new(fetch))
//!     .audio_backend(Arc::new(web_audio))
//!     .speech_synthesizer(Arc::new(speech))
//!     .enable_speech_fallback(true)
//!     .build()?;
//! let service = AudioService::new(core, AudioConfig::default())?;
//!
//! service.preload_audio(urls, PreloadOptions::default());
//! service
//!     .play_audio("https://cdn.example.com/apple.mp3", PlayOptions::default(), Some("apple"))
//!     .await?;
//! ```

use crate::cache::{AudioCache, CacheStats};
use crate::capabilities::SupportedCapabilities;
use crate::config::AudioConfig;
use crate::error::Result;
use crate::loader::ResourceLoader;
use crate::memory::MemoryMonitor;
use crate::preload::{PreloadOptions, PreloadScheduler};
use crate::retry::{Fallback, RetryCoordinator, RetryOutcome, SpeechFallback};
use crate::session::{PlayOptions, PlaySource, SessionManager, SessionSnapshot, TrackClaim};
use core_runtime::config::CoreConfig;
use core_runtime::events::EventStream;
use core_runtime::logging::redact_url;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

struct MonitorTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Pronunciation audio for the flashcard app.
pub struct AudioService {
    core: CoreConfig,
    config: AudioConfig,
    capabilities: SupportedCapabilities,
    cache: Arc<AudioCache>,
    scheduler: PreloadScheduler,
    sessions: Arc<SessionManager>,
    retry: RetryCoordinator,
    memory: Arc<MemoryMonitor>,
    monitor: Mutex<Option<MonitorTask>>,
}

impl AudioService {
    /// Build the service. Fails if a feature flag lacks its bridge or a
    /// tunable is out of range.
    pub fn new(core: CoreConfig, config: AudioConfig) -> Result<Self> {
        core.validate()?;
        config.validate()?;

        let capabilities = SupportedCapabilities::negotiate(&core);
        let event_bus = core.event_bus.clone();

        let cache = Arc::new(
            AudioCache::new(
                config.cache.clone(),
                Arc::clone(&core.audio_backend),
                Arc::clone(&core.clock),
            )
            .with_event_bus(event_bus.clone()),
        );

        let loader = Arc::new(ResourceLoader::new(
            Arc::clone(&core.http_client),
            Arc::clone(&core.audio_backend),
            Arc::clone(&cache),
            config.load_timeout,
        ));

        let scheduler = PreloadScheduler::new(
            Arc::clone(&loader),
            Arc::clone(&cache),
            config.preload_batch_size,
            Some(event_bus.clone()),
        );

        let mut sessions = SessionManager::new(Arc::clone(&loader), Arc::clone(&core.audio_backend))
            .with_event_bus(event_bus.clone());
        if let Some(synthesizer) = &core.speech_synthesizer {
            sessions = sessions.with_speech(Arc::clone(synthesizer), config.speech.clone());
        }

        let retry = RetryCoordinator::new(config.retry.clone()).with_event_bus(event_bus.clone());

        let mut memory = MemoryMonitor::new(Arc::clone(&cache), config.memory.clone())
            .with_event_bus(event_bus);
        if core.features.enable_memory_monitor {
            if let Some(lifecycle) = &core.lifecycle_observer {
                memory = memory.with_lifecycle(Arc::clone(lifecycle));
            }
        }
        if let Some(telemetry) = &core.memory_telemetry {
            memory = memory.with_telemetry(Arc::clone(telemetry));
        }

        info!(
            max_cache_items = config.cache.max_cache_items,
            max_cache_size_bytes = config.cache.max_cache_size_bytes,
            speech_fallback = core.features.enable_speech_fallback,
            "Audio service initialized"
        );

        Ok(Self {
            core,
            config,
            capabilities,
            cache,
            scheduler,
            sessions: Arc::new(sessions),
            retry,
            memory: Arc::new(memory),
            monitor: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    pub fn capabilities(&self) -> SupportedCapabilities {
        self.capabilities
    }

    /// Queue URLs for background loading. Returns how many were newly queued.
    pub fn preload_audio<I, S>(&self, urls: I, options: PreloadOptions) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scheduler.preload(urls, options)
    }

    /// Resolves once every queued preload has settled.
    pub async fn wait_preload_idle(&self) {
        self.scheduler.wait_idle().await;
    }

    /// Play a recorded pronunciation, retrying on failure.
    ///
    /// When retries run out and `fallback_text` is given, the text is spoken
    /// on the same track instead (if the speech fallback is enabled and a
    /// voice is available). A later play or a stop on the track abandons
    /// pending retries and the fallback; the outcome is then
    /// [`RetryOutcome::Cancelled`].
    #[instrument(skip(self, url, options, fallback_text), fields(url = %redact_url(url)))]
    pub async fn play_audio(
        &self,
        url: &str,
        options: PlayOptions,
        fallback_text: Option<&str>,
    ) -> Result<RetryOutcome<SessionSnapshot>> {
        self.retry.reset(url);

        let source = PlaySource::url(url);
        let claim = self.sessions.claim(&options.track_for(&source));

        let fallback = fallback_text.and_then(|text| self.speech_fallback(&claim, text, &options));
        if fallback_text.is_some() && fallback.is_none() {
            debug!("Speech fallback not available for this play");
        }

        self.retry
            .execute_until(
                url,
                || {
                    self.sessions
                        .play_claimed(&claim, source.clone(), options.clone())
                },
                fallback,
                claim.token(),
            )
            .await
    }

    /// Speak `text` on its own track (or `options.track_id`).
    pub async fn speak(&self, text: &str, options: PlayOptions) -> Result<SessionSnapshot> {
        self.sessions.play(PlaySource::text(text), options).await
    }

    pub async fn stop_audio(&self, track_id: &str, fade_out: Duration) -> bool {
        self.sessions.stop(track_id, fade_out).await
    }

    pub fn set_volume(&self, track_id: &str, volume: f32) -> bool {
        self.sessions.set_volume(track_id, volume)
    }

    /// Stop every session immediately.
    pub async fn pause_all(&self) -> usize {
        self.sessions.pause_all().await
    }

    pub fn session(&self, track_id: &str) -> Option<SessionSnapshot> {
        self.sessions.session(track_id)
    }

    pub fn active_tracks(&self) -> Vec<String> {
        self.sessions.active_tracks()
    }

    pub fn get_cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) -> usize {
        self.cache.clear()
    }

    /// Subscribe to cache, preload, playback and memory events.
    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.core.event_bus.subscribe())
    }

    /// Start the background memory monitor. Returns `false` if it is already
    /// running.
    pub async fn start_memory_monitor(&self) -> bool {
        if self.monitor.lock().is_some() {
            return false;
        }

        let token = CancellationToken::new();
        let handle = Arc::clone(&self.memory).start(token.clone()).await;

        let mut monitor = self.monitor.lock();
        if monitor.is_some() {
            // Lost a race with a concurrent start.
            token.cancel();
            return false;
        }
        *monitor = Some(MonitorTask { token, handle });
        true
    }

    /// Stop the monitor, every session, and release the whole cache.
    pub async fn shutdown(&self) {
        let task = self.monitor.lock().take();
        if let Some(task) = task {
            task.token.cancel();
            if let Err(e) = task.handle.await {
                warn!(error = %e, "Memory monitor task ended abnormally");
            }
        }

        self.sessions.stop_all(Duration::ZERO).await;
        let cleared = self.cache.clear();
        info!(cleared, "Audio service shut down");
    }

    fn speech_fallback(
        &self,
        claim: &TrackClaim,
        text: &str,
        options: &PlayOptions,
    ) -> Option<Fallback> {
        if !self.core.features.enable_speech_fallback || !self.capabilities.speech {
            return None;
        }
        let fallback =
            SpeechFallback::new(Arc::clone(&self.sessions), claim.clone(), options.clone());
        Some(fallback.into_fallback(text))
    }
}
