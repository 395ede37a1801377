//! # Playback Session Manager
//!
//! Owns every sound currently playing. A session is keyed by its track id;
//! starting a new session on a track fully stops the old one first, so one
//! track never has two voices.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle -> Loading -> Playing -> Completed
//!            |          |
//!            +----------+-----> Stopped
//! ```
//!
//! Terminal states discard the record. The voice graph (`source -> gain ->
//! output`) lives in a [`VoiceGraph`] guard; removing a session from the
//! registry drops the guard, which halts the voice on every path, including
//! errors and cancelled futures.
//!
//! ## Claims
//!
//! Every play first takes a [`TrackClaim`] on its track. A later claim, or a
//! stop, revokes it. A revoked claim can no longer start anything on the
//! track, which keeps a retry or speech fallback of an older play from
//! replacing a newer one. A voice fading out after `stop` stays attached to
//! its track until the fade ends, and the next play on the track cuts it off
//! before starting.

use crate::cache::EntryOrigin;
use crate::error::{PlaybackError, Result};
use crate::loader::{LoadStrategy, ResourceLoader};
use bridge_traits::{
    AudioBackend, AudioBuffer, SpeechOptions, SpeechSynthesizer, VoiceId, VoiceOutcome,
    VoiceParams,
};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use core_runtime::logging::redact_url;
use futures::channel::oneshot;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// What to play.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PlaySource {
    /// A recorded pronunciation.
    Url(String),
    /// Text for the speech synthesizer.
    Text(String),
}

impl PlaySource {
    pub fn url(url: impl Into<String>) -> Self {
        PlaySource::Url(url.into())
    }

    pub fn text(text: impl Into<String>) -> Self {
        PlaySource::Text(text.into())
    }

    /// The URL or text; doubles as the default track id.
    pub fn as_str(&self) -> &str {
        match self {
            PlaySource::Url(value) | PlaySource::Text(value) => value,
        }
    }
}

/// Per-play parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayOptions {
    /// Target gain, clamped to `0.0..=1.0`.
    #[serde(default = "default_volume")]
    pub volume: f32,

    #[serde(default = "default_playback_rate")]
    pub playback_rate: f32,

    #[serde(default, rename = "loop")]
    pub looping: bool,

    /// Ramp from silence to `volume` over this long. Zero starts at `volume`.
    #[serde(default, with = "crate::config::duration_ms")]
    pub fade_in: Duration,

    /// Exclusivity key. Defaults to the source URL or text.
    #[serde(default)]
    pub track_id: Option<String>,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            playback_rate: default_playback_rate(),
            looping: false,
            fade_in: Duration::ZERO,
            track_id: None,
        }
    }
}

impl PlayOptions {
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_playback_rate(mut self, rate: f32) -> Self {
        self.playback_rate = rate;
        self
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn with_fade_in(mut self, fade_in: Duration) -> Self {
        self.fade_in = fade_in;
        self
    }

    pub fn with_track_id(mut self, track_id: impl Into<String>) -> Self {
        self.track_id = Some(track_id.into());
        self
    }

    /// The track a play of `source` with these options runs on.
    pub fn track_for(&self, source: &PlaySource) -> String {
        self.track_id
            .clone()
            .unwrap_or_else(|| source.as_str().to_string())
    }
}

fn default_volume() -> f32 {
    1.0
}

fn default_playback_rate() -> f32 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Loading,
    Playing,
    Completed,
    Stopped,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Stopped)
    }
}

/// Read-only view of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub track_id: String,
    pub source: PlaySource,
    pub state: SessionState,
    pub volume: f32,
    pub playback_rate: f32,
    pub looping: bool,
}

/// A started voice. Dropping it halts the voice and releases a buffer the
/// cache did not take.
struct VoiceGraph {
    backend: Arc<dyn AudioBackend>,
    voice: VoiceId,
    owned_buffer: Option<AudioBuffer>,
}

impl Drop for VoiceGraph {
    fn drop(&mut self) {
        if let Err(e) = self.backend.stop_voice(self.voice) {
            warn!(error = %e, "Failed to stop voice");
        }
        if let Some(buffer) = self.owned_buffer.take() {
            if let Err(e) = self.backend.release_buffer(&buffer) {
                warn!(error = %e, "Failed to release uncached audio buffer");
            }
        }
    }
}

enum SessionKind {
    /// Resource still loading.
    Pending,
    Voice(VoiceGraph),
    Speech,
}

struct ActiveSession {
    /// Epoch of the claim the session was started under.
    generation: u64,
    source: PlaySource,
    state: SessionState,
    volume: f32,
    playback_rate: f32,
    looping: bool,
    kind: SessionKind,
}

impl ActiveSession {
    fn snapshot(&self, track_id: &str) -> SessionSnapshot {
        SessionSnapshot {
            track_id: track_id.to_string(),
            source: self.source.clone(),
            state: self.state,
            volume: self.volume,
            playback_rate: self.playback_rate,
            looping: self.looping,
        }
    }
}

/// The right to start sessions on one track.
///
/// Issued by [`SessionManager::claim`]. A later claim on the same track, or a
/// `stop`/`stop_all` covering it, revokes the claim and cancels its token.
#[derive(Debug, Clone)]
pub struct TrackClaim {
    track_id: String,
    epoch: u64,
    token: CancellationToken,
}

impl TrackClaim {
    pub fn track_id(&self) -> &str {
        &self.track_id
    }

    pub fn is_revoked(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancelled when the claim is revoked.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

struct ClaimSlot {
    epoch: u64,
    token: CancellationToken,
}

/// A stopped voice still ramping down.
struct FadingVoice {
    id: u64,
    graph: VoiceGraph,
}

#[derive(Default)]
struct RegistryState {
    sessions: HashMap<String, ActiveSession>,
    claims: HashMap<String, ClaimSlot>,
    fading: HashMap<String, FadingVoice>,
}

impl RegistryState {
    fn holds(&self, claim: &TrackClaim) -> bool {
        self.claims
            .get(&claim.track_id)
            .is_some_and(|slot| slot.epoch == claim.epoch)
    }

    fn revoke(&mut self, track_id: &str) {
        if let Some(slot) = self.claims.remove(track_id) {
            slot.token.cancel();
        }
    }

    fn revoke_all(&mut self) {
        for (_, slot) in self.claims.drain() {
            slot.token.cancel();
        }
    }
}

#[derive(Default)]
struct SessionRegistry {
    state: Mutex<RegistryState>,
    next_generation: AtomicU64,
}

impl SessionRegistry {
    fn next_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed)
    }

    /// Remove the session for `track_id` only if it is still `generation`.
    fn remove_if(&self, track_id: &str, generation: u64) -> Option<ActiveSession> {
        let mut state = self.state.lock();
        if state.sessions.get(track_id)?.generation != generation {
            return None;
        }
        state.sessions.remove(track_id)
    }

    /// Remove a session that ran to its end, releasing its claim as well.
    fn finish(&self, track_id: &str, generation: u64) -> Option<ActiveSession> {
        let mut state = self.state.lock();
        if state.sessions.get(track_id)?.generation != generation {
            return None;
        }
        if state
            .claims
            .get(track_id)
            .is_some_and(|slot| slot.epoch == generation)
        {
            state.claims.remove(track_id);
        }
        state.sessions.remove(track_id)
    }

    /// Take the fading voice on `track_id` if it is still fade `id`.
    fn take_fading(&self, track_id: &str, id: u64) -> Option<FadingVoice> {
        let mut state = self.state.lock();
        if state.fading.get(track_id)?.id != id {
            return None;
        }
        state.fading.remove(track_id)
    }

    #[cfg(test)]
    fn is_current(&self, track_id: &str, generation: u64) -> bool {
        self.state
            .lock()
            .sessions
            .get(track_id)
            .is_some_and(|s| s.generation == generation)
    }
}

/// Plays pronunciations and keeps one session per track.
pub struct SessionManager {
    loader: Arc<ResourceLoader>,
    backend: Arc<dyn AudioBackend>,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    speech_options: SpeechOptions,
    gain_ramps: bool,
    registry: Arc<SessionRegistry>,
    event_bus: Option<EventBus>,
}

impl SessionManager {
    pub fn new(loader: Arc<ResourceLoader>, backend: Arc<dyn AudioBackend>) -> Self {
        let gain_ramps = backend.supports_gain_ramps();
        Self {
            loader,
            backend,
            speech: None,
            speech_options: SpeechOptions::default(),
            gain_ramps,
            registry: Arc::new(SessionRegistry::default()),
            event_bus: None,
        }
    }

    /// Enable text sources.
    pub fn with_speech(
        mut self,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        options: SpeechOptions,
    ) -> Self {
        self.speech = Some(synthesizer);
        self.speech_options = options;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Take the track for a new play, revoking any earlier claim on it.
    ///
    /// The session currently on the track keeps playing until a session is
    /// started under the new claim.
    pub fn claim(&self, track_id: &str) -> TrackClaim {
        let claim = TrackClaim {
            track_id: track_id.to_string(),
            epoch: self.registry.next_generation(),
            token: CancellationToken::new(),
        };
        let previous = self.registry.state.lock().claims.insert(
            track_id.to_string(),
            ClaimSlot {
                epoch: claim.epoch,
                token: claim.token.clone(),
            },
        );
        if let Some(previous) = previous {
            previous.token.cancel();
        }
        claim
    }

    /// Start a session, replacing whatever is playing on the same track.
    ///
    /// For URL sources this resolves once the voice has started; natural end
    /// cleans up in the background. Text sources resolve once the utterance
    /// has been spoken. If the session is stopped or superseded before it
    /// could start, the returned snapshot is in [`SessionState::Stopped`].
    pub async fn play(&self, source: PlaySource, options: PlayOptions) -> Result<SessionSnapshot> {
        let claim = self.claim(&options.track_for(&source));
        self.play_claimed(&claim, source, options).await
    }

    /// Like [`play`](Self::play), on the track held by `claim`.
    ///
    /// `options.track_id` is ignored. Once the claim has been revoked this
    /// starts nothing and returns a [`SessionState::Stopped`] snapshot. A
    /// claim may start several sessions in turn, so retries of one play can
    /// share it.
    pub async fn play_claimed(
        &self,
        claim: &TrackClaim,
        source: PlaySource,
        options: PlayOptions,
    ) -> Result<SessionSnapshot> {
        let track_id = claim.track_id.as_str();
        let session = ActiveSession {
            generation: claim.epoch,
            source: source.clone(),
            state: SessionState::Loading,
            volume: options.volume.clamp(0.0, 1.0),
            playback_rate: options.playback_rate,
            looping: options.looping,
            kind: SessionKind::Pending,
        };

        let (previous, fading) = {
            let mut state = self.registry.state.lock();
            if !state.holds(claim) {
                drop(state);
                debug!(track_id = %track_id, "Claim revoked, not starting");
                return Ok(stopped_snapshot(track_id, source));
            }
            let previous = state.sessions.insert(track_id.to_string(), session);
            (previous, state.fading.remove(track_id))
        };
        if let Some(fading) = fading {
            debug!(track_id = %track_id, "Cutting fade-out short for new session");
            drop(fading);
        }
        if let Some(previous) = previous {
            debug!(track_id = %track_id, "Superseding session on track");
            self.teardown(track_id, previous);
        }

        match source {
            PlaySource::Url(url) => {
                self.play_url(track_id, claim.epoch, &url, options.fade_in)
                    .await
            }
            PlaySource::Text(text) => self.play_text(track_id, claim.epoch, &text).await,
        }
    }

    #[instrument(skip(self, url, fade_in), fields(url = %redact_url(url)))]
    async fn play_url(
        &self,
        track_id: &str,
        generation: u64,
        url: &str,
        fade_in: Duration,
    ) -> Result<SessionSnapshot> {
        let loaded = match self
            .loader
            .obtain(url, LoadStrategy::Auto, EntryOrigin::OnDemand)
            .await
        {
            Ok(loaded) => loaded,
            Err(e) => {
                self.registry.remove_if(track_id, generation);
                self.emit_error(track_id, &e.to_string(), true);
                return Err(e.into());
            }
        };
        let owned_buffer = (!loaded.cached).then(|| loaded.buffer.clone());

        let (snapshot, completion) = {
            let mut state = self.registry.state.lock();
            let Some(session) = state
                .sessions
                .get_mut(track_id)
                .filter(|s| s.generation == generation)
            else {
                drop(state);
                debug!("Session stopped while loading, not starting");
                if let Some(buffer) = owned_buffer {
                    self.release_owned(&buffer);
                }
                return Ok(stopped_snapshot(track_id, PlaySource::url(url)));
            };

            let initial_gain = if fade_in.is_zero() { session.volume } else { 0.0 };
            let params = VoiceParams {
                gain: initial_gain,
                playback_rate: session.playback_rate,
                looping: session.looping,
            };

            let started = match self.backend.start_voice(&loaded.buffer, params) {
                Ok(started) => started,
                Err(e) => {
                    state.sessions.remove(track_id);
                    drop(state);
                    if let Some(buffer) = owned_buffer {
                        self.release_owned(&buffer);
                    }
                    self.emit_error(track_id, &e.to_string(), true);
                    return Err(PlaybackError::Output(e.to_string()));
                }
            };

            if !fade_in.is_zero() {
                self.apply_gain(started.id, session.volume, fade_in);
            }

            session.state = SessionState::Playing;
            session.kind = SessionKind::Voice(VoiceGraph {
                backend: Arc::clone(&self.backend),
                voice: started.id,
                owned_buffer,
            });
            (session.snapshot(track_id), started.completion)
        };

        self.watch_completion(track_id.to_string(), generation, completion);

        info!(track_id = %track_id, "Playback started");
        self.emit(PlaybackEvent::Started {
            track_id: track_id.to_string(),
            url: url.to_string(),
        });
        Ok(snapshot)
    }

    async fn play_text(&self, track_id: &str, generation: u64, text: &str) -> Result<SessionSnapshot> {
        let synthesizer = match self.speech.clone() {
            Some(synthesizer) if synthesizer.is_available() => synthesizer,
            _ => {
                self.registry.remove_if(track_id, generation);
                return Err(PlaybackError::Unavailable("speech synthesis".to_string()));
            }
        };

        if !synthesizer.is_language_supported(&self.speech_options.lang) {
            self.registry.remove_if(track_id, generation);
            return Err(PlaybackError::SpeechUnsupported(
                self.speech_options.lang.clone(),
            ));
        }

        let volume = {
            let mut state = self.registry.state.lock();
            let Some(session) = state
                .sessions
                .get_mut(track_id)
                .filter(|s| s.generation == generation)
            else {
                return Ok(stopped_snapshot(track_id, PlaySource::text(text)));
            };
            session.state = SessionState::Playing;
            session.kind = SessionKind::Speech;
            session.volume
        };

        self.emit(PlaybackEvent::Started {
            track_id: track_id.to_string(),
            url: text.to_string(),
        });

        let options = self.speech_options.clone().with_volume(volume);
        let result = synthesizer.speak(text, &options).await;

        match result {
            Ok(()) => match self.registry.finish(track_id, generation) {
                Some(session) => {
                    self.emit(PlaybackEvent::Completed {
                        track_id: track_id.to_string(),
                    });
                    let mut snapshot = session.snapshot(track_id);
                    snapshot.state = SessionState::Completed;
                    Ok(snapshot)
                }
                None => Ok(stopped_snapshot(track_id, PlaySource::text(text))),
            },
            Err(e) => match self.registry.remove_if(track_id, generation) {
                Some(_) => {
                    self.emit_error(track_id, &e.to_string(), false);
                    Err(PlaybackError::Speech(e.to_string()))
                }
                // Stopped or superseded mid-utterance; a cancelled utterance
                // may report an error, which is expected here.
                None => Ok(stopped_snapshot(track_id, PlaySource::text(text))),
            },
        }
    }

    /// Stop the session on `track_id`, fading out over `fade_out` first.
    ///
    /// Revokes the track's claim, so a pending retry or fallback of the
    /// stopped play never starts. Returns `false` when nothing was playing on
    /// the track. A session still loading is cancelled before it starts; its
    /// load continues and still populates the cache.
    pub async fn stop(&self, track_id: &str, fade_out: Duration) -> bool {
        let session = {
            let mut state = self.registry.state.lock();
            state.revoke(track_id);
            state.sessions.remove(track_id)
        };
        let Some(session) = session else {
            return false;
        };

        self.emit(PlaybackEvent::Stopped {
            track_id: track_id.to_string(),
        });

        match session.kind {
            SessionKind::Voice(graph) if !fade_out.is_zero() => {
                self.apply_gain(graph.voice, 0.0, fade_out);
                let id = self.registry.next_generation();
                let replaced = self
                    .registry
                    .state
                    .lock()
                    .fading
                    .insert(track_id.to_string(), FadingVoice { id, graph });
                drop(replaced);

                tokio::time::sleep(fade_out).await;
                // A new play on the track may already have cut the fade short.
                drop(self.registry.take_fading(track_id, id));
            }
            SessionKind::Speech => self.cancel_speech(),
            SessionKind::Voice(_) | SessionKind::Pending => {}
        }

        debug!(track_id = %track_id, "Session stopped");
        true
    }

    /// Stop every session, sharing one fade. Returns how many were stopped.
    ///
    /// Every claim is revoked, including those of plays waiting to retry.
    pub async fn stop_all(&self, fade_out: Duration) -> usize {
        let drained: Vec<(String, ActiveSession)> = {
            let mut state = self.registry.state.lock();
            state.revoke_all();
            state.sessions.drain().collect()
        };
        let count = drained.len();

        let mut fading = Vec::new();
        let mut replaced = Vec::new();
        for (track_id, session) in drained {
            match session.kind {
                SessionKind::Voice(graph) if !fade_out.is_zero() => {
                    self.apply_gain(graph.voice, 0.0, fade_out);
                    let id = self.registry.next_generation();
                    replaced.extend(
                        self.registry
                            .state
                            .lock()
                            .fading
                            .insert(track_id.clone(), FadingVoice { id, graph }),
                    );
                    fading.push((track_id.clone(), id));
                }
                SessionKind::Speech => self.cancel_speech(),
                SessionKind::Voice(_) | SessionKind::Pending => {}
            }
            self.emit(PlaybackEvent::Stopped { track_id });
        }
        drop(replaced);

        if !fading.is_empty() {
            tokio::time::sleep(fade_out).await;
            for (track_id, id) in fading {
                drop(self.registry.take_fading(&track_id, id));
            }
        }

        if count > 0 {
            info!(count, "Stopped all sessions");
        }
        count
    }

    /// Stop everything immediately. There is no resumable pause.
    pub async fn pause_all(&self) -> usize {
        self.stop_all(Duration::ZERO).await
    }

    /// Change the volume of a session. Returns `false` when the track has no
    /// session.
    ///
    /// A session still loading keeps the value and starts at it.
    pub fn set_volume(&self, track_id: &str, volume: f32) -> bool {
        let volume = volume.clamp(0.0, 1.0);
        let mut state = self.registry.state.lock();
        let Some(session) = state.sessions.get_mut(track_id) else {
            return false;
        };

        session.volume = volume;
        if let SessionKind::Voice(graph) = &session.kind {
            if let Err(e) = self.backend.set_gain(graph.voice, volume) {
                warn!(track_id = %track_id, error = %e, "Failed to set gain");
            }
        }
        true
    }

    pub fn session(&self, track_id: &str) -> Option<SessionSnapshot> {
        self.registry
            .state
            .lock()
            .sessions
            .get(track_id)
            .map(|s| s.snapshot(track_id))
    }

    /// Tracks with a live session, sorted. Voices fading out after a stop
    /// are not listed.
    pub fn active_tracks(&self) -> Vec<String> {
        let mut tracks: Vec<String> = self
            .registry
            .state
            .lock()
            .sessions
            .keys()
            .cloned()
            .collect();
        tracks.sort();
        tracks
    }

    /// Clean up after the voice ends on its own.
    fn watch_completion(
        &self,
        track_id: String,
        generation: u64,
        completion: oneshot::Receiver<VoiceOutcome>,
    ) {
        let registry: Weak<SessionRegistry> = Arc::downgrade(&self.registry);
        let event_bus = self.event_bus.clone();

        tokio::spawn(async move {
            let outcome = completion.await.unwrap_or(VoiceOutcome::Stopped);
            let Some(registry) = registry.upgrade() else {
                return;
            };
            // Only a session that is still current finishes here; stop and
            // supersession already removed theirs.
            let Some(session) = registry.finish(&track_id, generation) else {
                return;
            };

            let event = match outcome {
                VoiceOutcome::Ended => {
                    debug!(track_id = %track_id, "Playback completed");
                    PlaybackEvent::Completed { track_id }
                }
                VoiceOutcome::Stopped => PlaybackEvent::Stopped { track_id },
                VoiceOutcome::Failed(message) => {
                    warn!(track_id = %track_id, error = %message, "Voice failed mid-playback");
                    PlaybackEvent::Error {
                        track_id: Some(track_id),
                        message,
                        recoverable: false,
                    }
                }
            };
            drop(session);

            if let Some(bus) = event_bus {
                bus.emit(CoreEvent::Playback(event)).ok();
            }
        });
    }

    fn teardown(&self, track_id: &str, session: ActiveSession) {
        if matches!(session.kind, SessionKind::Speech) {
            self.cancel_speech();
        }
        drop(session);
        self.emit(PlaybackEvent::Stopped {
            track_id: track_id.to_string(),
        });
    }

    fn apply_gain(&self, voice: VoiceId, target: f32, duration: Duration) {
        let result = if self.gain_ramps {
            self.backend.ramp_gain(voice, target, duration)
        } else {
            self.backend.set_gain(voice, target)
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to change gain");
        }
    }

    fn cancel_speech(&self) {
        if let Some(synthesizer) = &self.speech {
            synthesizer.cancel();
        }
    }

    fn release_owned(&self, buffer: &AudioBuffer) {
        if let Err(e) = self.backend.release_buffer(buffer) {
            warn!(error = %e, "Failed to release uncached audio buffer");
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Playback(event)).ok();
        }
    }

    fn emit_error(&self, track_id: &str, message: &str, recoverable: bool) {
        self.emit(PlaybackEvent::Error {
            track_id: Some(track_id.to_string()),
            message: message.to_string(),
            recoverable,
        });
    }
}

fn stopped_snapshot(track_id: &str, source: PlaySource) -> SessionSnapshot {
    SessionSnapshot {
        track_id: track_id.to_string(),
        source,
        state: SessionState::Stopped,
        volume: 0.0,
        playback_rate: 1.0,
        looping: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play_options_defaults() {
        let options = PlayOptions::default();
        assert_eq!(options.volume, 1.0);
        assert_eq!(options.playback_rate, 1.0);
        assert!(!options.looping);
        assert!(options.fade_in.is_zero());
        assert!(options.track_id.is_none());
    }

    #[test]
    fn test_play_options_deserialize() {
        let options: PlayOptions =
            serde_json::from_str(r#"{ "volume": 0.5, "loop": true, "fade_in": 250 }"#).unwrap();
        assert_eq!(options.volume, 0.5);
        assert!(options.looping);
        assert_eq!(options.fade_in, Duration::from_millis(250));
    }

    #[test]
    fn test_source_is_default_track() {
        assert_eq!(PlaySource::url("a.mp3").as_str(), "a.mp3");
        assert_eq!(PlaySource::text("hello").as_str(), "hello");
        assert!(SessionState::Stopped.is_terminal());
        assert!(!SessionState::Loading.is_terminal());
    }

    #[test]
    fn test_registry_generations() {
        let registry = SessionRegistry::default();
        let first = registry.next_generation();
        let second = registry.next_generation();
        assert_ne!(first, second);

        registry.state.lock().sessions.insert(
            "t".to_string(),
            ActiveSession {
                generation: second,
                source: PlaySource::url("a.mp3"),
                state: SessionState::Loading,
                volume: 1.0,
                playback_rate: 1.0,
                looping: false,
                kind: SessionKind::Pending,
            },
        );

        assert!(registry.is_current("t", second));
        assert!(registry.remove_if("t", first).is_none());
        assert!(registry.remove_if("t", second).is_some());
        assert!(!registry.is_current("t", second));
    }

    #[test]
    fn test_revoking_claims() {
        let mut state = RegistryState::default();
        let token = CancellationToken::new();
        state.claims.insert(
            "t".to_string(),
            ClaimSlot {
                epoch: 7,
                token: token.clone(),
            },
        );
        let claim = TrackClaim {
            track_id: "t".to_string(),
            epoch: 7,
            token,
        };
        let stale = TrackClaim {
            epoch: 6,
            ..claim.clone()
        };

        assert!(state.holds(&claim));
        assert!(!state.holds(&stale));

        state.revoke("t");
        assert!(!state.holds(&claim));
        assert!(claim.is_revoked());
    }

    #[test]
    fn test_track_for_defaults_to_source() {
        let source = PlaySource::url("a.mp3");
        assert_eq!(PlayOptions::default().track_for(&source), "a.mp3");
        assert_eq!(
            PlayOptions::default().with_track_id("card").track_for(&source),
            "card"
        );
    }
}
