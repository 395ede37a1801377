//! Audio decode/output bridge.
//!
//! The host runtime owns the actual audio engine (Web Audio on the web, a
//! native mixer elsewhere). The core only sees opaque handles: decoded
//! [`AudioBuffer`]s that the cache owns, and short-lived voices that the
//! playback session manager wires as `source -> gain -> output`.

use crate::{error::Result, platform::PlatformSendSync};
use bytes::Bytes;
use futures::channel::oneshot;
use std::time::Duration;
use uuid::Uuid;

/// How far a load must progress before the resource is handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DecodeMode {
    /// Fully fetch and decode into a playable buffer. Needed for precise
    /// gain control and fades.
    #[default]
    Full,
    /// Stop once duration and playability are known. Used for preloading,
    /// where "ready to play soon" is enough.
    Metadata,
}

/// Identifier for a decoded buffer held by the host engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(Uuid);

impl BufferId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BufferId {
    fn default() -> Self {
        Self::new()
    }
}

/// Opaque handle to decoded (or metadata-ready) audio.
///
/// Cloning the handle does not duplicate the underlying data; whoever owns the
/// handle is responsible for calling [`AudioBackend::release_buffer`] exactly
/// once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBuffer {
    pub id: BufferId,
    /// Playback duration, when the decoder could determine it.
    pub duration: Option<Duration>,
    /// Whether the buffer holds fully decoded PCM or only metadata.
    pub mode: DecodeMode,
}

impl AudioBuffer {
    pub fn new(duration: Option<Duration>, mode: DecodeMode) -> Self {
        Self {
            id: BufferId::new(),
            duration,
            mode,
        }
    }

    pub fn is_fully_decoded(&self) -> bool {
        self.mode == DecodeMode::Full
    }
}

/// Identifier for a playing voice (one source + gain pair).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceId(Uuid);

impl VoiceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for VoiceId {
    fn default() -> Self {
        Self::new()
    }
}

/// Initial parameters for a voice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceParams {
    /// Initial gain (0.0 = silent, 1.0 = unity).
    pub gain: f32,
    pub playback_rate: f32,
    pub looping: bool,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            gain: 1.0,
            playback_rate: 1.0,
            looping: false,
        }
    }
}

/// How a voice finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceOutcome {
    /// Source reached its natural end.
    Ended,
    /// Source was halted through [`AudioBackend::stop_voice`].
    Stopped,
    /// Engine reported an error mid-playback.
    Failed(String),
}

/// A started voice plus its single completion point.
///
/// The backend resolves `completion` exactly once. A dropped sender is treated
/// by callers as [`VoiceOutcome::Stopped`].
#[derive(Debug)]
pub struct StartedVoice {
    pub id: VoiceId,
    pub completion: oneshot::Receiver<VoiceOutcome>,
}

impl StartedVoice {
    pub fn new(id: VoiceId, completion: oneshot::Receiver<VoiceOutcome>) -> Self {
        Self { id, completion }
    }
}

/// Host audio engine.
///
/// `decode` is the only suspending operation. Voice control is synchronous so
/// that graph changes happen atomically relative to the cooperative scheduler.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait AudioBackend: PlatformSendSync {
    /// Decode raw bytes into a playable buffer.
    ///
    /// Implementations should report corrupt or unsupported input as
    /// [`BridgeError::Unsupported`](crate::BridgeError::Unsupported).
    async fn decode(&self, data: Bytes, mode: DecodeMode) -> Result<AudioBuffer>;

    /// Build `source -> gain -> output` for `buffer` and start it.
    fn start_voice(&self, buffer: &AudioBuffer, params: VoiceParams) -> Result<StartedVoice>;

    /// Set the gain immediately.
    fn set_gain(&self, voice: VoiceId, gain: f32) -> Result<()>;

    /// Linearly ramp the gain from its current value to `target` over `duration`.
    fn ramp_gain(&self, voice: VoiceId, target: f32, duration: Duration) -> Result<()>;

    /// Halt the source and disconnect its graph. Stopping a voice that already
    /// ended must succeed.
    fn stop_voice(&self, voice: VoiceId) -> Result<()>;

    /// Tear down the decoded data behind `buffer`.
    ///
    /// Voices already started on the buffer keep playing; the engine frees the
    /// data once the last of them finishes.
    fn release_buffer(&self, buffer: &AudioBuffer) -> Result<()>;

    /// Whether the engine can schedule gain ramps. Engines without ramps get
    /// stepped gain changes instead.
    fn supports_gain_ramps(&self) -> bool {
        true
    }
}
