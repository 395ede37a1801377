//! In-memory host bridges shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::{
    AudioBackend, AudioBuffer, BufferId, DecodeMode, HeapUsage, HttpClient, HttpRequest,
    HttpResponse, ManualClock, MemoryTelemetry, SpeechOptions, SpeechSynthesizer, StartedVoice,
    VoiceId, VoiceOutcome, VoiceParams,
};
use bytes::Bytes;
use core_playback::cache::{AudioCache, CacheConfig};
use core_playback::loader::ResourceLoader;
use futures::channel::oneshot;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Body the backend refuses to decode.
pub const CORRUPT_BODY: &[u8] = b"not audio";

// ============================================================================
// HTTP
// ============================================================================

#[derive(Clone)]
enum Route {
    Body(Bytes),
    Status(u16),
    Fail(String),
}

struct RouteEntry {
    route: Route,
    /// Transport failures to report before serving `route`.
    failures_first: usize,
}

/// Serves canned responses per URL. Unknown URLs answer 404.
#[derive(Default)]
pub struct MockHttp {
    routes: Mutex<HashMap<String, RouteEntry>>,
    calls: Mutex<Vec<String>>,
    delay: Mutex<Duration>,
}

impl MockHttp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer `url` with a body of `size` bytes.
    pub fn respond(&self, url: &str, size: usize) {
        self.route(url, Route::Body(Bytes::from(vec![7u8; size])), 0);
    }

    pub fn respond_corrupt(&self, url: &str) {
        self.route(url, Route::Body(Bytes::from_static(CORRUPT_BODY)), 0);
    }

    pub fn respond_status(&self, url: &str, status: u16) {
        self.route(url, Route::Status(status), 0);
    }

    pub fn fail(&self, url: &str, message: &str) {
        self.route(url, Route::Fail(message.to_string()), 0);
    }

    /// Fail `times` fetches of `url`, then serve `size` bytes.
    pub fn fail_then_respond(&self, url: &str, times: usize, size: usize) {
        self.route(url, Route::Body(Bytes::from(vec![7u8; size])), times);
    }

    /// Delay every response, in tokio time.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().iter().filter(|u| *u == url).count()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn route(&self, url: &str, route: Route, failures_first: usize) {
        self.routes.lock().insert(
            url.to_string(),
            RouteEntry {
                route,
                failures_first,
            },
        );
    }
}

#[async_trait]
impl HttpClient for MockHttp {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.calls.lock().push(request.url.clone());

        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let route = {
            let mut routes = self.routes.lock();
            match routes.get_mut(&request.url) {
                Some(entry) if entry.failures_first > 0 => {
                    entry.failures_first -= 1;
                    Route::Fail("connection reset".to_string())
                }
                Some(entry) => entry.route.clone(),
                None => Route::Status(404),
            }
        };

        match route {
            Route::Body(body) => {
                let mut headers = HashMap::new();
                headers.insert("Content-Length".to_string(), body.len().to_string());
                Ok(HttpResponse {
                    status: 200,
                    headers,
                    body,
                })
            }
            Route::Status(status) => Ok(HttpResponse {
                status,
                headers: HashMap::new(),
                body: Bytes::new(),
            }),
            Route::Fail(message) => Err(BridgeError::OperationFailed(message)),
        }
    }
}

// ============================================================================
// Audio backend
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Decode(DecodeMode),
    Start { buffer: BufferId, params: VoiceParams },
    SetGain { voice: VoiceId, gain: f32 },
    Ramp { voice: VoiceId, target: f32, duration: Duration },
    Stop(VoiceId),
    Release(BufferId),
}

/// Records every call and lets tests end voices on demand.
pub struct RecordingBackend {
    calls: Mutex<Vec<BackendCall>>,
    completions: Mutex<HashMap<VoiceId, oneshot::Sender<VoiceOutcome>>>,
    live_buffers: Mutex<HashSet<BufferId>>,
    decode_delay: Mutex<Duration>,
    fail_start: AtomicBool,
    ramps: bool,
}

impl RecordingBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(true))
    }

    pub fn without_ramps() -> Arc<Self> {
        Arc::new(Self::build(false))
    }

    fn build(ramps: bool) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            completions: Mutex::new(HashMap::new()),
            live_buffers: Mutex::new(HashSet::new()),
            decode_delay: Mutex::new(Duration::ZERO),
            fail_start: AtomicBool::new(false),
            ramps,
        }
    }

    pub fn set_decode_delay(&self, delay: Duration) {
        *self.decode_delay.lock() = delay;
    }

    pub fn set_fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    /// Voices started and not yet stopped or ended.
    pub fn playing_voices(&self) -> Vec<VoiceId> {
        self.completions.lock().keys().copied().collect()
    }

    pub fn start_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, BackendCall::Start { .. }))
            .count()
    }

    pub fn start_params(&self) -> Vec<VoiceParams> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::Start { params, .. } => Some(params),
                _ => None,
            })
            .collect()
    }

    pub fn stopped(&self) -> Vec<VoiceId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::Stop(voice) => Some(voice),
                _ => None,
            })
            .collect()
    }

    pub fn released(&self) -> Vec<BufferId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::Release(buffer) => Some(buffer),
                _ => None,
            })
            .collect()
    }

    pub fn decode_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, BackendCall::Decode(_)))
            .count()
    }

    /// Decoded buffers not yet released.
    pub fn live_buffer_count(&self) -> usize {
        self.live_buffers.lock().len()
    }

    /// End every playing voice naturally.
    pub fn finish_all(&self) {
        let senders: Vec<_> = self.completions.lock().drain().collect();
        for (_, sender) in senders {
            sender.send(VoiceOutcome::Ended).ok();
        }
    }

    /// Report a mid-playback failure on every playing voice.
    pub fn fail_all(&self, message: &str) {
        let senders: Vec<_> = self.completions.lock().drain().collect();
        for (_, sender) in senders {
            sender.send(VoiceOutcome::Failed(message.to_string())).ok();
        }
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl AudioBackend for RecordingBackend {
    async fn decode(&self, data: Bytes, mode: DecodeMode) -> BridgeResult<AudioBuffer> {
        self.record(BackendCall::Decode(mode));

        let delay = *self.decode_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if data.as_ref() == CORRUPT_BODY {
            return Err(BridgeError::Unsupported("unrecognised container".to_string()));
        }

        let buffer = AudioBuffer::new(Some(Duration::from_secs(1)), mode);
        self.live_buffers.lock().insert(buffer.id);
        Ok(buffer)
    }

    fn start_voice(&self, buffer: &AudioBuffer, params: VoiceParams) -> BridgeResult<StartedVoice> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("output device lost".to_string()));
        }

        self.record(BackendCall::Start {
            buffer: buffer.id,
            params,
        });
        let voice = VoiceId::new();
        let (tx, rx) = oneshot::channel();
        self.completions.lock().insert(voice, tx);
        Ok(StartedVoice::new(voice, rx))
    }

    fn set_gain(&self, voice: VoiceId, gain: f32) -> BridgeResult<()> {
        self.record(BackendCall::SetGain { voice, gain });
        Ok(())
    }

    fn ramp_gain(&self, voice: VoiceId, target: f32, duration: Duration) -> BridgeResult<()> {
        self.record(BackendCall::Ramp {
            voice,
            target,
            duration,
        });
        Ok(())
    }

    fn stop_voice(&self, voice: VoiceId) -> BridgeResult<()> {
        self.record(BackendCall::Stop(voice));
        let sender = self.completions.lock().remove(&voice);
        if let Some(sender) = sender {
            sender.send(VoiceOutcome::Stopped).ok();
        }
        Ok(())
    }

    fn release_buffer(&self, buffer: &AudioBuffer) -> BridgeResult<()> {
        self.record(BackendCall::Release(buffer.id));
        self.live_buffers.lock().remove(&buffer.id);
        Ok(())
    }

    fn supports_gain_ramps(&self) -> bool {
        self.ramps
    }
}

// ============================================================================
// Speech
// ============================================================================

/// Speech engine that records utterances.
pub struct FakeSpeech {
    spoken: Mutex<Vec<String>>,
    languages: Vec<String>,
    available: bool,
    fail: AtomicBool,
    cancels: AtomicUsize,
    delay: Mutex<Duration>,
}

impl FakeSpeech {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::with_languages(&["en-US"], true))
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self::with_languages(&["en-US"], false))
    }

    pub fn with_languages(languages: &[&str], available: bool) -> Self {
        Self {
            spoken: Mutex::new(Vec::new()),
            languages: languages.iter().map(|l| l.to_string()).collect(),
            available,
            fail: AtomicBool::new(false),
            cancels: AtomicUsize::new(0),
            delay: Mutex::new(Duration::ZERO),
        }
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().clone()
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn speak(&self, text: &str, _options: &SpeechOptions) -> BridgeResult<()> {
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("synthesis-failed".to_string()));
        }
        self.spoken.lock().push(text.to_string());
        Ok(())
    }

    fn is_language_supported(&self, lang: &str) -> bool {
        self.languages.iter().any(|l| l == lang)
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Telemetry
// ============================================================================

/// Heap telemetry whose sample the test sets.
#[derive(Default)]
pub struct FakeTelemetry {
    usage: Mutex<Option<HeapUsage>>,
}

impl FakeTelemetry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, used_bytes: u64, limit_bytes: u64) {
        *self.usage.lock() = Some(HeapUsage::new(used_bytes, limit_bytes));
    }
}

impl MemoryTelemetry for FakeTelemetry {
    fn heap_usage(&self) -> Option<HeapUsage> {
        *self.usage.lock()
    }
}

// ============================================================================
// Wiring
// ============================================================================

/// Cache and loader over fresh mocks.
pub struct Harness {
    pub http: Arc<MockHttp>,
    pub backend: Arc<RecordingBackend>,
    pub clock: Arc<ManualClock>,
    pub cache: Arc<AudioCache>,
    pub loader: Arc<ResourceLoader>,
}

pub fn harness(config: CacheConfig) -> Harness {
    harness_with_timeout(config, Duration::from_secs(10))
}

pub fn harness_with_timeout(config: CacheConfig, timeout: Duration) -> Harness {
    let http = MockHttp::new();
    let backend = RecordingBackend::new();
    let clock = Arc::new(ManualClock::starting_now());
    let cache = Arc::new(AudioCache::new(config, backend.clone(), clock.clone()));
    let loader = Arc::new(ResourceLoader::new(
        http.clone(),
        backend.clone(),
        cache.clone(),
        timeout,
    ));

    Harness {
        http,
        backend,
        clock,
        cache,
        loader,
    }
}

/// A fully decoded buffer the tests hand to the cache directly.
pub fn buffer() -> AudioBuffer {
    AudioBuffer::new(Some(Duration::from_secs(1)), DecodeMode::Full)
}

/// Let spawned tasks run.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
