//! # Error/Retry Coordinator
//!
//! The one place where failed playback is retried. Each URL gets a bounded
//! number of attempts with a linearly growing delay; once they are used up an
//! optional fallback (normally speech synthesis) gets a single chance.
//!
//! The `_until` variants take a cancellation token. Cancelling it ends the
//! backoff wait at once and skips any remaining retries and the fallback;
//! the session manager cancels it when a newer play or a stop takes the
//! track.

use crate::config::duration_ms;
use crate::error::{PlaybackError, Result};
use crate::session::{PlayOptions, PlaySource, SessionManager, TrackClaim};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use core_runtime::logging::redact_url;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Retry limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries per URL before giving up.
    ///
    /// Default: 3.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay unit; retry `n` waits `base_delay * n`.
    ///
    /// Default: 1 second.
    #[serde(default = "default_base_delay", with = "duration_ms")]
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay: default_base_delay(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Delay before the given (1-based) retry.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_retries > 20 {
            return Err("retry.max_retries must be at most 20".to_string());
        }
        Ok(())
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_secs(1)
}

/// How a coordinated operation ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    /// The operation itself succeeded, possibly after retries.
    Recovered(T),
    /// Retries ran out and the fallback succeeded instead.
    FellBack,
    /// Abandoned through the cancellation token; nothing is left running.
    Cancelled,
}

impl<T> RetryOutcome<T> {
    pub fn recovered(self) -> Option<T> {
        match self {
            RetryOutcome::Recovered(value) => Some(value),
            RetryOutcome::FellBack | RetryOutcome::Cancelled => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, RetryOutcome::FellBack)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryOutcome::Cancelled)
    }
}

/// Last-resort action run once retries are exhausted.
pub type Fallback = BoxFuture<'static, Result<()>>;

/// Tracks attempts per URL and drives retries.
pub struct RetryCoordinator {
    policy: RetryPolicy,
    attempts: Mutex<HashMap<String, u32>>,
    event_bus: Option<EventBus>,
}

impl RetryCoordinator {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempts: Mutex::new(HashMap::new()),
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation`, routing a failure through [`handle`](Self::handle).
    pub async fn execute<T, F, Fut>(
        &self,
        url: &str,
        operation: F,
        fallback: Option<Fallback>,
    ) -> Result<RetryOutcome<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_until(url, operation, fallback, &CancellationToken::new())
            .await
    }

    /// [`execute`](Self::execute) that gives up once `cancel` fires.
    pub async fn execute_until<T, F, Fut>(
        &self,
        url: &str,
        mut operation: F,
        fallback: Option<Fallback>,
        cancel: &CancellationToken,
    ) -> Result<RetryOutcome<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let result = operation().await;
        if cancel.is_cancelled() {
            return Ok(self.abandon(url));
        }
        match result {
            Ok(value) => {
                self.reset(url);
                Ok(RetryOutcome::Recovered(value))
            }
            Err(error) => {
                self.handle_until(url, error, operation, fallback, cancel)
                    .await
            }
        }
    }

    /// Recover from `error` raised while playing `url`.
    ///
    /// Retries `retry` until it succeeds or the per-URL budget is spent,
    /// sleeping `base_delay * n` before retry `n`. On exhaustion the fallback
    /// runs once; if it fails too the result is [`PlaybackError::Exhausted`].
    /// Without a fallback the most recent error is returned unchanged.
    ///
    /// The attempt counter is cleared on success and otherwise kept, so a URL
    /// that already exhausted its budget goes straight to the fallback until
    /// [`reset`](Self::reset) is called.
    pub async fn handle<T, F, Fut>(
        &self,
        url: &str,
        error: PlaybackError,
        retry: F,
        fallback: Option<Fallback>,
    ) -> Result<RetryOutcome<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.handle_until(url, error, retry, fallback, &CancellationToken::new())
            .await
    }

    /// [`handle`](Self::handle) that gives up once `cancel` fires.
    ///
    /// Cancellation interrupts the backoff wait, skips the fallback, clears
    /// the attempt counter and yields [`RetryOutcome::Cancelled`].
    pub async fn handle_until<T, F, Fut>(
        &self,
        url: &str,
        error: PlaybackError,
        mut retry: F,
        fallback: Option<Fallback>,
        cancel: &CancellationToken,
    ) -> Result<RetryOutcome<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error = error;

        while let Some(attempt) = self.next_attempt(url) {
            let delay = self.policy.delay_for(attempt);
            warn!(
                url = %redact_url(url),
                attempt,
                max_retries = self.policy.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %last_error,
                "Audio playback failed, retrying"
            );
            self.emit(PlaybackEvent::RetryScheduled {
                url: url.to_string(),
                attempt,
                delay_ms: delay.as_millis() as u64,
            });

            tokio::select! {
                _ = cancel.cancelled() => return Ok(self.abandon(url)),
                _ = tokio::time::sleep(delay) => {}
            }

            let result = retry().await;
            if cancel.is_cancelled() {
                return Ok(self.abandon(url));
            }
            match result {
                Ok(value) => {
                    info!(url = %redact_url(url), attempt, "Audio playback recovered");
                    self.reset(url);
                    return Ok(RetryOutcome::Recovered(value));
                }
                Err(e) => last_error = e,
            }
        }

        if cancel.is_cancelled() {
            return Ok(self.abandon(url));
        }

        let Some(fallback) = fallback else {
            warn!(url = %redact_url(url), error = %last_error, "Retries exhausted, no fallback");
            return Err(last_error);
        };

        debug!(url = %redact_url(url), "Retries exhausted, trying fallback");
        match fallback.await {
            Ok(()) => {
                info!(url = %redact_url(url), "Fallback playback succeeded");
                self.emit(PlaybackEvent::FellBack {
                    url: url.to_string(),
                });
                Ok(RetryOutcome::FellBack)
            }
            Err(e) => {
                warn!(url = %redact_url(url), error = %e, "Fallback failed");
                Err(PlaybackError::Exhausted {
                    url: url.to_string(),
                    source: Box::new(e),
                })
            }
        }
    }

    /// Forget the attempt history for `url`.
    pub fn reset(&self, url: &str) {
        self.attempts.lock().remove(url);
    }

    /// Retries already spent on `url`.
    pub fn attempts(&self, url: &str) -> u32 {
        self.attempts.lock().get(url).copied().unwrap_or(0)
    }

    fn abandon<T>(&self, url: &str) -> RetryOutcome<T> {
        debug!(url = %redact_url(url), "Playback superseded or stopped, not retrying");
        self.reset(url);
        RetryOutcome::Cancelled
    }

    fn next_attempt(&self, url: &str) -> Option<u32> {
        let mut attempts = self.attempts.lock();
        let count = attempts.entry(url.to_string()).or_insert(0);
        if *count >= self.policy.max_retries {
            return None;
        }
        *count += 1;
        Some(*count)
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Playback(event)).ok();
        }
    }
}

/// Speaks the word on the failed play's track instead of its recording.
///
/// The utterance is an ordinary text session started under the play's
/// [`TrackClaim`], so stopping or pausing the track silences it and a newer
/// play on the track keeps it from starting at all.
pub struct SpeechFallback {
    sessions: Arc<SessionManager>,
    claim: TrackClaim,
    options: PlayOptions,
}

impl SpeechFallback {
    pub fn new(sessions: Arc<SessionManager>, claim: TrackClaim, options: PlayOptions) -> Self {
        Self {
            sessions,
            claim,
            options,
        }
    }

    /// Build a [`Fallback`] that speaks `text`.
    pub fn into_fallback(self, text: impl Into<String>) -> Fallback {
        let text = text.into();
        Box::pin(async move { self.speak(&text).await })
    }

    /// Speak `text` if the engine is usable and has a voice for the
    /// configured language. Being stopped while speaking is not a failure.
    pub async fn speak(&self, text: &str) -> Result<()> {
        self.sessions
            .play_claimed(&self.claim, PlaySource::text(text), self.options.clone())
            .await
            .map(|_| ())
    }
}
