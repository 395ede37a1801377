//! # Playback Error Types
//!
//! Error taxonomy for loading and playing pronunciation audio.

use std::time::Duration;
use thiserror::Error;

/// Why a resource could not be loaded.
///
/// The loader reports exactly one of these and never retries; the retry
/// coordinator decides what happens next.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// Fetch failed: transport error or non-2xx status.
    #[error("Network error loading {url}: {message}")]
    Network { url: String, message: String },

    /// Bytes arrived but are not playable audio.
    #[error("Decode error for {url}: {message}")]
    Decode { url: String, message: String },

    /// Fetch and decode together exceeded the deadline.
    #[error("Timed out loading {url} after {timeout:?}")]
    Timeout { url: String, timeout: Duration },
}

impl LoadError {
    /// URL of the resource that failed.
    pub fn url(&self) -> &str {
        match self {
            LoadError::Network { url, .. }
            | LoadError::Decode { url, .. }
            | LoadError::Timeout { url, .. } => url,
        }
    }
}

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Source Errors
    // ========================================================================
    /// Loading the resource failed.
    #[error(transparent)]
    Load(#[from] LoadError),

    // ========================================================================
    // Output Errors
    // ========================================================================
    /// The audio engine refused to build or drive the output graph.
    #[error("Audio output error: {0}")]
    Output(String),

    /// The speech engine failed to speak.
    #[error("Speech synthesis failed: {0}")]
    Speech(String),

    /// No installed voice supports the requested language.
    #[error("Speech language not supported: {0}")]
    SpeechUnsupported(String),

    /// A host capability needed for the operation is not available.
    #[error("Capability unavailable: {0}")]
    Unavailable(String),

    // ========================================================================
    // Recovery Errors
    // ========================================================================
    /// Retries ran out and the fallback failed too.
    #[error("all audio playback methods failed")]
    Exhausted {
        url: String,
        #[source]
        source: Box<PlaybackError>,
    },

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::Load(LoadError::Network { .. })
                | PlaybackError::Load(LoadError::Timeout { .. })
                | PlaybackError::Output(_)
        )
    }

    /// Returns `true` if this error is due to network issues.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::Load(LoadError::Network { .. })
                | PlaybackError::Load(LoadError::Timeout { .. })
        )
    }

    /// Returns `true` if this error is related to audio format/codec issues.
    pub fn is_format_error(&self) -> bool {
        matches!(self, PlaybackError::Load(LoadError::Decode { .. }))
    }

    /// Returns `true` once every recovery path has been tried.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, PlaybackError::Exhausted { .. })
    }
}

impl From<core_runtime::Error> for PlaybackError {
    fn from(error: core_runtime::Error) -> Self {
        match error {
            core_runtime::Error::Config(message) => PlaybackError::Config(message),
            core_runtime::Error::CapabilityMissing { capability, .. } => {
                PlaybackError::Unavailable(capability)
            }
            core_runtime::Error::Internal(message) => PlaybackError::Internal(message),
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let network: PlaybackError = LoadError::Network {
            url: "a.mp3".to_string(),
            message: "HTTP 503".to_string(),
        }
        .into();
        assert!(network.is_transient());
        assert!(network.is_network_error());
        assert!(!network.is_format_error());

        let decode: PlaybackError = LoadError::Decode {
            url: "a.mp3".to_string(),
            message: "not audio".to_string(),
        }
        .into();
        assert!(!decode.is_transient());
        assert!(decode.is_format_error());
    }

    #[test]
    fn test_exhausted_message() {
        let error = PlaybackError::Exhausted {
            url: "a.mp3".to_string(),
            source: Box::new(PlaybackError::Speech("no voices".to_string())),
        };
        assert_eq!(error.to_string(), "all audio playback methods failed");
        assert!(error.is_exhausted());
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_load_error_url() {
        let error = LoadError::Timeout {
            url: "slow.mp3".to_string(),
            timeout: Duration::from_secs(10),
        };
        assert_eq!(error.url(), "slow.mp3");
        assert!(error.to_string().contains("10s"));
    }
}
