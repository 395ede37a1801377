//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop hosts
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`, without retries (the audio core owns retry)
//! - `LifecycleObserver` that reports foreground until the host window pushes a
//!   visibility change
//!
//! Decoding and output are left to the embedding application: there is no
//! default `AudioBackend`.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{DesktopLifecycleObserver, ReqwestHttpClient};
//! use bridge_traits::LifecycleState;
//!
//! let http_client = ReqwestHttpClient::new()?;
//! let lifecycle = DesktopLifecycleObserver::new();
//!
//! // From the window event loop:
//! lifecycle.set_state(LifecycleState::Background);
//! ```

mod http;
mod lifecycle;

pub use http::ReqwestHttpClient;
pub use lifecycle::DesktopLifecycleObserver;
