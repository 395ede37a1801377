//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the vocabulary audio core:
//! - Logging and tracing infrastructure
//! - Host capability configuration
//! - Event bus system
//!
//! ## Overview
//!
//! Every other core crate depends on this one for its logging conventions,
//! the bridge set it was composed with, and the broadcast channel used to
//! report cache, preload, playback and memory activity.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
