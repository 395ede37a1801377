//! Logging system demonstration
//!
//! Shows the output formats and URL redaction used by the audio core.
//!
//! Run with:
//! ```bash
//! # Pretty format (default in debug)
//! cargo run --example logging_demo
//!
//! # JSON format
//! cargo run --example logging_demo -- json
//!
//! # With custom filter
//! cargo run --example logging_demo -- pretty "core_runtime=trace"
//! ```

use bridge_traits::time::LogLevel;
use core_runtime::logging::{init_logging, redact_url, LogFormat, LoggingConfig};
use std::env;
use tracing::{debug, info, instrument, span, trace, warn, Level};

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    let format = match args.get(1).map(String::as_str) {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        Some("pretty") => LogFormat::Pretty,
        _ => LogFormat::default(),
    };

    let mut config = LoggingConfig::default()
        .with_format(format)
        .with_level(LogLevel::Trace)
        .with_spans(true)
        .with_target(true);

    if let Some(filter) = args.get(2) {
        config = config.with_filter(filter.clone());
    }

    if let Err(e) = init_logging(config) {
        eprintln!("failed to initialise logging: {e}");
        return;
    }

    info!(format = ?format, "Logging initialized");

    demo_cache_events();
    demo_preload_batch().await;
    demo_redaction();
}

fn demo_cache_events() {
    let span = span!(Level::INFO, "cache");
    let _enter = span.enter();

    debug!(item_count = 12, total_size = 480_000, "Cache stats");
    warn!(evicted = 3, reason = "page_hidden", "Evicted entries under memory pressure");
}

async fn demo_preload_batch() {
    let words = ["apple", "pear", "plum"];
    for (idx, word) in words.iter().enumerate() {
        load_word(idx, word).await;
    }
    info!(loaded = words.len(), failed = 0, "Preload batch completed");
}

#[instrument(fields(position = idx))]
async fn load_word(idx: usize, word: &str) {
    trace!("Fetching pronunciation");
    tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;
}

fn demo_redaction() {
    let url = "https://cdn.example.com/audio/apple.mp3?signature=abc123";
    info!(url = %redact_url(url), "Signed URLs are logged without their query");
}
