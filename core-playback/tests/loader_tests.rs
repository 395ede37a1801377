//! Tests for the resource loader: failure taxonomy, timeout, cache insertion.

mod common;

use bridge_traits::DecodeMode;
use common::{buffer, harness, harness_with_timeout};
use core_playback::cache::{CacheConfig, EntryOrigin};
use core_playback::error::LoadError;
use core_playback::loader::LoadStrategy;
use std::time::Duration;

const URL: &str = "https://cdn.example.com/words/apple.mp3";

#[tokio::test]
async fn test_successful_load_is_cached() {
    let h = harness(CacheConfig::default());
    h.http.respond(URL, 24_000);

    let loaded = h
        .loader
        .load(URL, LoadStrategy::Auto, EntryOrigin::OnDemand)
        .await
        .unwrap();

    assert!(loaded.cached);
    assert_eq!(loaded.size_bytes, 24_000);
    assert!(loaded.buffer.is_fully_decoded());

    let entry = h.cache.peek(URL).unwrap();
    assert_eq!(entry.buffer, loaded.buffer);
    assert_eq!(entry.size_bytes, 24_000);
    assert!(!entry.is_preloaded());
}

#[tokio::test]
async fn test_metadata_strategy_decodes_metadata_only() {
    let h = harness(CacheConfig::default());
    h.http.respond(URL, 1_000);

    let loaded = h
        .loader
        .load(URL, LoadStrategy::Metadata, EntryOrigin::Preload)
        .await
        .unwrap();

    assert_eq!(loaded.buffer.mode, DecodeMode::Metadata);
    assert!(h.cache.peek(URL).unwrap().is_preloaded());
}

#[tokio::test]
async fn test_transport_failure_is_network_error() {
    let h = harness(CacheConfig::default());
    h.http.fail(URL, "dns lookup failed");

    let err = h
        .loader
        .load(URL, LoadStrategy::Auto, EntryOrigin::OnDemand)
        .await
        .unwrap_err();

    assert!(matches!(err, LoadError::Network { .. }));
    assert_eq!(err.url(), URL);
    assert!(err.to_string().contains("dns lookup failed"));
    assert!(h.cache.is_empty());
}

#[tokio::test]
async fn test_http_error_status_is_network_error() {
    let h = harness(CacheConfig::default());
    h.http.respond_status(URL, 503);

    let err = h
        .loader
        .load(URL, LoadStrategy::Auto, EntryOrigin::OnDemand)
        .await
        .unwrap_err();

    match err {
        LoadError::Network { message, .. } => assert_eq!(message, "HTTP 503"),
        other => panic!("expected network error, got {other:?}"),
    }
    assert_eq!(h.backend.decode_count(), 0);
}

#[tokio::test]
async fn test_undecodable_bytes_are_decode_error() {
    let h = harness(CacheConfig::default());
    h.http.respond_corrupt(URL);

    let err = h
        .loader
        .load(URL, LoadStrategy::Auto, EntryOrigin::OnDemand)
        .await
        .unwrap_err();

    assert!(matches!(err, LoadError::Decode { .. }));
    assert!(h.cache.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_covers_fetch_and_decode() {
    let h = harness_with_timeout(CacheConfig::default(), Duration::from_secs(10));
    h.http.respond(URL, 1_000);
    h.http.set_delay(Duration::from_secs(6));
    h.backend.set_decode_delay(Duration::from_secs(6));

    let err = h
        .loader
        .load(URL, LoadStrategy::Auto, EntryOrigin::OnDemand)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        LoadError::Timeout {
            url: URL.to_string(),
            timeout: Duration::from_secs(10)
        }
    );
    assert!(h.cache.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_slow_but_in_time_load_succeeds() {
    let h = harness_with_timeout(CacheConfig::default(), Duration::from_secs(10));
    h.http.respond(URL, 1_000);
    h.http.set_delay(Duration::from_secs(4));
    h.backend.set_decode_delay(Duration::from_secs(4));

    assert!(h
        .loader
        .load(URL, LoadStrategy::Auto, EntryOrigin::OnDemand)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_load_never_retries() {
    let h = harness(CacheConfig::default());
    h.http.fail_then_respond(URL, 1, 1_000);

    assert!(h
        .loader
        .load(URL, LoadStrategy::Auto, EntryOrigin::OnDemand)
        .await
        .is_err());
    assert_eq!(h.http.calls_for(URL), 1);
}

#[tokio::test]
async fn test_oversize_load_is_returned_uncached() {
    let h = harness(CacheConfig::default().with_max_size(500));
    h.http.respond(URL, 2_000);

    let loaded = h
        .loader
        .load(URL, LoadStrategy::Auto, EntryOrigin::OnDemand)
        .await
        .unwrap();

    assert!(!loaded.cached);
    assert!(h.cache.is_empty());
}

#[tokio::test]
async fn test_obtain_serves_cache_hits() {
    let h = harness(CacheConfig::default());
    let cached = buffer();
    h.cache.put(URL, cached.clone(), 900, EntryOrigin::Preload).is_cached();

    let loaded = h
        .loader
        .obtain(URL, LoadStrategy::Auto, EntryOrigin::OnDemand)
        .await
        .unwrap();

    assert_eq!(loaded.buffer, cached);
    assert_eq!(loaded.size_bytes, 900);
    assert!(h.http.calls().is_empty());
}

#[tokio::test]
async fn test_obtain_upgrades_metadata_entry() {
    let h = harness(CacheConfig::default());
    h.http.respond(URL, 1_000);

    h.loader
        .load(URL, LoadStrategy::Metadata, EntryOrigin::Preload)
        .await
        .unwrap();
    let metadata_only = h.cache.peek(URL).unwrap().buffer;

    let loaded = h
        .loader
        .obtain(URL, LoadStrategy::Auto, EntryOrigin::OnDemand)
        .await
        .unwrap();

    assert!(loaded.buffer.is_fully_decoded());
    assert_eq!(h.http.calls_for(URL), 2);
    assert!(h.backend.released().contains(&metadata_only.id));
    assert_eq!(h.cache.len(), 1);
}
