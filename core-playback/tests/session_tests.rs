//! Tests for the playback session manager: exclusivity, fades, stop and
//! volume semantics.

mod common;

use common::{harness, settle, BackendCall, FakeSpeech, Harness, RecordingBackend};
use core_playback::cache::CacheConfig;
use core_playback::error::{LoadError, PlaybackError};
use core_playback::session::{PlayOptions, PlaySource, SessionManager, SessionState};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use std::sync::Arc;
use std::time::Duration;

const APPLE: &str = "https://cdn.example.com/apple.mp3";
const PEAR: &str = "https://cdn.example.com/pear.mp3";

fn setup() -> (Harness, SessionManager) {
    let h = harness(CacheConfig::default());
    h.http.respond(APPLE, 1_000);
    h.http.respond(PEAR, 1_000);
    let manager = SessionManager::new(h.loader.clone(), h.backend.clone());
    (h, manager)
}

fn track(id: &str) -> PlayOptions {
    PlayOptions::default().with_track_id(id)
}

#[tokio::test]
async fn test_play_starts_voice_at_volume() {
    let (h, manager) = setup();

    let snapshot = manager
        .play(PlaySource::url(APPLE), PlayOptions::default().with_volume(0.6))
        .await
        .unwrap();

    assert_eq!(snapshot.state, SessionState::Playing);
    assert_eq!(snapshot.track_id, APPLE);
    assert_eq!(snapshot.volume, 0.6);

    let params = h.backend.start_params();
    assert_eq!(params.len(), 1);
    assert_eq!(params[0].gain, 0.6);
    assert!(h.cache.contains(APPLE));
    assert_eq!(manager.active_tracks(), vec![APPLE.to_string()]);
}

#[tokio::test]
async fn test_fade_in_starts_silent_and_ramps() {
    let (h, manager) = setup();

    manager
        .play(
            PlaySource::url(APPLE),
            track("word")
                .with_volume(0.8)
                .with_fade_in(Duration::from_millis(300)),
        )
        .await
        .unwrap();

    assert_eq!(h.backend.start_params()[0].gain, 0.0);
    let voice = h.backend.playing_voices()[0];
    assert!(h.backend.calls().contains(&BackendCall::Ramp {
        voice,
        target: 0.8,
        duration: Duration::from_millis(300),
    }));
}

#[tokio::test]
async fn test_fade_without_ramp_support_steps_gain() {
    let h = harness(CacheConfig::default());
    h.http.respond(APPLE, 1_000);
    let output = RecordingBackend::without_ramps();
    let manager = SessionManager::new(h.loader.clone(), output.clone());

    manager
        .play(
            PlaySource::url(APPLE),
            track("word")
                .with_volume(0.5)
                .with_fade_in(Duration::from_millis(300)),
        )
        .await
        .unwrap();

    let voice = output.playing_voices()[0];
    let calls = output.calls();
    assert!(calls.contains(&BackendCall::SetGain { voice, gain: 0.5 }));
    assert!(!calls.iter().any(|call| matches!(call, BackendCall::Ramp { .. })));
}

#[tokio::test]
async fn test_new_session_fully_stops_previous_on_same_track() {
    let (h, manager) = setup();

    manager
        .play(PlaySource::url(APPLE), track("card"))
        .await
        .unwrap();
    let first = h.backend.playing_voices()[0];

    manager
        .play(PlaySource::url(PEAR), track("card"))
        .await
        .unwrap();

    let calls = h.backend.calls();
    let stop_at = calls
        .iter()
        .position(|call| *call == BackendCall::Stop(first))
        .expect("first voice stopped");
    let second_start = calls
        .iter()
        .rposition(|call| matches!(call, BackendCall::Start { .. }))
        .unwrap();
    assert!(stop_at < second_start);

    assert_eq!(h.backend.playing_voices().len(), 1);
    assert_eq!(manager.active_tracks(), vec!["card".to_string()]);
    assert_eq!(
        manager.session("card").unwrap().source,
        PlaySource::url(PEAR)
    );
}

#[tokio::test]
async fn test_different_tracks_play_together() {
    let (h, manager) = setup();

    manager.play(PlaySource::url(APPLE), track("a")).await.unwrap();
    manager.play(PlaySource::url(APPLE), track("b")).await.unwrap();

    assert_eq!(h.backend.playing_voices().len(), 2);
    // Second play was a cache hit.
    assert_eq!(h.http.calls_for(APPLE), 1);
}

#[tokio::test]
async fn test_natural_end_removes_session() {
    let (h, manager) = setup();
    let bus = EventBus::new(32);
    let mut events = bus.subscribe();
    let manager = manager.with_event_bus(bus);

    manager.play(PlaySource::url(APPLE), track("t")).await.unwrap();
    assert!(manager.session("t").is_some());

    h.backend.finish_all();
    settle().await;

    assert!(manager.session("t").is_none());
    assert!(manager.active_tracks().is_empty());

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    assert_eq!(
        received,
        vec![
            CoreEvent::Playback(PlaybackEvent::Started {
                track_id: "t".to_string(),
                url: APPLE.to_string()
            }),
            CoreEvent::Playback(PlaybackEvent::Completed {
                track_id: "t".to_string()
            }),
        ]
    );
}

#[tokio::test]
async fn test_play_stop_then_set_volume_is_noop() {
    let (h, manager) = setup();

    manager.play(PlaySource::url(APPLE), track("t")).await.unwrap();
    assert!(manager.stop("t", Duration::ZERO).await);

    assert!(!manager.set_volume("t", 0.3));
    assert!(!h
        .backend
        .calls()
        .iter()
        .any(|call| matches!(call, BackendCall::SetGain { .. })));
    assert!(h.backend.playing_voices().is_empty());

    // Double stop is silent.
    assert!(!manager.stop("t", Duration::ZERO).await);
}

#[tokio::test]
async fn test_set_volume_clamps() {
    let (h, manager) = setup();
    manager.play(PlaySource::url(APPLE), track("t")).await.unwrap();
    let voice = h.backend.playing_voices()[0];

    assert!(manager.set_volume("t", 1.7));
    assert!(manager.set_volume("t", -2.0));

    let gains: Vec<f32> = h
        .backend
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            BackendCall::SetGain { voice: v, gain } if v == voice => Some(gain),
            _ => None,
        })
        .collect();
    assert_eq!(gains, vec![1.0, 0.0]);
    assert_eq!(manager.session("t").unwrap().volume, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_with_fade_ramps_then_halts() {
    let (h, manager) = setup();
    manager.play(PlaySource::url(APPLE), track("t")).await.unwrap();
    let voice = h.backend.playing_voices()[0];

    let started = tokio::time::Instant::now();
    assert!(manager.stop("t", Duration::from_millis(500)).await);
    assert!(started.elapsed() >= Duration::from_millis(500));

    let calls = h.backend.calls();
    let ramp = calls
        .iter()
        .position(|call| {
            *call
                == BackendCall::Ramp {
                    voice,
                    target: 0.0,
                    duration: Duration::from_millis(500),
                }
        })
        .expect("fade-out ramp");
    let stop = calls
        .iter()
        .position(|call| *call == BackendCall::Stop(voice))
        .expect("voice halted");
    assert!(ramp < stop);
}

#[tokio::test(start_paused = true)]
async fn test_play_during_fade_out_cuts_the_fade_short() {
    let (h, manager) = setup();
    manager.play(PlaySource::url(APPLE), track("word")).await.unwrap();
    let fading = h.backend.playing_voices()[0];

    let (stopped, audible) = tokio::join!(
        manager.stop("word", Duration::from_millis(500)),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            manager
                .play(PlaySource::url(PEAR), track("word"))
                .await
                .unwrap();
            h.backend.playing_voices()
        }
    );

    assert!(stopped);
    assert_eq!(audible.len(), 1);
    assert_ne!(audible[0], fading);

    // The fading voice was halted before the new one started, exactly once.
    let calls = h.backend.calls();
    let halted = calls
        .iter()
        .position(|call| *call == BackendCall::Stop(fading))
        .expect("fading voice halted");
    let second_start = calls
        .iter()
        .rposition(|call| matches!(call, BackendCall::Start { .. }))
        .unwrap();
    assert!(halted < second_start);
    assert_eq!(
        h.backend.stopped().iter().filter(|v| **v == fading).count(),
        1
    );

    // The end of the fade leaves the new session alone.
    assert_eq!(h.backend.playing_voices(), audible);
    assert_eq!(
        manager.session("word").unwrap().source,
        PlaySource::url(PEAR)
    );
}

#[tokio::test(start_paused = true)]
async fn test_stop_all_fade_is_cut_by_new_play() {
    let (h, manager) = setup();
    manager.play(PlaySource::url(APPLE), track("word")).await.unwrap();

    let (stopped, audible) = tokio::join!(
        manager.stop_all(Duration::from_millis(500)),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            manager
                .play(PlaySource::url(PEAR), track("word"))
                .await
                .unwrap();
            h.backend.playing_voices().len()
        }
    );

    assert_eq!(stopped, 1);
    assert_eq!(audible, 1);
    assert_eq!(h.backend.playing_voices().len(), 1);
    assert_eq!(manager.active_tracks(), vec!["word".to_string()]);
}

#[tokio::test]
async fn test_revoked_claim_starts_nothing() {
    let (h, manager) = setup();
    let older = manager.claim("word");
    let newer = manager.claim("word");
    assert!(older.is_revoked());
    assert!(!newer.is_revoked());

    let snapshot = manager
        .play_claimed(&older, PlaySource::url(APPLE), PlayOptions::default())
        .await
        .unwrap();
    assert_eq!(snapshot.state, SessionState::Stopped);
    assert_eq!(h.backend.start_count(), 0);

    manager
        .play_claimed(&newer, PlaySource::url(PEAR), PlayOptions::default())
        .await
        .unwrap();
    assert_eq!(
        manager.session("word").unwrap().source,
        PlaySource::url(PEAR)
    );

    assert!(manager.stop("word", Duration::ZERO).await);
    assert!(newer.is_revoked());
}

#[tokio::test(start_paused = true)]
async fn test_stop_while_loading_cancels_start_but_keeps_cache() {
    let (h, manager) = setup();
    h.http.set_delay(Duration::from_secs(1));

    let (played, stopped) = tokio::join!(
        manager.play(PlaySource::url(APPLE), track("t")),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            assert_eq!(manager.session("t").unwrap().state, SessionState::Loading);
            manager.stop("t", Duration::ZERO).await
        }
    );

    assert!(stopped);
    assert_eq!(played.unwrap().state, SessionState::Stopped);
    assert_eq!(h.backend.start_count(), 0);
    assert!(h.cache.contains(APPLE));
    assert!(manager.session("t").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_volume_set_while_loading_is_used_at_start() {
    let (h, manager) = setup();
    h.http.set_delay(Duration::from_secs(1));

    let (played, changed) = tokio::join!(
        manager.play(PlaySource::url(APPLE), track("t")),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            manager.set_volume("t", 0.25)
        }
    );

    assert!(changed);
    assert_eq!(played.unwrap().volume, 0.25);
    assert_eq!(h.backend.start_params()[0].gain, 0.25);
}

#[tokio::test]
async fn test_load_failure_leaves_no_session() {
    let (h, manager) = setup();
    h.http.fail(APPLE, "offline");

    let err = manager
        .play(PlaySource::url(APPLE), track("t"))
        .await
        .unwrap_err();

    assert!(matches!(err, PlaybackError::Load(LoadError::Network { .. })));
    assert!(manager.session("t").is_none());
}

#[tokio::test]
async fn test_output_failure_is_reported() {
    let (h, manager) = setup();
    h.backend.set_fail_start(true);

    let err = manager
        .play(PlaySource::url(APPLE), track("t"))
        .await
        .unwrap_err();

    assert!(matches!(err, PlaybackError::Output(_)));
    assert!(err.is_transient());
    assert!(manager.active_tracks().is_empty());
}

#[tokio::test]
async fn test_uncached_buffer_released_when_session_ends() {
    let h = harness(CacheConfig::default().with_max_size(500));
    h.http.respond(APPLE, 2_000);
    let manager = SessionManager::new(h.loader.clone(), h.backend.clone());

    manager.play(PlaySource::url(APPLE), track("t")).await.unwrap();
    assert!(h.cache.is_empty());
    assert_eq!(h.backend.live_buffer_count(), 1);

    manager.stop("t", Duration::ZERO).await;
    assert_eq!(h.backend.live_buffer_count(), 0);
}

#[tokio::test]
async fn test_pause_all_stops_everything() {
    let (h, manager) = setup();
    manager.play(PlaySource::url(APPLE), track("a")).await.unwrap();
    manager.play(PlaySource::url(PEAR), track("b")).await.unwrap();

    assert_eq!(manager.pause_all().await, 2);
    assert!(h.backend.playing_voices().is_empty());
    assert!(manager.active_tracks().is_empty());
    assert_eq!(manager.pause_all().await, 0);
}

#[tokio::test]
async fn test_text_source_is_spoken() {
    let (_h, manager) = setup();
    let speech = FakeSpeech::new();
    let manager = manager.with_speech(speech.clone(), Default::default());

    let snapshot = manager
        .play(PlaySource::text("apple"), PlayOptions::default())
        .await
        .unwrap();

    assert_eq!(snapshot.state, SessionState::Completed);
    assert_eq!(snapshot.track_id, "apple");
    assert_eq!(speech.spoken(), vec!["apple".to_string()]);
    assert!(manager.session("apple").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_audio_on_track_cancels_speech() {
    let (h, manager) = setup();
    let speech = FakeSpeech::new();
    speech.set_delay(Duration::from_secs(2));
    let manager = manager.with_speech(speech.clone(), Default::default());

    let (spoken, played) = tokio::join!(
        manager.play(PlaySource::text("apple"), track("card")),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            manager.play(PlaySource::url(APPLE), track("card")).await
        }
    );

    assert_eq!(spoken.unwrap().state, SessionState::Stopped);
    assert_eq!(played.unwrap().state, SessionState::Playing);
    assert_eq!(speech.cancel_count(), 1);
    assert_eq!(h.backend.playing_voices().len(), 1);
}

#[tokio::test]
async fn test_text_without_speech_engine() {
    let (_h, manager) = setup();

    let err = manager
        .play(PlaySource::text("apple"), PlayOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PlaybackError::Unavailable(_)));

    let manager = manager.with_speech(FakeSpeech::unavailable(), Default::default());
    let err = manager
        .play(PlaySource::text("apple"), PlayOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PlaybackError::Unavailable(_)));

    let speech = Arc::new(FakeSpeech::with_languages(&["fr-FR"], true));
    let manager = manager.with_speech(speech, Default::default());
    let err = manager
        .play(PlaySource::text("apple"), PlayOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PlaybackError::SpeechUnsupported(lang) if lang == "en-US"));
}
