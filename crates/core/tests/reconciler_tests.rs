//! Playback state reconciliation

mod common;

use std::sync::Arc;

use serde_json::json;

use common::RecordingRemote;
use gesturemedia_core::credential::Credential;
use gesturemedia_core::playback::{LoopMode, PlaybackCommand, PlaybackState};
use gesturemedia_core::reconciler::{PlaybackReconciler, RefreshOutcome};
use gesturemedia_core::remote::{HttpPlaybackRemote, HttpRemoteConfig};
use gesturemedia_core::status::{ChannelStatusSink, StatusEvent, TracingStatusSink};
use gesturemedia_control_server::{
    player::{Action, Player, RepeatState},
    ControlServer, ServerConfig,
};

fn track_a() -> serde_json::Value {
    json!({
        "is_playing": true,
        "shuffle_state": false,
        "repeat_state": "context",
        "item": {
            "name": "A",
            "artists": [{"name": "Artist"}],
            "album": {"name": "Album", "images": [{"url": "https://covers.example/a.jpg"}]}
        }
    })
}

fn reconciler(remote: Arc<RecordingRemote>) -> PlaybackReconciler {
    PlaybackReconciler::new(remote, Arc::new(TracingStatusSink))
}

#[tokio::test]
async fn test_same_snapshot_twice_is_idempotent() {
    let remote = RecordingRemote::new();
    remote.answer(track_a());
    remote.answer(track_a());
    let reconciler = reconciler(remote.clone());
    let credential = Credential::new("t");

    let first = match reconciler.refresh(Some(&credential)).await {
        RefreshOutcome::Updated(state) => state,
        other => panic!("unexpected outcome: {:?}", other),
    };
    let second = match reconciler.refresh(Some(&credential)).await {
        RefreshOutcome::Updated(state) => state,
        other => panic!("unexpected outcome: {:?}", other),
    };

    assert_eq!(first, second);
    assert_eq!(*reconciler.snapshot(), *first);
    assert_eq!(first.loop_mode, LoopMode::Context);
    assert_eq!(first.track.as_ref().unwrap().title, "A");
}

#[tokio::test]
async fn test_no_session_keeps_cached_track() {
    let remote = RecordingRemote::new();
    remote.answer(track_a());
    remote.answer_no_session();
    let reconciler = reconciler(remote.clone());
    let credential = Credential::new("t");

    assert!(reconciler.refresh(Some(&credential)).await.is_updated());
    assert_eq!(reconciler.refresh(Some(&credential)).await, RefreshOutcome::NoSession);

    let state = reconciler.snapshot();
    assert_eq!(state.track.as_ref().unwrap().title, "A");
    assert_eq!(state.loop_mode, LoopMode::Context);
}

#[tokio::test]
async fn test_partial_response_is_discarded_whole() {
    let remote = RecordingRemote::new();
    remote.answer(track_a());
    // Shuffle changed but repeat state missing: nothing of it may land
    remote.answer(json!({"shuffle_state": true, "item": null}));
    let reconciler = reconciler(remote.clone());
    let credential = Credential::new("t");

    reconciler.refresh(Some(&credential)).await;
    let before = reconciler.snapshot();

    let outcome = reconciler.refresh(Some(&credential)).await;
    assert!(matches!(outcome, RefreshOutcome::Stale(_)));
    assert_eq!(reconciler.snapshot(), before);
    assert!(!reconciler.snapshot().shuffle_enabled);
}

#[tokio::test]
async fn test_refresh_without_credential_makes_no_request() {
    let remote = RecordingRemote::new();
    let (sink, mut status) = ChannelStatusSink::with_default_capacity();
    let reconciler = PlaybackReconciler::new(remote.clone(), Arc::new(sink));

    assert_eq!(reconciler.refresh(None).await, RefreshOutcome::CredentialMissing);
    assert_eq!(remote.fetch_count(), 0);
    assert_eq!(*reconciler.snapshot(), PlaybackState::default());
    assert!(matches!(
        status.recv().await.unwrap(),
        StatusEvent::CredentialMissing { .. }
    ));
}

#[tokio::test]
async fn test_server_wins_over_optimistic_update() {
    let remote = RecordingRemote::new();
    remote.answer(json!({"shuffle_state": false, "repeat_state": "off", "item": null}));
    let reconciler = reconciler(remote.clone());

    reconciler.apply_optimistic(&PlaybackCommand::SetShuffle(true));
    assert!(reconciler.snapshot().shuffle_enabled);

    assert!(reconciler.refresh(Some(&Credential::new("t"))).await.is_updated());
    assert!(!reconciler.snapshot().shuffle_enabled);
}

#[tokio::test]
async fn test_out_of_band_change_converges_over_http() {
    let server = ControlServer::start(
        ServerConfig {
            bind_address: "127.0.0.1:0".to_string(),
            access_token: "secret".to_string(),
        },
        Player::default(),
    )
    .await
    .unwrap();

    let remote = HttpPlaybackRemote::new(HttpRemoteConfig {
        base_url: server.base_url(),
        ..HttpRemoteConfig::default()
    })
    .unwrap();
    let reconciler = PlaybackReconciler::new(Arc::new(remote), Arc::new(TracingStatusSink));
    let credential = Credential::new("secret");

    assert_eq!(reconciler.refresh(Some(&credential)).await, RefreshOutcome::NoSession);

    // Another client turns on repeat and moves to the next track
    {
        let mut player = server.player().lock();
        player.apply(Action::Loop(RepeatState::Track));
        player.apply(Action::Next);
    }

    assert!(reconciler.refresh(Some(&credential)).await.is_updated());
    let state = reconciler.snapshot();
    assert_eq!(state.loop_mode, LoopMode::Track);
    assert!(state.is_playing);
    assert_eq!(state.track.as_ref().unwrap().title, "Thumbs Up");

    // Wrong token is a transport failure and leaves the snapshot alone
    let outcome = reconciler.refresh(Some(&Credential::new("wrong"))).await;
    assert!(matches!(outcome, RefreshOutcome::Failed(_)));
    assert_eq!(reconciler.snapshot(), state);

    server.shutdown().await.unwrap();
}
