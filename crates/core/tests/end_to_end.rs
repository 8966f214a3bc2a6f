//! Full session against an in-process control server:
//! frame → classification → mapping → dispatch → refresh

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{RecordingRemote, ScriptedClassifier, StaticFrames};
use gesturemedia_core::credential::{Credential, SharedCredential};
use gesturemedia_core::dispatcher::DispatchOutcome;
use gesturemedia_core::gesture::GestureLabel;
use gesturemedia_core::pipeline::{GestureSession, GestureSessionBuilder};
use gesturemedia_core::playback::{LoopMode, PlaybackCommand, PlaybackState};
use gesturemedia_core::reconciler::PlaybackStateReader;
use gesturemedia_core::remote::{HttpPlaybackRemote, HttpRemoteConfig};
use gesturemedia_core::scheduler::{SchedulerConfig, SchedulerPhase};
use gesturemedia_core::status::{ChannelStatusSink, StatusEvent};
use gesturemedia_control_server::{player::Player, ControlServer, ServerConfig};

const TOKEN: &str = "e2e-token";

async fn start_server() -> anyhow::Result<ControlServer> {
    common::init_tracing();
    let server = ControlServer::start(
        ServerConfig {
            bind_address: "127.0.0.1:0".to_string(),
            access_token: TOKEN.to_string(),
        },
        Player::default(),
    )
    .await?;
    Ok(server)
}

fn builder(server: &ControlServer, credentials: Arc<SharedCredential>) -> GestureSessionBuilder {
    let remote = HttpPlaybackRemote::new(HttpRemoteConfig {
        base_url: server.base_url(),
        ..HttpRemoteConfig::default()
    })
    .unwrap();
    let (sink, _) = ChannelStatusSink::with_default_capacity();
    GestureSessionBuilder::new(Arc::new(remote), credentials, Arc::new(sink))
}

/// Wait until the cached state satisfies `predicate`
async fn wait_for(reader: &mut PlaybackStateReader, predicate: impl Fn(&PlaybackState) -> bool) -> Arc<PlaybackState> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let snapshot = reader.snapshot();
            if predicate(snapshot.as_ref()) {
                return snapshot;
            }
            assert!(reader.changed().await, "reconciler dropped");
        }
    })
    .await
    .expect("state did not converge in time")
}

#[tokio::test]
async fn test_shuffle_gesture_converges_with_server() -> anyhow::Result<()> {
    let server = start_server().await?;
    let credentials = Arc::new(SharedCredential::with_credential(Credential::new(TOKEN)));
    let classifier = Arc::new(ScriptedClassifier::always(GestureLabel::Shuffle, 0.9));

    let session = builder(&server, credentials)
        .with_scheduler_config(SchedulerConfig {
            tick_interval: Duration::from_millis(50),
            min_interval: Duration::from_secs(30),
            confidence_threshold: 0.5,
            ..SchedulerConfig::default()
        })
        .with_detector(Arc::new(StaticFrames), classifier.clone())
        .start();
    let mut reader = session.state();
    assert!(!reader.snapshot().shuffle_enabled);

    assert!(session.start_detection());

    // Converged once the post-command refresh has brought back server data
    let state = wait_for(&mut reader, |s| s.shuffle_enabled && s.track.is_some()).await;
    assert!(state.shuffle_enabled);
    assert!(server.player().lock().shuffle());
    assert_eq!(classifier.calls(), 1);

    session.stop_detection();
    assert_eq!(session.detection_phase(), Some(SchedulerPhase::Idle));
    session.shutdown().await;
    server.shutdown().await
}

#[tokio::test]
async fn test_manual_controls_without_detector() -> anyhow::Result<()> {
    let server = start_server().await?;
    let credentials = Arc::new(SharedCredential::with_credential(Credential::new(TOKEN)));
    let session: GestureSession = builder(&server, credentials)
        .detection_unavailable("camera not found")
        .start();

    assert!(!session.start_detection());
    assert_eq!(session.detection_phase(), None);

    let pipeline = session.pipeline();
    assert!(pipeline.handle_manual(PlaybackCommand::Play).await.is_sent());
    assert!(server.player().lock().is_playing());

    // Three loop gestures cycle Off → Context → Track → Off on both sides
    for expected in [LoopMode::Context, LoopMode::Track, LoopMode::Off] {
        let outcome = pipeline.handle_gesture(GestureLabel::Loop).await;
        assert_eq!(outcome, Some(DispatchOutcome::Sent));
        assert_eq!(session.state().snapshot().loop_mode, expected);
    }

    assert_eq!(pipeline.handle_gesture(GestureLabel::None).await, None);

    session.shutdown().await;
    server.shutdown().await
}

#[tokio::test]
async fn test_signed_out_session_sends_nothing() -> anyhow::Result<()> {
    let server = start_server().await?;
    let credentials = Arc::new(SharedCredential::new());
    let (sink, mut status) = ChannelStatusSink::with_default_capacity();
    let remote = HttpPlaybackRemote::new(HttpRemoteConfig {
        base_url: server.base_url(),
        ..HttpRemoteConfig::default()
    })
    .unwrap();
    let session = GestureSessionBuilder::new(Arc::new(remote), credentials.clone(), Arc::new(sink))
        .detection_unavailable("no model")
        .start();

    let outcome = session.pipeline().handle_manual(PlaybackCommand::Next).await;
    assert_eq!(outcome, DispatchOutcome::CredentialMissing);
    assert!(!server.player().lock().is_active());

    let mut saw_missing = false;
    while let Ok(event) = status.try_recv() {
        if matches!(event, StatusEvent::CredentialMissing { ref operation } if operation == "dispatch") {
            saw_missing = true;
        }
    }
    assert!(saw_missing);

    // Signing in makes the same action go through
    credentials.set(Credential::new(TOKEN));
    assert!(session.pipeline().handle_manual(PlaybackCommand::Next).await.is_sent());
    assert!(server.player().lock().is_active());

    session.shutdown().await;
    server.shutdown().await
}

#[tokio::test(start_paused = true)]
async fn test_zero_timer_periods_keep_background_loops_alive() {
    let remote = RecordingRemote::new();
    let credentials = Arc::new(SharedCredential::with_credential(Credential::new(TOKEN)));
    let (sink, _) = ChannelStatusSink::with_default_capacity();
    let session = GestureSessionBuilder::new(remote.clone(), credentials, Arc::new(sink))
        .with_scheduler_config(SchedulerConfig {
            tick_interval: Duration::ZERO,
            min_interval: Duration::from_secs(60),
            ..SchedulerConfig::default()
        })
        .with_poll_interval(Duration::ZERO)
        .with_detector(
            Arc::new(StaticFrames),
            Arc::new(ScriptedClassifier::always(GestureLabel::Next, 0.9)),
        )
        .start();

    assert!(session.start_detection());
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(remote.sent(), vec![PlaybackCommand::Next]);
    assert!(remote.fetch_count() > 2);
    assert!(session.is_detecting());
    session.shutdown().await;
}
