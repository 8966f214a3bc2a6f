//! Shared fakes for integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use gesturemedia_core::capture::{Frame, FrameSource};
use gesturemedia_core::classifier::{Classification, Classifier, ClassifierError};
use gesturemedia_core::credential::Credential;
use gesturemedia_core::gesture::GestureLabel;
use gesturemedia_core::playback::PlaybackCommand;
use gesturemedia_core::remote::{PlaybackRemote, RemoteSnapshot};
use gesturemedia_core::Result;

/// Log to the test harness output; honours `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn tiny_frame() -> Frame {
    Frame::from_rgb(2, 2, vec![0; 12]).unwrap()
}

/// Always has the same frame ready
pub struct StaticFrames;

#[async_trait]
impl FrameSource for StaticFrames {
    async fn acquire(&self) -> Option<Frame> {
        Some(tiny_frame())
    }
}

/// Never has a frame
pub struct NoFrames;

#[async_trait]
impl FrameSource for NoFrames {
    async fn acquire(&self) -> Option<Frame> {
        None
    }
}

/// Classifier returning scripted results, then a fallback, after an optional delay.
/// Tracks how many calls overlap.
pub struct ScriptedClassifier {
    script: Mutex<VecDeque<std::result::Result<Classification, ClassifierError>>>,
    fallback: std::result::Result<Classification, ClassifierError>,
    delay: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
    calls: AtomicUsize,
}

impl ScriptedClassifier {
    pub fn always(label: GestureLabel, confidence: f32) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Ok(Classification::new(label, confidence)),
            delay: Duration::ZERO,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: ClassifierError) -> Self {
        Self {
            fallback: Err(error),
            ..Self::always(GestureLabel::None, 0.0)
        }
    }

    pub fn then(self, result: std::result::Result<Classification, ClassifierError>) -> Self {
        self.script.lock().push_back(result);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn classify(&self, _frame: &Frame) -> std::result::Result<Classification, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Remote that records every call and answers state requests from a script
#[derive(Default)]
pub struct RecordingRemote {
    pub sent: Mutex<Vec<PlaybackCommand>>,
    pub fetches: AtomicUsize,
    answers: Mutex<VecDeque<RemoteSnapshot>>,
}

impl RecordingRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn answer(&self, body: Value) {
        self.answers.lock().push_back(RemoteSnapshot::Active(body));
    }

    pub fn answer_no_session(&self) {
        self.answers.lock().push_back(RemoteSnapshot::NoSession);
    }

    pub fn sent(&self) -> Vec<PlaybackCommand> {
        self.sent.lock().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlaybackRemote for RecordingRemote {
    async fn send_command(&self, command: PlaybackCommand, _credential: &Credential) -> Result<()> {
        self.sent.lock().push(command);
        Ok(())
    }

    async fn fetch_state(&self, _credential: &Credential) -> Result<RemoteSnapshot> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .answers
            .lock()
            .pop_front()
            .unwrap_or(RemoteSnapshot::NoSession))
    }
}

/// Accepts every command but never answers a state fetch
#[derive(Default)]
pub struct StalledStateRemote {
    sent: Mutex<Vec<PlaybackCommand>>,
}

impl StalledStateRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<PlaybackCommand> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl PlaybackRemote for StalledStateRemote {
    async fn send_command(&self, command: PlaybackCommand, _credential: &Credential) -> Result<()> {
        self.sent.lock().push(command);
        Ok(())
    }

    async fn fetch_state(&self, _credential: &Credential) -> Result<RemoteSnapshot> {
        std::future::pending::<Result<RemoteSnapshot>>().await
    }
}
