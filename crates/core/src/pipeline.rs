//! Detection → mapping → dispatch → refresh wiring
//!
//! [`GesturePipeline`] turns detections (and manual controls) into commands
//! one at a time, so two commands never race on the same cached
//! shuffle/loop state. [`GestureSession`] owns everything that runs in the
//! background for one user session and tears it down in one place.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use crate::capture::{CameraSession, FrameSource};
use crate::classifier::Classifier;
use crate::config::Config;
use crate::credential::CredentialSource;
use crate::dispatcher::{CommandDispatcher, DispatchOutcome};
use crate::gesture::{DetectionEvent, GestureLabel};
use crate::mapper::GestureActionMapper;
use crate::playback::PlaybackCommand;
use crate::reconciler::{PlaybackReconciler, PlaybackStateReader, RefreshOutcome};
use crate::remote::PlaybackRemote;
use crate::scheduler::{InferenceScheduler, SchedulerConfig, SchedulerPhase};
use crate::status::{report, Acknowledgements, StatusEvent, StatusSink};

pub struct GesturePipeline {
    mapper: GestureActionMapper,
    reconciler: Arc<PlaybackReconciler>,
    dispatcher: Arc<CommandDispatcher>,
    credentials: Arc<dyn CredentialSource>,
    /// Held from mapping until the post-command refresh finishes
    turn: AsyncMutex<()>,
}

impl GesturePipeline {
    pub fn new(
        reconciler: Arc<PlaybackReconciler>,
        dispatcher: Arc<CommandDispatcher>,
        credentials: Arc<dyn CredentialSource>,
    ) -> Self {
        Self {
            mapper: GestureActionMapper::new(),
            reconciler,
            dispatcher,
            credentials,
            turn: AsyncMutex::new(()),
        }
    }

    pub fn state(&self) -> PlaybackStateReader {
        self.reconciler.reader()
    }

    pub fn acknowledgements(&self) -> &Arc<Acknowledgements> {
        self.dispatcher.acknowledgements()
    }

    /// Consume detections until the sender side closes
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<DetectionEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_detection(event).await;
        }
        tracing::debug!("Detection channel closed");
    }

    pub async fn handle_detection(&self, event: DetectionEvent) -> Option<DispatchOutcome> {
        tracing::debug!(label = %event.label, confidence = event.confidence, "Handling detection");
        self.handle_gesture(event.label).await
    }

    /// Map a gesture against the cached state and dispatch the result.
    /// `None` when the gesture has no command.
    pub async fn handle_gesture(&self, label: GestureLabel) -> Option<DispatchOutcome> {
        let _turn = self.turn.lock().await;
        let state = self.reconciler.snapshot();
        let command = self.mapper.map(label, &state)?;
        Some(self.send(command).await)
    }

    /// Explicit command from the manual controls
    pub async fn handle_manual(&self, command: PlaybackCommand) -> DispatchOutcome {
        let _turn = self.turn.lock().await;
        self.send(command).await
    }

    /// Fetch the remote state now
    pub async fn refresh_now(&self) -> RefreshOutcome {
        let credential = self.credentials.current();
        self.reconciler.refresh(credential.as_ref()).await
    }

    async fn send(&self, command: PlaybackCommand) -> DispatchOutcome {
        let credential = self.credentials.current();
        self.dispatcher.dispatch(command, credential.as_ref()).await
    }
}

/// Builds a [`GestureSession`]
pub struct GestureSessionBuilder {
    remote: Arc<dyn PlaybackRemote>,
    credentials: Arc<dyn CredentialSource>,
    status: Arc<dyn StatusSink>,
    scheduler_config: SchedulerConfig,
    poll_interval: Duration,
    request_timeout: Duration,
    ack_display: Duration,
    event_buffer: usize,
    detector: Option<(Arc<dyn FrameSource>, Arc<dyn Classifier>)>,
    camera: Option<Arc<CameraSession>>,
    unavailable: Option<String>,
}

impl GestureSessionBuilder {
    pub fn new(
        remote: Arc<dyn PlaybackRemote>,
        credentials: Arc<dyn CredentialSource>,
        status: Arc<dyn StatusSink>,
    ) -> Self {
        let defaults = Config::default();
        Self {
            remote,
            credentials,
            status,
            scheduler_config: SchedulerConfig::default(),
            poll_interval: defaults.reconcile.poll_interval(),
            request_timeout: defaults.remote.request_timeout(),
            ack_display: defaults.ui.ack_display(),
            event_buffer: defaults.detection.event_buffer,
            detector: None,
            camera: None,
            unavailable: None,
        }
    }

    pub fn with_config(mut self, config: &Config) -> Self {
        self.scheduler_config = config.detection.scheduler_config();
        self.poll_interval = config.reconcile.poll_interval();
        self.request_timeout = config.remote.request_timeout();
        self.ack_display = config.ui.ack_display();
        self.event_buffer = config.detection.event_buffer.max(1);
        self
    }

    pub fn with_scheduler_config(mut self, config: SchedulerConfig) -> Self {
        self.scheduler_config = config;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Detect gestures from `source`
    pub fn with_detector(mut self, source: Arc<dyn FrameSource>, classifier: Arc<dyn Classifier>) -> Self {
        self.detector = Some((source, classifier));
        self
    }

    /// Detect gestures from an open camera; the session closes it on shutdown
    pub fn with_camera(mut self, camera: Arc<CameraSession>, classifier: Arc<dyn Classifier>) -> Self {
        let source: Arc<dyn FrameSource> = camera.clone();
        self.detector = Some((source, classifier));
        self.camera = Some(camera);
        self
    }

    /// Run with manual controls only, reporting why detection is off
    pub fn detection_unavailable(mut self, reason: impl Into<String>) -> Self {
        self.detector = None;
        self.unavailable = Some(reason.into());
        self
    }

    /// Spawn the background tasks. Must be called inside a tokio runtime.
    pub fn start(self) -> GestureSession {
        let reconciler = Arc::new(
            PlaybackReconciler::new(self.remote.clone(), self.status.clone())
                .with_request_timeout(self.request_timeout),
        );
        let acknowledgements = Arc::new(Acknowledgements::new(self.ack_display));
        let dispatcher = Arc::new(CommandDispatcher::new(
            self.remote,
            reconciler.clone(),
            self.status.clone(),
            acknowledgements,
            self.request_timeout,
        ));
        let pipeline = Arc::new(GesturePipeline::new(
            reconciler.clone(),
            dispatcher,
            self.credentials.clone(),
        ));

        let (events_tx, events_rx) = mpsc::channel(self.event_buffer);
        let scheduler = self.detector.map(|(source, classifier)| {
            InferenceScheduler::new(
                source,
                classifier,
                self.scheduler_config,
                events_tx,
                self.status.clone(),
            )
        });

        let tasks = vec![
            tokio::spawn(pipeline.clone().run(events_rx)),
            reconciler.spawn_periodic(self.credentials, self.poll_interval),
        ];

        if let Some(reason) = &self.unavailable {
            tracing::warn!(reason = %reason, "Gesture detection unavailable; manual controls only");
            report(
                self.status.as_ref(),
                StatusEvent::DetectionDisabled {
                    reason: reason.clone(),
                },
            );
        }

        GestureSession {
            pipeline,
            scheduler,
            camera: self.camera,
            tasks,
        }
    }
}

/// Running session: detection loop, detection consumer and periodic refresh
pub struct GestureSession {
    pipeline: Arc<GesturePipeline>,
    scheduler: Option<InferenceScheduler>,
    camera: Option<Arc<CameraSession>>,
    tasks: Vec<JoinHandle<()>>,
}

impl GestureSession {
    pub fn pipeline(&self) -> &Arc<GesturePipeline> {
        &self.pipeline
    }

    pub fn state(&self) -> PlaybackStateReader {
        self.pipeline.state()
    }

    /// `None` when the session runs without a detector
    pub fn detection_phase(&self) -> Option<SchedulerPhase> {
        self.scheduler.as_ref().map(|s| s.phase())
    }

    pub fn is_detecting(&self) -> bool {
        self.scheduler.as_ref().is_some_and(|s| s.is_running())
    }

    /// Returns `false` when detection is unavailable or disabled
    pub fn start_detection(&self) -> bool {
        match &self.scheduler {
            Some(scheduler) => scheduler.start(),
            None => {
                tracing::warn!("No detector configured; cannot start detection");
                false
            }
        }
    }

    pub fn stop_detection(&self) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.stop();
        }
    }

    /// Stop detection, cancel background tasks and release the camera
    pub async fn shutdown(mut self) {
        self.stop_detection();
        for task in self.tasks.drain(..) {
            task.abort();
            let _ = task.await;
        }
        if let Some(camera) = self.camera.take() {
            camera.close();
        }
        tracing::info!("Session shut down");
    }
}

impl Drop for GestureSession {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
