//! Inference scheduler
//!
//! Drives the detection loop. Each tick may start at most one inference, and
//! only when both guards hold:
//!
//! - no inference is in flight (at most one `classify` call outstanding)
//! - at least `min_interval` has passed since the last *completed* inference,
//!   successful or not
//!
//! A tick that fails a guard is skipped, never queued. Accepted detections are
//! sent on an mpsc channel in completion order, which is also submission order
//! because inferences never overlap.
//!
//! ```text
//!            tick (guards pass)
//!   Idle ─────────────────────────▶ InFlight
//!    ▲                                 │ frame → classify → (emit)
//!    └─────────────────────────────────┘
//!                                      │ model failed to load
//!                                      ▼
//!                                   Disabled (terminal)
//! ```

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant, MissedTickBehavior};

use crate::capture::FrameSource;
use crate::classifier::{Classification, Classifier};
use crate::gesture::DetectionEvent;
use crate::status::{report, StatusEvent, StatusSink};

/// Timing and acceptance policy for the detection loop
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often the loop ticks
    pub tick_interval: Duration,
    /// Minimum time between the end of one inference and the start of the next
    pub min_interval: Duration,
    /// Detections below this confidence are treated as `None`
    pub confidence_threshold: f32,
    /// Budget for acquiring a frame
    pub frame_timeout: Duration,
    /// Budget for one classification
    pub inference_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            min_interval: Duration::from_millis(5000),
            confidence_threshold: 0.5,
            frame_timeout: Duration::from_secs(1),
            inference_timeout: Duration::from_secs(5),
        }
    }
}

/// Scheduler phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    Idle,
    InFlight,
    /// The classifier can never become ready; detection is off for good
    Disabled,
}

/// Why a tick did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Detection is not enabled
    Stopped,
    /// Detection was permanently disabled
    Disabled,
    /// An inference is already outstanding
    InFlight,
    /// The minimum interval since the last completion has not passed
    RateLimited,
}

/// Result of a tick
#[derive(Debug)]
pub enum TickOutcome {
    /// An inference was started; the handle resolves when it completes
    Started(JoinHandle<InferenceOutcome>),
    Skipped(SkipReason),
}

impl TickOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, TickOutcome::Started(_))
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            TickOutcome::Started(_) => None,
            TickOutcome::Skipped(reason) => Some(*reason),
        }
    }
}

/// What a single inference produced
#[derive(Debug, Clone, PartialEq)]
pub enum InferenceOutcome {
    /// Detection accepted and sent downstream
    Emitted(DetectionEvent),
    /// Frame source had nothing; the interval was not consumed
    NoFrame,
    /// Classifier saw no gesture
    NoGesture,
    /// Gesture below the confidence threshold
    BelowThreshold(Classification),
    /// Classification failed or timed out
    Failed(String),
    /// Result arrived after detection was stopped, or downstream was full
    Discarded,
    /// Classifier reported a permanent failure
    Disabled(String),
}

struct SchedulerState {
    phase: SchedulerPhase,
    running: bool,
    /// Bumped on every stop so late results can be recognised
    generation: u64,
    last_completed: Option<Instant>,
}

struct Shared {
    source: Arc<dyn FrameSource>,
    classifier: Arc<dyn Classifier>,
    config: SchedulerConfig,
    events: mpsc::Sender<DetectionEvent>,
    status: Arc<dyn StatusSink>,
    state: Mutex<SchedulerState>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

/// Gesture detection loop with mutual exclusion and rate limiting
#[derive(Clone)]
pub struct InferenceScheduler {
    shared: Arc<Shared>,
}

impl InferenceScheduler {
    pub fn new(
        source: Arc<dyn FrameSource>,
        classifier: Arc<dyn Classifier>,
        config: SchedulerConfig,
        events: mpsc::Sender<DetectionEvent>,
        status: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                source,
                classifier,
                config,
                events,
                status,
                state: Mutex::new(SchedulerState {
                    phase: SchedulerPhase::Idle,
                    running: false,
                    generation: 0,
                    last_completed: None,
                }),
                loop_handle: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.shared.state.lock().phase
    }

    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    /// Enable detection and start ticking. Returns `false` if detection has
    /// been permanently disabled.
    pub fn start(&self) -> bool {
        {
            let mut state = self.shared.state.lock();
            if state.phase == SchedulerPhase::Disabled {
                return false;
            }
            if state.running {
                return true;
            }
            state.running = true;
        }

        let weak = Arc::downgrade(&self.shared);
        let tick_interval = timer_period("tick_interval", self.shared.config.tick_interval);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + tick_interval, tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let Some(shared) = Weak::upgrade(&weak) else {
                    break;
                };
                let outcome = InferenceScheduler { shared }.tick();
                if let TickOutcome::Skipped(reason) = outcome {
                    tracing::trace!(?reason, "Tick skipped");
                    if matches!(reason, SkipReason::Stopped | SkipReason::Disabled) {
                        break;
                    }
                }
            }
        });

        if let Some(previous) = self.shared.loop_handle.lock().replace(handle) {
            previous.abort();
        }

        tracing::info!(
            min_interval_ms = self.shared.config.min_interval.as_millis() as u64,
            threshold = self.shared.config.confidence_threshold,
            "Gesture detection started"
        );
        report(self.shared.status.as_ref(), StatusEvent::DetectionStarted);
        true
    }

    /// Disable detection. Future ticks are cancelled; an inference already in
    /// flight runs to completion and its result is dropped.
    pub fn stop(&self) {
        {
            let mut state = self.shared.state.lock();
            if !state.running {
                return;
            }
            state.running = false;
            state.generation = state.generation.wrapping_add(1);
        }
        self.shared.stop_loop();

        tracing::info!("Gesture detection stopped");
        report(self.shared.status.as_ref(), StatusEvent::DetectionStopped);
    }

    /// One scheduling decision. Never blocks; the inference itself runs on a
    /// spawned task.
    pub fn tick(&self) -> TickOutcome {
        let generation = {
            let mut state = self.shared.state.lock();
            if state.phase == SchedulerPhase::Disabled {
                return TickOutcome::Skipped(SkipReason::Disabled);
            }
            if !state.running {
                return TickOutcome::Skipped(SkipReason::Stopped);
            }
            if state.phase == SchedulerPhase::InFlight {
                return TickOutcome::Skipped(SkipReason::InFlight);
            }
            if let Some(last) = state.last_completed {
                if last.elapsed() < self.shared.config.min_interval {
                    return TickOutcome::Skipped(SkipReason::RateLimited);
                }
            }
            state.phase = SchedulerPhase::InFlight;
            state.generation
        };

        let shared = self.shared.clone();
        TickOutcome::Started(tokio::spawn(async move { shared.run_inference(generation).await }))
    }
}

impl Shared {
    fn stop_loop(&self) {
        if let Some(handle) = self.loop_handle.lock().take() {
            handle.abort();
        }
    }

    async fn run_inference(&self, generation: u64) -> InferenceOutcome {
        let frame = match timeout(self.config.frame_timeout, self.source.acquire()).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::debug!("No frame available");
                self.state.lock().phase = SchedulerPhase::Idle;
                return InferenceOutcome::NoFrame;
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.config.frame_timeout.as_millis() as u64,
                    "Frame acquisition timed out"
                );
                self.state.lock().phase = SchedulerPhase::Idle;
                return InferenceOutcome::NoFrame;
            }
        };

        let started = Instant::now();
        let result = timeout(self.config.inference_timeout, self.classifier.classify(&frame)).await;
        drop(frame);
        let completed_at = Instant::now();

        let outcome = match result {
            Err(_) => InferenceOutcome::Failed(format!(
                "classification timed out after {}ms",
                self.config.inference_timeout.as_millis()
            )),
            Ok(Err(e)) if e.is_permanent() => InferenceOutcome::Disabled(e.to_string()),
            Ok(Err(e)) => InferenceOutcome::Failed(e.to_string()),
            Ok(Ok(classification)) => self.evaluate(classification, completed_at),
        };

        tracing::debug!(
            classifier = self.classifier.name(),
            elapsed_ms = (completed_at - started).as_millis() as u64,
            ?outcome,
            "Inference complete"
        );

        // Completion is recorded for every outcome so failures also wait out
        // the interval. Emission happens under the lock so a later inference
        // can never overtake this one on the channel.
        let mut state = self.state.lock();
        state.last_completed = Some(completed_at);

        match outcome {
            InferenceOutcome::Disabled(reason) => {
                state.phase = SchedulerPhase::Disabled;
                state.running = false;
                drop(state);
                self.stop_loop();
                tracing::error!(reason = %reason, "Classifier unavailable; disabling detection");
                report(
                    self.status.as_ref(),
                    StatusEvent::DetectionDisabled {
                        reason: reason.clone(),
                    },
                );
                InferenceOutcome::Disabled(reason)
            }
            InferenceOutcome::Emitted(event) => {
                state.phase = SchedulerPhase::Idle;
                if !state.running || state.generation != generation {
                    tracing::debug!(label = %event.label, "Detection stopped meanwhile; dropping result");
                    return InferenceOutcome::Discarded;
                }
                match self.events.try_send(event) {
                    Ok(()) => {
                        tracing::info!(
                            label = %event.label,
                            confidence = event.confidence,
                            "Gesture detected"
                        );
                        InferenceOutcome::Emitted(event)
                    }
                    Err(e) => {
                        tracing::warn!(label = %event.label, "Detection dropped: {}", e);
                        InferenceOutcome::Discarded
                    }
                }
            }
            other => {
                state.phase = SchedulerPhase::Idle;
                if let InferenceOutcome::Failed(message) = &other {
                    tracing::warn!("Classification failed: {}", message);
                }
                other
            }
        }
    }

    fn evaluate(&self, classification: Classification, completed_at: Instant) -> InferenceOutcome {
        if !classification.confidence.is_finite() {
            InferenceOutcome::Failed(format!(
                "classifier returned non-finite confidence for {}",
                classification.label
            ))
        } else if !classification.label.is_actionable() {
            InferenceOutcome::NoGesture
        } else if classification.confidence < self.config.confidence_threshold {
            InferenceOutcome::BelowThreshold(classification)
        } else {
            InferenceOutcome::Emitted(DetectionEvent::new(
                classification.label,
                classification.confidence,
                completed_at,
            ))
        }
    }
}

/// Shortest period a timer loop accepts; tokio intervals panic on zero
pub(crate) const MIN_TIMER_PERIOD: Duration = Duration::from_millis(1);

pub(crate) fn timer_period(name: &str, period: Duration) -> Duration {
    if period < MIN_TIMER_PERIOD {
        tracing::warn!(
            setting = name,
            "Timer period {:?} too short; using {:?}",
            period,
            MIN_TIMER_PERIOD
        );
        MIN_TIMER_PERIOD
    } else {
        period
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.stop_loop();
    }
}
