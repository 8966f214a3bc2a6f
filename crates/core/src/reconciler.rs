//! Playback state reconciler
//!
//! Sole writer of the cached [`PlaybackState`]. Every write replaces the whole
//! snapshot, so readers see either the old state or the new one and never a
//! mix. Readers hold a [`PlaybackStateReader`].
//!
//! Refresh outcomes:
//!
//! | Remote answer | Cached snapshot |
//! |---|---|
//! | valid body | replaced |
//! | no active session (`204`) | kept |
//! | malformed / partial body | kept (`Stale`) |
//! | transport failure / timeout | kept |
//! | no credential | kept, no request made |

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::{timeout, MissedTickBehavior};

use crate::credential::{Credential, CredentialSource};
use crate::playback::{PlaybackCommand, PlaybackState};
use crate::remote::wire::PlayerStateResponse;
use crate::remote::{PlaybackRemote, RemoteSnapshot};
use crate::scheduler::timer_period;
use crate::status::{report, StatusEvent, StatusSink};
use crate::Error;

const OPERATION: &str = "refresh";

/// Fetch budget when none is configured
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of one refresh
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// Snapshot replaced with the remote state
    Updated(Arc<PlaybackState>),
    /// Remote has no active session; previous snapshot retained
    NoSession,
    /// Response was malformed; previous snapshot retained
    Stale(String),
    /// No credential; nothing was requested
    CredentialMissing,
    /// Remote unreachable or answered with an error status
    Failed(String),
}

impl RefreshOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, RefreshOutcome::Updated(_))
    }
}

/// Read-only view of the cached playback state
#[derive(Clone)]
pub struct PlaybackStateReader {
    rx: watch::Receiver<Arc<PlaybackState>>,
}

impl PlaybackStateReader {
    /// Current snapshot
    pub fn snapshot(&self) -> Arc<PlaybackState> {
        self.rx.borrow().clone()
    }

    /// Wait until the snapshot is replaced. Returns `false` once the
    /// reconciler is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

pub struct PlaybackReconciler {
    remote: Arc<dyn PlaybackRemote>,
    status: Arc<dyn StatusSink>,
    state: watch::Sender<Arc<PlaybackState>>,
    request_timeout: Duration,
    /// Serialises fetch-and-replace so an older response cannot land after a newer one
    refresh_lock: AsyncMutex<()>,
}

impl PlaybackReconciler {
    /// Starts from the defaults (shuffle off, loop `Off`, no track)
    pub fn new(remote: Arc<dyn PlaybackRemote>, status: Arc<dyn StatusSink>) -> Self {
        let (state, _) = watch::channel(Arc::new(PlaybackState::default()));
        Self {
            remote,
            status,
            state,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            refresh_lock: AsyncMutex::new(()),
        }
    }

    /// Bound every state fetch; expiry is handled like a transport failure
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn reader(&self) -> PlaybackStateReader {
        PlaybackStateReader {
            rx: self.state.subscribe(),
        }
    }

    pub fn snapshot(&self) -> Arc<PlaybackState> {
        self.state.borrow().clone()
    }

    /// Fetch the remote state and replace the cached snapshot if it is valid
    pub async fn refresh(&self, credential: Option<&Credential>) -> RefreshOutcome {
        let Some(credential) = credential else {
            tracing::debug!("{}", Error::credential_missing(OPERATION));
            report(
                self.status.as_ref(),
                StatusEvent::CredentialMissing {
                    operation: OPERATION.to_string(),
                },
            );
            return RefreshOutcome::CredentialMissing;
        };

        let _guard = self.refresh_lock.lock().await;

        let fetched = match timeout(self.request_timeout, self.remote.fetch_state(credential)).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout("fetch playback state", self.request_timeout)),
        };

        let body = match fetched {
            Ok(RemoteSnapshot::Active(body)) => body,
            Ok(RemoteSnapshot::NoSession) => {
                tracing::debug!("No active playback session; keeping cached state");
                return RefreshOutcome::NoSession;
            }
            Err(Error::StaleRemoteState(message)) => {
                tracing::warn!("Discarding remote state: {}", message);
                return RefreshOutcome::Stale(message);
            }
            Err(e) => {
                let message = e.to_string();
                report(
                    self.status.as_ref(),
                    StatusEvent::TransportFailure {
                        operation: OPERATION.to_string(),
                        message: message.clone(),
                    },
                );
                return RefreshOutcome::Failed(message);
            }
        };

        match PlayerStateResponse::parse(body) {
            Ok(response) => {
                let next = response.into_state();
                let snapshot = self.replace(next);
                tracing::debug!(
                    shuffle = snapshot.shuffle_enabled,
                    loop_mode = %snapshot.loop_mode,
                    track = snapshot.track.as_ref().map(|t| t.title.as_str()),
                    "Playback state refreshed"
                );
                RefreshOutcome::Updated(snapshot)
            }
            Err(e) => {
                let message = format!("malformed player state: {}", e);
                tracing::warn!("Discarding remote state: {}", message);
                RefreshOutcome::Stale(message)
            }
        }
    }

    /// Record the local effect of a command the remote just accepted.
    /// Only `SetShuffle` and `SetLoop` change anything.
    pub fn apply_optimistic(&self, command: &PlaybackCommand) -> Arc<PlaybackState> {
        self.replace_with(|current| current.apply(command))
    }

    /// Periodic refresh on `interval`, first run immediately. A credential
    /// arriving between ticks triggers an extra refresh right away.
    pub fn spawn_periodic(
        self: &Arc<Self>,
        credentials: Arc<dyn CredentialSource>,
        interval: Duration,
    ) -> JoinHandle<()> {
        let reconciler = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(timer_period("poll_interval", interval));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut acquisitions = credentials.acquisitions();
            loop {
                let acquired = match acquisitions.as_mut() {
                    Some(rx) => tokio::select! {
                        _ = ticker.tick() => Ok(false),
                        changed = rx.changed() => changed.map(|_| true),
                    },
                    None => {
                        ticker.tick().await;
                        Ok(false)
                    }
                };
                match acquired {
                    Ok(true) => tracing::debug!("Credential acquired; refreshing playback state"),
                    Ok(false) => {}
                    Err(_) => {
                        acquisitions = None;
                        continue;
                    }
                }
                let credential = credentials.current();
                let outcome = reconciler.refresh(credential.as_ref()).await;
                tracing::trace!(?outcome, "Periodic refresh");
            }
        })
    }

    /// Wholesale replace; receivers are only notified on an actual change
    fn replace(&self, next: PlaybackState) -> Arc<PlaybackState> {
        self.replace_with(move |_| next)
    }

    /// Derive the next snapshot from the current one and publish it, all
    /// while holding the channel's write lock
    fn replace_with(&self, derive: impl FnOnce(&PlaybackState) -> PlaybackState) -> Arc<PlaybackState> {
        let mut replaced = None;
        self.state.send_if_modified(|current| {
            let next = derive(current.as_ref());
            if **current == next {
                replaced = Some(current.clone());
                false
            } else {
                let snapshot = Arc::new(next);
                *current = snapshot.clone();
                replaced = Some(snapshot);
                true
            }
        });
        replaced.unwrap_or_else(|| self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::LoopMode;
    use crate::status::TracingStatusSink;
    use crate::Result;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;

    struct ScriptedRemote {
        answers: Mutex<VecDeque<Result<RemoteSnapshot>>>,
    }

    impl ScriptedRemote {
        fn new(answers: Vec<Result<RemoteSnapshot>>) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.into()),
            })
        }
    }

    #[async_trait]
    impl PlaybackRemote for ScriptedRemote {
        async fn send_command(&self, _command: PlaybackCommand, _credential: &Credential) -> Result<()> {
            Ok(())
        }

        async fn fetch_state(&self, _credential: &Credential) -> Result<RemoteSnapshot> {
            self.answers
                .lock()
                .pop_front()
                .unwrap_or(Ok(RemoteSnapshot::NoSession))
        }
    }

    /// Accepts commands but never answers a state fetch
    struct StalledRemote;

    #[async_trait]
    impl PlaybackRemote for StalledRemote {
        async fn send_command(&self, _command: PlaybackCommand, _credential: &Credential) -> Result<()> {
            Ok(())
        }

        async fn fetch_state(&self, _credential: &Credential) -> Result<RemoteSnapshot> {
            std::future::pending().await
        }
    }

    fn reconciler(answers: Vec<Result<RemoteSnapshot>>) -> PlaybackReconciler {
        PlaybackReconciler::new(ScriptedRemote::new(answers), Arc::new(TracingStatusSink))
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_snapshot() {
        let reconciler = reconciler(vec![
            Ok(RemoteSnapshot::Active(json!({"shuffle_state": true, "repeat_state": "track"}))),
            Err(Error::Transport("connection refused".to_string())),
        ]);
        let credential = Credential::new("t");

        assert!(reconciler.refresh(Some(&credential)).await.is_updated());
        let outcome = reconciler.refresh(Some(&credential)).await;
        assert!(matches!(outcome, RefreshOutcome::Failed(_)));

        let state = reconciler.snapshot();
        assert!(state.shuffle_enabled);
        assert_eq!(state.loop_mode, LoopMode::Track);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_fetch_times_out_and_keeps_snapshot() {
        use crate::status::ChannelStatusSink;

        let (sink, mut events) = ChannelStatusSink::with_default_capacity();
        let reconciler = PlaybackReconciler::new(Arc::new(StalledRemote), Arc::new(sink))
            .with_request_timeout(Duration::from_secs(2));
        reconciler.apply_optimistic(&PlaybackCommand::SetShuffle(true));
        let started = tokio::time::Instant::now();

        let outcome = reconciler.refresh(Some(&Credential::new("t"))).await;

        assert!(matches!(outcome, RefreshOutcome::Failed(ref message) if message.contains("timed out")));
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(reconciler.snapshot().shuffle_enabled);
        assert_eq!(events.recv().await.unwrap().event_type(), "transport_failure");

        // The refresh lock was released, so the next refresh is not stuck behind it
        let second_cred = Credential::new("t");
        let second = tokio::time::timeout(Duration::from_secs(3), reconciler.refresh(Some(&second_cred)));
        assert!(matches!(second.await, Ok(RefreshOutcome::Failed(_))));
    }

    #[tokio::test]
    async fn test_non_json_body_is_stale() {
        let reconciler = reconciler(vec![Err(Error::StaleRemoteState("not json".to_string()))]);
        let outcome = reconciler.refresh(Some(&Credential::new("t"))).await;
        assert!(matches!(outcome, RefreshOutcome::Stale(_)));
        assert_eq!(*reconciler.snapshot(), PlaybackState::default());
    }

    #[tokio::test]
    async fn test_optimistic_update_notifies_readers() {
        let reconciler = reconciler(vec![]);
        let mut reader = reconciler.reader();

        reconciler.apply_optimistic(&PlaybackCommand::SetLoop(LoopMode::Context));
        assert!(reader.changed().await);
        assert_eq!(reader.snapshot().loop_mode, LoopMode::Context);

        // Stateless commands leave the snapshot alone
        let before = reconciler.snapshot();
        let after = reconciler.apply_optimistic(&PlaybackCommand::Next);
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[tokio::test]
    async fn test_optimistic_update_builds_on_latest_snapshot() {
        let reconciler = reconciler(vec![Ok(RemoteSnapshot::Active(
            json!({"shuffle_state": true, "repeat_state": "off", "is_playing": true}),
        ))]);
        assert!(reconciler.refresh(Some(&Credential::new("t"))).await.is_updated());

        let state = reconciler.apply_optimistic(&PlaybackCommand::SetLoop(LoopMode::Track));
        assert!(state.shuffle_enabled);
        assert!(state.is_playing);
        assert_eq!(state.loop_mode, LoopMode::Track);
        assert!(Arc::ptr_eq(&state, &reconciler.snapshot()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_refresh_runs_immediately() {
        use crate::credential::SharedCredential;

        let reconciler = Arc::new(reconciler(vec![Ok(RemoteSnapshot::Active(
            json!({"shuffle_state": true, "repeat_state": "off"}),
        ))]));
        let mut reader = reconciler.reader();
        let credentials = Arc::new(SharedCredential::with_credential(Credential::new("t")));

        let handle = reconciler.spawn_periodic(credentials, Duration::from_secs(10));
        assert!(reader.changed().await);
        assert!(reader.snapshot().shuffle_enabled);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_credential_acquisition_triggers_refresh() {
        use crate::credential::SharedCredential;

        let reconciler = Arc::new(reconciler(vec![Ok(RemoteSnapshot::Active(
            json!({"shuffle_state": false, "repeat_state": "track"}),
        ))]));
        let mut reader = reconciler.reader();
        let credentials = Arc::new(SharedCredential::new());
        let started = tokio::time::Instant::now();

        let handle = reconciler.spawn_periodic(credentials.clone(), Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(*reconciler.snapshot(), PlaybackState::default());

        credentials.set(Credential::new("t"));
        assert!(reader.changed().await);
        assert_eq!(reader.snapshot().loop_mode, LoopMode::Track);
        assert!(started.elapsed() < Duration::from_secs(10));
        handle.abort();
    }
}
