//! Command dispatcher
//!
//! One attempt per command. No retry, no queue: a failed dispatch is reported
//! and forgotten, and the next gesture or manual action is the only recovery.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::credential::Credential;
use crate::playback::PlaybackCommand;
use crate::reconciler::{PlaybackReconciler, RefreshOutcome};
use crate::remote::PlaybackRemote;
use crate::status::{report, Acknowledgements, StatusEvent, StatusSink};
use crate::Error;

const OPERATION: &str = "dispatch";

/// What happened to a dispatched command
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Remote accepted the command
    Sent,
    /// No credential; nothing was sent
    CredentialMissing,
    /// Remote unreachable, error status, or timeout
    Failed(String),
}

impl DispatchOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, DispatchOutcome::Sent)
    }
}

pub struct CommandDispatcher {
    remote: Arc<dyn PlaybackRemote>,
    reconciler: Arc<PlaybackReconciler>,
    status: Arc<dyn StatusSink>,
    acknowledgements: Arc<Acknowledgements>,
    request_timeout: Duration,
}

impl CommandDispatcher {
    pub fn new(
        remote: Arc<dyn PlaybackRemote>,
        reconciler: Arc<PlaybackReconciler>,
        status: Arc<dyn StatusSink>,
        acknowledgements: Arc<Acknowledgements>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            remote,
            reconciler,
            status,
            acknowledgements,
            request_timeout,
        }
    }

    pub fn acknowledgements(&self) -> &Arc<Acknowledgements> {
        &self.acknowledgements
    }

    /// Send `command` and, once the remote accepts it, record the local
    /// effect and re-sync the cached state.
    pub async fn dispatch(&self, command: PlaybackCommand, credential: Option<&Credential>) -> DispatchOutcome {
        let Some(credential) = credential else {
            tracing::warn!(%command, "{}", Error::credential_missing(OPERATION));
            report(
                self.status.as_ref(),
                StatusEvent::CredentialMissing {
                    operation: OPERATION.to_string(),
                },
            );
            return DispatchOutcome::CredentialMissing;
        };

        let result = match timeout(self.request_timeout, self.remote.send_command(command, credential)).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(format!("dispatch {}", command), self.request_timeout)),
        };

        if let Err(e) = result {
            let message = e.to_string();
            tracing::warn!(%command, "Dispatch failed: {}", message);
            report(
                self.status.as_ref(),
                StatusEvent::TransportFailure {
                    operation: OPERATION.to_string(),
                    message: message.clone(),
                },
            );
            return DispatchOutcome::Failed(message);
        }

        tracing::info!(%command, "Command sent");

        if matches!(command, PlaybackCommand::SetShuffle(_) | PlaybackCommand::SetLoop(_)) {
            self.reconciler.apply_optimistic(&command);
        }

        self.acknowledgements.show(command);
        report(
            self.status.as_ref(),
            StatusEvent::CommandAcknowledged {
                command: command.to_string(),
            },
        );

        match self.reconciler.refresh(Some(credential)).await {
            RefreshOutcome::Updated(_) | RefreshOutcome::NoSession => {}
            other => tracing::debug!(outcome = ?other, "Post-command refresh did not update state"),
        }

        DispatchOutcome::Sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::LoopMode;
    use crate::remote::RemoteSnapshot;
    use crate::status::ChannelStatusSink;
    use crate::Result;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct FailingRemote {
        attempts: Mutex<u32>,
    }

    #[async_trait]
    impl PlaybackRemote for FailingRemote {
        async fn send_command(&self, _command: PlaybackCommand, _credential: &Credential) -> Result<()> {
            *self.attempts.lock() += 1;
            Err(Error::Transport("HTTP 500 Internal Server Error".to_string()))
        }

        async fn fetch_state(&self, _credential: &Credential) -> Result<RemoteSnapshot> {
            Ok(RemoteSnapshot::NoSession)
        }
    }

    #[tokio::test]
    async fn test_failure_is_not_retried_and_leaves_state() {
        let remote = Arc::new(FailingRemote::default());
        let (sink, mut events) = ChannelStatusSink::with_default_capacity();
        let status: Arc<dyn StatusSink> = Arc::new(sink);
        let reconciler = Arc::new(PlaybackReconciler::new(remote.clone(), status.clone()));
        let dispatcher = CommandDispatcher::new(
            remote.clone(),
            reconciler.clone(),
            status,
            Arc::new(Acknowledgements::default()),
            Duration::from_secs(1),
        );

        let outcome = dispatcher
            .dispatch(PlaybackCommand::SetLoop(LoopMode::Context), Some(&Credential::new("t")))
            .await;

        assert!(matches!(outcome, DispatchOutcome::Failed(_)));
        assert_eq!(*remote.attempts.lock(), 1);
        assert_eq!(reconciler.snapshot().loop_mode, LoopMode::Off);
        assert!(dispatcher.acknowledgements().visible().is_none());
        assert_eq!(events.recv().await.unwrap().event_type(), "transport_failure");
    }
}
