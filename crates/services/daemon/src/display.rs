//! Terminal display of playback state and status events

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use gesturemedia_core::playback::PlaybackState;
use gesturemedia_core::reconciler::PlaybackStateReader;
use gesturemedia_core::status::StatusEvent;

pub fn describe_state(state: &PlaybackState) -> String {
    let track = match &state.track {
        Some(track) => format!("{} - {} [{}]", track.title, track.artist_line(), track.album_name),
        None => "nothing playing".to_string(),
    };
    format!(
        "{} {} | shuffle {} | repeat {}",
        if state.is_playing { "▶" } else { "⏸" },
        track,
        if state.shuffle_enabled { "on" } else { "off" },
        state.loop_mode
    )
}

/// Line shown to the user for a status event; `None` for events only worth logging
pub fn describe_event(event: &StatusEvent) -> Option<String> {
    match event {
        StatusEvent::DetectionStarted => Some("gesture detection on".to_string()),
        StatusEvent::DetectionStopped => Some("gesture detection off".to_string()),
        StatusEvent::DetectionDisabled { reason } => {
            Some(format!("gesture detection unavailable ({}); keyboard controls still work", reason))
        }
        StatusEvent::CommandAcknowledged { command } => Some(format!("✓ {}", command)),
        StatusEvent::CredentialMissing { operation } if operation == "dispatch" => {
            Some("not signed in: set an access token to control playback".to_string())
        }
        StatusEvent::CredentialMissing { .. } => None,
        StatusEvent::TransportFailure { operation, message } => Some(format!("{} failed: {}", operation, message)),
    }
}

/// Print status events and every state change until both sources close
pub fn spawn(mut events: broadcast::Receiver<StatusEvent>, mut state: PlaybackStateReader) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut state_open = true;
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => {
                        if let Some(line) = describe_event(&event) {
                            println!("{}", line);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Display fell behind status events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                changed = state.changed(), if state_open => {
                    if changed {
                        println!("{}", describe_state(&state.snapshot()));
                    } else {
                        state_open = false;
                    }
                }
            }
        }
    })
}
