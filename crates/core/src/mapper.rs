//! Gesture → playback command mapping
//!
//! | Gesture | Command |
//! |---|---|
//! | `Play`, `Pause` | `PlayPause` (remote picks the direction) |
//! | `Next` / `Previous` | `Next` / `Previous` |
//! | `VolumeUp` / `VolumeDown` | `VolumeUp` / `VolumeDown` |
//! | `Shuffle` | `SetShuffle(!shuffle_enabled)` |
//! | `Loop` | `SetLoop(loop_mode.next())` |
//! | `None` | nothing |
//!
//! `Shuffle` and `Loop` read the cached [`PlaybackState`], which may be up to
//! one reconciliation interval old. Before the first successful fetch the
//! cache holds the defaults (shuffle off, loop `Off`).

use crate::gesture::GestureLabel;
use crate::playback::{PlaybackCommand, PlaybackState};

#[derive(Debug, Default, Clone, Copy)]
pub struct GestureActionMapper;

impl GestureActionMapper {
    pub fn new() -> Self {
        Self
    }

    /// Command for a gesture given the current cached state
    pub fn map(&self, label: GestureLabel, state: &PlaybackState) -> Option<PlaybackCommand> {
        let command = match label {
            GestureLabel::Play | GestureLabel::Pause => PlaybackCommand::PlayPause,
            GestureLabel::Next => PlaybackCommand::Next,
            GestureLabel::Previous => PlaybackCommand::Previous,
            GestureLabel::VolumeUp => PlaybackCommand::VolumeUp,
            GestureLabel::VolumeDown => PlaybackCommand::VolumeDown,
            GestureLabel::Shuffle => PlaybackCommand::SetShuffle(!state.shuffle_enabled),
            GestureLabel::Loop => PlaybackCommand::SetLoop(state.loop_mode.next()),
            GestureLabel::None => return None,
        };
        Some(command)
    }
}
