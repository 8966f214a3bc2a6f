//! Playback commands and the locally cached playback state

use serde::{Deserialize, Serialize};
use std::fmt;

/// Repeat mode of the remote player, cycling `Off → Context → Track → Off`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    #[default]
    Off,
    /// Repeat the current playlist / album
    Context,
    /// Repeat the current track
    Track,
}

impl LoopMode {
    /// Next mode in the cycle
    pub fn next(self) -> Self {
        match self {
            LoopMode::Off => LoopMode::Context,
            LoopMode::Context => LoopMode::Track,
            LoopMode::Track => LoopMode::Off,
        }
    }

    /// Wire representation (`"off"`, `"context"`, `"track"`)
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopMode::Off => "off",
            LoopMode::Context => "context",
            LoopMode::Track => "track",
        }
    }

    /// Parse the wire representation
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "off" => Some(LoopMode::Off),
            "context" => Some(LoopMode::Context),
            "track" => Some(LoopMode::Track),
            _ => None,
        }
    }
}

impl fmt::Display for LoopMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command for the remote playback controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackCommand {
    Play,
    Pause,
    /// Toggle play/pause; the remote decides the direction from its own state
    PlayPause,
    Next,
    Previous,
    VolumeUp,
    VolumeDown,
    SetShuffle(bool),
    SetLoop(LoopMode),
}

impl PlaybackCommand {
    /// Action name sent in the control request body
    pub fn action(&self) -> &'static str {
        match self {
            PlaybackCommand::Play => "Play",
            PlaybackCommand::Pause => "Pause",
            PlaybackCommand::PlayPause => "PlayPause",
            PlaybackCommand::Next => "Next",
            PlaybackCommand::Previous => "Previous",
            PlaybackCommand::VolumeUp => "VolumeUp",
            PlaybackCommand::VolumeDown => "VolumeDown",
            PlaybackCommand::SetShuffle(_) => "Shuffle",
            PlaybackCommand::SetLoop(_) => "Loop",
        }
    }
}

impl fmt::Display for PlaybackCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackCommand::SetShuffle(on) => write!(f, "Shuffle({})", on),
            PlaybackCommand::SetLoop(mode) => write!(f, "Loop({})", mode),
            other => f.write_str(other.action()),
        }
    }
}

/// Currently playing track as reported by the remote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NowPlaying {
    pub title: String,
    pub artists: Vec<String>,
    pub album_name: String,
    pub album_cover_url: Option<String>,
}

impl NowPlaying {
    /// Artists joined for display
    pub fn artist_line(&self) -> String {
        self.artists.join(", ")
    }
}

/// Local mirror of the remote player's state.
///
/// Always replaced as a whole; nothing patches individual fields of a
/// published snapshot. The default value (`shuffle` off, loop `Off`, no
/// track) is what readers see before the first successful fetch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaybackState {
    pub shuffle_enabled: bool,
    pub loop_mode: LoopMode,
    pub is_playing: bool,
    /// `None` when the remote reports no current item
    pub track: Option<NowPlaying>,
}

impl PlaybackState {
    /// State the remote is expected to be in once `command` has landed.
    ///
    /// Only shuffle and loop are predicted; everything else is left to the
    /// next authoritative fetch.
    pub fn apply(&self, command: &PlaybackCommand) -> PlaybackState {
        let mut next = self.clone();
        match *command {
            PlaybackCommand::SetShuffle(on) => next.shuffle_enabled = on,
            PlaybackCommand::SetLoop(mode) => next.loop_mode = mode,
            _ => {}
        }
        next
    }
}
