//! JSON bodies exchanged with the remote playback controller

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::playback::{LoopMode, NowPlaying, PlaybackCommand, PlaybackState};

/// Body of `POST /control`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlRequest {
    pub action: String,
    /// Argument of parameterised actions (`Shuffle`, `Loop`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
}

impl From<&PlaybackCommand> for ControlRequest {
    fn from(command: &PlaybackCommand) -> Self {
        let state = match command {
            PlaybackCommand::SetShuffle(on) => Some(Value::Bool(*on)),
            PlaybackCommand::SetLoop(mode) => Some(Value::String(mode.as_str().to_string())),
            _ => None,
        };
        Self {
            action: command.action().to_string(),
            state,
        }
    }
}

/// Body of a `200` answer to the player-state request.
///
/// `shuffle_state` and `repeat_state` are required; a body without them is
/// rejected as a whole.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerStateResponse {
    #[serde(default)]
    pub is_playing: bool,
    pub shuffle_state: bool,
    pub repeat_state: LoopMode,
    /// `null` when nothing is loaded
    #[serde(default)]
    pub item: Option<TrackItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackItem {
    pub name: String,
    pub artists: Vec<ArtistItem>,
    pub album: AlbumItem,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistItem {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlbumItem {
    pub name: String,
    #[serde(default)]
    pub images: Vec<ImageItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageItem {
    pub url: String,
}

impl PlayerStateResponse {
    /// Parse a response body; any missing or mistyped field fails the whole body
    pub fn parse(body: Value) -> serde_json::Result<Self> {
        serde_json::from_value(body)
    }

    pub fn into_state(self) -> PlaybackState {
        PlaybackState {
            shuffle_enabled: self.shuffle_state,
            loop_mode: self.repeat_state,
            is_playing: self.is_playing,
            track: self.item.map(|item| NowPlaying {
                title: item.name,
                artists: item.artists.into_iter().map(|a| a.name).collect(),
                album_name: item.album.name,
                album_cover_url: item.album.images.into_iter().next().map(|image| image.url),
            }),
        }
    }
}
