//! In-memory media player driven by control actions

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Player shared between handlers and tests
pub type SharedPlayer = Arc<parking_lot::Mutex<Player>>;

/// Repeat mode as reported in `repeat_state`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatState {
    #[default]
    Off,
    Context,
    Track,
}

/// One entry of the playlist
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub title: String,
    pub artists: Vec<String>,
    pub album: String,
    pub cover_url: Option<String>,
}

impl Track {
    pub fn new(title: &str, artists: &[&str], album: &str) -> Self {
        Self {
            title: title.to_string(),
            artists: artists.iter().map(|a| a.to_string()).collect(),
            album: album.to_string(),
            cover_url: None,
        }
    }

    pub fn with_cover(mut self, url: &str) -> Self {
        self.cover_url = Some(url.to_string());
        self
    }
}

/// Control action parsed from a request body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Play,
    Pause,
    PlayPause,
    Next,
    Previous,
    VolumeUp,
    VolumeDown,
    Shuffle(bool),
    Loop(RepeatState),
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ActionError {
    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("action {action} requires a valid \"state\": {message}")]
    InvalidState { action: String, message: String },
}

impl Action {
    pub fn parse(action: &str, state: Option<&Value>) -> Result<Self, ActionError> {
        let invalid = |message: &str| ActionError::InvalidState {
            action: action.to_string(),
            message: message.to_string(),
        };

        match action {
            "Play" => Ok(Action::Play),
            "Pause" => Ok(Action::Pause),
            "PlayPause" => Ok(Action::PlayPause),
            "Next" => Ok(Action::Next),
            "Previous" => Ok(Action::Previous),
            "VolumeUp" => Ok(Action::VolumeUp),
            "VolumeDown" => Ok(Action::VolumeDown),
            "Shuffle" => state
                .and_then(Value::as_bool)
                .map(Action::Shuffle)
                .ok_or_else(|| invalid("expected a boolean")),
            "Loop" => {
                let state = state.ok_or_else(|| invalid("missing"))?;
                serde_json::from_value(state.clone())
                    .map(Action::Loop)
                    .map_err(|_| invalid("expected \"off\", \"context\" or \"track\""))
            }
            other => Err(ActionError::UnknownAction(other.to_string())),
        }
    }
}

/// Body of `GET /player`
#[derive(Debug, Clone, Serialize)]
pub struct PlayerSnapshot {
    pub is_playing: bool,
    pub shuffle_state: bool,
    pub repeat_state: RepeatState,
    pub volume_percent: u8,
    pub item: Option<ItemJson>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemJson {
    pub name: String,
    pub artists: Vec<NameJson>,
    pub album: AlbumJson,
}

#[derive(Debug, Clone, Serialize)]
pub struct NameJson {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlbumJson {
    pub name: String,
    pub images: Vec<ImageJson>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageJson {
    pub url: String,
}

/// In-memory player
///
/// Starts without an active session; the first accepted action activates it.
#[derive(Debug, Clone)]
pub struct Player {
    playlist: Vec<Track>,
    index: usize,
    active: bool,
    is_playing: bool,
    volume: u8,
    volume_step: u8,
    shuffle: bool,
    repeat: RepeatState,
}

impl Default for Player {
    fn default() -> Self {
        Self::new(demo_playlist(), 10)
    }
}

impl Player {
    pub fn new(playlist: Vec<Track>, volume_step: u8) -> Self {
        Self {
            playlist,
            index: 0,
            active: false,
            is_playing: false,
            volume: 50,
            volume_step: volume_step.max(1),
            shuffle: false,
            repeat: RepeatState::Off,
        }
    }

    pub fn into_shared(self) -> SharedPlayer {
        Arc::new(parking_lot::Mutex::new(self))
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Start a session without sending an action
    pub fn activate(&mut self) {
        self.active = true;
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn repeat(&self) -> RepeatState {
        self.repeat
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.playlist.get(self.index)
    }

    pub fn apply(&mut self, action: Action) {
        self.active = true;
        match action {
            Action::Play => self.is_playing = true,
            Action::Pause => self.is_playing = false,
            Action::PlayPause => self.is_playing = !self.is_playing,
            Action::Next => self.skip(1),
            Action::Previous => self.skip(-1),
            Action::VolumeUp => self.volume = self.volume.saturating_add(self.volume_step).min(100),
            Action::VolumeDown => self.volume = self.volume.saturating_sub(self.volume_step),
            Action::Shuffle(on) => self.shuffle = on,
            Action::Loop(mode) => self.repeat = mode,
        }
        tracing::info!(
            ?action,
            playing = self.is_playing,
            track = self.current_track().map(|t| t.title.as_str()),
            "Player updated"
        );
    }

    fn skip(&mut self, direction: isize) {
        if self.playlist.is_empty() {
            return;
        }
        let len = self.playlist.len() as isize;
        self.index = (self.index as isize + direction).rem_euclid(len) as usize;
        self.is_playing = true;
    }

    /// `None` while no session is active
    pub fn snapshot(&self) -> Option<PlayerSnapshot> {
        if !self.active {
            return None;
        }
        Some(PlayerSnapshot {
            is_playing: self.is_playing,
            shuffle_state: self.shuffle,
            repeat_state: self.repeat,
            volume_percent: self.volume,
            item: self.current_track().map(|track| ItemJson {
                name: track.title.clone(),
                artists: track
                    .artists
                    .iter()
                    .map(|name| NameJson { name: name.clone() })
                    .collect(),
                album: AlbumJson {
                    name: track.album.clone(),
                    images: track
                        .cover_url
                        .iter()
                        .map(|url| ImageJson { url: url.clone() })
                        .collect(),
                },
            }),
        })
    }
}

fn demo_playlist() -> Vec<Track> {
    vec![
        Track::new("Open Palm", &["The Gestures"], "Hands Up").with_cover("https://covers.example/hands-up.jpg"),
        Track::new("Thumbs Up", &["The Gestures", "Wave"], "Hands Up")
            .with_cover("https://covers.example/hands-up.jpg"),
        Track::new("Skip Ahead", &["Fast Forward"], "Next Level"),
    ]
}
