//! Gesture vocabulary and detection events
//!
//! [`GestureLabel`] is the closed set of tokens a classifier can produce.
//! [`DetectionEvent`] is emitted once per accepted inference and consumed by
//! the pipeline exactly once.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::time::Instant;

/// A gesture recognised by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GestureLabel {
    Play,
    Pause,
    Next,
    Previous,
    VolumeUp,
    VolumeDown,
    Shuffle,
    Loop,
    /// Background / no hand in frame. Valid, but carries no command.
    None,
}

impl GestureLabel {
    /// Every label, in declaration order
    pub const ALL: [GestureLabel; 9] = [
        GestureLabel::Play,
        GestureLabel::Pause,
        GestureLabel::Next,
        GestureLabel::Previous,
        GestureLabel::VolumeUp,
        GestureLabel::VolumeDown,
        GestureLabel::Shuffle,
        GestureLabel::Loop,
        GestureLabel::None,
    ];

    /// Canonical display name
    pub fn as_str(&self) -> &'static str {
        match self {
            GestureLabel::Play => "Play",
            GestureLabel::Pause => "Pause",
            GestureLabel::Next => "Next",
            GestureLabel::Previous => "Previous",
            GestureLabel::VolumeUp => "VolumeUp",
            GestureLabel::VolumeDown => "VolumeDown",
            GestureLabel::Shuffle => "Shuffle",
            GestureLabel::Loop => "Loop",
            GestureLabel::None => "None",
        }
    }

    /// Whether this label can ever produce a playback command
    pub fn is_actionable(&self) -> bool {
        !matches!(self, GestureLabel::None)
    }
}

impl fmt::Display for GestureLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GestureLabel {
    type Err = Error;

    /// Parse a label name. Case, spaces, dashes and underscores are ignored,
    /// so `"Volume Up"`, `"volume_up"` and `"VolumeUp"` are the same label.
    fn from_str(s: &str) -> Result<Self> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();

        let label = match key.as_str() {
            "play" => GestureLabel::Play,
            "pause" => GestureLabel::Pause,
            "next" | "skip" => GestureLabel::Next,
            "previous" | "prev" | "back" => GestureLabel::Previous,
            "volumeup" => GestureLabel::VolumeUp,
            "volumedown" => GestureLabel::VolumeDown,
            "shuffle" => GestureLabel::Shuffle,
            "loop" | "repeat" => GestureLabel::Loop,
            "none" | "background" | "" => GestureLabel::None,
            _ => return Err(Error::UnknownLabel(s.to_string())),
        };
        Ok(label)
    }
}

/// One accepted detection, produced by the inference scheduler
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionEvent {
    /// Detected gesture (never [`GestureLabel::None`])
    pub label: GestureLabel,
    /// Classifier confidence in `[0, 1]`
    pub confidence: f32,
    /// Monotonic completion time of the inference
    pub timestamp: Instant,
}

impl DetectionEvent {
    pub fn new(label: GestureLabel, confidence: f32, timestamp: Instant) -> Self {
        Self {
            label,
            confidence: confidence.clamp(0.0, 1.0),
            timestamp,
        }
    }
}
