//! Keyboard controls read from stdin, one word per line

use std::fmt;
use std::str::FromStr;

use gesturemedia_core::gesture::GestureLabel;
use gesturemedia_core::playback::PlaybackCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualInput {
    /// Explicit command sent as-is
    Command(PlaybackCommand),
    /// Shuffle / loop, resolved against the cached state like a gesture
    Gesture(GestureLabel),
    Refresh,
    StartDetection,
    StopDetection,
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownInput(pub String);

impl fmt::Display for UnknownInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown command '{}' (type 'help')", self.0)
    }
}

impl std::error::Error for UnknownInput {}

impl FromStr for ManualInput {
    type Err = UnknownInput;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = match s.trim().to_ascii_lowercase().as_str() {
            "play" => ManualInput::Command(PlaybackCommand::Play),
            "pause" => ManualInput::Command(PlaybackCommand::Pause),
            "toggle" | "p" => ManualInput::Command(PlaybackCommand::PlayPause),
            "next" | "n" => ManualInput::Command(PlaybackCommand::Next),
            "prev" | "previous" | "b" => ManualInput::Command(PlaybackCommand::Previous),
            "up" | "+" => ManualInput::Command(PlaybackCommand::VolumeUp),
            "down" | "-" => ManualInput::Command(PlaybackCommand::VolumeDown),
            "shuffle" | "s" => ManualInput::Gesture(GestureLabel::Shuffle),
            "loop" | "l" => ManualInput::Gesture(GestureLabel::Loop),
            "refresh" | "r" => ManualInput::Refresh,
            "start" => ManualInput::StartDetection,
            "stop" => ManualInput::StopDetection,
            "status" => ManualInput::Status,
            "help" | "?" => ManualInput::Help,
            "quit" | "exit" | "q" => ManualInput::Quit,
            _ => return Err(UnknownInput(s.trim().to_string())),
        };
        Ok(input)
    }
}

pub const HELP: &str = "\
commands:
  play | pause | toggle      playback
  next | prev                skip
  up | down                  volume
  shuffle | loop             flip shuffle / cycle repeat (off → context → track)
  refresh                    fetch now playing
  start | stop               gesture detection
  status                     show current state
  quit";
