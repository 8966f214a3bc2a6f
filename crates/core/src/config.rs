//! Configuration for GestureMedia
//!
//! Configuration can be loaded from a TOML file and/or environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::credential::Credential;
use crate::remote::HttpRemoteConfig;
use crate::scheduler::SchedulerConfig;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote playback controller
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Detection loop timing and acceptance
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Playback state polling
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// Gesture classifier model
    #[serde(default)]
    pub model: ModelConfig,

    /// Frame source
    #[serde(default)]
    pub camera: CameraConfig,

    /// User-facing display
    #[serde(default)]
    pub ui: UiConfig,
}

/// Remote playback controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_control_path")]
    pub control_path: String,

    #[serde(default = "default_state_path")]
    pub state_path: String,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Bearer token from the login flow; absent means "not signed in"
    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default)]
    pub refresh_token: Option<String>,
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_control_path() -> String {
    "/control".to_string()
}

fn default_state_path() -> String {
    "/player".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5000
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            control_path: default_control_path(),
            state_path: default_state_path(),
            request_timeout_ms: default_request_timeout_ms(),
            access_token: None,
            refresh_token: None,
        }
    }
}

impl RemoteConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn http_config(&self) -> HttpRemoteConfig {
        HttpRemoteConfig {
            base_url: self.base_url.clone(),
            control_path: self.control_path.clone(),
            state_path: self.state_path.clone(),
            request_timeout: self.request_timeout(),
        }
    }

    /// Credential from the configured tokens, if any
    pub fn credential(&self) -> Option<Credential> {
        let token = self.access_token.as_deref().filter(|t| !t.is_empty())?;
        let credential = Credential::new(token);
        Some(match self.refresh_token.as_deref() {
            Some(refresh) => credential.with_refresh_token(refresh),
            None => credential,
        })
    }
}

/// Detection loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Start detecting as soon as the session runs
    #[serde(default)]
    pub start_on_launch: bool,

    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Minimum time between completed inferences
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Detections with lower confidence are ignored
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    #[serde(default = "default_frame_timeout_ms")]
    pub frame_timeout_ms: u64,

    #[serde(default = "default_inference_timeout_ms")]
    pub inference_timeout_ms: u64,

    /// Capacity of the detection event channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_tick_interval_ms() -> u64 {
    100
}

fn default_min_interval_ms() -> u64 {
    5000
}

fn default_confidence_threshold() -> f32 {
    0.5
}

fn default_frame_timeout_ms() -> u64 {
    1000
}

fn default_inference_timeout_ms() -> u64 {
    5000
}

fn default_event_buffer() -> usize {
    8
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            start_on_launch: false,
            tick_interval_ms: default_tick_interval_ms(),
            min_interval_ms: default_min_interval_ms(),
            confidence_threshold: default_confidence_threshold(),
            frame_timeout_ms: default_frame_timeout_ms(),
            inference_timeout_ms: default_inference_timeout_ms(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl DetectionConfig {
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            min_interval: Duration::from_millis(self.min_interval_ms),
            confidence_threshold: self.confidence_threshold,
            frame_timeout: Duration::from_millis(self.frame_timeout_ms),
            inference_timeout: Duration::from_millis(self.inference_timeout_ms),
        }
    }
}

/// Playback state polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    10_000
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl ReconcileConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Classifier model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// ONNX model file; detection is unavailable without one
    #[serde(default)]
    pub model_path: Option<PathBuf>,

    /// Metadata JSON holding the label list
    #[serde(default)]
    pub metadata_path: Option<PathBuf>,

    #[serde(default = "default_input_size")]
    pub input_size: u32,
}

fn default_input_size() -> u32 {
    224
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            metadata_path: None,
            input_size: default_input_size(),
        }
    }
}

impl ModelConfig {
    /// Metadata path, defaulting to `metadata.json` next to the model
    pub fn resolved_metadata_path(&self) -> Option<PathBuf> {
        self.metadata_path.clone().or_else(|| {
            self.model_path
                .as_ref()
                .map(|model| model.with_file_name("metadata.json"))
        })
    }
}

/// Frame source configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Directory of still images replayed as camera frames
    #[serde(default)]
    pub frames_dir: Option<PathBuf>,

    /// Webcam index for live capture
    #[serde(default)]
    pub device_index: u32,
}

/// Display configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// How long a "command sent" acknowledgement stays visible
    #[serde(default = "default_ack_display_ms")]
    pub ack_display_ms: u64,
}

fn default_ack_display_ms() -> u64 {
    3000
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            ack_display_ms: default_ack_display_ms(),
        }
    }
}

impl UiConfig {
    pub fn ack_display(&self) -> Duration {
        Duration::from_millis(self.ack_display_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Load configuration from file if it exists, otherwise from environment.
    /// Environment variables override file values.
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(p) if p.as_ref().exists() => Self::from_file(p)?,
            Some(p) => {
                tracing::warn!(path = %p.as_ref().display(), "Config file not found; using environment");
                Self::default()
            }
            None => Self::default(),
        };
        let config = config.with_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply `GESTUREMEDIA_*` overrides from `lookup`. Unparseable values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        // Remote
        if let Some(url) = lookup("GESTUREMEDIA_REMOTE_URL") {
            self.remote.base_url = url;
        }
        if let Some(token) = lookup("GESTUREMEDIA_ACCESS_TOKEN") {
            self.remote.access_token = Some(token);
        }
        if let Some(token) = lookup("GESTUREMEDIA_REFRESH_TOKEN") {
            self.remote.refresh_token = Some(token);
        }
        if let Some(ms) = lookup("GESTUREMEDIA_REQUEST_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.remote.request_timeout_ms = ms;
        }

        // Detection
        if let Some(start) = lookup("GESTUREMEDIA_START_DETECTION").and_then(|v| v.parse().ok()) {
            self.detection.start_on_launch = start;
        }
        if let Some(ms) = lookup("GESTUREMEDIA_MIN_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.detection.min_interval_ms = ms;
        }
        if let Some(threshold) = lookup("GESTUREMEDIA_CONFIDENCE_THRESHOLD").and_then(|v| v.parse().ok()) {
            self.detection.confidence_threshold = threshold;
        }

        // Reconcile
        if let Some(ms) = lookup("GESTUREMEDIA_POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.reconcile.poll_interval_ms = ms;
        }

        // Model
        if let Some(path) = lookup("GESTUREMEDIA_MODEL_PATH") {
            self.model.model_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("GESTUREMEDIA_METADATA_PATH") {
            self.model.metadata_path = Some(PathBuf::from(path));
        }

        // Camera
        if let Some(dir) = lookup("GESTUREMEDIA_FRAMES_DIR") {
            self.camera.frames_dir = Some(PathBuf::from(dir));
        }
        if let Some(index) = lookup("GESTUREMEDIA_CAMERA_INDEX").and_then(|v| v.parse().ok()) {
            self.camera.device_index = index;
        }

        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.detection.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid(format!(
                "detection.confidence_threshold must be within [0, 1], got {}",
                threshold
            )));
        }
        if self.detection.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("detection.tick_interval_ms must be > 0".to_string()));
        }
        if self.detection.event_buffer == 0 {
            return Err(ConfigError::Invalid("detection.event_buffer must be > 0".to_string()));
        }
        if self.reconcile.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("reconcile.poll_interval_ms must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for crate::Error {
    fn from(err: ConfigError) -> Self {
        crate::Error::Config(err.to_string())
    }
}
