//! Classifier adapter
//!
//! Wraps an opaque image model behind [`Classifier`]. The adapter only
//! classifies; confidence thresholding is applied by the inference scheduler.

mod labels;
#[cfg(feature = "onnx")]
mod onnx;

pub use labels::LabelVocabulary;
#[cfg(feature = "onnx")]
pub use onnx::{OnnxClassifier, OnnxClassifierConfig};

use crate::capture::Frame;
use crate::gesture::GestureLabel;
use async_trait::async_trait;

/// Output of one successful inference
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub label: GestureLabel,
    pub confidence: f32,
}

impl Classification {
    pub fn new(label: GestureLabel, confidence: f32) -> Self {
        Self { label, confidence }
    }
}

/// Errors a classifier can report for a single call
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClassifierError {
    /// Model or metadata is still loading; try again on a later tick
    #[error("classifier not ready")]
    NotReady,

    /// Model or metadata failed to load; the classifier will never be ready
    #[error("model load failed: {0}")]
    ModelLoad(String),

    /// Frame could not be turned into model input
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// Runtime failure inside the model
    #[error("inference failed: {0}")]
    Inference(String),
}

impl ClassifierError {
    /// Whether detection has to be disabled for the rest of the session
    pub fn is_permanent(&self) -> bool {
        matches!(self, ClassifierError::ModelLoad(_))
    }
}

/// Turns a frame into a gesture label and confidence.
///
/// Must be safe to call repeatedly and must not keep the frame past the call.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classifier name for logs
    fn name(&self) -> &str;

    async fn classify(&self, frame: &Frame) -> Result<Classification, ClassifierError>;
}
