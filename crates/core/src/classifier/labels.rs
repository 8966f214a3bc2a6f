//! Label vocabulary loaded from model metadata
//!
//! Image-classifier exports ship a `metadata.json` next to the model whose
//! `labels` array gives the class name for each output index:
//!
//! ```json
//! { "modelName": "gestures", "labels": ["Play", "Pause", "Next", "Background"] }
//! ```

use crate::gesture::GestureLabel;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;

use super::{Classification, ClassifierError};

#[derive(Debug, Deserialize)]
struct ModelMetadata {
    labels: Vec<String>,
}

/// Ordered class names decoded into gesture labels
#[derive(Debug, Clone, PartialEq)]
pub struct LabelVocabulary {
    labels: Vec<GestureLabel>,
}

impl LabelVocabulary {
    pub fn new(labels: Vec<GestureLabel>) -> Self {
        Self { labels }
    }

    /// Parse class names. Names outside the gesture vocabulary decode to
    /// [`GestureLabel::None`] so an unfamiliar class can never fire a command.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        if names.is_empty() {
            return Err(Error::Config("model metadata has no labels".to_string()));
        }
        let labels = names
            .iter()
            .map(|name| {
                name.as_ref().parse::<GestureLabel>().unwrap_or_else(|_| {
                    tracing::warn!(class = name.as_ref(), "Model class is not a known gesture; treating as None");
                    GestureLabel::None
                })
            })
            .collect();
        Ok(Self { labels })
    }

    /// Parse metadata JSON text
    pub fn from_metadata_json(json: &str) -> Result<Self> {
        let metadata: ModelMetadata = serde_json::from_str(json)?;
        Self::from_names(&metadata.labels)
    }

    /// Load metadata from a file
    pub fn from_metadata_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::model_load(path.display().to_string(), e.to_string()))?;
        Self::from_metadata_json(&json)
            .map_err(|e| Error::model_load(path.display().to_string(), e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label for a raw output index
    pub fn decode(&self, index: usize) -> Option<GestureLabel> {
        self.labels.get(index).copied()
    }

    /// Pick the highest-scoring class from a model output vector
    pub fn decode_scores(&self, scores: &[f32]) -> std::result::Result<Classification, ClassifierError> {
        if scores.len() != self.labels.len() {
            return Err(ClassifierError::Inference(format!(
                "model produced {} scores for {} labels",
                scores.len(),
                self.labels.len()
            )));
        }

        let (index, confidence) = scores
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, score)| score.is_finite())
            .fold(None, |best: Option<(usize, f32)>, (i, score)| match best {
                Some((_, top)) if top >= score => best,
                _ => Some((i, score)),
            })
            .ok_or_else(|| ClassifierError::Inference("no finite scores".to_string()))?;

        Ok(Classification::new(self.labels[index], confidence.clamp(0.0, 1.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_decodes_in_order() {
        let vocab = LabelVocabulary::from_metadata_json(
            r#"{"modelName":"g","labels":["Play","Volume Up","Background","Wave"]}"#,
        )
        .unwrap();
        assert_eq!(vocab.len(), 4);
        assert_eq!(vocab.decode(0), Some(GestureLabel::Play));
        assert_eq!(vocab.decode(1), Some(GestureLabel::VolumeUp));
        assert_eq!(vocab.decode(2), Some(GestureLabel::None));
        assert_eq!(vocab.decode(3), Some(GestureLabel::None));
        assert_eq!(vocab.decode(4), None);
    }

    #[test]
    fn test_empty_labels_rejected() {
        assert!(LabelVocabulary::from_metadata_json(r#"{"labels":[]}"#).is_err());
        assert!(matches!(
            LabelVocabulary::from_metadata_json(r#"{"classes":["Play"]}"#),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_decode_scores_argmax() {
        let vocab = LabelVocabulary::new(vec![GestureLabel::Next, GestureLabel::Shuffle, GestureLabel::None]);
        let result = vocab.decode_scores(&[0.1, 0.85, 0.05]).unwrap();
        assert_eq!(result.label, GestureLabel::Shuffle);
        assert!((result.confidence - 0.85).abs() < 1e-6);
    }

    #[test]
    fn test_decode_scores_shape_mismatch() {
        let vocab = LabelVocabulary::new(vec![GestureLabel::Next]);
        assert!(matches!(
            vocab.decode_scores(&[0.5, 0.5]),
            Err(ClassifierError::Inference(_))
        ));
        assert!(vocab.decode_scores(&[f32::NAN]).is_err());
    }

    #[test]
    fn test_missing_metadata_file_is_model_load() {
        let err = LabelVocabulary::from_metadata_file("/nonexistent/metadata.json").unwrap_err();
        assert!(matches!(err, Error::ModelLoad { .. }));
    }
}
