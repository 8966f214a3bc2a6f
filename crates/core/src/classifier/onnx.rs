//! ONNX Runtime image classifier
//!
//! Runs a square-input image classification model (NHWC, RGB scaled to
//! `[-1, 1]`) and decodes the score vector through the model's metadata
//! labels. The session is loaded lazily on the first call; a load failure is
//! remembered and reported as [`ClassifierError::ModelLoad`] on every call.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use image::imageops::FilterType;
use ort::{
    execution_providers::CPUExecutionProvider,
    session::{Session, SessionOutputs},
    value::Tensor,
};
use parking_lot::Mutex;
use tokio::sync::OnceCell;

use super::{Classification, Classifier, ClassifierError, LabelVocabulary};
use crate::capture::Frame;

/// Where to find the model and how big its input is
#[derive(Debug, Clone)]
pub struct OnnxClassifierConfig {
    pub model_path: PathBuf,
    pub metadata_path: PathBuf,
    /// Side length of the square model input (224 for most exports)
    pub input_size: u32,
}

struct LoadedModel {
    session: Mutex<Session>,
    output_name: String,
    vocabulary: LabelVocabulary,
}

/// Image classifier backed by ONNX Runtime
pub struct OnnxClassifier {
    config: OnnxClassifierConfig,
    model: OnceCell<Result<Arc<LoadedModel>, String>>,
}

impl OnnxClassifier {
    pub fn new(config: OnnxClassifierConfig) -> Self {
        Self {
            config,
            model: OnceCell::new(),
        }
    }

    /// Load model and metadata now instead of on the first frame
    pub async fn preload(&self) -> Result<(), ClassifierError> {
        self.model().await.map(|_| ())
    }

    async fn model(&self) -> Result<Arc<LoadedModel>, ClassifierError> {
        let loaded = self
            .model
            .get_or_init(|| async {
                let config = self.config.clone();
                match tokio::task::spawn_blocking(move || Self::load(&config)).await {
                    Ok(result) => result,
                    Err(e) => Err(format!("model load task failed: {}", e)),
                }
            })
            .await;

        loaded.clone().map_err(ClassifierError::ModelLoad)
    }

    fn load(config: &OnnxClassifierConfig) -> Result<Arc<LoadedModel>, String> {
        tracing::info!(model = %config.model_path.display(), "Loading gesture classifier");

        let vocabulary =
            LabelVocabulary::from_metadata_file(&config.metadata_path).map_err(|e| e.to_string())?;

        let session = Session::builder()
            .and_then(|builder| builder.with_execution_providers([CPUExecutionProvider::default().build()]))
            .and_then(|builder| builder.commit_from_file(&config.model_path))
            .map_err(|e| format!("{}: {}", config.model_path.display(), e))?;

        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| "model declares no outputs".to_string())?;

        tracing::info!(labels = vocabulary.len(), "Gesture classifier loaded");

        Ok(Arc::new(LoadedModel {
            session: Mutex::new(session),
            output_name,
            vocabulary,
        }))
    }

    /// Resize to the model input and scale RGB into `[-1, 1]`, NHWC order
    fn preprocess(frame: &Frame, size: u32) -> Result<Vec<f32>, ClassifierError> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(ClassifierError::MalformedFrame("empty frame".to_string()));
        }
        let resized = image::imageops::resize(&frame.to_image(), size, size, FilterType::Triangle);
        Ok(resized
            .into_raw()
            .into_iter()
            .map(|v| v as f32 / 127.5 - 1.0)
            .collect())
    }
}

#[async_trait]
impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        "onnx"
    }

    async fn classify(&self, frame: &Frame) -> Result<Classification, ClassifierError> {
        let model = self.model().await?;
        let size = self.config.input_size as usize;
        let input = Self::preprocess(frame, self.config.input_size)?;

        let runner = model.clone();
        let scores = tokio::task::spawn_blocking(move || -> Result<Vec<f32>, ClassifierError> {
            let tensor = Tensor::from_array(([1, size, size, 3], input))
                .map_err(|e| ClassifierError::MalformedFrame(e.to_string()))?;

            let mut session = runner.session.lock();
            let outputs: SessionOutputs = session
                .run(ort::inputs![tensor])
                .map_err(|e| ClassifierError::Inference(e.to_string()))?;
            let (_, data) = outputs[runner.output_name.as_str()]
                .try_extract_tensor::<f32>()
                .map_err(|e| ClassifierError::Inference(e.to_string()))?;
            Ok(data.to_vec())
        })
        .await
        .map_err(|e| ClassifierError::Inference(format!("inference task failed: {}", e)))??;

        model.vocabulary.decode_scores(&scores)
    }
}
