// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! ONNX Runtime pose model.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use image::DynamicImage;
use ndarray::Array4;
#[cfg(feature = "coreml")]
use ort::execution_providers::CoreMLExecutionProvider;
#[cfg(feature = "cuda")]
use ort::execution_providers::CUDAExecutionProvider;
#[cfg(feature = "tensorrt")]
use ort::execution_providers::TensorRTExecutionProvider;
use ort::session::Session;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::value::TensorRef;

use crate::device::Device;
use crate::download::try_download_model;
use crate::error::{AnalysisError, Result};
use crate::inference::InferenceConfig;
use crate::pose::metadata::{METADATA_KEYS, ModelMetadata};
use crate::pose::postprocess::decode_pose;
use crate::pose::preprocess::letterbox;
use crate::pose::{PoseEstimate, PoseEstimator, Speed};

/// YOLO pose model running on ONNX Runtime.
///
/// # Example
///
/// ```no_run
/// use squat_form::{PoseEstimator, PoseModel};
///
/// let mut model = PoseModel::load("yolo11n-pose.onnx")?;
/// let frame = image::open("squat.jpg")?;
/// let estimate = model.estimate(&frame)?;
/// println!("Found {} people", estimate.len());
/// # Ok::<(), squat_form::AnalysisError>(())
/// ```
pub struct PoseModel {
    session: Session,
    metadata: ModelMetadata,
    input_name: String,
    output_name: String,
    config: InferenceConfig,
    warmed_up: bool,
}

impl PoseModel {
    /// Load a pose model with default inference settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing and cannot be downloaded, the
    /// session cannot be created, or the model is not a 17-keypoint pose model.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_config(path, InferenceConfig::default())
    }

    /// Load a pose model with custom configuration.
    ///
    /// A missing `yolo11n-pose.onnx` is downloaded first.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the ONNX model file.
    /// * `config` - Detection thresholds, input size and device.
    ///
    /// # Errors
    ///
    /// See [`PoseModel::load`].
    pub fn load_with_config<P: AsRef<Path>>(path: P, config: InferenceConfig) -> Result<Self> {
        config.validate()?;

        let mut path = path.as_ref().to_path_buf();
        if !path.exists() {
            path = try_download_model(&path)?;
        }

        let builder = Session::builder().map_err(|e| {
            AnalysisError::ModelLoadError(format!("Failed to create session builder: {e}"))
        })?;
        let builder = Self::register_device(builder, config.device.as_ref())?;

        let session = builder
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                AnalysisError::ModelLoadError(format!("Failed to set optimization level: {e}"))
            })?
            .with_intra_threads(config.num_threads)
            .map_err(|e| {
                AnalysisError::ModelLoadError(format!("Failed to set intra-thread count: {e}"))
            })?
            .commit_from_file(&path)
            .map_err(|e| AnalysisError::ModelLoadError(format!("Failed to load model: {e}")))?;

        let metadata = Self::extract_metadata(&session)?;

        let input_name = session
            .inputs
            .first()
            .map_or_else(|| "images".to_string(), |i| i.name.clone());
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| AnalysisError::ModelLoadError("Model has no outputs".to_string()))?;

        let config = InferenceConfig {
            imgsz: config.imgsz.or(Some(metadata.imgsz)),
            ..config
        };

        crate::verbose!(
            "Loaded {} from {} (imgsz {:?})",
            metadata.model_name(),
            path.display(),
            config.imgsz.unwrap_or(metadata.imgsz)
        );

        Ok(Self {
            session,
            metadata,
            input_name,
            output_name,
            config,
            warmed_up: false,
        })
    }

    /// Attach the execution provider for `device`.
    ///
    /// Devices whose feature is not compiled in fall back to CPU with a warning.
    #[allow(clippy::unnecessary_wraps, unused_mut)]
    fn register_device(mut builder: SessionBuilder, device: Option<&Device>) -> Result<SessionBuilder> {
        let Some(device) = device else {
            return Ok(builder);
        };

        match device {
            Device::Cpu => {}
            #[cfg(feature = "cuda")]
            Device::Cuda(index) => {
                #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                let provider = CUDAExecutionProvider::default()
                    .with_device_id(*index as i32)
                    .build();
                builder = builder.with_execution_providers([provider]).map_err(|e| {
                    AnalysisError::ModelLoadError(format!("Failed to register CUDA EP: {e}"))
                })?;
            }
            #[cfg(feature = "tensorrt")]
            Device::TensorRt(index) => {
                #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                let provider = TensorRTExecutionProvider::default()
                    .with_device_id(*index as i32)
                    .build();
                builder = builder.with_execution_providers([provider]).map_err(|e| {
                    AnalysisError::ModelLoadError(format!("Failed to register TensorRT EP: {e}"))
                })?;
            }
            #[cfg(feature = "coreml")]
            Device::CoreMl | Device::Mps => {
                builder = builder
                    .with_execution_providers([CoreMLExecutionProvider::default()
                        .with_subgraphs(true)
                        .build()])
                    .map_err(|e| {
                        AnalysisError::ModelLoadError(format!("Failed to register CoreML EP: {e}"))
                    })?;
            }
            #[allow(unreachable_patterns)]
            other => {
                crate::warn!("Device '{other}' is not enabled in this build, using CPU");
            }
        }
        Ok(builder)
    }

    /// Read the Ultralytics custom metadata keys from the session.
    fn extract_metadata(session: &Session) -> Result<ModelMetadata> {
        let model_metadata = session.metadata().map_err(|e| {
            AnalysisError::ModelLoadError(format!("Failed to get model metadata: {e}"))
        })?;

        let map: HashMap<String, String> = METADATA_KEYS
            .iter()
            .filter_map(|key| match model_metadata.custom(key) {
                Ok(Some(value)) => Some(((*key).to_string(), value)),
                _ => None,
            })
            .collect();

        ModelMetadata::from_map(&map)
    }

    /// Run one dummy inference so the first real frame is not slowed by allocation.
    ///
    /// # Errors
    ///
    /// Returns an error if the session fails on the dummy input.
    pub fn warmup(&mut self) -> Result<()> {
        if self.warmed_up {
            return Ok(());
        }
        let (h, w) = self.input_size();
        let dummy = Array4::<f32>::zeros((1, 3, h, w));
        self.run_inference(&dummy)?;
        self.warmed_up = true;
        Ok(())
    }

    /// Detect people and their keypoints in `image`.
    ///
    /// # Errors
    ///
    /// Returns an error if preprocessing, the session or decoding fails.
    pub fn predict(&mut self, image: &DynamicImage) -> Result<PoseEstimate> {
        if !self.warmed_up {
            self.warmup()?;
        }

        let start = Instant::now();
        let input = letterbox(image, self.input_size())?;
        let preprocess = start.elapsed().as_secs_f64() * 1000.0;

        let start = Instant::now();
        let (output, shape) = self.run_inference(&input.tensor)?;
        let inference = start.elapsed().as_secs_f64() * 1000.0;

        let start = Instant::now();
        let mut estimate = decode_pose(
            &output,
            &shape,
            &input,
            self.metadata.num_classes(),
            &self.config,
        )?;
        estimate.speed = Speed {
            preprocess,
            inference,
            postprocess: start.elapsed().as_secs_f64() * 1000.0,
        };
        Ok(estimate)
    }

    fn run_inference(&mut self, input: &Array4<f32>) -> Result<(Vec<f32>, Vec<usize>)> {
        let input = input.as_standard_layout();
        let input_tensor = TensorRef::from_array_view(&input).map_err(|e| {
            AnalysisError::InferenceError(format!("Failed to create input tensor: {e}"))
        })?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .map_err(|e| AnalysisError::InferenceError(format!("Inference failed: {e}")))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            AnalysisError::InferenceError(format!("Output '{}' not found", self.output_name))
        })?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| AnalysisError::InferenceError(format!("Failed to extract output: {e}")))?;

        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let shape: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
        Ok((data.to_vec(), shape))
    }

    /// Input size (height, width) used for letterboxing.
    #[must_use]
    pub fn input_size(&self) -> (usize, usize) {
        self.config.imgsz.unwrap_or(self.metadata.imgsz)
    }

    #[must_use]
    pub const fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    #[must_use]
    pub const fn config(&self) -> &InferenceConfig {
        &self.config
    }
}

impl PoseEstimator for PoseModel {
    fn estimate(&mut self, image: &DynamicImage) -> Result<PoseEstimate> {
        self.predict(image)
    }
}

impl std::fmt::Debug for PoseModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoseModel")
            .field("model", &self.metadata.model_name())
            .field("imgsz", &self.input_size())
            .field("input", &self.input_name)
            .field("output", &self.output_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_not_found() {
        let result = PoseModel::load("nonexistent.onnx");
        assert!(matches!(result, Err(AnalysisError::ModelLoadError(_))));
    }

    #[test]
    fn test_invalid_config_rejected_before_loading() {
        let config = InferenceConfig::new().with_confidence(2.0);
        let result = PoseModel::load_with_config("nonexistent.onnx", config);
        assert!(matches!(result, Err(AnalysisError::ConfigError(_))));
    }
}
