// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Pose model configuration.
//!
//! [`InferenceConfig`] controls the ONNX pose backend: person detection threshold,
//! NMS overlap, input size and execution hardware. It is separate from
//! [`AnalysisConfig`](crate::AnalysisConfig), which governs the squat metrics.

use crate::device::Device;
use crate::error::{AnalysisError, Result};

/// Configuration for the pose model.
///
/// # Example
///
/// ```rust
/// use squat_form::InferenceConfig;
///
/// let config = InferenceConfig::new()
///     .with_confidence(0.4)
///     .with_iou(0.5)
///     .with_imgsz(640, 640);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceConfig {
    /// Minimum person detection confidence (0.0 to 1.0).
    ///
    /// Unrelated to the per-keypoint threshold used by the squat evaluator.
    pub confidence_threshold: f32,
    /// IoU threshold for Non-Maximum Suppression (0.0 to 1.0).
    pub iou_threshold: f32,
    /// Maximum number of people kept per frame, ordered by confidence.
    pub max_detections: usize,
    /// Explicit input size (height, width). `None` uses the model metadata.
    pub imgsz: Option<(usize, usize)>,
    /// Intra-op threads for ONNX Runtime. `0` lets the runtime decide.
    pub num_threads: usize,
    /// Execution device. `None` runs on the CPU provider.
    pub device: Option<Device>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 300,
            imgsz: None,
            num_threads: 0,
            device: None,
        }
    }
}

impl InferenceConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the person detection confidence threshold.
    #[must_use]
    pub const fn with_confidence(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Set the IoU threshold for Non-Maximum Suppression.
    #[must_use]
    pub const fn with_iou(mut self, threshold: f32) -> Self {
        self.iou_threshold = threshold;
        self
    }

    /// Set the maximum number of people returned per frame.
    #[must_use]
    pub const fn with_max_detections(mut self, max: usize) -> Self {
        self.max_detections = max;
        self
    }

    /// Set the input image size.
    ///
    /// # Arguments
    ///
    /// * `height` - The target image height.
    /// * `width` - The target image width.
    #[must_use]
    pub const fn with_imgsz(mut self, height: usize, width: usize) -> Self {
        self.imgsz = Some((height, width));
        self
    }

    /// Set the number of threads for inference.
    #[must_use]
    pub const fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = threads;
        self
    }

    /// Set the execution device.
    #[must_use]
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = Some(device);
        self
    }

    /// Check that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::ConfigError`] for thresholds outside [0, 1] or a
    /// zero-sized input.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(AnalysisError::ConfigError(format!(
                "Detection confidence must be between 0 and 1, got {}",
                self.confidence_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(AnalysisError::ConfigError(format!(
                "IoU threshold must be between 0 and 1, got {}",
                self.iou_threshold
            )));
        }
        if let Some((h, w)) = self.imgsz
            && (h == 0 || w == 0)
        {
            return Err(AnalysisError::ConfigError(format!(
                "Image size must be positive, got {h}x{w}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = InferenceConfig::default();
        assert!((config.confidence_threshold - 0.25).abs() < f32::EPSILON);
        assert!((config.iou_threshold - 0.45).abs() < f32::EPSILON);
        assert_eq!(config.max_detections, 300);
        assert!(config.device.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = InferenceConfig::new()
            .with_confidence(0.5)
            .with_iou(0.6)
            .with_max_detections(1)
            .with_imgsz(480, 640)
            .with_threads(8)
            .with_device(Device::Cuda(1));

        assert!((config.confidence_threshold - 0.5).abs() < f32::EPSILON);
        assert!((config.iou_threshold - 0.6).abs() < f32::EPSILON);
        assert_eq!(config.max_detections, 1);
        assert_eq!(config.imgsz, Some((480, 640)));
        assert_eq!(config.num_threads, 8);
        assert_eq!(config.device, Some(Device::Cuda(1)));
    }

    #[test]
    fn test_config_validate() {
        assert!(InferenceConfig::new().with_confidence(1.5).validate().is_err());
        assert!(InferenceConfig::new().with_iou(-0.1).validate().is_err());
        assert!(InferenceConfig::new().with_imgsz(0, 640).validate().is_err());
    }
}
