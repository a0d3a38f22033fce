// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! ONNX model metadata parsing.
//!
//! Ultralytics exports store their settings as individual custom metadata keys
//! (`task`, `stride`, `imgsz`, `kpt_shape`, `names`, ...). Only pose models are
//! accepted here.

use std::collections::HashMap;

use crate::error::{AnalysisError, Result};
use crate::keypoint::NUM_KEYPOINTS;

/// Metadata keys read from the model.
pub const METADATA_KEYS: [&str; 9] = [
    "description",
    "author",
    "version",
    "stride",
    "task",
    "batch",
    "imgsz",
    "kpt_shape",
    "names",
];

/// Settings extracted from a YOLO-pose ONNX export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMetadata {
    /// Model description, e.g. "Ultralytics YOLO11n-pose model".
    pub description: String,
    /// Ultralytics version used for export.
    pub version: String,
    /// Model task; always `pose` once validated.
    pub task: String,
    /// Model stride (typically 32).
    pub stride: u32,
    /// Input image size as (height, width).
    pub imgsz: (usize, usize),
    /// Keypoints per person and values per keypoint.
    pub kpt_shape: (usize, usize),
    /// Class ID to class name mapping.
    pub names: HashMap<usize, String>,
}

impl Default for ModelMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            version: String::new(),
            task: "pose".to_string(),
            stride: 32,
            imgsz: (640, 640),
            kpt_shape: (NUM_KEYPOINTS, 3),
            names: HashMap::from([(0, "person".to_string())]),
        }
    }
}

impl ModelMetadata {
    /// Parse metadata from the model's custom key/value pairs.
    ///
    /// Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::MetadataError`] if a value is malformed, the task is
    /// not `pose`, or the keypoint layout is not 17 points with confidence.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self> {
        let mut metadata = Self::default();

        for (key, value) in map {
            let value = value.trim().trim_matches('\'').trim_matches('"');
            match key.as_str() {
                "description" => metadata.description = value.to_string(),
                "version" => metadata.version = value.to_string(),
                "task" => metadata.task = value.to_string(),
                "stride" => {
                    metadata.stride = value.parse().map_err(|_| {
                        AnalysisError::MetadataError(format!("Invalid stride value: {value}"))
                    })?;
                }
                "imgsz" => metadata.imgsz = parse_pair(value, "imgsz")?,
                "kpt_shape" => metadata.kpt_shape = parse_pair(value, "kpt_shape")?,
                "names" => {
                    let names = parse_names(value);
                    if !names.is_empty() {
                        metadata.names = names;
                    }
                }
                _ => {}
            }
        }

        metadata.validate()?;
        Ok(metadata)
    }

    fn validate(&self) -> Result<()> {
        if self.task != "pose" {
            return Err(AnalysisError::MetadataError(format!(
                "Expected a pose model, got task '{}'. Export with: yolo export model=yolo11n-pose.pt format=onnx",
                self.task
            )));
        }
        if self.kpt_shape != (NUM_KEYPOINTS, 3) {
            return Err(AnalysisError::MetadataError(format!(
                "Expected kpt_shape [{NUM_KEYPOINTS}, 3], got [{}, {}]",
                self.kpt_shape.0, self.kpt_shape.1
            )));
        }
        Ok(())
    }

    /// Number of classes the model detects.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.names.len().max(1)
    }

    /// Short model name for log lines, e.g. "YOLO11n-pose".
    #[must_use]
    pub fn model_name(&self) -> String {
        self.description
            .split_whitespace()
            .find(|word| word.starts_with("YOLO"))
            .map_or_else(|| "YOLO-pose".to_string(), str::to_string)
    }
}

/// Parse a two-element list such as `[640, 640]`.
fn parse_pair(value: &str, key: &str) -> Result<(usize, usize)> {
    let values: Vec<usize> = value
        .trim_matches(|c| c == '[' || c == ']' || c == '(' || c == ')')
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    match values.as_slice() {
        [a, b] => Ok((*a, *b)),
        [a] => Ok((*a, *a)),
        _ => Err(AnalysisError::MetadataError(format!(
            "Invalid {key} value: {value}"
        ))),
    }
}

/// Parse a Python dict string like `{0: 'person'}`.
fn parse_names(value: &str) -> HashMap<usize, String> {
    value
        .trim_matches(|c| c == '{' || c == '}')
        .split(',')
        .filter_map(|entry| {
            let (key, name) = entry.split_once(':')?;
            let id = key.trim().parse().ok()?;
            Some((id, name.trim().trim_matches('\'').trim_matches('"').to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_parse_pose_metadata() {
        let metadata = ModelMetadata::from_map(&map(&[
            ("description", "Ultralytics YOLO11n-pose model trained on coco-pose.yaml"),
            ("task", "pose"),
            ("stride", "32"),
            ("imgsz", "[480, 640]"),
            ("kpt_shape", "[17, 3]"),
            ("names", "{0: 'person'}"),
        ]))
        .unwrap();

        assert_eq!(metadata.imgsz, (480, 640));
        assert_eq!(metadata.stride, 32);
        assert_eq!(metadata.kpt_shape, (17, 3));
        assert_eq!(metadata.names.get(&0).map(String::as_str), Some("person"));
        assert_eq!(metadata.model_name(), "YOLO11n-pose");
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let metadata = ModelMetadata::from_map(&HashMap::new()).unwrap();
        assert_eq!(metadata, ModelMetadata::default());
        assert_eq!(metadata.num_classes(), 1);
    }

    #[test]
    fn test_rejects_detect_model() {
        let err = ModelMetadata::from_map(&map(&[("task", "detect")])).unwrap_err();
        assert!(matches!(err, AnalysisError::MetadataError(_)));
    }

    #[test]
    fn test_rejects_other_keypoint_layouts() {
        assert!(ModelMetadata::from_map(&map(&[("kpt_shape", "[17, 2]")])).is_err());
        assert!(ModelMetadata::from_map(&map(&[("kpt_shape", "[133, 3]")])).is_err());
        assert!(ModelMetadata::from_map(&map(&[("stride", "abc")])).is_err());
    }
}
