// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Error types for squat analysis.
//!
//! Per-frame conditions (missing keypoints, degenerate geometry, no person, a failed
//! inference call) are not errors here: they are recorded on the frame and the run
//! continues. [`AnalysisError`] covers the failures a caller has to act on, such as a
//! model that cannot be loaded or a source that cannot be opened.

use std::fmt;

/// Result type alias for analysis operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Main error type for the analysis library.
#[derive(Debug)]
pub enum AnalysisError {
    /// Error loading the ONNX pose model.
    ModelLoadError(String),
    /// Error running the pose model.
    InferenceError(String),
    /// Error decoding or processing images.
    ImageError(String),
    /// Invalid configuration provided.
    ConfigError(String),
    /// IO error described by a message.
    IoError(String),
    /// Wrapped `std::io::Error`.
    Io(std::io::Error),
    /// Error parsing model metadata.
    MetadataError(String),
    /// Preview window error.
    VisualizerError(String),
    /// Video decode or encode error.
    VideoError(String),
    /// Error writing CSV or JSON reports.
    ExportError(String),
    /// Feature not enabled at compile time.
    FeatureNotEnabled(String),
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModelLoadError(msg) => write!(f, "Model load error: {msg}"),
            Self::InferenceError(msg) => write!(f, "Inference error: {msg}"),
            Self::ImageError(msg) => write!(f, "Image error: {msg}"),
            Self::ConfigError(msg) => write!(f, "Config error: {msg}"),
            Self::IoError(msg) => write!(f, "IO error: {msg}"),
            Self::Io(err) => write!(f, "IO error: {err}"),
            Self::MetadataError(msg) => write!(f, "Metadata error: {msg}"),
            Self::VisualizerError(msg) => write!(f, "Visualizer error: {msg}"),
            Self::VideoError(msg) => write!(f, "Video error: {msg}"),
            Self::ExportError(msg) => write!(f, "Export error: {msg}"),
            Self::FeatureNotEnabled(msg) => write!(f, "Feature not enabled: {msg}"),
        }
    }
}

impl std::error::Error for AnalysisError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AnalysisError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<image::ImageError> for AnalysisError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageError(err.to_string())
    }
}

impl From<csv::Error> for AnalysisError {
    fn from(err: csv::Error) -> Self {
        Self::ExportError(err.to_string())
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(err: serde_json::Error) -> Self {
        Self::ExportError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AnalysisError::ModelLoadError("test".to_string());
        assert_eq!(err.to_string(), "Model load error: test");

        let err = AnalysisError::ConfigError("window must be positive".to_string());
        assert_eq!(err.to_string(), "Config error: window must be positive");
    }

    #[test]
    fn test_io_error_source() {
        use std::error::Error;

        let err = AnalysisError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(err.source().is_some());
        assert!(AnalysisError::VideoError("x".into()).source().is_none());
    }
}
