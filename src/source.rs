// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Frame sources.
//!
//! A squat recording reaches the analyser as a video file, an ordered set of
//! image files, or frames already in memory. Live capture devices and network
//! streams are not supported.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use image::DynamicImage;

use crate::error::{AnalysisError, Result};

const VIDEO_EXTENSIONS: [&str; 10] = [
    "mp4", "avi", "mov", "mkv", "wmv", "flv", "webm", "m4v", "mpeg", "mpg",
];

const IMAGE_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "bmp", "gif", "webp", "tiff", "tif"];

/// Input to analyse.
#[derive(Debug, Clone)]
pub enum Source {
    /// Single image file.
    Image(PathBuf),
    /// Explicit list of image files, analysed in order.
    ImageList(Vec<PathBuf>),
    /// Directory of images, analysed in file name order.
    Directory(PathBuf),
    /// Glob pattern such as `frames/*.png`.
    Glob(String),
    /// Video file. Requires the `video` feature.
    Video(PathBuf),
    /// Decoded frames held in memory.
    Frames {
        frames: Vec<DynamicImage>,
        fps: Option<f32>,
    },
}

impl Source {
    /// In-memory frames with an optional frame rate.
    #[must_use]
    pub const fn frames(frames: Vec<DynamicImage>, fps: Option<f32>) -> Self {
        Self::Frames { frames, fps }
    }

    #[must_use]
    pub const fn is_video(&self) -> bool {
        matches!(self, Self::Video(_))
    }

    /// True for sources that yield exactly one frame.
    #[must_use]
    pub fn is_image(&self) -> bool {
        match self {
            Self::Image(_) => true,
            Self::ImageList(paths) => paths.len() == 1,
            Self::Frames { frames, .. } => frames.len() == 1,
            _ => false,
        }
    }

    /// Get the path if this source has one.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Image(p) | Self::Video(p) | Self::Directory(p) => Some(p),
            _ => None,
        }
    }

    /// Human-readable identifier used in reports.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Image(p) | Self::Video(p) | Self::Directory(p) => p.display().to_string(),
            Self::ImageList(paths) => format!("{} images", paths.len()),
            Self::Glob(pattern) => pattern.clone(),
            Self::Frames { frames, .. } => format!("{} in-memory frames", frames.len()),
        }
    }

    fn is_video_file(path: &Path) -> bool {
        has_extension(path, &VIDEO_EXTENSIONS)
    }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension().is_some_and(|ext| {
        let ext = ext.to_string_lossy().to_lowercase();
        extensions.contains(&ext.as_str())
    })
}

/// Check if a path is an image file based on extension.
fn is_image_file(path: &Path) -> bool {
    has_extension(path, &IMAGE_EXTENSIONS)
}

impl FromStr for Source {
    type Err = AnalysisError;

    /// Classify a CLI source string.
    ///
    /// Camera indices and stream URLs are rejected.
    fn from_str(s: &str) -> Result<Self> {
        if s.parse::<u32>().is_ok() {
            return Err(AnalysisError::ConfigError(format!(
                "Webcam sources are not supported: {s}. Record the set and pass the video file"
            )));
        }
        if s.contains("://") {
            return Err(AnalysisError::ConfigError(format!(
                "Stream and URL sources are not supported: {s}"
            )));
        }
        if s.contains('*') {
            return Ok(Self::Glob(s.to_string()));
        }

        let path = PathBuf::from(s);
        if path.is_dir() {
            return Ok(Self::Directory(path));
        }
        if Self::is_video_file(&path) {
            return Ok(Self::Video(path));
        }
        Ok(Self::Image(path))
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        if path.is_dir() {
            Self::Directory(path)
        } else if Self::is_video_file(&path) {
            Self::Video(path)
        } else {
            Self::Image(path)
        }
    }
}

impl From<Vec<DynamicImage>> for Source {
    fn from(frames: Vec<DynamicImage>) -> Self {
        Self::Frames { frames, fps: None }
    }
}

impl From<DynamicImage> for Source {
    fn from(frame: DynamicImage) -> Self {
        Self::Frames {
            frames: vec![frame],
            fps: None,
        }
    }
}

/// Metadata about a source frame.
#[derive(Debug, Clone)]
pub struct SourceMeta {
    /// Frame index (0 for single images).
    pub frame_idx: usize,
    /// Total frames, if known up front.
    pub total_frames: Option<usize>,
    /// Source path or identifier.
    pub path: String,
    /// Frames per second, for video sources.
    pub fps: Option<f32>,
}

impl Default for SourceMeta {
    fn default() -> Self {
        Self {
            frame_idx: 0,
            total_frames: Some(1),
            path: String::new(),
            fps: None,
        }
    }
}

/// Iterator over the frames of a [`Source`].
///
/// Yields `Err` for a frame that cannot be read. Directory and glob sources are
/// listed when the iterator is created, so an unreadable directory fails there.
pub struct SourceIterator {
    source: Source,
    current_frame: usize,
    image_paths: Vec<PathBuf>,
    finished: bool,
    #[cfg(feature = "video")]
    decoder: Option<video_rs::decode::Decoder>,
    #[cfg(feature = "video")]
    total_frames: Option<usize>,
}

impl SourceIterator {
    /// Create a new source iterator.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory or glob base cannot be listed.
    pub fn new(source: Source) -> Result<Self> {
        let image_paths = match &source {
            Source::Directory(path) => collect_images_from_dir(path)?,
            Source::Glob(pattern) => collect_images_from_glob(pattern)?,
            Source::Image(path) => vec![path.clone()],
            Source::ImageList(paths) => paths.clone(),
            Source::Video(_) | Source::Frames { .. } => vec![],
        };

        Ok(Self {
            source,
            current_frame: 0,
            image_paths,
            finished: false,
            #[cfg(feature = "video")]
            decoder: None,
            #[cfg(feature = "video")]
            total_frames: None,
        })
    }

    fn next_image(&mut self) -> Option<Result<(DynamicImage, SourceMeta)>> {
        let path = self.image_paths.get(self.current_frame)?;
        let meta = SourceMeta {
            frame_idx: self.current_frame,
            total_frames: Some(self.image_paths.len()),
            path: path.to_string_lossy().to_string(),
            fps: None,
        };
        self.current_frame += 1;

        Some(
            image::open(path)
                .map(|img| (img, meta))
                .map_err(|e| {
                    AnalysisError::ImageError(format!("Failed to load {}: {e}", path.display()))
                }),
        )
    }

    fn next_memory_frame(&mut self) -> Option<Result<(DynamicImage, SourceMeta)>> {
        let Source::Frames { frames, fps } = &self.source else {
            return None;
        };
        let frame = frames.get(self.current_frame)?.clone();
        let meta = SourceMeta {
            frame_idx: self.current_frame,
            total_frames: Some(frames.len()),
            path: String::new(),
            fps: *fps,
        };
        self.current_frame += 1;
        Some(Ok((frame, meta)))
    }

    #[cfg(feature = "video")]
    fn next_video_frame(&mut self) -> Option<Result<(DynamicImage, SourceMeta)>> {
        if self.decoder.is_none()
            && let Source::Video(path) = &self.source
        {
            match video_rs::decode::Decoder::new(path.as_path()) {
                Ok(decoder) => {
                    if let Ok(duration) = decoder.duration() {
                        let fps = f64::from(decoder.frame_rate());
                        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                        {
                            self.total_frames = Some((duration.as_secs_f64() * fps) as usize);
                        }
                    }
                    self.decoder = Some(decoder);
                }
                Err(e) => {
                    return Some(Err(AnalysisError::VideoError(format!(
                        "Failed to open {}: {e}",
                        path.display()
                    ))));
                }
            }
        }

        let decoder = self.decoder.as_mut()?;
        match decoder.decode() {
            Ok((_ts, frame)) => {
                let fps = decoder.frame_rate();
                let meta = SourceMeta {
                    frame_idx: self.current_frame,
                    total_frames: self.total_frames,
                    path: self.source.label(),
                    fps: (fps > 0.0).then_some(fps),
                };
                self.current_frame += 1;
                Some(video_frame_to_image(&frame).map(|img| (img, meta)))
            }
            Err(video_rs::Error::DecodeExhausted | video_rs::Error::ReadExhausted) => None,
            Err(e) => Some(Err(AnalysisError::VideoError(format!(
                "Failed to decode frame {}: {e}",
                self.current_frame
            )))),
        }
    }

    #[cfg(not(feature = "video"))]
    fn next_video_frame(&mut self) -> Option<Result<(DynamicImage, SourceMeta)>> {
        // Report once, then end.
        self.finished = true;
        Some(Err(AnalysisError::FeatureNotEnabled(
            "Video support requires the 'video' feature".to_string(),
        )))
    }
}

impl Iterator for SourceIterator {
    type Item = Result<(DynamicImage, SourceMeta)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match &self.source {
            Source::Image(_) | Source::Directory(_) | Source::Glob(_) | Source::ImageList(_) => {
                self.next_image()
            }
            Source::Frames { .. } => self.next_memory_frame(),
            Source::Video(_) => self.next_video_frame(),
        }
    }
}

/// Collect image paths from a directory, sorted by name.
fn collect_images_from_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(AnalysisError::ImageError(format!(
            "Not a directory: {}",
            dir.display()
        )));
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| is_image_file(path))
        .collect();

    paths.sort();
    Ok(paths)
}

/// Collect image paths for a `dir/*.ext` pattern, sorted by name.
fn collect_images_from_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let Some(star_pos) = pattern.find('*') else {
        return Ok(vec![PathBuf::from(pattern)]);
    };

    let dir_part = &pattern[..star_pos];
    let dir = if dir_part.is_empty() {
        Path::new(".")
    } else {
        Path::new(dir_part.trim_end_matches(['/', '\\']))
    };
    let ext_filter: Option<String> = pattern[star_pos..]
        .strip_prefix("*.")
        .map(str::to_lowercase);

    if !dir.is_dir() {
        return Err(AnalysisError::ImageError(format!(
            "Directory not found: {}",
            dir.display()
        )));
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            ext_filter.as_ref().map_or_else(
                || is_image_file(path),
                |ext| {
                    path.extension()
                        .is_some_and(|e| e.to_string_lossy().to_lowercase() == *ext)
                },
            )
        })
        .collect();

    paths.sort();
    Ok(paths)
}

/// Convert a decoded HWC RGB frame to a `DynamicImage`.
#[cfg(feature = "video")]
fn video_frame_to_image(frame: &video_rs::Frame) -> Result<DynamicImage> {
    let shape = frame.shape();
    let height = u32::try_from(shape[0])
        .map_err(|_| AnalysisError::ImageError("Frame height exceeds u32::MAX".to_string()))?;
    let width = u32::try_from(shape[1])
        .map_err(|_| AnalysisError::ImageError("Frame width exceeds u32::MAX".to_string()))?;

    // Logical iteration order is row-major HWC regardless of memory layout.
    let rgb: Vec<u8> = frame.iter().copied().collect();
    let buffer = image::RgbImage::from_raw(width, height, rgb).ok_or_else(|| {
        AnalysisError::ImageError("Failed to create image from video frame".to_string())
    })?;

    Ok(DynamicImage::ImageRgb8(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_source_from_string() {
        assert!(matches!("squat.jpg".parse::<Source>(), Ok(Source::Image(_))));
        assert!(matches!("squat.MP4".parse::<Source>(), Ok(Source::Video(_))));
        assert!(matches!("frames/*.png".parse::<Source>(), Ok(Source::Glob(_))));
    }

    #[test]
    fn test_live_sources_rejected() {
        assert!(matches!(
            "0".parse::<Source>(),
            Err(AnalysisError::ConfigError(_))
        ));
        assert!("rtsp://camera.local/stream".parse::<Source>().is_err());
        assert!("https://example.com/squat.mp4".parse::<Source>().is_err());
    }

    #[test]
    fn test_memory_frames() {
        let frames = vec![DynamicImage::ImageRgb8(RgbImage::new(4, 4)); 3];
        let source = Source::frames(frames, Some(30.0));
        assert_eq!(source.label(), "3 in-memory frames");

        let metas: Vec<SourceMeta> = SourceIterator::new(source)
            .unwrap()
            .map(|item| item.unwrap().1)
            .collect();
        assert_eq!(metas.len(), 3);
        assert_eq!(metas[2].frame_idx, 2);
        assert_eq!(metas[0].fps, Some(30.0));
        assert_eq!(metas[0].total_frames, Some(3));
    }

    #[test]
    fn test_directory_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.png", "notes.txt"] {
            let path = dir.path().join(name);
            if name.ends_with(".png") {
                RgbImage::new(2, 2).save(&path).unwrap();
            } else {
                std::fs::write(&path, "x").unwrap();
            }
        }

        let source = Source::from(dir.path().to_path_buf());
        assert!(matches!(source, Source::Directory(_)));

        let paths: Vec<String> = SourceIterator::new(source)
            .unwrap()
            .map(|item| item.unwrap().1.path)
            .collect();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("a.png"));
        assert!(paths[1].ends_with("b.png"));
    }

    #[test]
    fn test_missing_image_yields_error() {
        let mut iter = SourceIterator::new(Source::Image(PathBuf::from("missing.jpg"))).unwrap();
        assert!(matches!(iter.next(), Some(Err(AnalysisError::ImageError(_)))));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_missing_directory_fails_on_open() {
        assert!(SourceIterator::new(Source::Directory(PathBuf::from("no/such/dir"))).is_err());
    }
}
