// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Writing annotated frames to disk as mp4, animated GIF or individual images.

use std::fmt;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, DynamicImage, Frame, RgbImage};

#[cfg(feature = "video")]
use video_rs::{Encoder, Time, encode::Settings as EncoderSettings};

use crate::error::{AnalysisError, Result};
use crate::pose::preprocess::resize_rgb;
use crate::source::SourceMeta;

#[cfg(feature = "video")]
use std::sync::Once;

#[cfg(feature = "video")]
static INIT: Once = Once::new();

/// GIF output width in pixels; height follows the frame aspect ratio.
pub const GIF_WIDTH: u32 = 720;

/// Highest frame rate a GIF is written at.
pub const GIF_MAX_FPS: f32 = 30.0;

/// Initialize `video-rs` once and silence `FFmpeg` below error level.
#[allow(clippy::missing_const_for_fn)]
pub fn init_logging() {
    #[cfg(feature = "video")]
    INIT.call_once(|| {
        if let Err(e) = video_rs::init() {
            crate::error!("Failed to initialize video-rs: {e}");
        }
    });
}

/// Container for annotated output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// H.264 mp4 (needs the `video` feature).
    Mp4,
    /// Animated GIF, looped forever.
    #[default]
    Gif,
    /// One JPEG per frame.
    Frames,
}

impl OutputFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Gif => "gif",
            Self::Frames => "jpg",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mp4 => "mp4",
            Self::Gif => "gif",
            Self::Frames => "frames",
        })
    }
}

/// First free run directory under `base`: `prefix`, then `prefix2`, `prefix3`, ...
#[must_use]
pub fn find_next_run_dir<P: AsRef<Path>>(base: P, prefix: &str) -> PathBuf {
    let base = base.as_ref();
    let first = base.join(prefix);
    if !first.exists() {
        return first;
    }
    (2..)
        .map(|i| base.join(format!("{prefix}{i}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}

/// Output size for a GIF frame: [`GIF_WIDTH`] wide, aspect preserved.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn gif_frame_size(width: u32, height: u32) -> (u32, u32) {
    if width == 0 {
        return (GIF_WIDTH, height);
    }
    let scaled = (f64::from(height) * f64::from(GIF_WIDTH) / f64::from(width)).round() as u32;
    (GIF_WIDTH, scaled.max(1))
}

/// Delay between GIF frames: `1 / min(fps, 30)` seconds.
#[must_use]
pub fn gif_frame_delay(fps: f32) -> Delay {
    let fps = if fps.is_finite() && fps > 0.0 {
        fps.min(GIF_MAX_FPS)
    } else {
        crate::processor::DEFAULT_FPS
    };
    Delay::from_saturating_duration(Duration::from_secs_f64(1.0 / f64::from(fps)))
}

/// A wrapper around the `video-rs` encoder.
#[cfg(feature = "video")]
pub struct VideoWriter {
    encoder: Encoder,
    frame_duration: Time,
    position: Time,
    width: usize,
    height: usize,
}

#[cfg(feature = "video")]
impl VideoWriter {
    /// Create an H.264 writer at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the encoder cannot be initialized.
    pub fn new<P: AsRef<Path>>(path: P, width: usize, height: usize, fps: f32) -> Result<Self> {
        let settings = EncoderSettings::preset_h264_yuv420p(width, height, false);
        let encoder = Encoder::new(path.as_ref(), settings).map_err(|e| {
            AnalysisError::VideoError(format!("Failed to create video encoder: {e}"))
        })?;

        Ok(Self {
            encoder,
            frame_duration: Time::from_secs_f64(1.0 / f64::from(fps)),
            position: Time::zero(),
            width,
            height,
        })
    }

    /// Append a frame. Its size must match the first frame.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the frame size changed.
    pub fn write_frame(&mut self, frame: &DynamicImage) -> Result<()> {
        let rgb = frame.to_rgb8();
        let (width, height) = (rgb.width() as usize, rgb.height() as usize);
        if width != self.width || height != self.height {
            return Err(AnalysisError::VideoError(format!(
                "Frame dimensions {width}x{height} do not match video dimensions {}x{}",
                self.width, self.height
            )));
        }

        let frame_array = ndarray::Array3::from_shape_vec((height, width, 3), rgb.into_raw())
            .map_err(|e| AnalysisError::VideoError(e.to_string()))?;
        self.encoder
            .encode(&frame_array, self.position)
            .map_err(|e| AnalysisError::VideoError(format!("Failed to encode frame: {e}")))?;

        self.position = self.position.aligned_with(self.frame_duration).add();
        Ok(())
    }

    /// Flush and close the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the encoder fails to finish.
    pub fn finish(mut self) -> Result<()> {
        self.encoder.finish().map_err(|e| {
            AnalysisError::VideoError(format!("Failed to finish video encoding: {e}"))
        })
    }
}

/// Streams annotated frames into the chosen [`OutputFormat`].
///
/// The writer is opened on the first frame, so the output takes that frame's size.
/// Call [`SaveResults::finish`] to flush; dropping without it may leave a truncated
/// file.
pub struct SaveResults {
    save_dir: PathBuf,
    format: OutputFormat,
    stem: String,
    fps: f32,
    frames_written: usize,
    gif: Option<GifEncoder<BufWriter<File>>>,
    #[cfg(feature = "video")]
    video_writer: Option<VideoWriter>,
}

impl SaveResults {
    /// Prepare a writer that names its output after `source_label`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::FeatureNotEnabled`] for mp4 without the `video`
    /// feature and an I/O error if `save_dir` cannot be created.
    pub fn new<P: Into<PathBuf>>(
        save_dir: P,
        format: OutputFormat,
        source_label: &str,
        fps: f32,
    ) -> Result<Self> {
        #[cfg(not(feature = "video"))]
        if format == OutputFormat::Mp4 {
            return Err(AnalysisError::FeatureNotEnabled(
                "mp4 output requires the 'video' feature".to_string(),
            ));
        }
        init_logging();

        let save_dir = save_dir.into();
        fs::create_dir_all(&save_dir).map_err(|e| {
            AnalysisError::IoError(format!(
                "Failed to create directory {}: {e}",
                save_dir.display()
            ))
        })?;

        let stem = Path::new(source_label)
            .file_stem()
            .map_or_else(|| "output".to_string(), |s| s.to_string_lossy().to_string());

        Ok(Self {
            save_dir,
            format,
            stem,
            fps,
            frames_written: 0,
            gif: None,
            #[cfg(feature = "video")]
            video_writer: None,
        })
    }

    #[must_use]
    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    #[must_use]
    pub const fn frames_written(&self) -> usize {
        self.frames_written
    }

    /// Path of the mp4 or GIF file, or of the directory holding per-frame images.
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        match self.format {
            OutputFormat::Frames => self.save_dir.clone(),
            format => self
                .save_dir
                .join(format!("{}.{}", self.stem, format.extension())),
        }
    }

    /// Append one annotated frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the output file cannot be opened or the frame cannot be
    /// encoded.
    pub fn save(&mut self, meta: &SourceMeta, annotated: &DynamicImage) -> Result<()> {
        match self.format {
            OutputFormat::Frames => self.save_image(meta, annotated)?,
            OutputFormat::Gif => self.save_gif_frame(annotated)?,
            #[cfg(feature = "video")]
            OutputFormat::Mp4 => self.save_video_frame(annotated)?,
            #[cfg(not(feature = "video"))]
            OutputFormat::Mp4 => {
                return Err(AnalysisError::FeatureNotEnabled(
                    "mp4 output requires the 'video' feature".to_string(),
                ));
            }
        }
        self.frames_written += 1;
        Ok(())
    }

    fn save_image(&self, meta: &SourceMeta, annotated: &DynamicImage) -> Result<()> {
        let path = self
            .save_dir
            .join(format!("{}_{}.jpg", self.stem, meta.frame_idx));
        annotated.to_rgb8().save(&path)?;
        Ok(())
    }

    fn save_gif_frame(&mut self, annotated: &DynamicImage) -> Result<()> {
        if self.gif.is_none() {
            let file = File::create(self.output_path())?;
            let mut encoder = GifEncoder::new_with_speed(BufWriter::new(file), 10);
            encoder.set_repeat(Repeat::Infinite)?;
            self.gif = Some(encoder);
        }

        let (width, height) = gif_frame_size(annotated.width(), annotated.height());
        let rgb = RgbImage::from_raw(width, height, resize_rgb(annotated, width, height)?)
            .ok_or_else(|| AnalysisError::ImageError("Resized frame has wrong size".to_string()))?;
        let rgba = DynamicImage::ImageRgb8(rgb).to_rgba8();
        let frame = Frame::from_parts(rgba, 0, 0, gif_frame_delay(self.fps));

        if let Some(encoder) = self.gif.as_mut() {
            encoder.encode_frame(frame)?;
        }
        Ok(())
    }

    #[cfg(feature = "video")]
    fn save_video_frame(&mut self, annotated: &DynamicImage) -> Result<()> {
        if self.video_writer.is_none() {
            let fps = if self.fps > 0.0 {
                self.fps
            } else {
                crate::processor::DEFAULT_FPS
            };
            self.video_writer = Some(VideoWriter::new(
                self.output_path(),
                annotated.width() as usize,
                annotated.height() as usize,
                fps,
            )?);
        }
        if let Some(writer) = self.video_writer.as_mut() {
            writer.write_frame(annotated)?;
        }
        Ok(())
    }

    /// Flush any open encoder.
    ///
    /// # Errors
    ///
    /// Returns an error if the encoder fails to finish.
    pub fn finish(self) -> Result<()> {
        // The GIF trailer is written when the encoder drops.
        drop(self.gif);
        #[cfg(feature = "video")]
        if let Some(writer) = self.video_writer {
            writer.finish()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn frame(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([40, 80, 120])))
    }

    #[test]
    fn test_find_next_run_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let first = find_next_run_dir(tmp.path(), "analyze");
        assert_eq!(first, tmp.path().join("analyze"));

        fs::create_dir_all(&first).unwrap();
        assert_eq!(
            find_next_run_dir(tmp.path(), "analyze"),
            tmp.path().join("analyze2")
        );

        fs::create_dir_all(tmp.path().join("analyze2")).unwrap();
        assert_eq!(
            find_next_run_dir(tmp.path(), "analyze"),
            tmp.path().join("analyze3")
        );
    }

    #[test]
    fn test_gif_frame_size_keeps_aspect() {
        assert_eq!(gif_frame_size(1280, 720), (720, 405));
        assert_eq!(gif_frame_size(360, 640), (720, 1280));
        assert_eq!(gif_frame_size(720, 720), (720, 720));
    }

    #[test]
    fn test_gif_frame_delay_caps_fps() {
        let (numer, denom) = gif_frame_delay(10.0).numer_denom_ms();
        assert!((f64::from(numer) / f64::from(denom) - 100.0).abs() < 1e-6);

        let (numer, denom) = gif_frame_delay(60.0).numer_denom_ms();
        assert!((f64::from(numer) / f64::from(denom) - 1000.0 / 30.0).abs() < 1e-3);
    }

    #[test]
    fn test_save_frames_as_images() {
        let tmp = tempfile::tempdir().unwrap();
        let mut saver =
            SaveResults::new(tmp.path().join("out"), OutputFormat::Frames, "clip.mp4", 10.0)
                .unwrap();
        for idx in 0..2 {
            let meta = SourceMeta {
                frame_idx: idx,
                ..SourceMeta::default()
            };
            saver.save(&meta, &frame(32, 24)).unwrap();
        }
        assert_eq!(saver.frames_written(), 2);
        assert!(tmp.path().join("out/clip_0.jpg").exists());
        assert!(tmp.path().join("out/clip_1.jpg").exists());
        saver.finish().unwrap();
    }

    #[test]
    fn test_save_gif() {
        let tmp = tempfile::tempdir().unwrap();
        let mut saver =
            SaveResults::new(tmp.path(), OutputFormat::Gif, "squat.mp4", 25.0).unwrap();
        let path = saver.output_path();
        assert_eq!(path, tmp.path().join("squat.gif"));

        for _ in 0..3 {
            saver.save(&SourceMeta::default(), &frame(64, 48)).unwrap();
        }
        saver.finish().unwrap();

        let decoded = image::open(&path).unwrap();
        assert_eq!(decoded.width(), GIF_WIDTH);
        assert_eq!(decoded.height(), 540);
    }
}
