// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Preview window for annotated frames.

use std::time::{Duration, Instant};

use image::DynamicImage;
use minifb::{Key, Window, WindowOptions};

use crate::error::{AnalysisError, Result};

/// Roughly 60 Hz.
const UPDATE_INTERVAL: Duration = Duration::from_micros(16_600);

/// A minifb window opened on the first frame and sized to it.
///
/// Closing the window or pressing Esc or Q ends the preview.
pub struct Viewer {
    title: String,
    window: Option<Window>,
    width: usize,
    height: usize,
    buffer: Vec<u32>,
}

impl Viewer {
    #[must_use]
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            window: None,
            width: 0,
            height: 0,
            buffer: Vec::new(),
        }
    }

    fn open(&mut self) -> Result<&mut Window> {
        if self.window.is_none() {
            let mut window = Window::new(
                &self.title,
                self.width,
                self.height,
                WindowOptions {
                    resize: true,
                    ..WindowOptions::default()
                },
            )
            .map_err(|e| AnalysisError::VisualizerError(format!("Failed to create window: {e}")))?;
            window.limit_update_rate(Some(UPDATE_INTERVAL));
            self.window = Some(window);
        }
        self.window
            .as_mut()
            .ok_or_else(|| AnalysisError::VisualizerError("Window unavailable".to_string()))
    }

    fn should_close(window: &Window) -> bool {
        !window.is_open() || window.is_key_down(Key::Escape) || window.is_key_down(Key::Q)
    }

    /// Show `image`. Returns `Ok(false)` once the user has closed the preview.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::VisualizerError`] if the window cannot be created
    /// or updated.
    pub fn update(&mut self, image: &DynamicImage) -> Result<bool> {
        if let Some(window) = &self.window
            && Self::should_close(window)
        {
            return Ok(false);
        }

        let rgb = image.to_rgb8();
        self.width = rgb.width() as usize;
        self.height = rgb.height() as usize;
        // minifb wants 0x00RRGGBB per pixel.
        self.buffer.clear();
        self.buffer.extend(
            rgb.pixels()
                .map(|p| (u32::from(p[0]) << 16) | (u32::from(p[1]) << 8) | u32::from(p[2])),
        );

        let (width, height) = (self.width, self.height);
        let buffer = std::mem::take(&mut self.buffer);
        let result = self
            .open()?
            .update_with_buffer(&buffer, width, height)
            .map_err(|e| AnalysisError::VisualizerError(format!("Failed to update window: {e}")));
        self.buffer = buffer;
        result?;
        Ok(true)
    }

    /// Keep the last frame on screen for `duration`, or until the window closes.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::VisualizerError`] if the window cannot be updated.
    pub fn hold(&mut self, duration: Duration) -> Result<bool> {
        let (width, height) = (self.width, self.height);
        let Some(window) = self.window.as_mut() else {
            return Ok(true);
        };

        let start = Instant::now();
        while start.elapsed() < duration {
            if Self::should_close(window) {
                return Ok(false);
            }
            window
                .update_with_buffer(&self.buffer, width, height)
                .map_err(|e| {
                    AnalysisError::VisualizerError(format!("Failed to update window: {e}"))
                })?;
        }
        Ok(true)
    }
}
