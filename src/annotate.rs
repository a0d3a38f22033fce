// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Frame annotation: pose skeleton plus the metrics panel.

use ab_glyph::{FontVec, PxScale};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_line_segment_mut, draw_text_mut, text_size,
};
use imageproc::rect::Rect;

use crate::config::{AnalysisConfig, BodySide};
use crate::download::check_font;
use crate::keypoint::{KeypointSet, ScoreSet, is_valid_keypoint};
use crate::metrics::{FrameMetrics, FrameStatus};
use crate::processor::FrameOutcome;
use crate::session::LiveUpdate;
use crate::visualizer::Color;
use crate::visualizer::skeleton::{KPT_COLOR_INDICES, LIMB_COLOR_INDICES, SKELETON, leg_limbs};

/// Font fetched for overlay text.
pub const DEFAULT_FONT: &str = "Arial.ttf";

const TEXT_SCALE: f32 = 40.0;
/// Top-left corner of the first text line.
const TEXT_OFFSET: (i32, i32) = (15, 100);
const TEXT_PADDING: i32 = 8;
const LINE_SPACING: i32 = 15;
const LIMB_THICKNESS: i32 = 2;
const KEYPOINT_RADIUS: i32 = 4;

/// Draws the pose skeleton and squat metrics onto frames.
pub struct Annotator {
    font: Option<FontVec>,
    confidence_threshold: f32,
    side: BodySide,
}

impl Annotator {
    /// Create an annotator, fetching [`DEFAULT_FONT`] if it is not cached yet.
    ///
    /// Without a font only the skeleton is drawn.
    #[must_use]
    pub fn new(config: &AnalysisConfig) -> Self {
        let font = check_font(DEFAULT_FONT)
            .and_then(|path| std::fs::read(path).ok())
            .and_then(|data| FontVec::try_from_vec(data).ok());
        Self::with_font(config, font)
    }

    #[must_use]
    pub const fn with_font(config: &AnalysisConfig, font: Option<FontVec>) -> Self {
        Self {
            font,
            confidence_threshold: config.confidence_threshold,
            side: config.side,
        }
    }

    #[must_use]
    pub const fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Text panel lines for a frame.
    #[must_use]
    pub fn overlay_lines(metrics: &FrameMetrics, live: Option<&LiveUpdate>) -> Vec<String> {
        let mut lines = vec![
            "Exercise: Squat".to_string(),
            format!("Knee Angle: {}", metrics.angle_text()),
            format!("Depth: {}", metrics.depth_text()),
        ];
        if let Some(update) = live {
            lines.push(format!("Squats: {}", update.reps));
            lines.push(format!("State: {}", update.state));
        }
        lines
    }

    /// Render the annotated copy of a processed frame.
    #[must_use]
    pub fn annotate(&self, outcome: &FrameOutcome<'_>) -> DynamicImage {
        let mut img = outcome.image.to_rgb8();

        if let Some(estimate) = outcome.estimate {
            for (keypoints, scores) in estimate.people() {
                self.draw_skeleton(&mut img, keypoints, scores);
            }
        }

        match outcome.metrics.status {
            FrameStatus::NoPersonDetected | FrameStatus::InferenceError => {
                self.draw_line(&mut img, outcome.metrics.feedback(), TEXT_OFFSET, Color::RED, None);
            }
            FrameStatus::Complete | FrameStatus::MissingKeypoints => {
                let mut y = TEXT_OFFSET.1;
                for line in Self::overlay_lines(outcome.metrics, outcome.live) {
                    let height = self.draw_line(
                        &mut img,
                        &line,
                        (TEXT_OFFSET.0, y),
                        Color::TURQUOISE,
                        Some(Color::BLACK),
                    );
                    y += height + 2 * TEXT_PADDING + LINE_SPACING;
                }
            }
        }

        DynamicImage::ImageRgb8(img)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn draw_skeleton(&self, img: &mut RgbImage, keypoints: &KeypointSet, scores: &ScoreSet) {
        let valid = |k: usize| is_valid_keypoint(keypoints.0[k], scores.0[k], self.confidence_threshold);
        let measured = leg_limbs(self.side);

        for (limb, &color_index) in SKELETON.iter().zip(LIMB_COLOR_INDICES.iter()) {
            let [a, b] = *limb;
            if !valid(a) || !valid(b) {
                continue;
            }
            let is_measured = measured
                .iter()
                .any(|m| (m[0] == a && m[1] == b) || (m[0] == b && m[1] == a));
            let (color, thickness) = if is_measured {
                (Color::GREEN, LIMB_THICKNESS * 2)
            } else {
                (Color::from_pose_index(color_index), LIMB_THICKNESS)
            };
            let (pa, pb) = (keypoints.0[a], keypoints.0[b]);
            draw_thick_line(img, (pa.x, pa.y), (pb.x, pb.y), thickness, color.into());
        }

        for (k, &color_index) in KPT_COLOR_INDICES.iter().enumerate() {
            if valid(k) {
                let kp = keypoints.0[k];
                draw_filled_circle_mut(
                    img,
                    (kp.x.round() as i32, kp.y.round() as i32),
                    KEYPOINT_RADIUS,
                    Rgb::from(Color::from_pose_index(color_index)),
                );
            }
        }
    }

    /// Draw one text line, returning its height (0 without a font).
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn draw_line(
        &self,
        img: &mut RgbImage,
        text: &str,
        (x, y): (i32, i32),
        color: Color,
        background: Option<Color>,
    ) -> i32 {
        let Some(font) = &self.font else {
            return 0;
        };
        let scale = PxScale::from(TEXT_SCALE);
        let (w, h) = text_size(scale, font, text);

        if let Some(bg) = background {
            let rect = Rect::at(x - TEXT_PADDING, y - TEXT_PADDING)
                .of_size(w + 2 * TEXT_PADDING as u32, h + 2 * TEXT_PADDING as u32);
            draw_filled_rect_mut(img, rect, bg.into());
        }
        draw_text_mut(img, color.into(), x, y, scale, font, text);
        h as i32
    }
}

/// Line segment widened by drawing parallel offsets.
#[allow(clippy::cast_precision_loss)]
fn draw_thick_line(img: &mut RgbImage, start: (f32, f32), end: (f32, f32), thickness: i32, color: Rgb<u8>) {
    let half = thickness / 2;
    for offset in -half..=half {
        let d = offset as f32;
        draw_line_segment_mut(img, (start.0 + d, start.1), (end.0 + d, end.1), color);
        draw_line_segment_mut(img, (start.0, start.1 + d), (end.0, end.1 + d), color);
    }
}
