// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Frame-by-frame squat analysis of a whole source.
//!
//! [`VideoProcessor`] pulls frames from a [`Source`], runs the pose estimator,
//! evaluates the primary person and records one [`FrameMetrics`] per frame.
//! Per-frame failures are recorded and skipped; only a source that cannot be read
//! at all fails the run.

use std::time::Instant;

use image::DynamicImage;

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::metrics::{AnalysisSummary, FrameMetrics, VideoAnalysis};
use crate::pose::{PoseEstimate, PoseEstimator};
use crate::session::{LiveSession, LiveUpdate};
use crate::source::{Source, SourceIterator, SourceMeta};
use crate::squat::SquatEvaluator;

/// Frame rate assumed when the source does not report one.
pub const DEFAULT_FPS: f32 = 10.0;

/// Everything known about one processed frame, handed to the frame callback.
#[derive(Debug)]
pub struct FrameOutcome<'a> {
    pub image: &'a DynamicImage,
    pub meta: &'a SourceMeta,
    /// Pose model output. `None` when inference failed on this frame.
    pub estimate: Option<&'a PoseEstimate>,
    pub metrics: &'a FrameMetrics,
    /// Rep counter state, present in rep-counting mode.
    pub live: Option<&'a LiveUpdate>,
}

/// Runs squat analysis over every frame of a source.
///
/// # Example
///
/// ```no_run
/// use squat_form::{AnalysisConfig, PoseModel, Source, VideoProcessor};
///
/// let model = PoseModel::load("yolo11n-pose.onnx")?;
/// let mut processor = VideoProcessor::new(model, AnalysisConfig::default())?;
/// let analysis = processor.analyze("squat.mp4".parse::<Source>()?)?;
/// println!("{:?}", analysis.summary.overall_depth);
/// # Ok::<(), squat_form::AnalysisError>(())
/// ```
#[derive(Debug)]
pub struct VideoProcessor<E> {
    estimator: E,
    config: AnalysisConfig,
    evaluator: SquatEvaluator,
    count_reps: bool,
}

impl<E: PoseEstimator> VideoProcessor<E> {
    /// Create a processor around `estimator`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::ConfigError`](crate::AnalysisError::ConfigError) if
    /// `config` is invalid.
    pub fn new(estimator: E, config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            evaluator: SquatEvaluator::new(&config),
            estimator,
            config,
            count_reps: false,
        })
    }

    /// Enable smoothing and rep counting on top of the per-frame metrics.
    #[must_use]
    pub const fn with_rep_counting(mut self, enabled: bool) -> Self {
        self.count_reps = enabled;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Consume the processor and return the estimator.
    pub fn into_estimator(self) -> E {
        self.estimator
    }

    /// Analyse every frame of `source`.
    ///
    /// # Errors
    ///
    /// See [`VideoProcessor::process_source`].
    pub fn analyze(&mut self, source: Source) -> Result<VideoAnalysis> {
        self.process_source(source, |_| Ok(true))
    }

    /// Analyse `source`, calling `on_frame` after each frame.
    ///
    /// The callback returns `Ok(false)` to stop early (frames so far are kept) and
    /// `Err` to abort the run.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be opened, its first frame cannot be
    /// read, or `on_frame` fails. Inference failures on individual frames are not
    /// errors; they are recorded as [`FrameStatus::InferenceError`](crate::FrameStatus).
    pub fn process_source<F>(&mut self, source: Source, mut on_frame: F) -> Result<VideoAnalysis>
    where
        F: FnMut(&FrameOutcome<'_>) -> Result<bool>,
    {
        let label = source.label();
        let mut frames_iter = SourceIterator::new(source)?;
        let mut session = self.count_reps.then(|| LiveSession::new(&self.config));
        let mut frames: Vec<FrameMetrics> = Vec::new();
        let mut fps: Option<f32> = None;

        loop {
            let (image, meta) = match frames_iter.next() {
                None => break,
                Some(Ok(frame)) => frame,
                // Nothing read yet: the source itself is unusable.
                Some(Err(e)) if frames.is_empty() => return Err(e),
                Some(Err(e)) => {
                    crate::warn!(
                        "Stopping after {} frames, failed to read the next one: {e}",
                        frames.len()
                    );
                    break;
                }
            };
            if fps.is_none() {
                fps = meta.fps;
            }

            let frame_index = frames.len();
            let start = Instant::now();
            let estimate = match self.estimator.estimate(&image) {
                Ok(estimate) => Some(estimate),
                Err(e) => {
                    crate::warn!("Inference failed on frame {frame_index}: {e}");
                    None
                }
            };

            let (metrics, live) = self.evaluate_frame(frame_index, estimate.as_ref(), session.as_mut(), start);
            log_frame(&metrics, live.as_ref());

            let keep_going = on_frame(&FrameOutcome {
                image: &image,
                meta: &meta,
                estimate: estimate.as_ref(),
                metrics: &metrics,
                live: live.as_ref(),
            })?;
            frames.push(metrics);
            if !keep_going {
                break;
            }
        }

        let reps = session.as_ref().map(LiveSession::reps);
        Ok(VideoAnalysis {
            source: label,
            fps: fps.filter(|f| f.is_finite() && *f > 0.0).unwrap_or(DEFAULT_FPS),
            summary: AnalysisSummary::from_frames(&frames, self.config.depth_angle_threshold, reps),
            frames,
        })
    }

    /// Turn one pose estimate into a metrics record, advancing the rep counter.
    fn evaluate_frame(
        &self,
        frame_index: usize,
        estimate: Option<&PoseEstimate>,
        session: Option<&mut LiveSession>,
        start: Instant,
    ) -> (FrameMetrics, Option<LiveUpdate>) {
        let Some(estimate) = estimate else {
            let elapsed = start.elapsed().as_secs_f64();
            let live = session.map(|s| s.skip());
            return (FrameMetrics::inference_error(frame_index, elapsed), live);
        };

        match (estimate.primary(), session) {
            (None, session) => {
                let live = session.map(|s| s.skip());
                let elapsed = start.elapsed().as_secs_f64();
                (FrameMetrics::no_person(frame_index, elapsed), live)
            }
            (Some((keypoints, scores)), Some(session)) => {
                let update = session.process(keypoints, scores);
                let elapsed = start.elapsed().as_secs_f64();
                (
                    FrameMetrics::from_analysis(frame_index, &update.analysis, elapsed),
                    Some(update),
                )
            }
            (Some((keypoints, scores)), None) => {
                let analysis = self.evaluator.evaluate(keypoints, scores);
                let elapsed = start.elapsed().as_secs_f64();
                (FrameMetrics::from_analysis(frame_index, &analysis, elapsed), None)
            }
        }
    }
}

fn log_frame(metrics: &FrameMetrics, live: Option<&LiveUpdate>) {
    match live {
        Some(update) => crate::verbose!(
            "frame {}: knee {} | {} | {} | reps {} ({}) {:.1}ms",
            metrics.frame_index,
            metrics.angle_text(),
            metrics.depth_text(),
            metrics.feedback(),
            update.reps,
            update.state,
            metrics.processing_time * 1000.0
        ),
        None => crate::verbose!(
            "frame {}: knee {} | {} | {} {:.1}ms",
            metrics.frame_index,
            metrics.angle_text(),
            metrics.depth_text(),
            metrics.feedback(),
            metrics.processing_time * 1000.0
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;
    use crate::keypoint::{Keypoint, KeypointIndex, KeypointSet, ScoreSet};
    use crate::metrics::FrameStatus;
    use image::RgbImage;

    /// Returns a canned estimate per call, `None` meaning an inference failure.
    struct Scripted(std::vec::IntoIter<Option<PoseEstimate>>);

    impl PoseEstimator for Scripted {
        fn estimate(&mut self, _image: &DynamicImage) -> Result<PoseEstimate> {
            self.0
                .next()
                .flatten()
                .ok_or_else(|| AnalysisError::InferenceError("scripted failure".to_string()))
        }
    }

    fn straight_leg() -> PoseEstimate {
        let mut kps = KeypointSet::undetected();
        kps.set(KeypointIndex::RightHip, Keypoint::new(0.0, 10.0));
        kps.set(KeypointIndex::RightKnee, Keypoint::new(0.0, 5.0));
        kps.set(KeypointIndex::RightAnkle, Keypoint::new(0.0, 0.0));
        let mut estimate = PoseEstimate::empty();
        estimate.push(kps, ScoreSet::uniform(0.9), None);
        estimate
    }

    fn blank_frames(n: usize) -> Source {
        Source::frames(vec![DynamicImage::ImageRgb8(RgbImage::new(8, 8)); n], None)
    }

    #[test]
    fn test_every_frame_recorded() {
        let script = vec![Some(straight_leg()), Some(PoseEstimate::empty()), None];
        let mut processor =
            VideoProcessor::new(Scripted(script.into_iter()), AnalysisConfig::default()).unwrap();

        let analysis = processor.analyze(blank_frames(3)).unwrap();
        let statuses: Vec<FrameStatus> = analysis.frames.iter().map(|f| f.status).collect();
        assert_eq!(
            statuses,
            vec![
                FrameStatus::Complete,
                FrameStatus::NoPersonDetected,
                FrameStatus::InferenceError
            ]
        );
        let indices: Vec<usize> = analysis.frames.iter().map(|f| f.frame_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!((analysis.fps - DEFAULT_FPS).abs() < f32::EPSILON);
        assert!(analysis.summary.reps.is_none());
    }

    #[test]
    fn test_callback_can_stop_early() {
        let script = vec![Some(straight_leg()); 5];
        let mut processor =
            VideoProcessor::new(Scripted(script.into_iter()), AnalysisConfig::default()).unwrap();

        let mut seen = 0;
        let analysis = processor
            .process_source(blank_frames(5), |_| {
                seen += 1;
                Ok(seen < 2)
            })
            .unwrap();
        assert_eq!(analysis.frames.len(), 2);
    }

    #[test]
    fn test_unreadable_source_is_fatal() {
        let mut processor =
            VideoProcessor::new(Scripted(Vec::new().into_iter()), AnalysisConfig::default())
                .unwrap();
        let result = processor.analyze(Source::Image("does/not/exist.jpg".into()));
        assert!(matches!(result, Err(AnalysisError::ImageError(_))));
    }

    #[test]
    fn test_read_failure_after_first_frame_keeps_frames() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("frame.png");
        RgbImage::new(8, 8).save(&good).unwrap();

        let script = vec![Some(straight_leg()); 3];
        let mut processor =
            VideoProcessor::new(Scripted(script.into_iter()), AnalysisConfig::default()).unwrap();
        let analysis = processor
            .analyze(Source::ImageList(vec![
                good.clone(),
                dir.path().join("missing.png"),
                good,
            ]))
            .unwrap();

        assert_eq!(analysis.frames.len(), 1);
        assert_eq!(analysis.frames[0].status, FrameStatus::Complete);
        assert_eq!(analysis.summary.total_frames, 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = AnalysisConfig::new().with_smoothing_window(0);
        assert!(VideoProcessor::new(Scripted(Vec::new().into_iter()), config).is_err());
    }

    #[test]
    fn test_rep_mode_reports_live_state() {
        let script = vec![Some(straight_leg()); 2];
        let mut processor =
            VideoProcessor::new(Scripted(script.into_iter()), AnalysisConfig::default())
                .unwrap()
                .with_rep_counting(true);

        let mut live_frames = 0;
        let analysis = processor
            .process_source(blank_frames(2), |outcome| {
                if outcome.live.is_some() {
                    live_frames += 1;
                }
                Ok(true)
            })
            .unwrap();
        assert_eq!(live_frames, 2);
        assert_eq!(analysis.summary.reps, Some(0));
    }
}
