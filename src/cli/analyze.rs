// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::path::PathBuf;
#[cfg(feature = "visualize")]
use std::time::Duration;

use crate::cli::args::AnalyzeArgs;
use crate::config::AnalysisConfig;
use crate::device::Device;
use crate::error::{AnalysisError, Result};
use crate::inference::InferenceConfig;
use crate::io::{SaveResults, find_next_run_dir};
use crate::metrics::VideoAnalysis;
use crate::pose::PoseModel;
use crate::processor::{DEFAULT_FPS, FrameOutcome, VideoProcessor};
use crate::report::{write_csv, write_json};
use crate::source::Source;
use crate::{info, section, success, verbose, warn};

#[cfg(feature = "annotate")]
use crate::annotate::Annotator;
#[cfg(feature = "visualize")]
use crate::visualizer::Viewer;

/// Parent of the numbered `analyze` run directories.
pub const RUNS_DIR: &str = "runs/squat";

/// How long a single-image result stays in the preview window.
#[cfg(feature = "visualize")]
const IMAGE_HOLD: Duration = Duration::from_millis(1500);

/// Build the analysis thresholds from the command line.
///
/// # Errors
///
/// Returns [`AnalysisError::ConfigError`] if the thresholds are inconsistent.
pub fn analysis_config(args: &AnalyzeArgs) -> Result<AnalysisConfig> {
    let config = AnalysisConfig::new()
        .with_confidence(args.conf)
        .with_depth_threshold(args.depth_threshold)
        .with_squat_threshold(args.squat_threshold)
        .with_rise_threshold(args.rise_threshold)
        .with_smoothing_window(args.window)
        .with_side(args.side);
    config.validate()?;
    Ok(config)
}

/// Build the pose model settings from the command line.
///
/// # Errors
///
/// Returns [`AnalysisError::ConfigError`] for an unknown device or out-of-range
/// thresholds.
pub fn inference_config(args: &AnalyzeArgs) -> Result<InferenceConfig> {
    let mut config = InferenceConfig::new()
        .with_confidence(args.det_conf)
        .with_iou(args.iou);
    if let Some(size) = args.imgsz {
        config = config.with_imgsz(size, size);
    }
    if let Some(device) = &args.device {
        let device: Device = device.parse().map_err(AnalysisError::ConfigError)?;
        config = config.with_device(device);
    }
    config.validate()?;
    Ok(config)
}

/// Frame sinks driven by the processor callback.
struct Outputs {
    save_dir: Option<PathBuf>,
    format: crate::io::OutputFormat,
    label: String,
    saver: Option<SaveResults>,
    #[cfg(feature = "annotate")]
    annotator: Option<Annotator>,
    #[cfg(feature = "visualize")]
    viewer: Option<Viewer>,
}

impl Outputs {
    fn new(args: &AnalyzeArgs, config: &AnalysisConfig, label: String) -> Self {
        let save_dir = args.save.then(|| find_next_run_dir(RUNS_DIR, "analyze"));

        #[cfg(not(feature = "annotate"))]
        if args.save || args.show {
            warn!("--save and --show require the 'annotate' feature; no frames will be drawn.");
        }
        #[cfg(not(feature = "visualize"))]
        if args.show {
            warn!("--show requires the 'visualize' feature.");
        }

        #[cfg(feature = "annotate")]
        let annotator = (args.save || args.show).then(|| Annotator::new(config));
        #[cfg(not(feature = "annotate"))]
        let _ = config;

        Self {
            save_dir,
            format: args.format,
            label,
            saver: None,
            #[cfg(feature = "annotate")]
            annotator,
            #[cfg(feature = "visualize")]
            viewer: args.show.then(|| Viewer::new("Squat Form Analysis")),
        }
    }

    /// Annotate, save and display one frame. `Ok(false)` means the preview was closed.
    #[allow(clippy::unnecessary_wraps, clippy::needless_pass_by_ref_mut)]
    fn handle(&mut self, outcome: &FrameOutcome<'_>) -> Result<bool> {
        #[cfg(feature = "annotate")]
        if let Some(annotator) = &self.annotator {
            let annotated = annotator.annotate(outcome);

            if let Some(dir) = &self.save_dir {
                if self.saver.is_none() {
                    let fps = outcome.meta.fps.unwrap_or(DEFAULT_FPS);
                    self.saver = Some(SaveResults::new(dir, self.format, &self.label, fps)?);
                }
                if let Some(saver) = self.saver.as_mut() {
                    saver.save(outcome.meta, &annotated)?;
                }
            }

            #[cfg(feature = "visualize")]
            if let Some(viewer) = self.viewer.as_mut()
                && !viewer.update(&annotated)?
            {
                return Ok(false);
            }
        }
        #[cfg(not(feature = "annotate"))]
        let _ = (outcome, &self.save_dir, self.format, &self.label, DEFAULT_FPS);

        Ok(true)
    }

    fn finish(self, single_image: bool) -> Result<()> {
        #[cfg(feature = "visualize")]
        if single_image && let Some(mut viewer) = self.viewer {
            viewer.hold(IMAGE_HOLD)?;
        }
        #[cfg(not(feature = "visualize"))]
        let _ = single_image;

        if let Some(saver) = self.saver {
            let path = saver.output_path();
            let written = saver.frames_written();
            saver.finish()?;
            success!("Saved {written} annotated frames to {}", path.display());
        }
        Ok(())
    }
}

/// Run the `analyze` command.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the model cannot be loaded,
/// the source cannot be opened, or an output file cannot be written.
pub fn run_analyze(args: &AnalyzeArgs) -> Result<()> {
    let config = analysis_config(args)?;
    let inference = inference_config(args)?;
    let source: Source = args.source.parse()?;
    let single_image = source.is_image();

    #[cfg(not(feature = "video"))]
    if source.is_video() {
        return Err(AnalysisError::FeatureNotEnabled(
            "video sources require the 'video' feature".to_string(),
        ));
    }

    let mut model = PoseModel::load_with_config(&args.model, inference)?;
    let (height, width) = model.input_size();
    verbose!(
        "{} loaded, imgsz=({height}, {width}), {} side, depth threshold {}°",
        model.metadata().model_name(),
        config.side,
        config.depth_angle_threshold
    );
    if let Err(e) = model.warmup() {
        warn!("Warmup failed: {e}");
    }

    let mut outputs = Outputs::new(args, &config, source.label());
    let mut processor = VideoProcessor::new(model, config)?.with_rep_counting(args.count_reps);
    let analysis = processor.process_source(source, |outcome| outputs.handle(outcome))?;
    outputs.finish(single_image)?;

    print_summary(&analysis);

    if let Some(path) = &args.csv {
        write_csv(path, &analysis.frames)?;
        success!("Per-frame metrics written to {path}");
    }
    if let Some(path) = &args.json {
        write_json(path, &analysis)?;
        success!("Analysis written to {path}");
    }
    Ok(())
}

fn print_summary(analysis: &VideoAnalysis) {
    let summary = &analysis.summary;
    section!("Squat analysis: {}", analysis.source);
    info!("Frames analysed: {}", summary.total_frames);
    info!(
        "Frames with knee angle: {} (missing keypoints {}, no person {}, inference errors {})",
        summary.frames_with_angle,
        summary.missing_keypoint_frames,
        summary.no_person_frames,
        summary.inference_error_frames
    );
    match summary.min_knee_angle {
        Some(angle) => info!("Minimum knee angle: {angle:.1}°"),
        None => info!("Minimum knee angle: N/A"),
    }
    info!(
        "Average processing time: {:.1}ms per frame",
        summary.avg_processing_time * 1000.0
    );
    if let Some(reps) = summary.reps {
        info!("Squats counted: {reps}");
    }
    info!("Overall depth: {}", summary.overall_depth);

    if !analysis.has_valid_metrics() {
        warn!("No frame produced a knee angle. Check that hip, knee and ankle are visible.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::{Cli, Commands};
    use clap::Parser;

    fn parse(extra: &[&str]) -> AnalyzeArgs {
        let mut argv = vec!["app", "analyze", "--source", "squat.mp4"];
        argv.extend_from_slice(extra);
        let Commands::Analyze(args) = Cli::parse_from(argv).command;
        args
    }

    #[test]
    fn test_analysis_config_from_args() {
        let config = analysis_config(&parse(&["--conf", "0.5", "--window", "3"])).unwrap();
        assert!((config.confidence_threshold - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.smoothing_window, 3);
    }

    #[test]
    fn test_collapsed_hysteresis_rejected() {
        let args = parse(&["--squat-threshold", "170", "--rise-threshold", "160"]);
        assert!(matches!(
            analysis_config(&args),
            Err(AnalysisError::ConfigError(_))
        ));
    }

    #[test]
    fn test_inference_config_from_args() {
        let config = inference_config(&parse(&["--imgsz", "320", "--device", "cpu"])).unwrap();
        assert_eq!(config.imgsz, Some((320, 320)));
        assert_eq!(config.device, Some(Device::Cpu));

        assert!(inference_config(&parse(&["--device", "tpu"])).is_err());
    }
}
