// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! End-to-end tests through the public API with a scripted pose estimator.

use image::{DynamicImage, RgbImage};
use squat_form::cli::logging::set_verbose;
use squat_form::report::{write_csv, write_json};
use squat_form::{
    AnalysisConfig, AnalysisError, BodySide, FrameStatus, Keypoint, KeypointIndex, KeypointSet,
    OverallDepth, PoseEstimate, PoseEstimator, Result, ScoreSet, Source, VideoProcessor,
};

/// Replays a fixed list of knee angles; `None` entries simulate a frame with nobody in it.
struct AngleScript {
    angles: std::vec::IntoIter<Option<f64>>,
    side: BodySide,
}

impl AngleScript {
    fn new(angles: Vec<Option<f64>>) -> Self {
        Self {
            angles: angles.into_iter(),
            side: BodySide::Right,
        }
    }
}

/// A leg with its knee bent to `degrees`, thigh pointing straight up from the knee.
fn leg(side: BodySide, degrees: f64) -> KeypointSet {
    let [hip, knee, ankle] = side.leg();
    let radians = degrees.to_radians();
    let mut kps = KeypointSet::undetected();
    kps.set(hip, Keypoint::new(100.0, 0.0));
    kps.set(knee, Keypoint::new(100.0, 100.0));
    #[allow(clippy::cast_possible_truncation)]
    kps.set(
        ankle,
        Keypoint::new(
            (100.0 + 100.0 * radians.sin()) as f32,
            (100.0 - 100.0 * radians.cos()) as f32,
        ),
    );
    kps
}

impl PoseEstimator for AngleScript {
    fn estimate(&mut self, _image: &DynamicImage) -> Result<PoseEstimate> {
        let Some(next) = self.angles.next() else {
            return Err(AnalysisError::InferenceError("script exhausted".to_string()));
        };
        let mut estimate = PoseEstimate::empty();
        if let Some(degrees) = next {
            estimate.push(leg(self.side, degrees), ScoreSet::uniform(0.9), None);
        }
        Ok(estimate)
    }
}

fn frames(n: usize) -> Source {
    Source::frames(vec![DynamicImage::ImageRgb8(RgbImage::new(16, 16)); n], Some(30.0))
}

/// Two full squats: stand, descend, hold, rise, twice.
fn two_squats() -> Vec<Option<f64>> {
    let mut angles = Vec::new();
    for _ in 0..2 {
        angles.extend(std::iter::repeat_n(Some(170.0), 6));
        angles.extend(std::iter::repeat_n(Some(80.0), 8));
    }
    angles.extend(std::iter::repeat_n(Some(170.0), 8));
    angles
}

#[test]
fn test_reps_counted_over_squat_sequence() {
    set_verbose(false);
    let angles = two_squats();
    let n = angles.len();
    let mut processor = VideoProcessor::new(AngleScript::new(angles), AnalysisConfig::default())
        .unwrap()
        .with_rep_counting(true);

    let analysis = processor.analyze(frames(n)).unwrap();
    assert_eq!(analysis.frames.len(), n);
    assert_eq!(analysis.summary.reps, Some(2));
    assert!((analysis.fps - 30.0).abs() < f32::EPSILON);
    assert_eq!(analysis.summary.overall_depth, OverallDepth::Achieved);

    let min = analysis.summary.min_knee_angle.unwrap();
    assert!((min - 80.0).abs() < 1e-3);
}

#[test]
fn test_shallow_squats_need_more_depth() {
    set_verbose(false);
    let angles = vec![Some(170.0), Some(120.0), Some(100.0), Some(120.0), Some(170.0)];
    let mut processor =
        VideoProcessor::new(AngleScript::new(angles), AnalysisConfig::default()).unwrap();

    let analysis = processor.analyze(frames(5)).unwrap();
    assert_eq!(analysis.summary.overall_depth, OverallDepth::NeedsDeeper);
    assert!(analysis.summary.reps.is_none());
    assert!(analysis.has_valid_metrics());
    assert!(
        analysis
            .frames
            .iter()
            .all(|f| f.depth_text() == "Needs Improvement (Above Parallel)")
    );
}

#[test]
fn test_missing_people_and_failures_are_recorded() {
    set_verbose(false);
    // Three scripted frames, then the script runs dry and inference fails.
    let angles = vec![None, Some(90.0), None];
    let mut processor =
        VideoProcessor::new(AngleScript::new(angles), AnalysisConfig::default()).unwrap();

    let analysis = processor.analyze(frames(4)).unwrap();
    let statuses: Vec<FrameStatus> = analysis.frames.iter().map(|f| f.status).collect();
    assert_eq!(
        statuses,
        vec![
            FrameStatus::NoPersonDetected,
            FrameStatus::Complete,
            FrameStatus::NoPersonDetected,
            FrameStatus::InferenceError,
        ]
    );
    assert_eq!(analysis.summary.no_person_frames, 2);
    assert_eq!(analysis.summary.inference_error_frames, 1);
    assert_eq!(analysis.summary.frames_with_angle, 1);
    assert_eq!(analysis.frames[3].feedback(), "Inference Error");
    assert_eq!(analysis.frames[3].angle_text(), "N/A");
}

#[test]
fn test_wrong_side_reports_missing_keypoints() {
    set_verbose(false);
    let config = AnalysisConfig::new().with_side(BodySide::Left);
    let mut processor = VideoProcessor::new(AngleScript::new(vec![Some(90.0)]), config).unwrap();

    let analysis = processor.analyze(frames(1)).unwrap();
    assert_eq!(analysis.frames[0].status, FrameStatus::MissingKeypoints);
    assert!(!analysis.has_valid_metrics());
    assert_eq!(analysis.summary.overall_depth, OverallDepth::Undetermined);
}

#[test]
fn test_export_csv_and_json() {
    set_verbose(false);
    let angles = vec![Some(150.0), None, Some(85.0)];
    let mut processor =
        VideoProcessor::new(AngleScript::new(angles), AnalysisConfig::default()).unwrap();
    let analysis = processor.analyze(frames(3)).unwrap();

    let tmp = tempfile::tempdir().unwrap();
    let csv_path = tmp.path().join("metrics.csv");
    let json_path = tmp.path().join("analysis.json");
    write_csv(&csv_path, &analysis.frames).unwrap();
    write_json(&json_path, &analysis).unwrap();

    let csv_text = std::fs::read_to_string(&csv_path).unwrap();
    let lines: Vec<&str> = csv_text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("frame_index,knee_angle,"));
    assert!(lines[2].starts_with("1,N/A,N/A,N/A,No person detected,"));
    assert!(lines[3].contains("Good Depth (Below Parallel)"));

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(json["summary"]["total_frames"], 3);
    assert_eq!(json["summary"]["overall_depth"], "Achieved good depth.");
    assert_eq!(json["frames"][1]["feedback"], "No person detected");
}

#[test]
fn test_source_parsing_rejects_streams() {
    assert!("rtsp://camera/stream".parse::<Source>().is_err());
    assert!("0".parse::<Source>().is_err());
    assert!("squat.mp4".parse::<Source>().unwrap().is_video());
}
