// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use clap::{Args, Parser, Subcommand};

use crate::config::BodySide;
use crate::download::DEFAULT_POSE_MODEL;
use crate::io::OutputFormat;

/// CLI arguments parser.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = r#"Examples:
    squat-form analyze --source squat.mp4
    squat-form analyze -s squat.mp4 --count-reps --show
    squat-form analyze -s frames/ --side left --depth-threshold 90 --csv metrics.csv
    squat-form analyze -s squat.mp4 --save --format gif --json analysis.json
    squat-form analyze -s squat.mp4 --model yolo11s-pose.onnx --device cuda:0"#)]
pub struct Cli {
    #[command(subcommand)]
    /// Subcommand to execute.
    pub command: Commands,
}

/// Commands for the CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze squat form in a video, image or image folder
    Analyze(AnalyzeArgs),
}

/// Arguments for the analyze command.
#[derive(Args, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct AnalyzeArgs {
    /// Input source (image, directory, glob or video file)
    #[arg(short, long)]
    pub source: String,

    /// Path to the YOLO pose ONNX model
    #[arg(short, long, default_value = DEFAULT_POSE_MODEL)]
    pub model: String,

    /// Minimum keypoint confidence for hip, knee and ankle
    #[arg(long, default_value_t = 0.3)]
    pub conf: f32,

    /// Knee angle (degrees) below which depth counts as below parallel
    #[arg(long, default_value_t = 95.0)]
    pub depth_threshold: f64,

    /// Leg used for the knee angle
    #[arg(long, default_value_t = BodySide::Right)]
    pub side: BodySide,

    /// Count repetitions with the smoothed-angle state machine
    #[arg(long, default_value_t = false)]
    pub count_reps: bool,

    /// Smoothed knee angle (degrees) below which a squat starts
    #[arg(long, default_value_t = 110.0)]
    pub squat_threshold: f64,

    /// Smoothed knee angle (degrees) above which a squat completes
    #[arg(long, default_value_t = 160.0)]
    pub rise_threshold: f64,

    /// Number of recent angles averaged by the smoother
    #[arg(long, default_value_t = 5)]
    pub window: usize,

    /// Person detection confidence threshold
    #[arg(long, default_value_t = 0.25)]
    pub det_conf: f32,

    /// `IoU` threshold for NMS
    #[arg(long, default_value_t = 0.45)]
    pub iou: f32,

    /// Inference image size
    #[arg(long)]
    pub imgsz: Option<usize>,

    /// Device to use (cpu, cuda:0, mps, coreml, tensorrt:0)
    #[arg(long)]
    pub device: Option<String>,

    /// Save annotated output to runs/squat/analyze
    #[arg(long, default_value_t = false)]
    pub save: bool,

    /// Output format for --save
    #[arg(long, value_enum, default_value_t = OutputFormat::Gif)]
    pub format: OutputFormat,

    /// Write per-frame metrics to this CSV file
    #[arg(long)]
    pub csv: Option<String>,

    /// Write the summary and per-frame metrics to this JSON file
    #[arg(long)]
    pub json: Option<String>,

    /// Display annotated frames in a window
    #[arg(long, default_value_t = false)]
    pub show: bool,

    /// Show verbose output
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub verbose: bool,
}
