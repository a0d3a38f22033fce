// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Execution device selection.
use std::fmt;
use std::str::FromStr;

/// Hardware device for pose inference.
///
/// Accelerated devices only take effect when the matching cargo feature
/// (`cuda`, `tensorrt`, `coreml`) is enabled; otherwise the model falls back to CPU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Device {
    Cpu,
    /// NVIDIA GPU by index.
    Cuda(usize),
    /// Apple Silicon. Served by `CoreML`.
    Mps,
    CoreMl,
    /// NVIDIA `TensorRT` by device index.
    TensorRt(usize),
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda(i) => write!(f, "cuda:{i}"),
            Self::Mps => write!(f, "mps"),
            Self::CoreMl => write!(f, "coreml"),
            Self::TensorRt(i) => write!(f, "tensorrt:{i}"),
        }
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "cpu" => Ok(Self::Cpu),
            "mps" => Ok(Self::Mps),
            "coreml" => Ok(Self::CoreMl),
            _ => {
                if let Some(rest) = s.strip_prefix("cuda") {
                    Ok(Self::Cuda(parse_device_index(rest)?))
                } else if let Some(rest) = s.strip_prefix("tensorrt") {
                    Ok(Self::TensorRt(parse_device_index(rest)?))
                } else if let Ok(index) = s.parse::<usize>() {
                    // Bare index, as in `--device 0`.
                    Ok(Self::Cuda(index))
                } else {
                    Err(format!(
                        "Unknown device: {s} (expected cpu, cuda[:N], tensorrt[:N], mps or coreml)"
                    ))
                }
            }
        }
    }
}

/// Parse a device index suffix such as ":1". Empty means device 0.
fn parse_device_index(s: &str) -> Result<usize, String> {
    if s.is_empty() {
        return Ok(0);
    }
    s.strip_prefix(':')
        .and_then(|index| index.parse::<usize>().ok())
        .ok_or_else(|| format!("Invalid device index: {s}"))
}
