// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! CSV and JSON export of analysis results.
//!
//! The CSV holds one row per frame with the columns `frame_index`, `knee_angle`,
//! `squat_depth_feedback`, `knee_valgus_feedback`, `feedback`, `processing_time`.
//! Values a frame did not produce are written as `N/A`.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{AnalysisError, Result};
use crate::metrics::{FrameMetrics, VideoAnalysis};

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            AnalysisError::ExportError(format!(
                "Failed to create directory {}: {e}",
                parent.display()
            ))
        })?;
    }
    Ok(())
}

/// Write per-frame metrics as CSV to any writer.
///
/// # Errors
///
/// Returns an error if a record cannot be serialized or written.
pub fn write_csv_to<W: Write>(writer: W, frames: &[FrameMetrics]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for frame in frames {
        csv.serialize(frame)?;
    }
    csv.flush()?;
    Ok(())
}

/// Write per-frame metrics to a CSV file, creating parent directories.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_csv<P: AsRef<Path>>(path: P, frames: &[FrameMetrics]) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    write_csv_to(File::create(path)?, frames)
}

/// Write the summary and per-frame metrics as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_json<P: AsRef<Path>>(path: P, analysis: &VideoAnalysis) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, analysis)?;
    writer.flush()?;
    Ok(())
}
