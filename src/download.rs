// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Asset downloading.
//!
//! Fetches the default pose model from Ultralytics GitHub releases when it is not
//! found locally, and the overlay font into the user config directory.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::{AnalysisError, Result};

/// Default YOLO pose model name.
pub const DEFAULT_POSE_MODEL: &str = "yolo11n-pose.onnx";

/// URL for downloading the default pose model.
const DEFAULT_POSE_MODEL_URL: &str =
    "https://github.com/ultralytics/assets/releases/download/v8.3.0/yolo11n-pose.onnx";

/// Assets URL for downloading fonts.
const ASSETS_URL: &str = "https://github.com/ultralytics/assets/releases/download/v0.0.0";

/// Connection timeout in seconds.
const CONNECT_TIMEOUT: u64 = 30;

/// Read timeout in seconds.
const READ_TIMEOUT: u64 = 300;

const BAR_WIDTH: usize = 12;

/// Minimum seconds between progress redraws.
const MIN_UPDATE_INTERVAL: f64 = 0.1;

/// Format bytes as human-readable string (e.g., "10.4MB").
#[allow(clippy::cast_precision_loss)]
fn format_bytes(bytes: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    if bytes >= GB {
        format!("{:.1}GB", bytes / GB)
    } else if bytes >= MB {
        format!("{:.1}MB", bytes / MB)
    } else if bytes >= KB {
        format!("{:.1}KB", bytes / KB)
    } else {
        format!("{bytes:.0}B")
    }
}

/// Format time duration.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn format_time(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{seconds:.1}s")
    } else if seconds < 3600.0 {
        let mins = (seconds / 60.0) as u32;
        let secs = seconds % 60.0;
        format!("{mins}:{secs:04.1}")
    } else {
        let hours = (seconds / 3600.0) as u32;
        let mins = ((seconds % 3600.0) / 60.0) as u32;
        let secs = seconds % 60.0;
        format!("{hours}:{mins:02}:{secs:04.1}")
    }
}

/// Generate progress bar string.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn generate_bar(progress: f64, width: usize) -> String {
    let filled = (progress * width as f64) as usize;
    let partial = progress * width as f64 - filled as f64;

    let mut bar = "━".repeat(filled);
    if filled < width {
        if partial > 0.5 {
            bar.push('╸');
            bar.push_str(&"─".repeat(width - filled - 1));
        } else {
            bar.push_str(&"─".repeat(width - filled));
        }
    }
    bar
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn print_progress(desc: &str, downloaded: u64, total_size: u64, elapsed: f64, done: bool) {
    let rate = if elapsed > 0.0 {
        downloaded as f64 / elapsed
    } else {
        0.0
    };
    let line = if total_size > 0 {
        let progress = if done {
            1.0
        } else {
            (downloaded as f64 / total_size as f64).min(1.0)
        };
        format!(
            "{desc}: {}% {} {}/{} {}/s {}",
            (progress * 100.0) as u8,
            generate_bar(progress, BAR_WIDTH),
            format_bytes(downloaded as f64),
            format_bytes(total_size as f64),
            format_bytes(rate),
            format_time(elapsed)
        )
    } else {
        format!(
            "{desc}: {} {}/s {}",
            format_bytes(downloaded as f64),
            format_bytes(rate),
            format_time(elapsed)
        )
    };

    if done {
        eprintln!("\r\x1b[K{line}");
    } else {
        eprint!("\r\x1b[K{line}");
        std::io::stderr().flush().ok();
    }
}

/// Download a file from URL to the specified path with progress bar.
///
/// Streams to a `.part` file next to `dest`, then renames it into place so an
/// interrupted download never leaves a truncated file behind.
fn download_file(url: &str, dest: &Path) -> Result<()> {
    let config = ureq::Agent::config_builder()
        .timeout_connect(Some(Duration::from_secs(CONNECT_TIMEOUT)))
        .timeout_recv_body(Some(Duration::from_secs(READ_TIMEOUT)))
        .build();
    let agent = ureq::Agent::new_with_config(config);

    let response = agent.get(url).call().map_err(|e| {
        let msg = match &e {
            ureq::Error::Timeout(_) => format!("Connection timed out while downloading {url}"),
            ureq::Error::Io(io_err) => format!("Network error downloading {url}: {io_err}"),
            _ => format!("Failed to download {url}: {e}"),
        };
        AnalysisError::ModelLoadError(msg)
    })?;

    let total_size: u64 = response
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    let temp_path = dest.with_extension("part");
    let _ = fs::remove_file(&temp_path);

    let temp_file = File::create(&temp_path).map_err(|e| {
        AnalysisError::ModelLoadError(format!(
            "Failed to create temp file {}: {e}",
            temp_path.display()
        ))
    })?;
    let mut writer = BufWriter::new(temp_file);
    let mut reader = response.into_body().into_reader();

    let desc = format!("Downloading {url} to '{}'", dest.display());
    let start_time = Instant::now();
    let mut downloaded: u64 = 0;

    let download_result: Result<()> = (|| {
        let mut buffer = [0u8; 65536];
        let mut last_update = Instant::now();
        loop {
            let bytes_read = reader.read(&mut buffer).map_err(|e| {
                AnalysisError::ModelLoadError(format!("Failed to read from network: {e}"))
            })?;
            if bytes_read == 0 {
                break;
            }
            writer.write_all(&buffer[..bytes_read]).map_err(|e| {
                AnalysisError::ModelLoadError(format!("Failed to write to temp file: {e}"))
            })?;
            downloaded += bytes_read as u64;

            if last_update.elapsed().as_secs_f64() >= MIN_UPDATE_INTERVAL {
                last_update = Instant::now();
                print_progress(
                    &desc,
                    downloaded,
                    total_size,
                    start_time.elapsed().as_secs_f64(),
                    false,
                );
            }
        }
        writer
            .flush()
            .map_err(|e| AnalysisError::ModelLoadError(format!("Failed to flush temp file: {e}")))
    })();

    if let Err(e) = download_result {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    print_progress(
        &desc,
        downloaded,
        total_size,
        start_time.elapsed().as_secs_f64(),
        true,
    );

    fs::rename(&temp_path, dest).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        AnalysisError::ModelLoadError(format!(
            "Failed to move downloaded file to {}: {e}",
            dest.display()
        ))
    })
}

/// Download the model at `model_path` if it is a known pose model.
///
/// Only [`DEFAULT_POSE_MODEL`] is downloadable. The file lands at the path as
/// given (the current directory for a bare filename).
///
/// # Errors
///
/// Returns [`AnalysisError::ModelLoadError`] for unknown models or failed downloads.
pub fn try_download_model<P: AsRef<Path>>(model_path: P) -> Result<PathBuf> {
    let path = model_path.as_ref();
    let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");

    if filename != DEFAULT_POSE_MODEL {
        return Err(AnalysisError::ModelLoadError(format!(
            "Model file not found: {}. Auto-download is only supported for {DEFAULT_POSE_MODEL}",
            path.display(),
        )));
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    download_file(DEFAULT_POSE_MODEL_URL, path)?;
    Ok(path.to_path_buf())
}

/// Return the local path of `font`, downloading it on first use.
///
/// Fonts are cached in `<config dir>/Ultralytics`. Returns `None` when the font is
/// unavailable; callers draw without text in that case.
#[must_use]
pub fn check_font(font: &str) -> Option<PathBuf> {
    let font_name = Path::new(font).file_name()?.to_string_lossy().into_owned();
    let config_dir = dirs::config_dir()?.join("Ultralytics");
    let font_path = config_dir.join(&font_name);

    if font_path.exists() {
        return Some(font_path);
    }

    if let Err(e) = fs::create_dir_all(&config_dir) {
        crate::warn!("Failed to create config directory: {e}");
        return None;
    }

    let url = format!("{ASSETS_URL}/{font_name}");
    match download_file(&url, &font_path) {
        Ok(()) => Some(font_path),
        Err(e) => {
            crate::warn!("Font unavailable, overlay text disabled: {e}");
            None
        }
    }
}
