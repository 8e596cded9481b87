//! Media probing via an external `ffprobe` subprocess, per spec.md
//! §4.6 step 2. The probe tool itself is an external collaborator
//! (spec.md §1); this module only shapes the subprocess call and
//! parses its JSON output.

use std::path::Path;

use serde::Deserialize;
use tokio::process::Command;

use super::error::UploadError;

#[derive(Debug, Clone, Copy)]
pub struct ProbeResult {
    pub width: u32,
    pub height: u32,
    pub duration_seconds: u32,
    pub size_bytes: u64,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    streams: Vec<FfprobeStream>,
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
}

pub async fn probe(path: &Path) -> Result<ProbeResult, UploadError> {
    let path_str = path.display().to_string();
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_entries",
            "stream=width,height:format=duration,size",
        ])
        .arg(path)
        .output()
        .await
        .map_err(|e| UploadError::probe_failed(&path_str, e.to_string()))?;

    if !output.status.success() {
        return Err(UploadError::probe_failed(&path_str, format!("ffprobe exited with {}", output.status)));
    }

    let parsed: FfprobeOutput = serde_json::from_slice(&output.stdout)
        .map_err(|e| UploadError::probe_failed(&path_str, format!("unparseable ffprobe output: {e}")))?;

    let video_stream = parsed
        .streams
        .iter()
        .find(|s| s.width.is_some() && s.height.is_some())
        .ok_or_else(|| UploadError::probe_failed(&path_str, "no video stream with dimensions"))?;

    let width = video_stream.width.ok_or_else(|| UploadError::probe_failed(&path_str, "missing width"))?;
    let height = video_stream.height.ok_or_else(|| UploadError::probe_failed(&path_str, "missing height"))?;

    let duration_seconds: u32 = parsed
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .map(|d| d.round() as u32)
        .ok_or_else(|| UploadError::probe_failed(&path_str, "missing or unparseable duration"))?;

    let size_bytes: u64 = parsed
        .format
        .size
        .as_deref()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| UploadError::probe_failed(&path_str, "missing or unparseable size"))?;

    Ok(ProbeResult { width, height, duration_seconds, size_bytes })
}
