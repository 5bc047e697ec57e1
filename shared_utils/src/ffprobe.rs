//! Media inspection through `ffprobe`.
//!
//! The JSON document (`-show_format -show_streams`) is decoded into typed structs; only the
//! first video stream and the first audio stream matter to the planners.

use crate::errors::{FitError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FFprobeResult {
    pub format_name: String,
    pub duration: f64,
    pub size: u64,
    pub video_codec: String,
    pub width: u32,
    pub height: u32,
    /// As reported, e.g. `30000/1001`.
    pub frame_rate_raw: String,
    pub frame_rate: f64,
    pub pix_fmt: String,
    pub audio_codec: Option<String>,
    /// Channels of the first audio stream, 0 without audio.
    pub audio_channels: u32,
}

#[derive(Debug, Deserialize)]
struct ProbeDocument {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: ProbeFormat,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    format_name: Option<String>,
    duration: Option<Numeric>,
    size: Option<Numeric>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    pix_fmt: Option<String>,
    channels: Option<u32>,
    duration: Option<Numeric>,
}

impl ProbeStream {
    fn is(&self, kind: &str) -> bool {
        self.codec_type.as_deref() == Some(kind)
    }
}

/// ffprobe prints most numbers as strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    fn value(&self) -> Option<f64> {
        match self {
            Numeric::Number(n) => Some(*n),
            Numeric::Text(s) => s.trim().parse().ok(),
        }
    }
}

pub fn probe_video(path: &Path) -> Result<FFprobeResult> {
    if !path.is_file() {
        return Err(FitError::ProbeFailed(format!(
            "{} is not a readable file",
            path.display()
        )));
    }
    let ffprobe = crate::tools::find_tool("ffprobe")?;

    let output = Command::new(ffprobe)
        .args(["-v", "error", "-print_format", "json"])
        .args(["-show_format", "-show_streams", "--"])
        .arg(path)
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = stderr.trim();
        return Err(FitError::ProbeFailed(if detail.is_empty() {
            format!("{}: exit code {:?}", path.display(), output.status.code())
        } else {
            format!("{}: {}", path.display(), detail)
        }));
    }

    let result = parse_probe_json(&String::from_utf8_lossy(&output.stdout))?;
    debug!(path = %path.display(), probe = ?result, "ffprobe result");
    Ok(result)
}

/// Decodes ffprobe's JSON output. Usable without the tool installed.
pub fn parse_probe_json(json_str: &str) -> Result<FFprobeResult> {
    let doc: ProbeDocument = serde_json::from_str(json_str)
        .map_err(|e| FitError::ProbeFailed(format!("unreadable ffprobe output: {}", e)))?;

    let video = doc
        .streams
        .iter()
        .find(|s| s.is("video"))
        .ok_or_else(|| FitError::ProbeFailed("no video stream".to_string()))?;
    let audio = doc.streams.iter().find(|s| s.is("audio"));

    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        (w, h) => {
            return Err(FitError::ProbeFailed(format!(
                "video stream has no usable dimensions ({}x{})",
                w.unwrap_or(0),
                h.unwrap_or(0)
            )))
        }
    };

    // some containers only carry a per-stream duration
    let duration = [doc.format.duration.as_ref(), video.duration.as_ref()]
        .into_iter()
        .flatten()
        .find_map(Numeric::value)
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| FitError::ProbeFailed("duration missing".to_string()))?;

    let (frame_rate_raw, frame_rate) = [&video.r_frame_rate, &video.avg_frame_rate]
        .into_iter()
        .flatten()
        .find_map(|raw| parse_frame_rate(raw).map(|rate| (raw.clone(), rate)))
        .ok_or_else(|| {
            FitError::ProbeFailed(format!(
                "frame rate unreadable ({})",
                video.r_frame_rate.as_deref().unwrap_or("absent")
            ))
        })?;

    Ok(FFprobeResult {
        format_name: doc.format.format_name.clone().unwrap_or_else(|| "unknown".into()),
        duration,
        size: doc
            .format
            .size
            .as_ref()
            .and_then(Numeric::value)
            .map_or(0, |s| s as u64),
        video_codec: video.codec_name.clone().unwrap_or_else(|| "unknown".into()),
        width,
        height,
        frame_rate_raw,
        frame_rate,
        pix_fmt: video.pix_fmt.clone().unwrap_or_else(|| "unknown".into()),
        audio_codec: audio.and_then(|s| s.codec_name.clone()),
        audio_channels: audio.and_then(|s| s.channels).unwrap_or(0),
    })
}

/// `num/den` or a plain decimal. `None` for zero, negative or malformed rates.
pub fn parse_frame_rate(s: &str) -> Option<f64> {
    let rate = match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den <= 0.0 {
                return None;
            }
            num / den
        }
        None => s.trim().parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}
