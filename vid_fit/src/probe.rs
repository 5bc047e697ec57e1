//! Media Inspector port.
//!
//! The planners only ever see a [`MediaProbe`]; where it comes from is behind
//! [`MediaInspector`]. [`FfprobeInspector`] is the production implementation.

use serde::{Deserialize, Serialize};
use shared_utils::{FFprobeResult, FitError, Result};
use std::path::Path;
use tracing::info;

/// Source properties the allocator chain consumes. Built once per job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaProbe {
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub source_audio_channels: u32,
}

impl MediaProbe {
    /// Checks the properties every stage relies on being positive.
    pub fn validate(&self) -> Result<()> {
        if !self.duration_seconds.is_finite() || self.duration_seconds <= 0.0 {
            return Err(FitError::invalid_input(format!(
                "duration must be positive, got {}",
                self.duration_seconds
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(FitError::invalid_input(format!(
                "source dimensions must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if !self.frame_rate.is_finite() || self.frame_rate <= 0.0 {
            return Err(FitError::invalid_input(format!(
                "source frame rate must be positive, got {}",
                self.frame_rate
            )));
        }
        Ok(())
    }
}

impl From<&FFprobeResult> for MediaProbe {
    fn from(probe: &FFprobeResult) -> Self {
        Self {
            duration_seconds: probe.duration,
            width: probe.width,
            height: probe.height,
            frame_rate: probe.frame_rate,
            source_audio_channels: probe.audio_channels,
        }
    }
}

pub trait MediaInspector {
    fn inspect(&self, input: &Path) -> Result<MediaProbe>;
}

/// Reads source properties with `ffprobe`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfprobeInspector;

impl MediaInspector for FfprobeInspector {
    fn inspect(&self, input: &Path) -> Result<MediaProbe> {
        let raw = shared_utils::probe_video(input)?;
        let probe = MediaProbe::from(&raw);
        info!(
            input = %input.display(),
            duration = probe.duration_seconds,
            width = probe.width,
            height = probe.height,
            fps = probe.frame_rate,
            audio_channels = probe.source_audio_channels,
            "Probed source"
        );
        Ok(probe)
    }
}
