//! Plan policy: every tunable constant of the allocator chain in one immutable value.
//!
//! A job builds one [`PlanPolicy`] up front and threads it through each stage, so two jobs with
//! different budgets never share state.

use serde::{Deserialize, Serialize};
use shared_utils::{FileSize, FitError, Result};

pub const DEFAULT_SIZE_LIMIT_MIB: u64 = 10;
/// Fixed Opus allowance per output channel (bps).
pub const AUDIO_BITRATE_PER_CHANNEL: u64 = 32_000;
/// Deducted from the envelope for container overhead and rate-control overshoot (bps).
pub const SAFETY_MARGIN_BPS: u64 = 13_000;
pub const STEREO_THRESHOLD_BPS: u64 = 386_000;
pub const LOW_BANDWIDTH_THRESHOLD_BPS: u64 = 192_000;
pub const BITS_PER_PIXEL: f64 = 2.0;
pub const MAX_FRAME_RATE: f64 = 60.0;
/// One keyframe every this many seconds of output.
pub const GOP_SECONDS: u32 = 10;
pub const DEFAULT_OUTPUT_FILE: &str = "compressed.mp4";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioMode {
    /// Channel count derived from the envelope and the source layout.
    #[default]
    Automatic,
    /// Channel count supplied by the caller, taken as given.
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMode {
    #[default]
    BitrateDensity,
    UserHeight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameRateMode {
    /// Source rate, capped.
    #[default]
    Source,
    UserChosen,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanPolicy {
    pub size_limit: FileSize,
    pub audio_bitrate_per_channel: u64,
    pub safety_margin: u64,
    pub stereo_threshold: u64,
    pub low_bandwidth_threshold: u64,
    pub bits_per_pixel: f64,
    pub max_frame_rate: f64,
    pub gop_seconds: u32,
    pub audio_mode: AudioMode,
    pub resolution_mode: ResolutionMode,
    pub frame_rate_mode: FrameRateMode,
}

impl Default for PlanPolicy {
    fn default() -> Self {
        Self {
            size_limit: FileSize::from_mib(DEFAULT_SIZE_LIMIT_MIB),
            audio_bitrate_per_channel: AUDIO_BITRATE_PER_CHANNEL,
            safety_margin: SAFETY_MARGIN_BPS,
            stereo_threshold: STEREO_THRESHOLD_BPS,
            low_bandwidth_threshold: LOW_BANDWIDTH_THRESHOLD_BPS,
            bits_per_pixel: BITS_PER_PIXEL,
            max_frame_rate: MAX_FRAME_RATE,
            gop_seconds: GOP_SECONDS,
            audio_mode: AudioMode::default(),
            resolution_mode: ResolutionMode::default(),
            frame_rate_mode: FrameRateMode::default(),
        }
    }
}

impl PlanPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size_limit(mut self, size_limit: FileSize) -> Self {
        self.size_limit = size_limit;
        self
    }

    pub fn with_audio_mode(mut self, mode: AudioMode) -> Self {
        self.audio_mode = mode;
        self
    }

    pub fn with_resolution_mode(mut self, mode: ResolutionMode) -> Self {
        self.resolution_mode = mode;
        self
    }

    pub fn with_frame_rate_mode(mut self, mode: FrameRateMode) -> Self {
        self.frame_rate_mode = mode;
        self
    }

    pub fn with_safety_margin(mut self, bps: u64) -> Self {
        self.safety_margin = bps;
        self
    }

    pub fn with_bits_per_pixel(mut self, density: f64) -> Self {
        self.bits_per_pixel = density;
        self
    }

    /// Rejects policies no stage could work with.
    pub fn validate(&self) -> Result<()> {
        if self.size_limit.is_zero() {
            return Err(FitError::invalid_input("size limit must be greater than zero"));
        }
        if !self.bits_per_pixel.is_finite() || self.bits_per_pixel <= 0.0 {
            return Err(FitError::invalid_input(format!(
                "bits-per-pixel density must be positive, got {}",
                self.bits_per_pixel
            )));
        }
        if !self.max_frame_rate.is_finite() || self.max_frame_rate < 1.0 {
            return Err(FitError::invalid_input(format!(
                "frame-rate cap must be at least 1, got {}",
                self.max_frame_rate
            )));
        }
        if self.gop_seconds == 0 {
            return Err(FitError::invalid_input("GOP length must be at least one second"));
        }
        Ok(())
    }
}
