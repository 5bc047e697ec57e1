//! Audio Policy: output channel count and its Opus bitrate.

use crate::config::{AudioMode, PlanPolicy};
use crate::decision::DecisionProvider;
use serde::{Deserialize, Serialize};
use shared_utils::{FitError, Result};
use tracing::{info, warn};

pub const MAX_OUTPUT_CHANNELS: u8 = 2;

/// `channels == 0` means no audio stream at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioPlan {
    pub channels: u8,
    pub bitrate: u64,
}

impl AudioPlan {
    pub fn none() -> Self {
        Self {
            channels: 0,
            bitrate: 0,
        }
    }

    pub fn with_channels(channels: u8, per_channel_bps: u64) -> Result<Self> {
        let channels = validate_channel_count(u32::from(channels))?;
        Ok(Self {
            channels,
            bitrate: u64::from(channels) * per_channel_bps,
        })
    }

    pub fn is_disabled(&self) -> bool {
        self.channels == 0
    }
}

/// Accepts 0, 1 or 2.
pub fn validate_channel_count(channels: u32) -> Result<u8> {
    if channels > u32::from(MAX_OUTPUT_CHANNELS) {
        return Err(FitError::invalid_input(format!(
            "audio channels must be 0, 1 or 2, got {}",
            channels
        )));
    }
    Ok(channels as u8)
}

/// Picks the output audio layout for a job.
///
/// Automatic mode may stop to ask whether to drop audio when the envelope is under the
/// low-bandwidth threshold. Manual mode takes the caller's count as given after range checks.
pub fn decide_audio(
    envelope: u64,
    source_channels: u32,
    policy: &PlanPolicy,
    decisions: &mut dyn DecisionProvider,
) -> Result<AudioPlan> {
    let channels = match policy.audio_mode {
        AudioMode::Automatic => automatic_channels(envelope, source_channels, policy, decisions)?,
        AudioMode::Manual => {
            let chosen = decisions.choose_audio_channels(source_channels)?;
            let chosen = validate_channel_count(u32::from(chosen))?;
            if u32::from(chosen) > source_channels {
                warn!(
                    requested = chosen,
                    source_channels,
                    "Requested more audio channels than the source carries"
                );
            }
            chosen
        }
    };

    let plan = AudioPlan::with_channels(channels, policy.audio_bitrate_per_channel)?;
    info!(
        mode = ?policy.audio_mode,
        channels = plan.channels,
        bitrate = plan.bitrate,
        "Audio plan"
    );
    Ok(plan)
}

fn automatic_channels(
    envelope: u64,
    source_channels: u32,
    policy: &PlanPolicy,
    decisions: &mut dyn DecisionProvider,
) -> Result<u8> {
    if source_channels == 0 {
        return Ok(0);
    }
    if envelope >= policy.stereo_threshold && source_channels >= 2 {
        return Ok(2);
    }
    if envelope < policy.low_bandwidth_threshold {
        warn!(
            envelope,
            threshold = policy.low_bandwidth_threshold,
            "Low bandwidth, audio will take a large share of the budget"
        );
        let drop = decisions.confirm_drop_audio(envelope)?;
        return Ok(if drop { 0 } else { 1 });
    }
    Ok(1)
}
