//! Frame Rate Planner.

use crate::config::{FrameRateMode, PlanPolicy};
use crate::decision::DecisionProvider;
use shared_utils::{FitError, Result};
use tracing::info;

fn check_source_rate(source_fps: f64) -> Result<()> {
    if !source_fps.is_finite() || source_fps <= 0.0 {
        return Err(FitError::invalid_input(format!(
            "source frame rate must be positive, got {}",
            source_fps
        )));
    }
    Ok(())
}

/// Highest rate the output may use: the source rate or the cap, whichever is lower.
pub fn frame_rate_limit(source_fps: f64, cap: f64) -> f64 {
    source_fps.min(cap)
}

/// A caller-chosen rate must be a whole number in `1..=limit`.
pub fn validate_requested_frame_rate(requested: u32, limit: f64) -> Result<u32> {
    if requested == 0 || f64::from(requested) > limit {
        return Err(FitError::invalid_input(format!(
            "frame rate must be between 1 and {}, got {}",
            limit.floor(),
            requested
        )));
    }
    Ok(requested)
}

pub fn plan_frame_rate(
    source_fps: f64,
    policy: &PlanPolicy,
    decisions: &mut dyn DecisionProvider,
) -> Result<f64> {
    check_source_rate(source_fps)?;
    let limit = frame_rate_limit(source_fps, policy.max_frame_rate);

    let fps = match policy.frame_rate_mode {
        FrameRateMode::Source => limit,
        FrameRateMode::UserChosen => {
            if limit < 1.0 {
                return Err(FitError::invalid_input(format!(
                    "source runs at {:.3} fps, no whole frame rate of at least 1 fits under it",
                    source_fps
                )));
            }
            let requested = decisions.choose_frame_rate(limit)?;
            f64::from(validate_requested_frame_rate(requested, limit)?)
        }
    };

    info!(mode = ?policy.frame_rate_mode, source_fps, fps, "Frame rate plan");
    Ok(fps)
}

/// Keyframe interval in frames: one keyframe every `gop_seconds` of output.
pub fn gop_length(fps: f64, gop_seconds: u32) -> u32 {
    let frames = (fps * f64::from(gop_seconds)).round();
    if frames.is_finite() && frames >= 1.0 {
        frames.min(u32::MAX as f64) as u32
    } else {
        1
    }
}
