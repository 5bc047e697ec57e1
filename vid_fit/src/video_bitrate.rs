//! Video Bitrate Allocator.

use crate::audio_policy::AudioPlan;
use crate::config::PlanPolicy;
use tracing::warn;

/// `max(0, envelope − audio − margin)`.
///
/// Zero is a legal result: the budget cannot hold this duration. It is logged, not raised.
pub fn allocate_video_bitrate(envelope: u64, audio: &AudioPlan, policy: &PlanPolicy) -> u64 {
    let bitrate = envelope
        .saturating_sub(audio.bitrate)
        .saturating_sub(policy.safety_margin);

    if bitrate == 0 {
        warn!(
            envelope,
            audio_bitrate = audio.bitrate,
            margin = policy.safety_margin,
            "Size budget is infeasible for this duration, video bitrate is zero"
        );
    }
    bitrate
}
