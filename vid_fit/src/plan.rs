//! Plan builder: runs the allocator chain once and freezes the result.
//!
//! Probe → envelope → audio → video bitrate → resolution → preset → frame rate.

use crate::audio_policy::{decide_audio, AudioPlan};
use crate::bandwidth::total_envelope;
use crate::config::PlanPolicy;
use crate::decision::DecisionProvider;
use crate::frame_rate::{gop_length, plan_frame_rate};
use crate::preset::Preset;
use crate::probe::MediaProbe;
use crate::resolution::{plan_resolution, Resolution, MIN_DIMENSION};
use crate::video_bitrate::allocate_video_bitrate;
use serde::{Deserialize, Serialize};
use shared_utils::{ensure_even_dimensions, FileSize, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoPlan {
    pub bitrate: u64,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    /// Keyframe interval in frames.
    pub gop: u32,
    pub preset: Preset,
}

impl VideoPlan {
    /// The budget leaves nothing for video; the encode will run but look terrible.
    pub fn is_degenerate(&self) -> bool {
        self.bitrate == 0
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

/// Everything both encoder passes need. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodePlan {
    pub input: PathBuf,
    pub output: PathBuf,
    pub probe: MediaProbe,
    pub size_limit: FileSize,
    pub envelope: u64,
    pub audio: AudioPlan,
    pub video: VideoPlan,
}

pub fn build_plan(
    input: &Path,
    output: &Path,
    probe: &MediaProbe,
    policy: &PlanPolicy,
    decisions: &mut dyn DecisionProvider,
) -> Result<EncodePlan> {
    policy.validate()?;
    probe.validate()?;

    let envelope = total_envelope(probe.duration_seconds, policy.size_limit)?;
    info!(
        budget = %policy.size_limit,
        duration = probe.duration_seconds,
        envelope,
        "Bandwidth envelope"
    );

    let audio = decide_audio(envelope, probe.source_audio_channels, policy, decisions)?;
    let bitrate = allocate_video_bitrate(envelope, &audio, policy);

    let planned = plan_resolution(probe.width, probe.height, bitrate, policy, decisions)?;
    let (width, height, corrected) = ensure_even_dimensions(planned.width, planned.height);
    let (width, height) = (width.max(MIN_DIMENSION), height.max(MIN_DIMENSION));
    if corrected {
        warn!(
            planned = %planned,
            corrected = %Resolution::new(width, height),
            "Odd output dimensions adjusted for 4:2:0"
        );
    }

    let preset = decisions.choose_preset()?;
    let frame_rate = plan_frame_rate(probe.frame_rate, policy, decisions)?;
    let gop = gop_length(frame_rate, policy.gop_seconds);

    let video = VideoPlan {
        bitrate,
        width,
        height,
        frame_rate,
        gop,
        preset,
    };
    info!(
        bitrate = video.bitrate,
        resolution = %video.resolution(),
        fps = video.frame_rate,
        gop = video.gop,
        preset = %video.preset,
        "Video plan"
    );

    Ok(EncodePlan {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        probe: probe.clone(),
        size_limit: policy.size_limit,
        envelope,
        audio,
        video,
    })
}

impl fmt::Display for EncodePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Input:      {}", self.input.display())?;
        writeln!(
            f,
            "Source:     {}x{} @ {:.3} fps, {:.2} s, {} audio channel(s)",
            self.probe.width,
            self.probe.height,
            self.probe.frame_rate,
            self.probe.duration_seconds,
            self.probe.source_audio_channels
        )?;
        writeln!(f, "Budget:     {} ({} bps)", self.size_limit, self.envelope)?;
        if self.audio.is_disabled() {
            writeln!(f, "Audio:      none")?;
        } else {
            writeln!(
                f,
                "Audio:      opus, {} channel(s), {} bps",
                self.audio.channels, self.audio.bitrate
            )?;
        }
        writeln!(
            f,
            "Video:      hevc, {} bps, {} @ {} fps, gop {}, preset {}",
            self.video.bitrate,
            self.video.resolution(),
            self.video.frame_rate,
            self.video.gop,
            self.video.preset
        )?;
        write!(f, "Output:     {}", self.output.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AudioMode, FrameRateMode, ResolutionMode};
    use crate::decision::ScriptedDecisions;
    use shared_utils::FitError;

    fn probe(duration: f64) -> MediaProbe {
        MediaProbe {
            duration_seconds: duration,
            width: 1920,
            height: 1080,
            frame_rate: 30.0,
            source_audio_channels: 2,
        }
    }

    fn medium() -> ScriptedDecisions {
        ScriptedDecisions {
            preset: Some(Preset::Medium),
            ..Default::default()
        }
    }

    fn build(probe: &MediaProbe, policy: &PlanPolicy, decisions: &mut ScriptedDecisions) -> Result<EncodePlan> {
        build_plan(
            Path::new("in.mkv"),
            Path::new("compressed.mp4"),
            probe,
            policy,
            decisions,
        )
    }

    #[test]
    fn test_one_minute_1080p_stereo() {
        let plan = build(&probe(60.0), &PlanPolicy::default(), &mut medium()).unwrap();

        assert_eq!(plan.envelope, 1_398_101);
        assert_eq!(plan.audio.channels, 2);
        assert_eq!(plan.audio.bitrate, 64_000);
        assert_eq!(plan.video.bitrate, 1_321_101);
        assert_eq!(plan.video.resolution(), Resolution::new(1084, 610));
        assert!(plan.video.height <= 1080);
        assert_eq!(plan.video.frame_rate, 30.0);
        assert_eq!(plan.video.gop, 300);
        assert_eq!(plan.video.preset, Preset::Medium);
        assert!(!plan.video.is_degenerate());
    }

    #[test]
    fn test_ten_minutes_needs_audio_decision() {
        let policy = PlanPolicy::default();
        assert!(matches!(
            build(&probe(600.0), &policy, &mut medium()),
            Err(FitError::DecisionRequired(_))
        ));

        let mut keep = ScriptedDecisions {
            drop_audio: Some(false),
            ..medium()
        };
        let plan = build(&probe(600.0), &policy, &mut keep).unwrap();
        assert_eq!(plan.envelope, 139_810);
        assert_eq!(plan.audio.channels, 1);
        assert_eq!(plan.video.bitrate, 94_810);
        assert_eq!(plan.video.width % 2, 0);
        assert_eq!(plan.video.height % 2, 0);
    }

    #[test]
    fn test_infeasible_budget_is_degenerate_not_error() {
        let policy = PlanPolicy::default().with_size_limit(FileSize::from_kib(16));
        let mut decisions = ScriptedDecisions {
            drop_audio: Some(true),
            ..medium()
        };
        let plan = build(&probe(3600.0), &policy, &mut decisions).unwrap();
        assert!(plan.video.is_degenerate());
        assert_eq!(plan.video.resolution(), Resolution::new(2, 2));
    }

    #[test]
    fn test_user_height_odd_width_is_made_even() {
        let policy = PlanPolicy::default()
            .with_resolution_mode(ResolutionMode::UserHeight)
            .with_audio_mode(AudioMode::Manual)
            .with_frame_rate_mode(FrameRateMode::UserChosen);
        let mut decisions = ScriptedDecisions {
            audio_channels: Some(0),
            output_height: Some(361),
            frame_rate: Some(24),
            ..medium()
        };
        let plan = build(&probe(60.0), &policy, &mut decisions).unwrap();
        // 361 × 16/9 = 641.8 -> 642, height 361 -> 360
        assert_eq!(plan.video.resolution(), Resolution::new(642, 360));
        assert_eq!(plan.audio, AudioPlan::none());
        assert_eq!(plan.video.bitrate, 1_398_101 - 13_000);
        assert_eq!(plan.video.frame_rate, 24.0);
        assert_eq!(plan.video.gop, 240);
    }

    #[test]
    fn test_invalid_probe_rejected() {
        let bad = MediaProbe {
            duration_seconds: 0.0,
            ..probe(60.0)
        };
        assert!(matches!(
            build(&bad, &PlanPolicy::default(), &mut medium()),
            Err(FitError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_plan_display_and_json() {
        let plan = build(&probe(60.0), &PlanPolicy::default(), &mut medium()).unwrap();
        let text = plan.to_string();
        assert!(text.contains("1084x610"));
        assert!(text.contains("preset medium"));
        assert!(text.contains("compressed.mp4"));

        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["video"]["preset"], "medium");
        assert_eq!(json["audio"]["channels"], 2);
        assert_eq!(json["size_limit"], 10 * 1_048_576);
    }
}
