//! vid-fit - fit a video into a file-size budget with a two-pass HEVC encode
//!
//! The allocator chain turns a size budget and the source properties into a plan:
//! - total bit envelope from budget and duration
//! - audio channels (0/1/2) at a fixed Opus allowance per channel
//! - video bitrate = envelope minus audio minus a safety margin
//! - output resolution from a bits-per-pixel density, or a caller-chosen height
//! - frame rate capped at 60, GOP of ten seconds
//!
//! The plan then drives two libx265 passes through FFmpeg.
//!
//! ```rust,ignore
//! use vid_fit::{fit_to_size, PlanPolicy, PromptDecisions};
//! use std::path::Path;
//!
//! let mut decisions = PromptDecisions::stdio();
//! let report = fit_to_size(
//!     Path::new("talk.mkv"),
//!     Path::new("compressed.mp4"),
//!     &PlanPolicy::default(),
//!     &mut decisions,
//!     false,
//! )?;
//! println!("{} of {}", report.output_size, report.size_limit);
//! ```

pub mod audio_policy;
pub mod bandwidth;
pub mod config;
pub mod conversion_api;
pub mod decision;
pub mod frame_rate;
pub mod orchestrator;
pub mod plan;
pub mod preset;
pub mod probe;
pub mod resolution;
pub mod video_bitrate;

// Re-exports
pub use audio_policy::{decide_audio, AudioPlan};
pub use bandwidth::total_envelope;
pub use config::{AudioMode, FrameRateMode, PlanPolicy, ResolutionMode};
pub use conversion_api::{execute_plan, fit_to_size, plan_job, JobReport};
pub use decision::{DecisionProvider, PromptDecisions, ScriptedDecisions};
pub use frame_rate::{gop_length, plan_frame_rate};
pub use orchestrator::{EncodeOrchestrator, Encoder, FfmpegEncoder, Pass};
pub use plan::{build_plan, EncodePlan, VideoPlan};
pub use preset::Preset;
pub use probe::{FfprobeInspector, MediaInspector, MediaProbe};
pub use resolution::{plan_by_density, plan_by_user_height, plan_resolution, Resolution};
pub use video_bitrate::allocate_video_bitrate;

pub use shared_utils::errors::{FitError, Result};
