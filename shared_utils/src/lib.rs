//! Shared Utilities for the vid-fit tools
//!
//! - Unified error type
//! - Logging setup (stderr + rolling file)
//! - FFprobe wrapper for media inspection
//! - FFmpeg process runner with progress parsing
//! - External tool discovery
//! - Even-dimension helpers for 4:2:0 output
//! - Byte-size type for budgets

pub mod errors;
pub mod ffmpeg_process;
pub mod ffprobe;
pub mod logging;
pub mod progress;
pub mod tools;
pub mod types;
pub mod video;

pub use errors::{FitError, Result};
pub use ffmpeg_process::{
    format_command, format_ffmpeg_error, run_with_stdout_lines, FfmpegProcess,
    FfmpegProgressParser,
};
pub use ffprobe::{parse_frame_rate, parse_probe_json, probe_video, FFprobeResult};
pub use progress::{create_pass_progress_bar, set_fraction};
pub use tools::{find_tool, require_tools};
pub use types::FileSize;
pub use video::{ensure_even_dimensions, format_size_arg, round_to_even};
