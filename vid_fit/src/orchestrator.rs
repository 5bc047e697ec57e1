//! Encode Orchestrator - two-pass libx265 through FFmpeg
//!
//! ANALYZE (pass 1) writes rate-control statistics to a null sink with audio disabled.
//! FINALIZE (pass 2) reads them back and writes the real container. Pass 2 can only be
//! started with the [`AnalyzedPass`] token pass 1 returns, so the order is fixed at compile time.
//!
//! The statistics file lives in a private temp directory owned by that token, so two jobs
//! running side by side never share it. Pass 2 writes into a temp file next to the requested
//! output, which is renamed over it only when the pass succeeds. A failed pass leaves whatever
//! file was already there untouched.

use crate::plan::EncodePlan;
use shared_utils::{
    create_pass_progress_bar, find_tool, format_ffmpeg_error, format_size_arg,
    run_with_stdout_lines, set_fraction, FfmpegProgressParser, FitError, Result,
};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, info};

pub const VIDEO_CODEC: &str = "libx265";
pub const AUDIO_CODEC: &str = "libopus";
pub const PIXEL_FORMAT: &str = "yuv420p";
pub const STATS_FILE_NAME: &str = "x265_2pass.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Analyze,
    Finalize,
}

impl Pass {
    pub fn number(self) -> u8 {
        match self {
            Pass::Analyze => 1,
            Pass::Finalize => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Pass::Analyze => "Pass 1/2 analyze",
            Pass::Finalize => "Pass 2/2 encode",
        }
    }
}

/// `:` and `=` separate x265 options, so a stats path containing them must be escaped.
fn escape_x265_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | ':' | '=') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub fn x265_params(pass: Pass, stats_file: &Path) -> String {
    format!(
        "pass={}:stats={}",
        pass.number(),
        escape_x265_value(&stats_file.to_string_lossy())
    )
}

/// FFmpeg arguments for one pass.
///
/// Pass 1 always carries `-an` and writes to the null muxer. Pass 2 carries the Opus flags, or
/// `-an` when the plan has no audio, and writes to `destination`.
pub fn pass_args(
    plan: &EncodePlan,
    pass: Pass,
    stats_file: &Path,
    destination: &Path,
) -> Vec<OsString> {
    let video = &plan.video;
    let mut args: Vec<OsString> = vec![
        "-y".into(),
        "-hide_banner".into(),
        "-nostdin".into(),
        "-i".into(),
        plan.input.clone().into_os_string(),
        "-c:v".into(),
        VIDEO_CODEC.into(),
        "-tag:v".into(),
        "hvc1".into(),
    ];

    match pass {
        Pass::Finalize if !plan.audio.is_disabled() => {
            args.extend([
                "-c:a".into(),
                AUDIO_CODEC.into(),
                "-ac".into(),
                plan.audio.channels.to_string().into(),
                "-b:a".into(),
                plan.audio.bitrate.to_string().into(),
                "-vbr".into(),
                "off".into(),
            ]);
        }
        _ => args.push("-an".into()),
    }

    args.extend([
        "-pix_fmt".into(),
        PIXEL_FORMAT.into(),
        "-b:v".into(),
        video.bitrate.to_string().into(),
        "-preset".into(),
        video.preset.as_str().into(),
        "-r".into(),
        video.frame_rate.to_string().into(),
        "-g".into(),
        video.gop.to_string().into(),
        "-s".into(),
        format_size_arg(video.width, video.height).into(),
        "-x265-params".into(),
        x265_params(pass, stats_file).into(),
        "-progress".into(),
        "pipe:1".into(),
        "-nostats".into(),
    ]);

    match pass {
        Pass::Analyze => args.extend(["-f".into(), "null".into(), "-".into()]),
        Pass::Finalize => args.push(destination.as_os_str().to_os_string()),
    }
    args
}

/// Runs one encoder invocation to completion.
pub trait Encoder {
    fn run_pass(&mut self, pass: Pass, args: &[OsString], duration_seconds: f64) -> Result<()>;
}

/// Real encoder: spawns `ffmpeg` and drives a progress bar from `-progress pipe:1`.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    binary: PathBuf,
    quiet: bool,
}

impl FfmpegEncoder {
    pub fn new(binary: impl Into<PathBuf>, quiet: bool) -> Self {
        Self {
            binary: binary.into(),
            quiet,
        }
    }

    /// Finds `ffmpeg` on `PATH`.
    pub fn locate(quiet: bool) -> Result<Self> {
        Ok(Self::new(find_tool("ffmpeg")?, quiet))
    }
}

impl Encoder for FfmpegEncoder {
    fn run_pass(&mut self, pass: Pass, args: &[OsString], duration_seconds: f64) -> Result<()> {
        let pb = create_pass_progress_bar(pass.label(), self.quiet);
        let mut parser = FfmpegProgressParser::with_duration(duration_seconds);

        let mut cmd = Command::new(&self.binary);
        cmd.args(args);

        let result = run_with_stdout_lines(&mut cmd, |line| {
            if let Some(fraction) = parser.parse_line(line) {
                set_fraction(&pb, fraction);
            }
            if let Some(speed) = parser.speed() {
                pb.set_message(format!("frame {} {:.2}x", parser.frame(), speed));
            }
        });
        pb.finish_and_clear();
        debug!(
            pass = pass.number(),
            frames = parser.frame(),
            encoded_seconds = parser.out_seconds(),
            reached_end = parser.is_finished(),
            "Encoder progress at exit"
        );

        let (status, stderr) = result.map_err(|e| FitError::EncoderFailed {
            pass: pass.number(),
            exit_code: None,
            message: format!("{:#}", e),
        })?;

        if !status.success() {
            return Err(FitError::EncoderFailed {
                pass: pass.number(),
                exit_code: status.code(),
                message: format_ffmpeg_error(&stderr),
            });
        }
        Ok(())
    }
}

/// Handed out by a successful pass 1. Owns the statistics directory and the staged output
/// until pass 2 is done.
#[derive(Debug)]
pub struct AnalyzedPass {
    stats_dir: TempDir,
    stats_file: PathBuf,
    staged_output: NamedTempFile,
}

/// Temp file in the output's directory, keeping its extension so FFmpeg picks the same muxer.
fn stage_output(output: &Path) -> Result<NamedTempFile> {
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let suffix = output
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    let mut builder = tempfile::Builder::new();
    builder.prefix(".vid-fit-").suffix(&suffix);
    // temp files default to owner-only, the finished output should not be
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o644));
    }
    Ok(builder.tempfile_in(dir)?)
}

pub struct EncodeOrchestrator<E> {
    encoder: E,
}

impl<E: Encoder> EncodeOrchestrator<E> {
    pub fn new(encoder: E) -> Self {
        Self { encoder }
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    /// ANALYZE. A failure here ends the job, nothing is written.
    ///
    /// The output is staged first, so an unwritable output directory fails before the encoder runs.
    pub fn analyze(&mut self, plan: &EncodePlan) -> Result<AnalyzedPass> {
        let staged_output = stage_output(&plan.output)?;
        let stats_dir = tempfile::Builder::new().prefix("vid-fit-").tempdir()?;
        let stats_file = stats_dir.path().join(STATS_FILE_NAME);
        debug!(stats = %stats_file.display(), staged = %staged_output.path().display(), "Two-pass scratch files");

        let args = pass_args(plan, Pass::Analyze, &stats_file, staged_output.path());
        info!(pass = 1, input = %plan.input.display(), "Analyzing");
        self.encoder
            .run_pass(Pass::Analyze, &args, plan.probe.duration_seconds)?;

        Ok(AnalyzedPass {
            stats_dir,
            stats_file,
            staged_output,
        })
    }

    /// FINALIZE. Only a successful pass replaces `plan.output`; on failure the staged file is
    /// deleted and any existing output stays as it was.
    pub fn finalize(&mut self, plan: &EncodePlan, analyzed: AnalyzedPass) -> Result<()> {
        let AnalyzedPass {
            stats_dir,
            stats_file,
            staged_output,
        } = analyzed;

        let args = pass_args(plan, Pass::Finalize, &stats_file, staged_output.path());
        info!(pass = 2, output = %plan.output.display(), "Encoding");
        let result = self
            .encoder
            .run_pass(Pass::Finalize, &args, plan.probe.duration_seconds);

        if let Err(e) = stats_dir.close() {
            debug!(error = %e, "Could not remove two-pass statistics directory");
        }
        result?;

        staged_output
            .persist(&plan.output)
            .map_err(|e| FitError::IoError(e.error))?;
        Ok(())
    }

    pub fn run(&mut self, plan: &EncodePlan) -> Result<()> {
        let analyzed = self.analyze(plan)?;
        self.finalize(plan, analyzed)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::audio_policy::AudioPlan;
    use crate::plan::VideoPlan;
    use crate::preset::Preset;
    use crate::probe::MediaProbe;
    use shared_utils::FileSize;
    use std::fs;

    /// Records every invocation; optionally fails one pass.
    #[derive(Default)]
    pub(crate) struct RecordingEncoder {
        pub calls: Vec<(Pass, Vec<String>)>,
        pub fail_on: Option<Pass>,
        /// Written to the output path during pass 2.
        pub output_bytes: Option<Vec<u8>>,
    }

    impl Encoder for RecordingEncoder {
        fn run_pass(&mut self, pass: Pass, args: &[OsString], _duration: f64) -> Result<()> {
            let args: Vec<String> = args
                .iter()
                .map(|a| a.to_string_lossy().into_owned())
                .collect();
            if pass == Pass::Finalize {
                if let (Some(bytes), Some(output)) = (&self.output_bytes, args.last()) {
                    std::fs::write(output, bytes)?;
                }
            }
            self.calls.push((pass, args));
            if self.fail_on == Some(pass) {
                return Err(FitError::EncoderFailed {
                    pass: pass.number(),
                    exit_code: Some(1),
                    message: "Conversion failed!".into(),
                });
            }
            Ok(())
        }
    }

    pub(crate) fn sample_plan(channels: u8, output: &Path) -> EncodePlan {
        EncodePlan {
            input: PathBuf::from("in.mkv"),
            output: output.to_path_buf(),
            probe: MediaProbe {
                duration_seconds: 60.0,
                width: 1920,
                height: 1080,
                frame_rate: 30.0,
                source_audio_channels: 2,
            },
            size_limit: FileSize::from_mib(10),
            envelope: 1_398_101,
            audio: AudioPlan::with_channels(channels, 32_000).unwrap(),
            video: VideoPlan {
                bitrate: 1_321_101,
                width: 1084,
                height: 610,
                frame_rate: 30.0,
                gop: 300,
                preset: Preset::Medium,
            },
        }
    }

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_pass_one_args() {
        let plan = sample_plan(2, Path::new("compressed.mp4"));
        let args = strings(&pass_args(
            &plan,
            Pass::Analyze,
            Path::new("/tmp/s/x265_2pass.log"),
            Path::new("out/.vid-fit-x.mp4"),
        ));

        assert_eq!(value_after(&args, "-i"), Some("in.mkv"));
        assert_eq!(value_after(&args, "-c:v"), Some("libx265"));
        assert_eq!(value_after(&args, "-tag:v"), Some("hvc1"));
        assert_eq!(value_after(&args, "-pix_fmt"), Some("yuv420p"));
        assert_eq!(value_after(&args, "-b:v"), Some("1321101"));
        assert_eq!(value_after(&args, "-preset"), Some("medium"));
        assert_eq!(value_after(&args, "-r"), Some("30"));
        assert_eq!(value_after(&args, "-g"), Some("300"));
        assert_eq!(value_after(&args, "-s"), Some("1084x610"));
        assert_eq!(
            value_after(&args, "-x265-params"),
            Some("pass=1:stats=/tmp/s/x265_2pass.log")
        );
        assert!(args.contains(&"-an".to_string()));
        assert!(!args.contains(&"-c:a".to_string()));
        assert_eq!(&args[args.len() - 3..], ["-f", "null", "-"]);
        assert!(!args.iter().any(|a| a.contains("vid-fit-x")));
    }

    #[test]
    fn test_pass_two_args_with_audio() {
        let plan = sample_plan(2, Path::new("out/compressed.mp4"));
        let args = strings(&pass_args(
            &plan,
            Pass::Finalize,
            Path::new("/tmp/s/x265_2pass.log"),
            Path::new("out/.vid-fit-x.mp4"),
        ));

        assert_eq!(value_after(&args, "-c:a"), Some("libopus"));
        assert_eq!(value_after(&args, "-ac"), Some("2"));
        assert_eq!(value_after(&args, "-b:a"), Some("64000"));
        assert_eq!(value_after(&args, "-vbr"), Some("off"));
        assert!(!args.contains(&"-an".to_string()));
        assert_eq!(
            value_after(&args, "-x265-params"),
            Some("pass=2:stats=/tmp/s/x265_2pass.log")
        );
        assert_eq!(args.last().map(String::as_str), Some("out/.vid-fit-x.mp4"));
    }

    #[test]
    fn test_pass_two_without_audio() {
        let plan = sample_plan(0, Path::new("compressed.mp4"));
        let args = strings(&pass_args(
            &plan,
            Pass::Finalize,
            Path::new("stats.log"),
            Path::new("staged.mp4"),
        ));
        assert!(args.contains(&"-an".to_string()));
        for flag in ["-c:a", "-ac", "-b:a", "-vbr"] {
            assert!(!args.contains(&flag.to_string()), "{} present", flag);
        }
    }

    #[test]
    fn test_x265_params_escapes_separators() {
        assert_eq!(
            x265_params(Pass::Analyze, Path::new(r"C:\tmp\a=b.log")),
            r"pass=1:stats=C\:\\tmp\\a\=b.log"
        );
    }

    #[test]
    fn test_run_is_two_ordered_passes_sharing_stats() {
        let dir = tempfile::tempdir().unwrap();
        let plan = sample_plan(1, &dir.path().join("compressed.mp4"));
        let mut orchestrator = EncodeOrchestrator::new(RecordingEncoder::default());
        orchestrator.run(&plan).unwrap();

        let calls = &orchestrator.encoder().calls;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, Pass::Analyze);
        assert_eq!(calls[1].0, Pass::Finalize);

        let stats1 = value_after(&calls[0].1, "-x265-params").unwrap();
        let stats2 = value_after(&calls[1].1, "-x265-params").unwrap();
        let path1 = stats1.trim_start_matches("pass=1:stats=");
        assert_eq!(path1, stats2.trim_start_matches("pass=2:stats="));
        assert!(path1.ends_with(STATS_FILE_NAME));
        // stats directory is gone once the job is over
        assert!(!Path::new(path1).parent().unwrap().exists());
    }

    #[test]
    fn test_pass_one_failure_skips_pass_two() {
        let dir = tempfile::tempdir().unwrap();
        let plan = sample_plan(2, &dir.path().join("compressed.mp4"));
        let mut orchestrator = EncodeOrchestrator::new(RecordingEncoder {
            fail_on: Some(Pass::Analyze),
            ..Default::default()
        });
        let err = orchestrator.run(&plan).unwrap_err();
        assert!(matches!(err, FitError::EncoderFailed { pass: 1, .. }));
        assert_eq!(orchestrator.encoder().calls.len(), 1);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_pass_two_writes_staged_file_then_renames() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("compressed.mp4");
        fs::write(&output, b"older encode").unwrap();
        let plan = sample_plan(2, &output);

        let mut orchestrator = EncodeOrchestrator::new(RecordingEncoder {
            output_bytes: Some(b"fresh encode".to_vec()),
            ..Default::default()
        });
        orchestrator.run(&plan).unwrap();

        let staged = PathBuf::from(orchestrator.encoder().calls[1].1.last().unwrap());
        assert_eq!(staged.parent(), Some(dir.path()));
        assert_eq!(staged.extension().unwrap(), "mp4");
        assert_ne!(staged, output);
        assert!(!staged.exists());
        assert_eq!(fs::read(&output).unwrap(), b"fresh encode");
        // only the output is left in the directory
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_unwritable_output_dir_fails_before_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let plan = sample_plan(2, &dir.path().join("missing/compressed.mp4"));
        let mut orchestrator = EncodeOrchestrator::new(RecordingEncoder::default());
        let err = orchestrator.run(&plan).unwrap_err();
        assert!(matches!(err, FitError::IoError(_)));
        assert!(orchestrator.encoder().calls.is_empty());
    }

    #[test]
    fn test_stage_output_without_parent_or_extension() {
        let staged = stage_output(Path::new("compressed")).unwrap();
        let name = staged.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".vid-fit-"));
        assert!(staged.path().extension().is_none());
        assert!(staged.path().starts_with("."));
    }

    #[test]
    fn test_pass_two_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let plan = sample_plan(2, &dir.path().join("compressed.mp4"));
        let mut orchestrator = EncodeOrchestrator::new(RecordingEncoder {
            fail_on: Some(Pass::Finalize),
            ..Default::default()
        });
        let err = orchestrator.run(&plan).unwrap_err();
        assert!(matches!(
            err,
            FitError::EncoderFailed {
                pass: 2,
                exit_code: Some(1),
                ..
            }
        ));
        assert_eq!(orchestrator.encoder().calls.len(), 2);
    }

    #[test]
    fn test_ffmpeg_encoder_missing_binary() {
        let plan = sample_plan(0, Path::new("compressed.mp4"));
        let args = pass_args(&plan, Pass::Analyze, Path::new("stats.log"), Path::new("-"));
        let mut encoder = FfmpegEncoder::new("/nonexistent/vid-fit-ffmpeg", true);
        let err = encoder.run_pass(Pass::Analyze, &args, 60.0).unwrap_err();
        assert!(matches!(
            err,
            FitError::EncoderFailed {
                pass: 1,
                exit_code: None,
                ..
            }
        ));
    }
}
