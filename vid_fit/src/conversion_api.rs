//! Job driver: probe → plan → two-pass encode → size report.
//!
//! The orchestrator only moves a finished pass-2 file into place, so a failed job never leaves a
//! partial output behind. The driver checks the finished file against the budget.

use crate::config::PlanPolicy;
use crate::decision::DecisionProvider;
use crate::orchestrator::{EncodeOrchestrator, Encoder, FfmpegEncoder};
use crate::plan::{build_plan, EncodePlan};
use crate::probe::{FfprobeInspector, MediaInspector};
use serde::Serialize;
use shared_utils::{require_tools, FileSize, FitError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobReport {
    pub output: PathBuf,
    pub output_size: FileSize,
    pub size_limit: FileSize,
}

impl JobReport {
    pub fn within_budget(&self) -> bool {
        self.output_size <= self.size_limit
    }

    /// Output size as a fraction of the budget.
    pub fn budget_ratio(&self) -> Option<f64> {
        self.output_size.ratio_of(self.size_limit)
    }
}

/// Refuses to let `-y` overwrite the source.
fn check_distinct_paths(input: &Path, output: &Path) -> Result<()> {
    let same = match (input.canonicalize(), output.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => input == output,
    };
    if same {
        return Err(FitError::invalid_input(format!(
            "output {} would overwrite the input",
            output.display()
        )));
    }
    Ok(())
}

/// Probes `input` and builds its plan. Nothing is encoded.
pub fn plan_job(
    input: &Path,
    output: &Path,
    inspector: &dyn MediaInspector,
    policy: &PlanPolicy,
    decisions: &mut dyn DecisionProvider,
) -> Result<EncodePlan> {
    check_distinct_paths(input, output)?;
    let probe = inspector.inspect(input)?;
    build_plan(input, output, &probe, policy, decisions)
}

/// Runs both passes of `plan`. A failed pass leaves any existing output file untouched.
pub fn execute_plan<E: Encoder>(plan: &EncodePlan, encoder: E) -> Result<JobReport> {
    if plan.video.is_degenerate() {
        warn!(
            budget = %plan.size_limit,
            duration = plan.probe.duration_seconds,
            "Encoding with a zero video bitrate, the result will not be watchable"
        );
    }

    EncodeOrchestrator::new(encoder).run(plan)?;
    report(plan)
}

fn report(plan: &EncodePlan) -> Result<JobReport> {
    let output_size = FileSize::new(fs::metadata(&plan.output)?.len());
    let report = JobReport {
        output: plan.output.clone(),
        output_size,
        size_limit: plan.size_limit,
    };

    let percent = report.budget_ratio().unwrap_or(0.0) * 100.0;
    if report.within_budget() {
        info!(
            output = %report.output.display(),
            size = %report.output_size,
            budget = %report.size_limit,
            "Done, {:.1}% of budget",
            percent
        );
    } else {
        warn!(
            output = %report.output.display(),
            size = %report.output_size,
            budget = %report.size_limit,
            "Output exceeds the budget ({:.1}%)",
            percent
        );
    }
    Ok(report)
}

/// Full job against the real tools.
pub fn fit_to_size(
    input: &Path,
    output: &Path,
    policy: &PlanPolicy,
    decisions: &mut dyn DecisionProvider,
    quiet: bool,
) -> Result<JobReport> {
    require_tools(&["ffprobe", "ffmpeg"])?;
    let plan = plan_job(input, output, &FfprobeInspector, policy, decisions)?;
    execute_plan(&plan, FfmpegEncoder::locate(quiet)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::ScriptedDecisions;
    use crate::orchestrator::tests::{sample_plan, RecordingEncoder};
    use crate::orchestrator::Pass;
    use crate::preset::Preset;
    use crate::probe::MediaProbe;

    struct FixedInspector(MediaProbe);

    impl MediaInspector for FixedInspector {
        fn inspect(&self, _input: &Path) -> Result<MediaProbe> {
            Ok(self.0.clone())
        }
    }

    struct BrokenInspector;

    impl MediaInspector for BrokenInspector {
        fn inspect(&self, input: &Path) -> Result<MediaProbe> {
            Err(FitError::ProbeFailed(format!("cannot read {}", input.display())))
        }
    }

    fn source() -> MediaProbe {
        MediaProbe {
            duration_seconds: 60.0,
            width: 1920,
            height: 1080,
            frame_rate: 30.0,
            source_audio_channels: 2,
        }
    }

    #[test]
    fn test_plan_job_uses_inspector() {
        let mut decisions = ScriptedDecisions {
            preset: Some(Preset::Fast),
            ..Default::default()
        };
        let plan = plan_job(
            Path::new("in.mkv"),
            Path::new("compressed.mp4"),
            &FixedInspector(source()),
            &PlanPolicy::default(),
            &mut decisions,
        )
        .unwrap();
        assert_eq!(plan.video.bitrate, 1_321_101);
        assert_eq!(plan.video.preset, Preset::Fast);
    }

    #[test]
    fn test_plan_job_propagates_probe_failure() {
        let err = plan_job(
            Path::new("missing.mkv"),
            Path::new("compressed.mp4"),
            &BrokenInspector,
            &PlanPolicy::default(),
            &mut ScriptedDecisions::default(),
        )
        .unwrap_err();
        assert!(err.is_external_tool_failure());
    }

    #[test]
    fn test_plan_job_refuses_to_overwrite_input() {
        let err = plan_job(
            Path::new("clip.mp4"),
            Path::new("clip.mp4"),
            &FixedInspector(source()),
            &PlanPolicy::default(),
            &mut ScriptedDecisions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, FitError::InvalidInput(_)));
    }

    #[test]
    fn test_execute_reports_size() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("compressed.mp4");
        let plan = sample_plan(2, &output);

        let encoder = RecordingEncoder {
            output_bytes: Some(vec![0u8; 4096]),
            ..Default::default()
        };
        let report = execute_plan(&plan, encoder).unwrap();
        assert_eq!(report.output, output);
        assert_eq!(report.output_size, FileSize::new(4096));
        assert!(report.within_budget());
        let ratio = report.budget_ratio().unwrap();
        assert!((ratio - 4096.0 / 10_485_760.0).abs() < 1e-12);
    }

    #[test]
    fn test_over_budget_is_reported_not_failed() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("compressed.mp4");
        let mut plan = sample_plan(0, &output);
        plan.size_limit = FileSize::new(1000);

        let encoder = RecordingEncoder {
            output_bytes: Some(vec![1u8; 2000]),
            ..Default::default()
        };
        let report = execute_plan(&plan, encoder).unwrap();
        assert!(!report.within_budget());
    }

    #[test]
    fn test_pass_two_failure_leaves_no_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("compressed.mp4");
        let plan = sample_plan(1, &output);

        let encoder = RecordingEncoder {
            fail_on: Some(Pass::Finalize),
            output_bytes: Some(b"partial".to_vec()),
            ..Default::default()
        };
        let err = execute_plan(&plan, encoder).unwrap_err();
        assert!(matches!(err, FitError::EncoderFailed { pass: 2, .. }));
        assert!(!output.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_pass_two_failure_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("compressed.mp4");
        fs::write(&output, b"earlier encode").unwrap();
        let plan = sample_plan(1, &output);

        // encoder dies before writing anything
        let encoder = RecordingEncoder {
            fail_on: Some(Pass::Finalize),
            output_bytes: None,
            ..Default::default()
        };
        let err = execute_plan(&plan, encoder).unwrap_err();
        assert!(matches!(err, FitError::EncoderFailed { pass: 2, .. }));
        assert_eq!(fs::read(&output).unwrap(), b"earlier encode");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_pass_two_failure_after_partial_write_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("compressed.mp4");
        fs::write(&output, b"earlier encode").unwrap();
        let plan = sample_plan(1, &output);

        let encoder = RecordingEncoder {
            fail_on: Some(Pass::Finalize),
            output_bytes: Some(b"half".to_vec()),
            ..Default::default()
        };
        execute_plan(&plan, encoder).unwrap_err();
        assert_eq!(fs::read(&output).unwrap(), b"earlier encode");
    }

    #[test]
    fn test_pass_one_failure_leaves_existing_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("compressed.mp4");
        fs::write(&output, b"previous run").unwrap();
        let plan = sample_plan(1, &output);

        let encoder = RecordingEncoder {
            fail_on: Some(Pass::Analyze),
            ..Default::default()
        };
        let err = execute_plan(&plan, encoder).unwrap_err();
        assert!(matches!(err, FitError::EncoderFailed { pass: 1, .. }));
        assert_eq!(fs::read(&output).unwrap(), b"previous run");
    }
}
