use clap::{Args, Parser, Subcommand};
use shared_utils::logging::{init_logging, LogConfig};
use shared_utils::FileSize;
use std::path::{Path, PathBuf};
use tracing::Level;

use vid_fit::config::DEFAULT_OUTPUT_FILE;
use vid_fit::{
    fit_to_size, plan_job, AudioMode, FfprobeInspector, FrameRateMode, PlanPolicy, Preset,
    PromptDecisions, ResolutionMode, ScriptedDecisions,
};

/// `vid-fit <INPUT>` plans and encodes; the subcommands are spelled-out variants.
#[derive(Parser)]
#[command(name = "vid-fit")]
#[command(version, about = "Fit a video into a file-size budget with two-pass HEVC", long_about = None)]
#[command(args_conflicts_with_subcommands = true, subcommand_negates_reqs = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan and encode (same as giving INPUT directly)
    #[command(name = "run")]
    Run(RunArgs),

    /// Print the plan without encoding
    Plan {
        #[command(flatten)]
        plan: PlanArgs,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    plan: PlanArgs,
    /// Hide progress bars
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Args)]
struct PlanArgs {
    // optional only so a subcommand can stand in for it
    #[arg(value_name = "INPUT", required = true)]
    input: Option<PathBuf>,
    #[arg(short, long, default_value = DEFAULT_OUTPUT_FILE)]
    output: PathBuf,
    /// Size budget in MiB
    #[arg(long, default_value_t = 10.0)]
    size_mib: f64,
    /// Speed preset, by name or index 0 (placebo) to 9 (ultrafast)
    #[arg(long)]
    preset: Option<Preset>,
    /// Fixed output channel count (0-2)
    #[arg(long, conflicts_with = "ask_audio")]
    audio_channels: Option<u8>,
    /// Ask for the output channel count
    #[arg(long)]
    ask_audio: bool,
    /// Drop audio when bandwidth is low
    #[arg(long, conflicts_with = "keep_audio")]
    drop_audio: bool,
    /// Keep a mono track when bandwidth is low
    #[arg(long)]
    keep_audio: bool,
    /// Output height; width follows the source aspect ratio
    #[arg(long, conflicts_with = "ask_height")]
    height: Option<u32>,
    #[arg(long)]
    ask_height: bool,
    /// Output frame rate
    #[arg(long, conflicts_with = "ask_fps")]
    fps: Option<u32>,
    #[arg(long)]
    ask_fps: bool,
    /// Never prompt; fail when a decision has no flag
    #[arg(long)]
    no_prompt: bool,
    #[arg(short, long)]
    verbose: bool,
}

impl PlanArgs {
    fn input(&self) -> anyhow::Result<&Path> {
        self.input
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("missing INPUT path"))
    }

    fn policy(&self) -> PlanPolicy {
        let audio_mode = if self.audio_channels.is_some() || self.ask_audio {
            AudioMode::Manual
        } else {
            AudioMode::Automatic
        };
        let resolution_mode = if self.height.is_some() || self.ask_height {
            ResolutionMode::UserHeight
        } else {
            ResolutionMode::BitrateDensity
        };
        let frame_rate_mode = if self.fps.is_some() || self.ask_fps {
            FrameRateMode::UserChosen
        } else {
            FrameRateMode::Source
        };

        PlanPolicy::new()
            .with_size_limit(FileSize::from_mib_f64(self.size_mib))
            .with_audio_mode(audio_mode)
            .with_resolution_mode(resolution_mode)
            .with_frame_rate_mode(frame_rate_mode)
    }

    fn decisions(&self) -> ScriptedDecisions {
        let drop_audio = match (self.drop_audio, self.keep_audio) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        let scripted = ScriptedDecisions {
            drop_audio,
            audio_channels: self.audio_channels,
            output_height: self.height,
            frame_rate: self.fps,
            preset: self.preset,
            fallback: None,
        };
        if self.no_prompt {
            scripted
        } else {
            scripted.with_fallback(PromptDecisions::stdio())
        }
    }

    fn log_config(&self) -> LogConfig {
        let level = if self.verbose { Level::DEBUG } else { Level::INFO };
        LogConfig::default().with_level(level)
    }
}

fn run(args: &RunArgs) -> anyhow::Result<()> {
    let plan = &args.plan;
    let _ = init_logging("vid_fit", plan.log_config());
    let mut decisions = plan.decisions();
    let report = fit_to_size(
        plan.input()?,
        &plan.output,
        &plan.policy(),
        &mut decisions,
        args.quiet,
    )?;
    println!(
        "{}: {} (budget {})",
        report.output.display(),
        report.output_size,
        report.size_limit
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None => run(&cli.run)?,
        Some(Commands::Run(args)) => run(&args)?,

        Some(Commands::Plan { plan, json }) => {
            let _ = init_logging("vid_fit", plan.log_config());
            let mut decisions = plan.decisions();
            let encode_plan = plan_job(
                plan.input()?,
                &plan.output,
                &FfprobeInspector,
                &plan.policy(),
                &mut decisions,
            )?;
            if json {
                println!("{}", serde_json::to_string_pretty(&encode_plan)?);
            } else {
                println!("{}", encode_plan);
            }
        }
    }

    Ok(())
}
