//! Logging setup shared by the vid-fit tools.
//!
//! Records go to stderr for the user and to a daily-rolling file for later inspection.
//! `RUST_LOG` replaces the default filter when set.
//!
//! ```no_run
//! use shared_utils::logging::{init_logging, LogConfig};
//!
//! init_logging("vid_fit", LogConfig::default().with_max_files(3))?;
//! tracing::info!("ready");
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Where the rolling files live. System temp directory by default.
    pub log_dir: PathBuf,
    /// Rolled files kept per program.
    pub max_files: usize,
    pub level: Level,
    pub file_output: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: std::env::temp_dir(),
            max_files: 5,
            level: Level::INFO,
            file_output: true,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.log_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_max_files(mut self, count: usize) -> Self {
        self.max_files = count;
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_file_output(mut self, enabled: bool) -> Self {
        self.file_output = enabled;
        self
    }
}

/// `<program>=<level>,shared_utils=<level>`; dashes become underscores to match crate targets.
fn default_directive(program_name: &str, level: Level) -> String {
    format!(
        "{}={level},shared_utils={level}",
        program_name.replace('-', "_"),
        level = level
    )
}

fn log_file_prefix(program_name: &str) -> String {
    format!("{}.log", program_name)
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_logging(program_name: &str, config: LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(program_name, config.level)));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(console::Term::stderr().is_term())
        .with_target(false);

    let file_layer = if config.file_output {
        std::fs::create_dir_all(&config.log_dir)
            .with_context(|| format!("Cannot create log directory {}", config.log_dir.display()))?;
        let appender = RollingFileAppender::new(
            Rotation::DAILY,
            &config.log_dir,
            log_file_prefix(program_name),
        );
        Some(
            fmt::layer()
                .with_writer(appender)
                .with_ansi(false)
                .with_thread_ids(true)
                .with_line_number(true),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("A tracing subscriber is already installed")?;

    if config.file_output {
        prune_log_files(&config.log_dir, program_name, config.max_files)?;
    }
    Ok(())
}

/// Deletes all but the `keep` newest rolled files of `program_name`.
///
/// Rolled files carry a `YYYY-MM-DD` suffix, so name order is age order.
fn prune_log_files(log_dir: &Path, program_name: &str, keep: usize) -> Result<()> {
    let mut files = collect_log_files(log_dir, program_name)?;
    files.sort();

    let excess = files.len().saturating_sub(keep);
    for path in files.into_iter().take(excess) {
        match std::fs::remove_file(&path) {
            Ok(()) => tracing::debug!(path = %path.display(), "Pruned log file"),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Could not prune log file"),
        }
    }
    Ok(())
}

fn collect_log_files(log_dir: &Path, program_name: &str) -> Result<Vec<PathBuf>> {
    let prefix = log_file_prefix(program_name);
    let entries = std::fs::read_dir(log_dir)
        .with_context(|| format!("Cannot read log directory {}", log_dir.display()))?;

    Ok(entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with(&prefix))
        })
        .collect())
}

/// One structured record per finished external command.
///
/// Success logs at info with the full output at debug; failure logs everything at error.
pub fn log_external_tool(
    tool_name: &str,
    command: &str,
    output: &str,
    exit_code: Option<i32>,
    duration: Duration,
) {
    let secs = duration.as_secs_f64();
    if exit_code == Some(0) {
        tracing::info!(tool = tool_name, duration_secs = secs, "External tool finished");
        tracing::debug!(tool = tool_name, command = %command, output = %output, "External tool output");
    } else {
        tracing::error!(
            tool = tool_name,
            command = %command,
            exit_code = ?exit_code,
            duration_secs = secs,
            output = %output,
            "External tool failed"
        );
    }
}
