//! FFmpeg child processes for encoder passes.
//!
//! An encoder pass writes `-progress pipe:1` records to stdout and diagnostics to stderr.
//! Reading only stdout while stderr is also piped stalls FFmpeg once the stderr pipe fills,
//! so [`FfmpegProcess`] drains stderr on a background thread for the whole run.

use anyhow::{anyhow, Context, Result};
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::info;

pub struct FfmpegProcess {
    child: Child,
    command: String,
    started: Instant,
    stderr_drain: Option<JoinHandle<String>>,
}

impl FfmpegProcess {
    /// Starts `cmd` with stdin closed and both output streams captured.
    pub fn spawn(cmd: &mut Command) -> Result<Self> {
        let command = format_command(cmd);
        info!(command = %command, "Starting FFmpeg");

        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Could not start {}", cmd.get_program().to_string_lossy()))?;

        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("FFmpeg stderr was not captured"))?;
        let stderr_drain = thread::spawn(move || {
            let mut bytes = Vec::new();
            // a read error only truncates diagnostics
            let _ = stderr.read_to_end(&mut bytes);
            String::from_utf8_lossy(&bytes).into_owned()
        });

        Ok(Self {
            child,
            command,
            started: Instant::now(),
            stderr_drain: Some(stderr_drain),
        })
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Waits for the process and returns its status with the collected stderr.
    pub fn wait_with_output(mut self) -> Result<(ExitStatus, String)> {
        let status = self
            .child
            .wait()
            .context("Lost track of the FFmpeg process")?;
        let stderr = match self.stderr_drain.take() {
            Some(handle) => handle.join().unwrap_or_default(),
            None => String::new(),
        };

        crate::logging::log_external_tool(
            "ffmpeg",
            &self.command,
            &stderr,
            status.code(),
            self.started.elapsed(),
        );
        Ok((status, stderr))
    }
}

/// `program arg arg ...` for log lines.
pub fn format_command(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|part| part.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Spawns `cmd` and hands each stdout line to `on_line` until the process closes stdout.
pub fn run_with_stdout_lines<F>(cmd: &mut Command, mut on_line: F) -> Result<(ExitStatus, String)>
where
    F: FnMut(&str),
{
    let mut process = FfmpegProcess::spawn(cmd)?;
    if let Some(stdout) = process.take_stdout() {
        let mut reader = BufReader::new(stdout);
        let mut line = String::new();
        while reader.read_line(&mut line).unwrap_or(0) > 0 {
            on_line(line.trim_end());
            line.clear();
        }
    }
    process.wait_with_output()
}

/// Follows the `-progress` key/value stream of one FFmpeg run.
///
/// Position comes from `out_time_us` (or `out_time_ms`, which FFmpeg also reports in
/// microseconds) and falls back to the `out_time=HH:MM:SS.us` clock. `progress=end` marks
/// the last record.
#[derive(Debug, Clone)]
pub struct FfmpegProgressParser {
    duration: Option<f64>,
    frame: u64,
    out_seconds: f64,
    speed: Option<f64>,
    finished: bool,
}

impl FfmpegProgressParser {
    /// `duration` in seconds; a non-positive value disables fraction reporting.
    pub fn with_duration(duration: f64) -> Self {
        Self {
            duration: (duration.is_finite() && duration > 0.0).then_some(duration),
            frame: 0,
            out_seconds: 0.0,
            speed: None,
            finished: false,
        }
    }

    /// Feeds one record line. Returns the completed fraction once it is known.
    pub fn parse_line(&mut self, line: &str) -> Option<f64> {
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim();
            match key.trim() {
                "frame" => self.frame = value.parse().unwrap_or(self.frame),
                "out_time_us" | "out_time_ms" => {
                    if let Ok(us) = value.parse::<u64>() {
                        self.out_seconds = us as f64 / 1e6;
                    }
                }
                "out_time" => {
                    if let Some(seconds) = parse_clock(value) {
                        self.out_seconds = seconds;
                    }
                }
                "speed" => self.speed = value.trim_end_matches('x').trim().parse().ok(),
                "progress" => self.finished |= value == "end",
                _ => {}
            }
        }
        self.fraction()
    }

    pub fn fraction(&self) -> Option<f64> {
        if self.finished {
            return Some(1.0);
        }
        match self.duration {
            Some(total) if self.out_seconds > 0.0 => Some((self.out_seconds / total).min(1.0)),
            _ => None,
        }
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn out_seconds(&self) -> f64 {
        self.out_seconds
    }

    /// Encoding speed relative to realtime, e.g. `1.5` for `speed=1.5x`.
    pub fn speed(&self) -> Option<f64> {
        self.speed
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// `HH:MM:SS(.frac)` to seconds.
fn parse_clock(clock: &str) -> Option<f64> {
    let mut parts = clock.splitn(3, ':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

fn is_stats_line(line: &str) -> bool {
    ["frame=", "fps=", "size=", "time=", "bitrate=", "speed="]
        .iter()
        .any(|prefix| line.starts_with(prefix))
}

/// One line of stderr worth showing to the user.
///
/// The last line reporting an error wins; otherwise the last line that is not a stats line.
pub fn format_ffmpeg_error(stderr: &str) -> String {
    let meaningful: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !is_stats_line(line))
        .collect();

    meaningful
        .iter()
        .rev()
        .find(|line| line.to_ascii_lowercase().contains("error"))
        .or_else(|| meaningful.last())
        .map(|line| line.to_string())
        .unwrap_or_else(|| "FFmpeg exited without diagnostics".to_string())
}
