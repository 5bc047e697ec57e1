//! Decision ports
//!
//! The planners never talk to a terminal. Whenever a choice belongs to the user they call a
//! [`DecisionProvider`]:
//! - [`PromptDecisions`] asks on a reader/writer pair and re-prompts until the answer is valid
//! - [`ScriptedDecisions`] answers from pre-set values (CLI flags) and either hands the rest to a
//!   fallback provider or fails with `DecisionRequired`

use crate::audio_policy::validate_channel_count;
use crate::frame_rate::validate_requested_frame_rate;
use crate::preset::Preset;
use crate::resolution::validate_requested_height;
use shared_utils::{FitError, Result};
use std::io::{self, BufRead, StdinLock, Stdout, Write};

pub trait DecisionProvider {
    /// `true` drops audio, `false` keeps a mono track. Asked only when bandwidth is low.
    fn confirm_drop_audio(&mut self, envelope: u64) -> Result<bool>;
    fn choose_audio_channels(&mut self, source_channels: u32) -> Result<u8>;
    fn choose_output_height(&mut self, source_height: u32) -> Result<u32>;
    /// `limit` is the source rate after the cap.
    fn choose_frame_rate(&mut self, limit: f64) -> Result<u32>;
    fn choose_preset(&mut self) -> Result<Preset>;
}

/// Interactive provider over any line-based reader and writer.
pub struct PromptDecisions<R, W> {
    input: R,
    output: W,
}

impl PromptDecisions<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> PromptDecisions<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn ask<T>(&mut self, question: &str, parse: impl Fn(&str) -> Result<T>) -> Result<T> {
        loop {
            write!(self.output, "{}", question)?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Err(FitError::DecisionRequired(format!(
                    "input closed while waiting for an answer to '{}'",
                    question.trim()
                )));
            }

            match parse(line.trim()) {
                Ok(answer) => return Ok(answer),
                Err(e) => writeln!(self.output, "{}", e)?,
            }
        }
    }
}

fn parse_number<T: std::str::FromStr>(s: &str) -> Result<T> {
    s.parse::<T>()
        .map_err(|_| FitError::invalid_input(format!("'{}' is not a whole number", s)))
}

fn parse_yes_no(s: &str) -> Result<bool> {
    match s.to_ascii_lowercase().as_str() {
        "y" | "yes" => Ok(true),
        "n" | "no" => Ok(false),
        _ => Err(FitError::invalid_input("answer y or n")),
    }
}

impl<R: BufRead, W: Write> DecisionProvider for PromptDecisions<R, W> {
    fn confirm_drop_audio(&mut self, envelope: u64) -> Result<bool> {
        writeln!(
            self.output,
            "Bandwidth is only {} kbps, keeping audio will cost video quality.",
            envelope / 1000
        )?;
        self.ask("Drop audio entirely? [y/n]: ", parse_yes_no)
    }

    fn choose_audio_channels(&mut self, source_channels: u32) -> Result<u8> {
        let question = format!(
            "Audio channels for the output (0-2, source has {}): ",
            source_channels
        );
        self.ask(&question, |s| validate_channel_count(parse_number(s)?))
    }

    fn choose_output_height(&mut self, source_height: u32) -> Result<u32> {
        let question = format!("Output height in pixels (source is {}): ", source_height);
        self.ask(&question, |s| validate_requested_height(parse_number(s)?))
    }

    fn choose_frame_rate(&mut self, limit: f64) -> Result<u32> {
        let question = format!("Output frame rate (1-{}): ", limit.floor());
        self.ask(&question, |s| validate_requested_frame_rate(parse_number(s)?, limit))
    }

    fn choose_preset(&mut self) -> Result<Preset> {
        writeln!(self.output, "Encoder presets, slowest first:")?;
        for preset in Preset::ALL {
            writeln!(self.output, "  {} {}", preset.index(), preset)?;
        }
        self.ask("Preset [0-9]: ", |s| s.parse::<Preset>())
    }
}

/// Answers from pre-set values. Unanswered questions go to `fallback`, or fail when there is none.
#[derive(Default)]
pub struct ScriptedDecisions {
    pub drop_audio: Option<bool>,
    pub audio_channels: Option<u8>,
    pub output_height: Option<u32>,
    pub frame_rate: Option<u32>,
    pub preset: Option<Preset>,
    pub fallback: Option<Box<dyn DecisionProvider>>,
}

impl ScriptedDecisions {
    pub fn with_fallback(mut self, fallback: impl DecisionProvider + 'static) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    fn fallback_or(&mut self, flag: &str) -> Result<&mut dyn DecisionProvider> {
        match self.fallback.as_deref_mut() {
            Some(fallback) => Ok(fallback),
            None => Err(FitError::DecisionRequired(format!(
                "no answer available in non-interactive mode, pass {}",
                flag
            ))),
        }
    }
}

impl DecisionProvider for ScriptedDecisions {
    fn confirm_drop_audio(&mut self, envelope: u64) -> Result<bool> {
        match self.drop_audio {
            Some(answer) => Ok(answer),
            None => self
                .fallback_or("--drop-audio or --keep-audio")?
                .confirm_drop_audio(envelope),
        }
    }

    fn choose_audio_channels(&mut self, source_channels: u32) -> Result<u8> {
        match self.audio_channels {
            Some(answer) => Ok(answer),
            None => self
                .fallback_or("--audio-channels")?
                .choose_audio_channels(source_channels),
        }
    }

    fn choose_output_height(&mut self, source_height: u32) -> Result<u32> {
        match self.output_height {
            Some(answer) => Ok(answer),
            None => self
                .fallback_or("--height")?
                .choose_output_height(source_height),
        }
    }

    fn choose_frame_rate(&mut self, limit: f64) -> Result<u32> {
        match self.frame_rate {
            Some(answer) => Ok(answer),
            None => self.fallback_or("--fps")?.choose_frame_rate(limit),
        }
    }

    fn choose_preset(&mut self) -> Result<Preset> {
        match self.preset {
            Some(answer) => Ok(answer),
            None => self.fallback_or("--preset")?.choose_preset(),
        }
    }
}
