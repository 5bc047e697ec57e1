//! x265 speed presets, slowest first.

use serde::{Deserialize, Serialize};
use shared_utils::{FitError, Result};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Placebo,
    Veryslow,
    Slower,
    Slow,
    Medium,
    Fast,
    Faster,
    Veryfast,
    Superfast,
    Ultrafast,
}

impl Preset {
    pub const ALL: [Preset; 10] = [
        Preset::Placebo,
        Preset::Veryslow,
        Preset::Slower,
        Preset::Slow,
        Preset::Medium,
        Preset::Fast,
        Preset::Faster,
        Preset::Veryfast,
        Preset::Superfast,
        Preset::Ultrafast,
    ];

    /// `0` is `placebo`, `9` is `ultrafast`.
    pub fn from_index(index: usize) -> Result<Self> {
        Self::ALL.get(index).copied().ok_or_else(|| {
            FitError::invalid_input(format!("preset index must be 0-9, got {}", index))
        })
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Preset::Placebo => "placebo",
            Preset::Veryslow => "veryslow",
            Preset::Slower => "slower",
            Preset::Slow => "slow",
            Preset::Medium => "medium",
            Preset::Fast => "fast",
            Preset::Faster => "faster",
            Preset::Veryfast => "veryfast",
            Preset::Superfast => "superfast",
            Preset::Ultrafast => "ultrafast",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts a preset name (case-insensitive) or its index.
impl FromStr for Preset {
    type Err = FitError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(index) = s.parse::<usize>() {
            return Self::from_index(index);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| FitError::invalid_input(format!("unknown preset '{}'", s)))
    }
}
