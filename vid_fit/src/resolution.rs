//! Resolution Planner
//!
//! Two interchangeable algorithms, picked by [`ResolutionMode`]:
//! - bitrate density: solve `bitrate = d × h × h × aspect` for `h`, clamp to the source, round
//!   both sides to even values
//! - user height: the caller names a height and the width follows the source aspect ratio

use crate::config::{PlanPolicy, ResolutionMode};
use crate::decision::DecisionProvider;
use serde::{Deserialize, Serialize};
use shared_utils::{round_to_even, FitError, Result};
use std::fmt;
use tracing::{info, warn};

/// Smallest frame the encoder accepts in 4:2:0.
pub const MIN_DIMENSION: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

fn check_source(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(FitError::invalid_input(format!(
            "source dimensions must be positive, got {}x{}",
            width, height
        )));
    }
    Ok(())
}

pub fn validate_requested_height(height: u32) -> Result<u32> {
    if height == 0 {
        return Err(FitError::invalid_input("output height must be positive"));
    }
    Ok(height)
}

/// Bitrate-density mode.
///
/// ```
/// use vid_fit::resolution::plan_by_density;
///
/// // plenty of bits: stays at source size
/// let full = plan_by_density(1920, 1080, 50_000_000, 2.0).unwrap();
/// assert_eq!((full.width, full.height), (1920, 1080));
/// ```
pub fn plan_by_density(
    source_width: u32,
    source_height: u32,
    video_bitrate: u64,
    bits_per_pixel: f64,
) -> Result<Resolution> {
    check_source(source_width, source_height)?;
    if !bits_per_pixel.is_finite() || bits_per_pixel <= 0.0 {
        return Err(FitError::invalid_input(format!(
            "bits-per-pixel density must be positive, got {}",
            bits_per_pixel
        )));
    }

    let aspect = source_width as f64 / source_height as f64;
    let height = (video_bitrate as f64 / (bits_per_pixel * aspect))
        .sqrt()
        .min(source_height as f64);
    // height × aspect can land a hair above an odd source width
    let width = (height * aspect).min(source_width as f64);

    let planned = Resolution::new(
        round_to_even(width).max(MIN_DIMENSION),
        round_to_even(height).max(MIN_DIMENSION),
    );
    if planned.height < MIN_DIMENSION * 2 || planned.width < MIN_DIMENSION * 2 {
        warn!(
            resolution = %planned,
            video_bitrate,
            "Planned resolution is at the minimum frame size"
        );
    }
    Ok(planned)
}

/// User-height mode. Width is `ceil(height × aspect)`, height is kept as given.
///
/// A height above the source falls back to the source resolution.
pub fn plan_by_user_height(
    source_width: u32,
    source_height: u32,
    requested_height: u32,
) -> Result<Resolution> {
    check_source(source_width, source_height)?;
    let requested_height = validate_requested_height(requested_height)?;

    if requested_height > source_height {
        warn!(
            requested_height,
            source_height, "Requested height exceeds the source, keeping source resolution"
        );
        return Ok(Resolution::new(source_width, source_height));
    }

    // ceil(requested × w / h) in integers, free of float drift on common ratios
    let numerator = u64::from(requested_height) * u64::from(source_width);
    let width = numerator.div_ceil(u64::from(source_height));
    Ok(Resolution::new(
        u32::try_from(width).unwrap_or(u32::MAX),
        requested_height,
    ))
}

/// Dispatches on the policy's resolution mode.
pub fn plan_resolution(
    source_width: u32,
    source_height: u32,
    video_bitrate: u64,
    policy: &PlanPolicy,
    decisions: &mut dyn DecisionProvider,
) -> Result<Resolution> {
    let resolution = match policy.resolution_mode {
        ResolutionMode::BitrateDensity => plan_by_density(
            source_width,
            source_height,
            video_bitrate,
            policy.bits_per_pixel,
        )?,
        ResolutionMode::UserHeight => {
            check_source(source_width, source_height)?;
            let requested = decisions.choose_output_height(source_height)?;
            plan_by_user_height(source_width, source_height, requested)?
        }
    };

    info!(
        mode = ?policy.resolution_mode,
        source = %Resolution::new(source_width, source_height),
        planned = %resolution,
        "Resolution plan"
    );
    Ok(resolution)
}
