//! Video Geometry Utilities
//!
//! 4:2:0 chroma subsampling needs both output dimensions to be even.

/// Rounds to the nearest integer, then moves an odd result one step toward `n`.
///
/// The parity correction follows the direction of the rounding error: if `n`
/// was above the rounded value the result is bumped up, otherwise it is pushed down.
///
/// ```
/// use shared_utils::video::round_to_even;
///
/// assert_eq!(round_to_even(10.4), 10);
/// assert_eq!(round_to_even(10.6), 10);
/// assert_eq!(round_to_even(11.0), 10);
/// assert_eq!(round_to_even(11.2), 12);
/// ```
pub fn round_to_even(n: f64) -> u32 {
    if !n.is_finite() || n <= 0.0 {
        return 0;
    }
    let rounded = n.round();
    let even = if rounded % 2.0 != 0.0 {
        if n > rounded {
            rounded + 1.0
        } else {
            rounded - 1.0
        }
    } else {
        rounded
    };
    even.min(u32::MAX as f64 - 1.0) as u32
}

/// Drops odd dimensions to the next lower even value. Returns whether anything changed.
pub fn ensure_even_dimensions(width: u32, height: u32) -> (u32, u32, bool) {
    let corrected_width = if !width.is_multiple_of(2) {
        width - 1
    } else {
        width
    };
    let corrected_height = if !height.is_multiple_of(2) {
        height - 1
    } else {
        height
    };
    let needs_correction = corrected_width != width || corrected_height != height;

    (corrected_width, corrected_height, needs_correction)
}

/// `-s` argument value.
pub fn format_size_arg(width: u32, height: u32) -> String {
    format!("{}x{}", width, height)
}
