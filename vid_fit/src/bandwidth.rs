//! Bandwidth Allocator: size budget + duration -> total bit envelope.

use shared_utils::{FileSize, FitError, Result};

/// Total bits per second the output may average: `floor(8 × limit_bytes / duration)`.
///
/// Every downstream bitrate is a share of this number.
pub fn total_envelope(duration_seconds: f64, size_limit: FileSize) -> Result<u64> {
    if !duration_seconds.is_finite() || duration_seconds <= 0.0 {
        return Err(FitError::invalid_input(format!(
            "duration must be positive, got {}",
            duration_seconds
        )));
    }
    if size_limit.is_zero() {
        return Err(FitError::invalid_input("size limit must be greater than zero"));
    }

    let envelope = (size_limit.bits() as f64 / duration_seconds).floor();
    Ok(envelope.min(u64::MAX as f64) as u64)
}
