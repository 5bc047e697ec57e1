//! Progress bars for long-running encoder passes.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

/// Percent-based bar template; the position is kept in per-mille for smoother updates.
pub const PASS_TEMPLATE: &str =
    "{spinner:.green} {prefix:.bold} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent:>3}% {msg}";
pub const PROGRESS_CHARS: &str = "█▓░";
pub const PASS_BAR_LENGTH: u64 = 1000;

/// Creates a bar for one encoder pass. Hidden when stderr is not a terminal or `quiet` is set.
pub fn create_pass_progress_bar(prefix: &str, quiet: bool) -> ProgressBar {
    let pb = ProgressBar::new(PASS_BAR_LENGTH);

    if quiet || !console::Term::stderr().is_term() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
        return pb;
    }

    match ProgressStyle::default_bar().template(PASS_TEMPLATE) {
        Ok(style) => pb.set_style(style.progress_chars(PROGRESS_CHARS)),
        Err(e) => tracing::debug!(error = %e, "Falling back to default progress style"),
    }
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Moves the bar to `fraction` (clamped to `0.0..=1.0`).
pub fn set_fraction(pb: &ProgressBar, fraction: f64) {
    let clamped = fraction.clamp(0.0, 1.0);
    pb.set_position((clamped * PASS_BAR_LENGTH as f64).round() as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_is_valid() {
        assert!(ProgressStyle::default_bar().template(PASS_TEMPLATE).is_ok());
    }

    #[test]
    fn test_set_fraction_clamps() {
        let pb = create_pass_progress_bar("Pass 1/2", true);
        set_fraction(&pb, 0.5);
        assert_eq!(pb.position(), 500);
        set_fraction(&pb, 7.0);
        assert_eq!(pb.position(), PASS_BAR_LENGTH);
        set_fraction(&pb, -1.0);
        assert_eq!(pb.position(), 0);
    }
}
