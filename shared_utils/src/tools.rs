//! External tool discovery.

use crate::errors::{FitError, Result};
use std::path::PathBuf;

/// Resolves `name` on `PATH`.
pub fn find_tool(name: &str) -> Result<PathBuf> {
    which::which(name).map_err(|_| {
        FitError::ToolNotFound(format!(
            "{} not found on PATH. Install FFmpeg (with libx265 and libopus) and retry",
            name
        ))
    })
}

/// Checks every tool a two-pass job needs, reporting the first one missing.
pub fn require_tools(names: &[&str]) -> Result<()> {
    for name in names {
        find_tool(name)?;
    }
    Ok(())
}
