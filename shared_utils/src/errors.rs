use thiserror::Error;

#[derive(Error, Debug)]
pub enum FitError {
    /// Out-of-range input: non-positive duration or dimensions, bad user selections.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("External tool not found: {0}")]
    ToolNotFound(String),

    #[error("FFprobe failed: {0}")]
    ProbeFailed(String),

    #[error("Encoder pass {pass} failed (exit code: {exit_code:?}): {message}")]
    EncoderFailed {
        pass: u8,
        exit_code: Option<i32>,
        message: String,
    },

    /// A decision point was reached with nobody to answer it (headless runs).
    #[error("Decision required: {0}")]
    DecisionRequired(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl FitError {
    /// Probe and encoder failures abort the whole job; everything else is the caller's input.
    pub fn is_external_tool_failure(&self) -> bool {
        matches!(
            self,
            FitError::ToolNotFound(_) | FitError::ProbeFailed(_) | FitError::EncoderFailed { .. }
        )
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        FitError::InvalidInput(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, FitError>;
