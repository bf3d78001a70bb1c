//! Error types for media operations.

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during probing and compositing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{tool} not found in PATH")]
    ToolNotFound { tool: String },

    #[error("Probe output has no WIDTHxHEIGHT token: {output}")]
    ProbeParse { output: String },

    #[error("Compositor exited with status {}", exit_status(.exit_code))]
    CompositorFailed {
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Invalid overlay image: {0}")]
    InvalidOverlay(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create a tool-not-found error.
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    /// Create a probe parse error, keeping the tail of long outputs.
    pub fn probe_parse(output: &str) -> Self {
        Self::ProbeParse {
            output: tail(output, 512).to_string(),
        }
    }

    /// Create a compositor failure carrying the captured process output.
    pub fn compositor_failed(exit_code: Option<i32>, stdout: String, stderr: String) -> Self {
        Self::CompositorFailed {
            exit_code,
            stdout,
            stderr,
        }
    }

    /// Create an invalid overlay error.
    pub fn invalid_overlay(message: impl Into<String>) -> Self {
        Self::InvalidOverlay(message.into())
    }
}

fn exit_status(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}

/// Last `max` bytes of `text`, cut on a char boundary.
fn tail(text: &str, max: usize) -> &str {
    let text = text.trim();
    if text.len() <= max {
        return text;
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}
