// SYNOID Timeline Errors
// Copyright (c) 2026 Xing_The_Creator | SYNOID

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used across the timeline crate.
pub type Result<T> = std::result::Result<T, TimelineError>;

/// Every failure the timeline pipeline can surface to a caller.
///
/// Probe failures are deliberately absent: they are logged and degrade to
/// "unknown duration" inside [`crate::render::probe`].
#[derive(Debug, Error)]
pub enum TimelineError {
    /// The request as a whole is malformed. Raised before any process spawn.
    #[error("invalid render request: {0}")]
    InvalidRequest(String),

    /// One segment of the request is malformed.
    #[error("invalid segment #{index} ('{section}'): {reason}")]
    InvalidSegment {
        index: usize,
        section: String,
        reason: String,
    },

    /// ffmpeg ran and exited non-zero.
    #[error("render failed (exit code {code:?})\nCommand: {command}\nError: {stderr}")]
    Render {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The render was cancelled by the caller; no output is kept.
    #[error("render cancelled")]
    Cancelled,

    /// The renderer binary could not be launched at all.
    #[error("failed to launch {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    /// Script or TTS metadata is unusable.
    #[error("script error: {0}")]
    Script(String),

    /// The analysis worker pool could not be built or joined.
    #[error("worker pool error: {0}")]
    Worker(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl TimelineError {
    pub fn invalid_segment(
        index: usize,
        section: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidSegment {
            index,
            section: section.into(),
            reason: reason.into(),
        }
    }

    /// True for the caller-preventable validation failures.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidRequest(_) | Self::InvalidSegment { .. })
    }

    /// True when an external render process ran and failed.
    pub fn is_render_failure(&self) -> bool {
        matches!(self, Self::Render { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_error_carries_command_and_stderr() {
        let err = TimelineError::Render {
            command: "ffmpeg -y -i a.mp4 out.mp4".to_string(),
            code: Some(1),
            stderr: "Invalid argument".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("ffmpeg -y -i a.mp4 out.mp4"));
        assert!(text.contains("Invalid argument"));
        assert!(err.is_render_failure());
        assert!(!err.is_validation());
    }

    #[test]
    fn test_segment_error_names_segment() {
        let err = TimelineError::invalid_segment(3, "Summary", "duration must be > 0");
        assert!(err.is_validation());
        assert!(err.to_string().contains("#3"));
        assert!(err.to_string().contains("Summary"));
    }
}
