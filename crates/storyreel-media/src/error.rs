//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid media file: {0}")]
    InvalidMedia(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an invalid media error.
    pub fn invalid_media(message: impl Into<String>) -> Self {
        Self::InvalidMedia(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// One-line description including the last diagnostic line, if any.
    pub fn diagnostic(&self) -> String {
        match self {
            Self::FfmpegFailed {
                message,
                stderr: Some(stderr),
                exit_code,
            } => {
                let last = stderr.lines().rev().find(|l| !l.trim().is_empty());
                match (last, exit_code) {
                    (Some(line), Some(code)) => format!("{} (exit {}): {}", message, code, line.trim()),
                    (Some(line), None) => format!("{}: {}", message, line.trim()),
                    (None, _) => self.to_string(),
                }
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_uses_last_stderr_line() {
        let err = MediaError::ffmpeg_failed(
            "FFmpeg exited with non-zero status",
            Some("frame=1\nUnable to find a suitable output format\n\n".to_string()),
            Some(1),
        );
        assert_eq!(
            err.diagnostic(),
            "FFmpeg exited with non-zero status (exit 1): Unable to find a suitable output format"
        );
    }

    #[test]
    fn test_diagnostic_without_stderr() {
        let err = MediaError::FfmpegNotFound;
        assert_eq!(err.diagnostic(), "FFmpeg not found in PATH");
    }
}
