//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{WorkerError, WorkerResult};

/// Default excerpt cap in characters.
pub const DEFAULT_EXCERPT_MAX_CHARS: usize = 300;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root of the scratch area; each generation gets its own subdirectory
    pub scratch_root: PathBuf,
    /// Durable output area for finished videos
    pub output_root: PathBuf,
    /// Local background music library
    pub music_root: PathBuf,
    /// Maximum generations running at once
    pub max_concurrent_generations: usize,
    /// Narration excerpt cap in characters
    pub excerpt_max_chars: usize,
    /// Keep request scratch directories after settlement (debugging)
    pub keep_scratch: bool,
    /// Retries for the final record write
    pub settle_retries: u32,
    /// Kill an encode running longer than this
    pub encode_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            scratch_root: std::env::temp_dir().join("storyreel"),
            output_root: PathBuf::from("output"),
            music_root: PathBuf::from("music"),
            max_concurrent_generations: 2,
            excerpt_max_chars: DEFAULT_EXCERPT_MAX_CHARS,
            keep_scratch: false,
            settle_retries: 3,
            encode_timeout: Duration::from_secs(900),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            scratch_root: std::env::var("STORYREEL_SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.scratch_root),
            output_root: std::env::var("STORYREEL_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_root),
            music_root: std::env::var("STORYREEL_MUSIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.music_root),
            max_concurrent_generations: std::env::var("STORYREEL_MAX_CONCURRENT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_concurrent_generations),
            excerpt_max_chars: std::env::var("STORYREEL_EXCERPT_MAX_CHARS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.excerpt_max_chars),
            keep_scratch: std::env::var("STORYREEL_KEEP_SCRATCH")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            settle_retries: std::env::var("STORYREEL_SETTLE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.settle_retries),
            encode_timeout: Duration::from_secs(
                std::env::var("STORYREEL_ENCODE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.encode_timeout.as_secs()),
            ),
        }
    }

    /// Reject values that would make every generation fail.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.max_concurrent_generations == 0 {
            return Err(WorkerError::config_error(
                "max_concurrent_generations must be at least 1",
            ));
        }
        if self.excerpt_max_chars < 20 {
            return Err(WorkerError::config_error(
                "excerpt_max_chars must be at least 20",
            ));
        }
        if self.scratch_root == self.output_root {
            return Err(WorkerError::config_error(
                "scratch and output directories must differ",
            ));
        }
        Ok(())
    }
}

/// HTTP capability service locations.
#[derive(Debug, Clone)]
pub struct CapabilityEndpoints {
    pub image_url: String,
    pub speech_url: String,
    /// Bearer token sent to the image and speech services
    pub api_key: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Retries for transient failures
    pub max_retries: u32,
}

impl Default for CapabilityEndpoints {
    fn default() -> Self {
        Self {
            image_url: "http://localhost:8010".to_string(),
            speech_url: "http://localhost:8020".to_string(),
            api_key: None,
            timeout: Duration::from_secs(120),
            max_retries: 2,
        }
    }
}

impl CapabilityEndpoints {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            image_url: std::env::var("STORYREEL_IMAGE_URL").unwrap_or(defaults.image_url),
            speech_url: std::env::var("STORYREEL_SPEECH_URL").unwrap_or(defaults.speech_url),
            api_key: std::env::var("STORYREEL_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
            timeout: Duration::from_secs(
                std::env::var("STORYREEL_CAPABILITY_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.timeout.as_secs()),
            ),
            max_retries: std::env::var("STORYREEL_CAPABILITY_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = WorkerConfig::default();
        assert_eq!(config.excerpt_max_chars, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = WorkerConfig {
            max_concurrent_generations: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(WorkerError::ConfigError(_))));
    }

    #[test]
    fn test_validate_rejects_shared_directories() {
        let config = WorkerConfig {
            scratch_root: PathBuf::from("/data"),
            output_root: PathBuf::from("/data"),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_endpoint_defaults() {
        let endpoints = CapabilityEndpoints::default();
        assert_eq!(endpoints.timeout, Duration::from_secs(120));
        assert!(endpoints.api_key.is_none());
    }
}
