//! Structured generation logging.

use tracing::{error, info, warn, Span};

use storyreel_models::{GenerationStage, PostId, Preset};

/// Logger that tags every line with the post and preset of one generation.
#[derive(Debug, Clone)]
pub struct GenerationLogger {
    post_id: String,
    preset: Preset,
}

impl GenerationLogger {
    pub fn new(post_id: &PostId, preset: Preset) -> Self {
        Self {
            post_id: post_id.to_string(),
            preset,
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            post_id = %self.post_id,
            preset = %self.preset,
            "Generation started: {}", message
        );
    }

    pub fn log_stage(&self, stage: GenerationStage, message: &str) {
        info!(
            post_id = %self.post_id,
            preset = %self.preset,
            stage = %stage,
            "{}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            post_id = %self.post_id,
            preset = %self.preset,
            "Generation warning: {}", message
        );
    }

    pub fn log_failure(&self, stage: GenerationStage, reason: &str) {
        error!(
            post_id = %self.post_id,
            preset = %self.preset,
            stage = %stage,
            "Generation failed: {}", reason
        );
    }

    pub fn log_completion(&self, duration_secs: f64, latency_ms: u64) {
        info!(
            post_id = %self.post_id,
            preset = %self.preset,
            duration_secs,
            latency_ms,
            "Generation completed"
        );
    }

    pub fn post_id(&self) -> &str {
        &self.post_id
    }

    /// Span covering the whole generation.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "generation",
            post_id = %self.post_id,
            preset = %self.preset
        )
    }
}
