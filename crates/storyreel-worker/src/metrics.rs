//! Generation metrics.

use metrics::{counter, histogram};

use storyreel_models::{GenerationStage, Preset};

/// Metric names as constants for consistency.
pub mod names {
    pub const GENERATIONS_TOTAL: &str = "storyreel_generations_total";
    pub const GENERATION_DURATION_SECONDS: &str = "storyreel_generation_duration_seconds";
    pub const STAGE_FAILURES_TOTAL: &str = "storyreel_stage_failures_total";
    pub const ENCODE_DURATION_SECONDS: &str = "storyreel_encode_duration_seconds";
}

/// Record a settled generation.
pub fn record_generation(outcome: &'static str, preset: Preset, duration_secs: f64) {
    let labels = [
        ("outcome", outcome.to_string()),
        ("preset", preset.as_str().to_string()),
    ];
    counter!(names::GENERATIONS_TOTAL, &labels).increment(1);

    let labels = [("preset", preset.as_str().to_string())];
    histogram!(names::GENERATION_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_stage_failure(stage: GenerationStage) {
    let labels = [("stage", stage.as_str().to_string())];
    counter!(names::STAGE_FAILURES_TOTAL, &labels).increment(1);
}

pub fn record_encode_duration(duration_secs: f64) {
    histogram!(names::ENCODE_DURATION_SECONDS).record(duration_secs);
}
