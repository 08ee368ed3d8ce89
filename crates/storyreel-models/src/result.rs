//! Generation result models.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::{CostBreakdown, Preset, Voice};

/// Pipeline stage, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStage {
    /// Request validation, source text retrieval and length checks
    Precondition,
    /// Creating scratch and output locations
    Storage,
    Image,
    /// Scene excerpt selection and speech synthesis
    Narration,
    Music,
    Mixing,
    Encoding,
    Validation,
    /// Unexpected errors outside the stage sequence (panics, lost tasks)
    Internal,
}

impl GenerationStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStage::Precondition => "precondition",
            GenerationStage::Storage => "storage",
            GenerationStage::Image => "image",
            GenerationStage::Narration => "narration",
            GenerationStage::Music => "music",
            GenerationStage::Mixing => "mixing",
            GenerationStage::Encoding => "encoding",
            GenerationStage::Validation => "validation",
            GenerationStage::Internal => "internal",
        }
    }

    /// Human label for progress displays.
    pub fn label(&self) -> &'static str {
        match self {
            GenerationStage::Precondition => "Checking story",
            GenerationStage::Storage => "Preparing workspace",
            GenerationStage::Image => "Generating image",
            GenerationStage::Narration => "Synthesizing narration",
            GenerationStage::Music => "Selecting music",
            GenerationStage::Mixing => "Mixing audio",
            GenerationStage::Encoding => "Encoding video",
            GenerationStage::Validation => "Validating output",
            GenerationStage::Internal => "Internal",
        }
    }
}

impl fmt::Display for GenerationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-stage metadata of a successful generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub preset: Preset,
    /// Model reported by the image generator
    pub image_model: String,
    /// Prompts reported by the image generator, one per image
    pub image_prompts: Vec<String>,
    pub voice: Voice,
    /// Text that was narrated (hook + excerpt)
    pub narration_text: String,
    pub narration_chars: usize,
    /// Background track used, if any
    pub music_track: Option<String>,
    /// Applied effect names in filter order
    pub effects: Vec<String>,
    pub slide_count: u32,
    pub latency_ms: u64,
    pub estimated_cost: CostBreakdown,
}

/// Successful generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedVideo {
    /// Final artifact in the durable output area
    pub video_path: PathBuf,
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    pub metadata: GenerationMetadata,
}

/// Failed generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationFailure {
    pub stage: GenerationStage,
    pub reason: String,
}

impl GenerationFailure {
    pub fn new(stage: GenerationStage, reason: impl Into<String>) -> Self {
        Self {
            stage,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for GenerationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.reason)
    }
}

/// Outcome of one orchestrator invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GenerationResult {
    Success(GeneratedVideo),
    Failure(GenerationFailure),
}

impl GenerationResult {
    pub fn failure(stage: GenerationStage, reason: impl Into<String>) -> Self {
        Self::Failure(GenerationFailure::new(stage, reason))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, GenerationResult::Success(_))
    }

    pub fn video(&self) -> Option<&GeneratedVideo> {
        match self {
            GenerationResult::Success(video) => Some(video),
            GenerationResult::Failure(_) => None,
        }
    }

    pub fn failure_info(&self) -> Option<&GenerationFailure> {
        match self {
            GenerationResult::Success(_) => None,
            GenerationResult::Failure(failure) => Some(failure),
        }
    }

    pub fn outcome_label(&self) -> &'static str {
        match self {
            GenerationResult::Success(_) => "success",
            GenerationResult::Failure(_) => "failure",
        }
    }
}
