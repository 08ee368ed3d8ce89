//! Shared data models for storyreel.
//!
//! This crate provides Serde-serializable types for:
//! - Generation requests, voices, presets and effect toggles
//! - Generation results and pipeline stages
//! - The per-post generation state machine
//! - Output encoding constants
//! - Cost tables and breakdowns

pub mod cost;
pub mod encoding;
pub mod generation_state;
pub mod post;
pub mod request;
pub mod result;

// Re-export common types
pub use cost::{CostBreakdown, CostLineItem, CostTable};
pub use encoding::{EncoderSettings, FrameFormat};
pub use generation_state::{GenerationState, TransitionError};
pub use post::{PostId, PostRecord, PostStatus};
pub use request::{
    EffectsConfig, GenerationRequest, ImageStyle, Intensity, Motion, MusicPreference, Preset,
    StoryRef, UnknownVariant, Voice,
};
pub use result::{
    GeneratedVideo, GenerationFailure, GenerationMetadata, GenerationResult, GenerationStage,
};
