//! Capability contracts consumed by the pipeline.
//!
//! Every external generator is reached through one of these traits, so the
//! orchestrator never depends on a vendor SDK. Timeouts and retries live in
//! the adapters.

mod error;
pub mod http;
pub mod music;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use storyreel_models::{ImageStyle, Voice};

pub use error::{CapabilityError, CapabilityResult};
pub use http::{HttpImageGenerator, HttpSpeechSynthesizer, HttpTextSource};
pub use music::LocalMusicLibrary;

/// Input to image generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRequest {
    pub title: String,
    pub category: String,
    pub style: ImageStyle,
    /// Text of the scene to depict (slides), if any
    pub scene: Option<String>,
}

/// A generated still image.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pub path: PathBuf,
    /// Prompt the generator actually used
    pub prompt: String,
    pub model: String,
}

/// Synthesized narration.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedSpeech {
    pub path: PathBuf,
    pub duration_secs: f64,
}

/// A background music track.
#[derive(Debug, Clone, PartialEq)]
pub struct MusicTrack {
    pub id: String,
    pub path: PathBuf,
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate one image and write it to `output`.
    async fn generate(&self, request: &ImageRequest, output: &Path) -> CapabilityResult<GeneratedImage>;

    async fn check_health(&self) -> CapabilityResult<()> {
        Ok(())
    }
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` with `voice` and write the audio to `output`.
    async fn synthesize(
        &self,
        text: &str,
        voice: Voice,
        output: &Path,
    ) -> CapabilityResult<SynthesizedSpeech>;

    async fn check_health(&self) -> CapabilityResult<()> {
        Ok(())
    }
}

#[async_trait]
pub trait MusicLibrary: Send + Sync {
    /// A track matching the story category, if the library has one.
    async fn for_category(&self, category: &str) -> CapabilityResult<Option<MusicTrack>>;

    /// A specific track by id.
    async fn by_id(&self, id: &str) -> CapabilityResult<Option<MusicTrack>>;

    async fn check_health(&self) -> CapabilityResult<()> {
        Ok(())
    }
}

#[async_trait]
pub trait TextSource: Send + Sync {
    /// Raw story text at `url`.
    async fn fetch(&self, url: &str) -> CapabilityResult<String>;

    async fn check_health(&self) -> CapabilityResult<()> {
        Ok(())
    }
}
