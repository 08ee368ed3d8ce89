//! Generation request models.
//!
//! A [`GenerationRequest`] is the immutable input to one video generation.
//! Voice and preset are closed enums, so unknown values are rejected while
//! the request is deserialized, before any external call is made.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use validator::Validate;

/// Reference to the stored story the video is generated from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct StoryRef {
    /// Location of the full story body (fetched through text retrieval)
    #[validate(url)]
    pub text_url: String,
    /// Story title, passed to the image generator
    #[serde(default)]
    pub title: String,
    /// Story category (e.g. "Contemporary", "Billionaire"); used for music lookup
    pub category: String,
    /// Free-form intensity tag; see [`Intensity::from_tag`]
    #[serde(default)]
    pub intensity: String,
}

impl StoryRef {
    /// Parsed intensity of the story.
    pub fn intensity(&self) -> Intensity {
        Intensity::from_tag(&self.intensity)
    }
}

/// Story intensity, derived leniently from the stored tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    Mild,
    #[default]
    Moderate,
    Spicy,
}

impl Intensity {
    /// Parse an intensity tag. Unknown or empty tags map to `Moderate`.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "mild" | "sweet" | "low" => Intensity::Mild,
            "spicy" | "hot" | "high" => Intensity::Spicy,
            _ => Intensity::Moderate,
        }
    }

    /// Image style requested from the image generator for this intensity.
    pub fn image_style(&self) -> ImageStyle {
        match self {
            Intensity::Mild => ImageStyle::SoftRomantic,
            Intensity::Moderate => ImageStyle::CinematicRomantic,
            Intensity::Spicy => ImageStyle::DramaticSensual,
        }
    }
}

/// Style parameter sent to the image generation capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ImageStyle {
    SoftRomantic,
    CinematicRomantic,
    DramaticSensual,
}

impl ImageStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageStyle::SoftRomantic => "soft_romantic",
            ImageStyle::CinematicRomantic => "cinematic_romantic",
            ImageStyle::DramaticSensual => "dramatic_sensual",
        }
    }
}

impl fmt::Display for ImageStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Named narration voice presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Voice {
    #[default]
    FemaleSoft,
    FemaleWarm,
    MaleDeep,
    MaleWarm,
    Narrator,
}

impl Voice {
    pub const ALL: &'static [Voice] = &[
        Voice::FemaleSoft,
        Voice::FemaleWarm,
        Voice::MaleDeep,
        Voice::MaleWarm,
        Voice::Narrator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Voice::FemaleSoft => "female_soft",
            Voice::FemaleWarm => "female_warm",
            Voice::MaleDeep => "male_deep",
            Voice::MaleWarm => "male_warm",
            Voice::Narrator => "narrator",
        }
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Voice {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Voice::ALL
            .iter()
            .find(|v| v.as_str() == s.to_lowercase())
            .copied()
            .ok_or_else(|| UnknownVariant::new("voice", s))
    }
}

/// Composition strategy preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// One generated image for the whole clip
    #[default]
    SingleImage,
    /// Several generated images shown as consecutive slides
    MultiSlide,
}

impl Preset {
    pub const ALL: &'static [Preset] = &[Preset::SingleImage, Preset::MultiSlide];

    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::SingleImage => "single_image",
            Preset::MultiSlide => "multi_slide",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Preset {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .iter()
            .find(|p| p.as_str() == s.to_lowercase())
            .copied()
            .ok_or_else(|| UnknownVariant::new("preset", s))
    }
}

#[derive(Debug, Error)]
#[error("Unknown {kind}: {value}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Background music preference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum MusicPreference {
    /// No background music
    None,
    /// Pick a track matching the story category
    #[default]
    Auto,
    /// A specific library track id
    Track(String),
}

/// Camera motion applied to the still image. Zoom and pan are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Motion {
    Zoom,
    Pan,
}

/// Named effect toggles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EffectsConfig {
    /// Slow zoom-in (Ken Burns)
    #[serde(default = "default_true")]
    pub zoom: bool,
    /// Horizontal pan; ignored when `zoom` is also set
    #[serde(default)]
    pub pan: bool,
    /// Vignette strength in (0, 1]; 0 disables
    #[serde(default = "default_vignette")]
    pub vignette_strength: f32,
    /// Fade in and out at the clip edges
    #[serde(default = "default_true")]
    pub fade: bool,
    /// Draw the hook/caption over the video
    #[serde(default = "default_true")]
    pub text_overlay: bool,
}

fn default_true() -> bool {
    true
}

fn default_vignette() -> f32 {
    0.5
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            zoom: true,
            pan: false,
            vignette_strength: default_vignette(),
            fade: true,
            text_overlay: true,
        }
    }
}

impl EffectsConfig {
    /// All effects off.
    pub fn none() -> Self {
        Self {
            zoom: false,
            pan: false,
            vignette_strength: 0.0,
            fade: false,
            text_overlay: false,
        }
    }

    /// All effects on (zoom takes the motion slot).
    pub fn all() -> Self {
        Self {
            zoom: true,
            pan: true,
            vignette_strength: 1.0,
            fade: true,
            text_overlay: true,
        }
    }

    /// The single motion effect to apply, if any.
    pub fn motion(&self) -> Option<Motion> {
        if self.zoom {
            Some(Motion::Zoom)
        } else if self.pan {
            Some(Motion::Pan)
        } else {
            None
        }
    }

    pub fn vignette_enabled(&self) -> bool {
        self.vignette_strength > 0.0
    }
}

/// Immutable input for one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct GenerationRequest {
    #[validate(nested)]
    pub story: StoryRef,
    /// Post caption
    #[serde(default)]
    #[validate(length(max = 2200))]
    pub caption: String,
    /// Opening hook, spoken before the excerpt and used as overlay text
    #[serde(default)]
    #[validate(length(max = 200))]
    pub hook: Option<String>,
    /// Call to action for the post
    #[serde(default)]
    #[validate(length(max = 200))]
    pub call_to_action: Option<String>,
    #[serde(default)]
    pub voice: Voice,
    #[serde(default)]
    pub music: MusicPreference,
    #[serde(default)]
    pub effects: EffectsConfig,
    #[serde(default)]
    pub preset: Preset,
    /// Explicit output file; defaults to a unique file in the output area
    #[serde(default)]
    pub output_path: Option<PathBuf>,
}

impl GenerationRequest {
    /// Create a request with defaults for everything but the story.
    pub fn new(story: StoryRef) -> Self {
        Self {
            story,
            caption: String::new(),
            hook: None,
            call_to_action: None,
            voice: Voice::default(),
            music: MusicPreference::default(),
            effects: EffectsConfig::default(),
            preset: Preset::default(),
            output_path: None,
        }
    }

    /// Hook text, if present and non-blank.
    pub fn hook_text(&self) -> Option<&str> {
        self.hook.as_deref().map(str::trim).filter(|h| !h.is_empty())
    }

    /// Text drawn over the video: the hook, falling back to the caption.
    /// Empty when the overlay effect is disabled.
    pub fn overlay_text(&self) -> String {
        if !self.effects.text_overlay {
            return String::new();
        }
        self.hook_text()
            .map(str::to_string)
            .unwrap_or_else(|| self.caption.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn story() -> StoryRef {
        StoryRef {
            text_url: "https://stories.example.com/s/1.txt".to_string(),
            title: "The Offer".to_string(),
            category: "Billionaire".to_string(),
            intensity: "spicy".to_string(),
        }
    }

    #[test]
    fn test_unknown_voice_rejected() {
        let json = r#"{"story":{"text_url":"https://x.example/a","category":"c"},"voice":"robot"}"#;
        assert!(serde_json::from_str::<GenerationRequest>(json).is_err());
    }

    #[test]
    fn test_unknown_preset_rejected() {
        let json = r#"{"story":{"text_url":"https://x.example/a","category":"c"},"preset":"collage"}"#;
        assert!(serde_json::from_str::<GenerationRequest>(json).is_err());
    }

    #[test]
    fn test_defaults_from_minimal_json() {
        let json = r#"{"story":{"text_url":"https://x.example/a","category":"Contemporary"}}"#;
        let req: GenerationRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.voice, Voice::FemaleSoft);
        assert_eq!(req.preset, Preset::SingleImage);
        assert_eq!(req.music, MusicPreference::Auto);
        assert_eq!(req.effects, EffectsConfig::default());
    }

    #[test]
    fn test_music_preference_track() {
        let json = r#"{"story":{"text_url":"https://x.example/a","category":"c"},"music":{"track":"velvet-night"}}"#;
        let req: GenerationRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.music, MusicPreference::Track("velvet-night".to_string()));
    }

    #[test]
    fn test_validation() {
        let mut req = GenerationRequest::new(story());
        assert!(req.validate().is_ok());

        req.hook = Some("x".repeat(201));
        assert!(req.validate().is_err());

        let mut bad_url = GenerationRequest::new(story());
        bad_url.story.text_url = "not a url".to_string();
        assert!(bad_url.validate().is_err());
    }

    #[test]
    fn test_intensity_mapping() {
        assert_eq!(Intensity::from_tag("Spicy"), Intensity::Spicy);
        assert_eq!(Intensity::from_tag(""), Intensity::Moderate);
        assert_eq!(Intensity::from_tag("unknown"), Intensity::Moderate);
        assert_eq!(Intensity::Mild.image_style(), ImageStyle::SoftRomantic);
        assert_eq!(story().intensity().image_style(), ImageStyle::DramaticSensual);
    }

    #[test]
    fn test_motion_exclusive() {
        assert_eq!(EffectsConfig::all().motion(), Some(Motion::Zoom));
        let pan_only = EffectsConfig {
            zoom: false,
            pan: true,
            ..EffectsConfig::none()
        };
        assert_eq!(pan_only.motion(), Some(Motion::Pan));
        assert_eq!(EffectsConfig::none().motion(), None);
    }

    #[test]
    fn test_overlay_text() {
        let mut req = GenerationRequest::new(story());
        req.caption = "Caption here".to_string();
        assert_eq!(req.overlay_text(), "Caption here");

        req.hook = Some("  He said yes.  ".to_string());
        assert_eq!(req.overlay_text(), "He said yes.");

        req.effects.text_overlay = false;
        assert_eq!(req.overlay_text(), "");
    }

    #[test]
    fn test_voice_from_str() {
        assert_eq!("male_deep".parse::<Voice>().unwrap(), Voice::MaleDeep);
        assert!("whisper".parse::<Voice>().is_err());
        assert_eq!("MULTI_SLIDE".parse::<Preset>().unwrap(), Preset::MultiSlide);
    }
}
