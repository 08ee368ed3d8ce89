//! Output format contract and encoder settings.
//!
//! These values target cross-platform playback on short-form platforms:
//! portrait 9:16 H.264 high profile in an MP4 container with the index
//! moved to the front of the file.

use serde::{Deserialize, Serialize};

/// Output frame width in pixels
pub const TARGET_WIDTH: u32 = 1080;
/// Output frame height in pixels
pub const TARGET_HEIGHT: u32 = 1920;
/// Output frame rate
pub const FRAME_RATE: u32 = 30;

/// Length of the fade-in and fade-out edges (seconds)
pub const FADE_SECS: f64 = 0.5;
/// Length of the overlay alpha ramp at each end (seconds)
pub const OVERLAY_RAMP_SECS: f64 = 1.0;

/// Audio normalization applied to every output, regardless of source
pub const AUDIO_NORMALIZATION_FILTER: &str =
    "aformat=sample_fmts=fltp:sample_rates=44100:channel_layouts=stereo";

/// Narration gain in the final mix
pub const NARRATION_VOLUME: f32 = 1.0;
/// Background music gain in the final mix
pub const MUSIC_VOLUME: f32 = 0.15;

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// H.264 profile
pub const DEFAULT_PROFILE: &str = "high";
/// H.264 level
pub const DEFAULT_LEVEL: &str = "4.0";
/// Pixel format
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "medium";
/// Default CRF (Constant Rate Factor)
pub const DEFAULT_CRF: u8 = 23;
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "192k";
/// Output audio sample rate
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
/// Output audio channels
pub const DEFAULT_AUDIO_CHANNELS: u8 = 2;

/// Output frame geometry and rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameFormat {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

impl Default for FrameFormat {
    fn default() -> Self {
        Self {
            width: TARGET_WIDTH,
            height: TARGET_HEIGHT,
            frame_rate: FRAME_RATE,
        }
    }
}

impl FrameFormat {
    /// Number of frames needed to cover `duration_secs`.
    pub fn frame_cap(&self, duration_secs: f64) -> u64 {
        if duration_secs <= 0.0 {
            return 0;
        }
        (duration_secs * f64::from(self.frame_rate)).ceil() as u64
    }
}

/// Encoder settings for the final video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderSettings {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub video_codec: String,
    pub profile: String,
    pub level: String,
    pub pixel_format: String,
    pub preset: String,
    pub crf: u8,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub sample_rate: u32,
    pub audio_channels: u8,
    /// Font file for the text overlay; fontconfig default when unset
    #[serde(default)]
    pub font_file: Option<String>,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            width: TARGET_WIDTH,
            height: TARGET_HEIGHT,
            frame_rate: FRAME_RATE,
            video_codec: DEFAULT_VIDEO_CODEC.to_string(),
            profile: DEFAULT_PROFILE.to_string(),
            level: DEFAULT_LEVEL.to_string(),
            pixel_format: DEFAULT_PIXEL_FORMAT.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            crf: DEFAULT_CRF,
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            audio_channels: DEFAULT_AUDIO_CHANNELS,
            font_file: None,
        }
    }
}

impl EncoderSettings {
    /// Frame size and rate every filter chain renders to.
    pub fn frame(&self) -> FrameFormat {
        FrameFormat {
            width: self.width,
            height: self.height,
            frame_rate: self.frame_rate,
        }
    }

    /// Set the overlay font file.
    pub fn with_font_file(mut self, font_file: impl Into<String>) -> Self {
        self.font_file = Some(font_file.into());
        self
    }

    /// Video codec arguments.
    pub fn video_args(&self) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            self.video_codec.clone(),
            "-profile:v".to_string(),
            self.profile.clone(),
            "-level".to_string(),
            self.level.clone(),
            "-pix_fmt".to_string(),
            self.pixel_format.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-r".to_string(),
            self.frame_rate.to_string(),
        ]
    }

    /// Audio codec arguments.
    pub fn audio_args(&self) -> Vec<String> {
        vec![
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
            "-ar".to_string(),
            self.sample_rate.to_string(),
            "-ac".to_string(),
            self.audio_channels.to_string(),
        ]
    }

    /// Container arguments: index at the front for progressive playback.
    pub fn container_args(&self) -> Vec<String> {
        vec!["-movflags".to_string(), "+faststart".to_string()]
    }
}
