//! Filter primitives for still-image clips.
//!
//! Each primitive is a single named step that renders to FFmpeg filter
//! syntax. A [`FilterChain`] is fully determined by duration, effect flags and
//! overlay text.

use std::f64::consts::FRAC_PI_2;

use storyreel_models::encoding::{AUDIO_NORMALIZATION_FILTER, FADE_SECS, OVERLAY_RAMP_SECS};
use storyreel_models::{EffectsConfig, FrameFormat, Motion};

/// Maximum zoom factor reached at the end of the clip.
pub const MAX_ZOOM: f64 = 1.2;
/// Fixed zoom used while panning.
pub const PAN_ZOOM: f64 = 1.15;

const OVERLAY_FONT_SIZE: u32 = 64;

/// A single video filter step.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterPrimitive {
    /// Repeat the still image for `frames` frames
    Loop { frames: u64, frame_rate: u32 },
    /// Fill and crop to the target portrait frame
    Scale { width: u32, height: u32 },
    /// Slow linear zoom-in over `frames`
    Zoom { frames: u64, frame: FrameFormat },
    /// Left-to-right pan at a fixed zoom over `frames`
    Pan { frames: u64, frame: FrameFormat },
    /// Vignette with lens angle in radians
    Vignette { angle: f64 },
    FadeIn { duration: f64 },
    FadeOut { start: f64, duration: f64 },
    /// Centered text with an alpha ramp at both ends
    TextOverlay {
        text: String,
        clip_duration: f64,
        ramp: f64,
        font_file: Option<String>,
    },
}

impl FilterPrimitive {
    pub fn name(&self) -> &'static str {
        match self {
            FilterPrimitive::Loop { .. } => "loop",
            FilterPrimitive::Scale { .. } => "scale",
            FilterPrimitive::Zoom { .. } => "zoom",
            FilterPrimitive::Pan { .. } => "pan",
            FilterPrimitive::Vignette { .. } => "vignette",
            FilterPrimitive::FadeIn { .. } => "fade_in",
            FilterPrimitive::FadeOut { .. } => "fade_out",
            FilterPrimitive::TextOverlay { .. } => "text_overlay",
        }
    }

    /// Whether this step is a user-facing effect (as opposed to framing).
    pub fn is_effect(&self) -> bool {
        !matches!(
            self,
            FilterPrimitive::Loop { .. } | FilterPrimitive::Scale { .. }
        )
    }

    /// Render to FFmpeg filter syntax.
    pub fn render(&self) -> String {
        match self {
            FilterPrimitive::Loop { frames, frame_rate } => format!(
                "loop=loop={}:size=1:start=0,setpts=N/{}/TB",
                frames.saturating_sub(1),
                frame_rate
            ),
            FilterPrimitive::Scale { width, height } => format!(
                "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},setsar=1",
                w = width,
                h = height
            ),
            FilterPrimitive::Zoom { frames, frame } => format!(
                "zoompan=z='min(1+{step}*on/{frames},{max})':x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':d=1:s={w}x{h}:fps={fps}",
                step = fmt_num(MAX_ZOOM - 1.0),
                frames = (*frames).max(1),
                max = fmt_num(MAX_ZOOM),
                w = frame.width,
                h = frame.height,
                fps = frame.frame_rate
            ),
            FilterPrimitive::Pan { frames, frame } => format!(
                "zoompan=z={zoom}:x='(iw-iw/zoom)*on/{frames}':y='ih/2-(ih/zoom/2)':d=1:s={w}x{h}:fps={fps}",
                zoom = fmt_num(PAN_ZOOM),
                frames = (*frames).max(1),
                w = frame.width,
                h = frame.height,
                fps = frame.frame_rate
            ),
            FilterPrimitive::Vignette { angle } => format!("vignette=angle={:.4}", angle),
            FilterPrimitive::FadeIn { duration } => {
                format!("fade=t=in:st=0:d={}", fmt_num(*duration))
            }
            FilterPrimitive::FadeOut { start, duration } => {
                format!("fade=t=out:st={}:d={}", fmt_num(*start), fmt_num(*duration))
            }
            FilterPrimitive::TextOverlay {
                text,
                clip_duration,
                ramp,
                font_file,
            } => {
                let font = font_file
                    .as_ref()
                    .map(|f| format!("fontfile='{}':", escape_filter_path(f)))
                    .unwrap_or_default();
                let hold_end = (clip_duration - ramp).max(*ramp);
                format!(
                    "drawtext={font}text='{text}':fontcolor=white:fontsize={size}:\
                     x=(w-text_w)/2:y=h*0.18:box=1:boxcolor=black@0.4:boxborderw=24:\
                     alpha='if(lt(t,{ramp}),t/{ramp},if(lt(t,{hold}),1,max(0,({end}-t)/{ramp})))'",
                    font = font,
                    text = escape_drawtext_text(text),
                    size = OVERLAY_FONT_SIZE,
                    ramp = fmt_num(*ramp),
                    hold = fmt_num(hold_end),
                    end = fmt_num(*clip_duration),
                )
            }
        }
    }
}

/// Audio filter step. Every output is normalized the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioPrimitive {
    Normalize,
}

impl AudioPrimitive {
    pub fn render(&self) -> &'static str {
        match self {
            AudioPrimitive::Normalize => AUDIO_NORMALIZATION_FILTER,
        }
    }
}

/// Which clip edges get a fade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadeEdges {
    pub fade_in: bool,
    pub fade_out: bool,
}

impl FadeEdges {
    pub const BOTH: FadeEdges = FadeEdges {
        fade_in: true,
        fade_out: true,
    };
}

/// Ordered video filter steps plus the parallel audio step.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterChain {
    pub video: Vec<FilterPrimitive>,
    pub audio: AudioPrimitive,
}

impl FilterChain {
    /// Chain for a whole clip: fades on both edges.
    pub fn build(
        duration_secs: f64,
        overlay_text: &str,
        effects: &EffectsConfig,
        frame: FrameFormat,
        font_file: Option<&str>,
    ) -> Self {
        Self::build_segment(duration_secs, overlay_text, effects, FadeEdges::BOTH, frame, font_file)
    }

    /// Chain for one segment of a longer clip.
    ///
    /// Order is fixed: loop, scale, motion, vignette, fade-in, fade-out, overlay.
    pub fn build_segment(
        duration_secs: f64,
        overlay_text: &str,
        effects: &EffectsConfig,
        edges: FadeEdges,
        frame: FrameFormat,
        font_file: Option<&str>,
    ) -> Self {
        let duration = duration_secs.max(0.0);
        let frames = frame.frame_cap(duration);
        let mut video = vec![
            FilterPrimitive::Loop {
                frames,
                frame_rate: frame.frame_rate,
            },
            FilterPrimitive::Scale {
                width: frame.width,
                height: frame.height,
            },
        ];

        match effects.motion() {
            Some(Motion::Zoom) => video.push(FilterPrimitive::Zoom { frames, frame }),
            Some(Motion::Pan) => video.push(FilterPrimitive::Pan { frames, frame }),
            None => {}
        }

        if effects.vignette_enabled() {
            let strength = f64::from(effects.vignette_strength).min(1.0);
            video.push(FilterPrimitive::Vignette {
                angle: strength * FRAC_PI_2,
            });
        }

        if effects.fade {
            if edges.fade_in {
                video.push(FilterPrimitive::FadeIn {
                    duration: FADE_SECS,
                });
            }
            if edges.fade_out {
                video.push(FilterPrimitive::FadeOut {
                    start: (duration - FADE_SECS).max(0.0),
                    duration: FADE_SECS,
                });
            }
        }

        let text = overlay_text.trim();
        if !text.is_empty() {
            video.push(FilterPrimitive::TextOverlay {
                text: text.to_string(),
                clip_duration: duration,
                ramp: OVERLAY_RAMP_SECS,
                font_file: font_file.map(str::to_string),
            });
        }

        Self {
            video,
            audio: AudioPrimitive::Normalize,
        }
    }

    /// Rendered `-vf` value.
    pub fn render_video(&self) -> String {
        self.video
            .iter()
            .map(FilterPrimitive::render)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Rendered `-af` value.
    pub fn render_audio(&self) -> &'static str {
        self.audio.render()
    }

    /// Names of the applied effects, in order.
    pub fn effect_names(&self) -> Vec<String> {
        self.video
            .iter()
            .filter(|p| p.is_effect())
            .map(|p| p.name().to_string())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.video.iter().any(|p| p.name() == name)
    }
}

/// Escape text for a single-quoted drawtext `text` option.
///
/// Backslashes, colons and percent signs are escaped for the filter and
/// drawtext expansion levels; single quotes become a typographic apostrophe
/// and line breaks collapse to spaces.
pub fn escape_drawtext_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\\\\\"),
            '\'' => out.push('\u{2019}'),
            ':' => out.push_str("\\:"),
            '%' => out.push_str("\\\\%"),
            '\r' => {}
            '\n' | '\t' => out.push(' '),
            _ => out.push(c),
        }
    }
    out
}

/// Escape a file path used inside a quoted filter option.
pub fn escape_filter_path(path: &str) -> String {
    path.replace('\\', "/")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// Format seconds without trailing zeros (`11.5`, `0`, `0.25`).
pub(crate) fn fmt_num(value: f64) -> String {
    let s = format!("{:.3}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}
