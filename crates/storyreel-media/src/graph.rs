//! Encoder invocations built from a [`FilterChain`].
//!
//! Video and audio filters are passed as separate `-vf` / `-af` options
//! rather than one `-filter_complex` graph; the fused form has been unreliable
//! with the zoompan and drawtext combination on some FFmpeg builds.

use std::path::{Path, PathBuf};

use storyreel_models::{EffectsConfig, EncoderSettings};

use crate::command::FfmpegCommand;
use crate::filters::{FadeEdges, FilterChain};

/// A fully specified encode: filter chain plus the FFmpeg command running it.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderInvocation {
    pub chain: FilterChain,
    pub command: FfmpegCommand,
    pub duration_secs: f64,
    pub frame_cap: u64,
}

impl EncoderInvocation {
    pub fn args(&self) -> Vec<String> {
        self.command.build_args()
    }

    pub fn output(&self) -> &Path {
        self.command.output_path()
    }

    /// Names of the applied effects, in order.
    pub fn effect_names(&self) -> Vec<String> {
        self.chain.effect_names()
    }
}

/// Builds encoder invocations for still-image clips.
#[derive(Debug, Clone, Default)]
pub struct FilterGraphBuilder {
    settings: EncoderSettings,
}

impl FilterGraphBuilder {
    pub fn new(settings: EncoderSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &EncoderSettings {
        &self.settings
    }

    /// Chain for a whole clip.
    pub fn chain(&self, duration_secs: f64, overlay_text: &str, effects: &EffectsConfig) -> FilterChain {
        FilterChain::build(
            duration_secs,
            overlay_text,
            effects,
            self.settings.frame(),
            self.settings.font_file.as_deref(),
        )
    }

    /// Image plus narration audio into the final video.
    pub fn build(
        &self,
        image: &Path,
        audio: &Path,
        output: &Path,
        duration_secs: f64,
        overlay_text: &str,
        effects: &EffectsConfig,
    ) -> EncoderInvocation {
        let chain = self.chain(duration_secs, overlay_text, effects);
        let frames = self.settings.frame().frame_cap(duration_secs);

        let command = FfmpegCommand::new(output)
            .input_with_args(self.image_input_args(), image)
            .input(audio)
            .map("0:v:0")
            .map("1:a:0")
            .video_filter(chain.render_video())
            .audio_filter(chain.render_audio())
            .output_args(self.settings.video_args())
            .output_args(self.settings.audio_args())
            .frames(frames)
            .output_args(self.settings.container_args());

        EncoderInvocation {
            chain,
            command,
            duration_secs,
            frame_cap: frames,
        }
    }

    /// One silent slide segment of a multi-slide video.
    pub fn build_segment(
        &self,
        image: &Path,
        output: &Path,
        duration_secs: f64,
        overlay_text: &str,
        effects: &EffectsConfig,
        edges: FadeEdges,
    ) -> EncoderInvocation {
        let chain = FilterChain::build_segment(
            duration_secs,
            overlay_text,
            effects,
            edges,
            self.settings.frame(),
            self.settings.font_file.as_deref(),
        );
        let frames = self.settings.frame().frame_cap(duration_secs);

        let command = FfmpegCommand::new(output)
            .input_with_args(self.image_input_args(), image)
            .video_filter(chain.render_video())
            .output_args(self.settings.video_args())
            .frames(frames)
            .no_audio();

        EncoderInvocation {
            chain,
            command,
            duration_secs,
            frame_cap: frames,
        }
    }

    /// Join encoded segments (listed in `concat_list`) and mux the narration.
    pub fn build_concat(
        &self,
        concat_list: &Path,
        audio: &Path,
        output: &Path,
        duration_secs: f64,
    ) -> FfmpegCommand {
        FfmpegCommand::new(output)
            .input_with_args(["-f", "concat", "-safe", "0"], concat_list)
            .input(audio)
            .map("0:v:0")
            .map("1:a:0")
            .output_args(["-c:v", "copy"])
            .audio_filter(storyreel_models::encoding::AUDIO_NORMALIZATION_FILTER)
            .output_args(self.settings.audio_args())
            .frames(self.settings.frame().frame_cap(duration_secs))
            .output_args(self.settings.container_args())
    }

    fn image_input_args(&self) -> Vec<String> {
        vec!["-framerate".to_string(), self.settings.frame_rate.to_string()]
    }
}

/// Contents of a concat demuxer list for `segments`.
pub fn concat_list(segments: &[PathBuf]) -> String {
    segments
        .iter()
        .map(|p| format!("file '{}'\n", p.to_string_lossy().replace('\'', "'\\''")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(builder: &FilterGraphBuilder, effects: &EffectsConfig) -> EncoderInvocation {
        builder.build(
            Path::new("/scratch/image.png"),
            Path::new("/scratch/mixed.wav"),
            Path::new("/out/post.mp4"),
            12.0,
            "Hook line",
            effects,
        )
    }

    #[test]
    fn test_single_image_invocation() {
        let invocation = build(&FilterGraphBuilder::default(), &EffectsConfig::default());
        let cmd = &invocation.command;

        assert_eq!(invocation.frame_cap, 360);
        assert_eq!(cmd.output_value("-frames:v"), Some("360"));
        assert_eq!(cmd.output_value("-movflags"), Some("+faststart"));
        assert_eq!(cmd.output_value("-c:v"), Some("libx264"));
        assert_eq!(cmd.output_value("-profile:v"), Some("high"));
        assert_eq!(
            cmd.output_value("-af"),
            Some("aformat=sample_fmts=fltp:sample_rates=44100:channel_layouts=stereo")
        );
        assert!(cmd.output_value("-filter_complex").is_none());
        assert_eq!(cmd.inputs().len(), 2);
        assert_eq!(invocation.output(), Path::new("/out/post.mp4"));
    }

    #[test]
    fn test_music_disabled_all_effects() {
        let invocation = build(&FilterGraphBuilder::default(), &EffectsConfig::all());
        assert_eq!(
            invocation.effect_names(),
            vec!["zoom", "vignette", "fade_in", "fade_out", "text_overlay"]
        );
        let vf = invocation.command.output_value("-vf").unwrap();
        assert!(vf.contains("fade=t=out:st=11.5:d=0.5"));
    }

    #[test]
    fn test_identical_inputs_identical_args() {
        let builder = FilterGraphBuilder::default();
        let a = build(&builder, &EffectsConfig::all());
        let b = build(&builder, &EffectsConfig::all());
        assert_eq!(a.args(), b.args());
    }

    #[test]
    fn test_custom_frame_matches_settings() {
        let settings = EncoderSettings {
            width: 720,
            height: 1280,
            frame_rate: 24,
            ..EncoderSettings::default()
        };
        let invocation = build(&FilterGraphBuilder::new(settings), &EffectsConfig::all());
        let vf = invocation.command.output_value("-vf").unwrap();

        assert!(vf.contains("crop=720:1280"));
        assert!(vf.contains("s=720x1280:fps=24"));
        assert!(!vf.contains("1080"));
        assert_eq!(invocation.frame_cap, 288);
        assert_eq!(invocation.command.output_value("-frames:v"), Some("288"));
        assert_eq!(invocation.command.output_value("-r"), Some("24"));
    }

    #[test]
    fn test_font_file_from_settings() {
        let builder = FilterGraphBuilder::new(EncoderSettings::default().with_font_file("/fonts/Inter.ttf"));
        let invocation = build(&builder, &EffectsConfig::default());
        let vf = invocation.command.output_value("-vf").unwrap();
        assert!(vf.contains("fontfile='/fonts/Inter.ttf'"));
    }

    #[test]
    fn test_segment_is_silent() {
        let invocation = FilterGraphBuilder::default().build_segment(
            Path::new("a.png"),
            Path::new("seg0.mp4"),
            4.0,
            "",
            &EffectsConfig::default(),
            FadeEdges::BOTH,
        );
        let args = invocation.args();
        assert!(args.contains(&"-an".to_string()));
        assert!(!args.contains(&"-af".to_string()));
        assert_eq!(invocation.frame_cap, 120);
    }

    #[test]
    fn test_concat_list_quotes_paths() {
        let list = concat_list(&[PathBuf::from("/s/seg0.mp4"), PathBuf::from("/s/it's.mp4")]);
        assert_eq!(list, "file '/s/seg0.mp4'\nfile '/s/it'\\''s.mp4'\n");
    }
}
