//! Narration and background music mixing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use storyreel_models::encoding::{AUDIO_NORMALIZATION_FILTER, DEFAULT_SAMPLE_RATE};

use crate::command::{EncodeRunner, FfmpegCommand};
use crate::error::{MediaError, MediaResult};
use crate::filters::fmt_num;
use crate::inspect::MediaInspector;

/// Inputs for one mix.
#[derive(Debug, Clone, PartialEq)]
pub struct MixRequest {
    pub narration: PathBuf,
    /// Background track; `None` passes the narration through
    pub music: Option<PathBuf>,
    pub narration_volume: f32,
    pub music_volume: f32,
    pub output: PathBuf,
}

/// Mixed audio artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct MixedAudio {
    pub path: PathBuf,
    /// Authoritative clip duration in seconds
    pub duration_secs: f64,
}

/// Combines narration with optional music into one audio artifact.
#[async_trait]
pub trait AudioMixer: Send + Sync {
    async fn mix(&self, request: &MixRequest) -> MediaResult<MixedAudio>;
}

/// [`AudioMixer`] running an FFmpeg `amix` graph.
///
/// Music is looped under the narration and the output ends with the narration.
pub struct FfmpegAudioMixer {
    runner: Arc<dyn EncodeRunner>,
    inspector: Arc<dyn MediaInspector>,
}

impl FfmpegAudioMixer {
    pub fn new(runner: Arc<dyn EncodeRunner>, inspector: Arc<dyn MediaInspector>) -> Self {
        Self { runner, inspector }
    }

    /// The FFmpeg command for a mix with music.
    pub fn command(narration: &Path, music: &Path, request: &MixRequest) -> FfmpegCommand {
        let graph = format!(
            "[0:a]volume={nv}[narration];[1:a]volume={mv}[music];\
             [narration][music]amix=inputs=2:duration=first:dropout_transition=0:normalize=0,{norm}[out]",
            nv = fmt_num(f64::from(request.narration_volume)),
            mv = fmt_num(f64::from(request.music_volume)),
            norm = AUDIO_NORMALIZATION_FILTER,
        );

        FfmpegCommand::new(&request.output)
            .input(narration)
            .input_with_args(["-stream_loop", "-1"], music)
            .filter_complex(graph)
            .map("[out]")
            .output_args(["-c:a", "pcm_s16le", "-ar"])
            .output_arg(DEFAULT_SAMPLE_RATE.to_string())
    }
}

#[async_trait]
impl AudioMixer for FfmpegAudioMixer {
    async fn mix(&self, request: &MixRequest) -> MediaResult<MixedAudio> {
        if !request.narration.exists() {
            return Err(MediaError::FileNotFound(request.narration.clone()));
        }

        let Some(music) = &request.music else {
            let info = self.inspector.inspect(&request.narration).await?;
            return Ok(MixedAudio {
                path: request.narration.clone(),
                duration_secs: info.duration,
            });
        };

        if !music.exists() {
            return Err(MediaError::FileNotFound(music.clone()));
        }

        let cmd = Self::command(&request.narration, music, request);
        self.runner.run(&cmd, None).await?;

        let info = self.inspector.inspect(&request.output).await?;
        if info.duration <= 0.0 {
            return Err(MediaError::invalid_media("mixed audio has no duration"));
        }

        info!(
            output = %request.output.display(),
            duration_secs = info.duration,
            "Mixed narration with music"
        );

        Ok(MixedAudio {
            path: request.output.clone(),
            duration_secs: info.duration,
        })
    }
}
