//! FFmpeg CLI wrapper for storyreel.
//!
//! This crate provides:
//! - A typed multi-input FFmpeg command builder and runner
//! - Filter primitives and encoder invocations for still-image clips
//! - FFprobe media inspection
//! - Output validation against the format contract
//! - Narration and music mixing

pub mod command;
pub mod error;
pub mod filters;
pub mod graph;
pub mod mix;
pub mod inspect;
pub mod progress;
pub mod validate;

pub use command::{check_ffmpeg, check_ffprobe, EncodeRunner, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use filters::{escape_drawtext_text, FadeEdges, FilterChain, FilterPrimitive};
pub use graph::{concat_list, EncoderInvocation, FilterGraphBuilder};
pub use mix::{AudioMixer, FfmpegAudioMixer, MixRequest, MixedAudio};
pub use inspect::{inspect_media, FfprobeInspector, MediaInfo, MediaInspector};
pub use progress::{FfmpegProgress, ProgressCallback};
pub use validate::{ExpectedOutput, OutputValidator, ValidationReport, DURATION_TOLERANCE_SECS};
