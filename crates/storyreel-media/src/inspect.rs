//! FFprobe media inspection.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Media file information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Duration in seconds
    pub duration: f64,
    /// Width in pixels (None for audio-only files)
    pub width: Option<u32>,
    /// Height in pixels (None for audio-only files)
    pub height: Option<u32>,
    pub has_audio: bool,
    /// Video codec, if any
    pub video_codec: Option<String>,
    /// File size in bytes
    pub size: u64,
}

impl MediaInfo {
    pub fn has_video(&self) -> bool {
        self.width.is_some() && self.height.is_some()
    }
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

/// Reports duration and dimensions of a media artifact.
#[async_trait]
pub trait MediaInspector: Send + Sync {
    async fn inspect(&self, path: &Path) -> MediaResult<MediaInfo>;
}

/// [`MediaInspector`] backed by the `ffprobe` binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfprobeInspector;

#[async_trait]
impl MediaInspector for FfprobeInspector {
    async fn inspect(&self, path: &Path) -> MediaResult<MediaInfo> {
        inspect_media(path).await
    }
}

/// Inspect a media file with FFprobe.
pub async fn inspect_media(path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("FFprobe failed for {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_ffprobe_output(&output.stdout)
}

fn parse_ffprobe_output(stdout: &[u8]) -> MediaResult<MediaInfo> {
    let report: FfprobeOutput = serde_json::from_slice(stdout)?;

    let video = report.streams.iter().find(|s| s.codec_type == "video");
    let has_audio = report.streams.iter().any(|s| s.codec_type == "audio");

    if video.is_none() && !has_audio {
        return Err(MediaError::invalid_media("No audio or video stream found"));
    }

    // Container duration first, then the longest stream duration
    let duration = report
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .or_else(|| {
            report
                .streams
                .iter()
                .filter_map(|s| s.duration.as_deref()?.parse::<f64>().ok())
                .reduce(f64::max)
        })
        .unwrap_or(0.0);

    let size = report
        .format
        .size
        .as_deref()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    Ok(MediaInfo {
        duration,
        width: video.and_then(|v| v.width),
        height: video.and_then(|v| v.height),
        has_audio,
        video_codec: video.and_then(|v| v.codec_name.clone()),
        size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_video_output() {
        let json = br#"{
            "streams": [
                {"codec_type": "video", "codec_name": "h264", "width": 1080, "height": 1920},
                {"codec_type": "audio", "codec_name": "aac"}
            ],
            "format": {"duration": "12.033000", "size": "2048000"}
        }"#;
        let info = parse_ffprobe_output(json).unwrap();
        assert!((info.duration - 12.033).abs() < 0.001);
        assert_eq!(info.width, Some(1080));
        assert_eq!(info.height, Some(1920));
        assert!(info.has_audio);
        assert!(info.has_video());
        assert_eq!(info.video_codec.as_deref(), Some("h264"));
    }

    #[test]
    fn test_parse_audio_only_uses_stream_duration() {
        let json = br#"{
            "streams": [{"codec_type": "audio", "codec_name": "mp3", "duration": "41.5"}],
            "format": {}
        }"#;
        let info = parse_ffprobe_output(json).unwrap();
        assert!((info.duration - 41.5).abs() < 0.001);
        assert!(!info.has_video());
    }

    #[test]
    fn test_parse_no_streams() {
        let json = br#"{"streams": [], "format": {"duration": "1.0"}}"#;
        assert!(matches!(
            parse_ffprobe_output(json),
            Err(MediaError::InvalidMedia(_))
        ));
    }

    #[tokio::test]
    async fn test_inspect_missing_file() {
        let result = inspect_media("/nonexistent/clip.mp4").await;
        assert!(matches!(result, Err(MediaError::FileNotFound(_))));
    }
}
