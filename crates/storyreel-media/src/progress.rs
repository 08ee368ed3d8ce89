//! FFmpeg progress parsing.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Progress information from FFmpeg's `-progress` output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Fraction of `total_secs` encoded so far, in [0, 1].
    pub fn fraction(&self, total_secs: f64) -> f64 {
        if self.is_complete {
            return 1.0;
        }
        if total_secs <= 0.0 || self.out_time_ms <= 0 {
            return 0.0;
        }
        (self.out_time_ms as f64 / 1000.0 / total_secs).min(1.0)
    }

    /// Update from one `key=value` line. Returns a snapshot at the end of
    /// each progress block.
    pub fn apply_line(&mut self, line: &str) -> Option<FfmpegProgress> {
        let (key, value) = line.trim().split_once('=')?;
        match key {
            // Both keys carry microseconds despite the name
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.parse::<i64>() {
                    self.out_time_ms = us / 1000;
                }
            }
            "frame" => {
                if let Ok(frame) = value.parse() {
                    self.frame = frame;
                }
            }
            "speed" => {
                if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                    self.speed = speed;
                }
            }
            "progress" => {
                if value == "end" {
                    self.is_complete = true;
                }
                return Some(self.clone());
            }
            _ => {}
        }
        None
    }
}

/// True for lines that belong to the `-progress` key/value stream.
pub fn is_progress_line(line: &str) -> bool {
    const KEYS: &[&str] = &[
        "frame",
        "fps",
        "stream_0_0_q",
        "bitrate",
        "total_size",
        "out_time_us",
        "out_time_ms",
        "out_time",
        "dup_frames",
        "drop_frames",
        "speed",
        "progress",
    ];
    match line.trim().split_once('=') {
        Some((key, _)) => KEYS.contains(&key) || key.starts_with("stream_"),
        None => false,
    }
}

/// Callback type for progress updates.
pub type ProgressCallback = Arc<dyn Fn(FfmpegProgress) + Send + Sync + 'static>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_lines() {
        let mut progress = FfmpegProgress::default();
        assert!(progress.apply_line("out_time_us=6000000").is_none());
        assert_eq!(progress.out_time_ms, 6000);

        progress.apply_line("speed=2.5x");
        assert!((progress.speed - 2.5).abs() < 0.01);

        progress.apply_line("speed=N/A");
        assert!((progress.speed - 2.5).abs() < 0.01);

        let snapshot = progress.apply_line("progress=continue").unwrap();
        assert!(!snapshot.is_complete);
        assert!((snapshot.fraction(12.0) - 0.5).abs() < 0.001);

        let snapshot = progress.apply_line("progress=end").unwrap();
        assert_eq!(snapshot.fraction(12.0), 1.0);
    }

    #[test]
    fn test_is_progress_line() {
        assert!(is_progress_line("out_time_us=100"));
        assert!(is_progress_line("progress=end"));
        assert!(!is_progress_line("[libx264 @ 0x1] using cpu capabilities"));
        assert!(!is_progress_line("Error opening input file a.png."));
    }
}
