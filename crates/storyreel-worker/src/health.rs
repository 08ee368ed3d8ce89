//! Capability liveness aggregation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Instant;

use storyreel_media::{check_ffmpeg, check_ffprobe};

use crate::capabilities::CapabilityResult;
use crate::orchestrator::Capabilities;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl CheckStatus {
    fn ok(latency_ms: u64) -> Self {
        Self {
            status: "ok".to_string(),
            error: None,
            latency_ms: Some(latency_ms),
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error: Some(msg.into()),
            latency_ms: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Aggregated health: `ready` when every check passes, `degraded` otherwise.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: String,
    pub checks: BTreeMap<String, CheckStatus>,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    pub fn is_ready(&self) -> bool {
        self.status == "ready"
    }
}

async fn timed<F>(check: F) -> CheckStatus
where
    F: Future<Output = CapabilityResult<()>>,
{
    let start = Instant::now();
    match check.await {
        Ok(()) => CheckStatus::ok(start.elapsed().as_millis() as u64),
        Err(e) => CheckStatus::error(e.to_string()),
    }
}

fn tool_check<T, E: std::fmt::Display>(result: Result<T, E>) -> CheckStatus {
    match result {
        Ok(_) => CheckStatus::ok(0),
        Err(e) => CheckStatus::error(e.to_string()),
    }
}

/// Check every capability the pipeline depends on.
pub async fn check_health(caps: &Capabilities) -> HealthReport {
    let (image, speech, music, text) = tokio::join!(
        timed(caps.images.check_health()),
        timed(caps.speech.check_health()),
        timed(caps.music.check_health()),
        timed(caps.text.check_health()),
    );

    let mut checks = BTreeMap::new();
    checks.insert("image_generation".to_string(), image);
    checks.insert("speech_synthesis".to_string(), speech);
    checks.insert("music_library".to_string(), music);
    checks.insert("text_source".to_string(), text);
    checks.insert("ffmpeg".to_string(), tool_check(check_ffmpeg()));
    checks.insert("ffprobe".to_string(), tool_check(check_ffprobe()));

    let all_ok = checks.values().all(CheckStatus::is_ok);
    HealthReport {
        status: if all_ok { "ready" } else { "degraded" }.to_string(),
        checks,
        checked_at: Utc::now(),
    }
}
