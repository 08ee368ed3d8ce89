//! Output validation against the format contract.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::inspect::{MediaInfo, MediaInspector};

/// Allowed absolute difference between expected and actual duration.
pub const DURATION_TOLERANCE_SECS: f64 = 1.0;

/// What the artifact is expected to look like.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpectedOutput {
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
}

/// Validation outcome with human-readable mismatches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub passed: bool,
    pub mismatches: Vec<String>,
    /// Inspected values, when inspection succeeded
    pub actual: Option<MediaInfo>,
}

impl ValidationReport {
    fn fail(mismatch: String) -> Self {
        Self {
            passed: false,
            mismatches: vec![mismatch],
            actual: None,
        }
    }

    /// All mismatches on one line.
    pub fn summary(&self) -> String {
        if self.passed {
            "ok".to_string()
        } else {
            self.mismatches.join("; ")
        }
    }
}

/// Checks a finished artifact against an [`ExpectedOutput`].
#[derive(Clone)]
pub struct OutputValidator {
    inspector: Arc<dyn MediaInspector>,
}

impl OutputValidator {
    pub fn new(inspector: Arc<dyn MediaInspector>) -> Self {
        Self { inspector }
    }

    pub async fn validate(&self, path: &Path, expected: &ExpectedOutput) -> ValidationReport {
        let size = match tokio::fs::metadata(path).await {
            Ok(meta) => meta.len(),
            Err(_) => return ValidationReport::fail(format!("output missing: {}", path.display())),
        };
        if size == 0 {
            return ValidationReport::fail(format!("output is empty: {}", path.display()));
        }

        let info = match self.inspector.inspect(path).await {
            Ok(info) => info,
            Err(e) => return ValidationReport::fail(format!("could not inspect output: {}", e)),
        };

        let mismatches = compare(&info, expected);
        debug!(
            path = %path.display(),
            duration = info.duration,
            mismatches = mismatches.len(),
            "Validated output"
        );

        ValidationReport {
            passed: mismatches.is_empty(),
            mismatches,
            actual: Some(info),
        }
    }
}

fn compare(info: &MediaInfo, expected: &ExpectedOutput) -> Vec<String> {
    let mut mismatches = Vec::new();

    if (info.duration - expected.duration_secs).abs() > DURATION_TOLERANCE_SECS {
        mismatches.push(format!(
            "duration {:.2}s differs from expected {:.2}s",
            info.duration, expected.duration_secs
        ));
    }

    match (info.width, info.height) {
        (Some(w), Some(h)) if w == expected.width && h == expected.height => {}
        (Some(w), Some(h)) => mismatches.push(format!(
            "dimensions {}x{} differ from expected {}x{}",
            w, h, expected.width, expected.height
        )),
        _ => mismatches.push("no video stream".to_string()),
    }

    mismatches
}
