//! Advisory generation progress.
//!
//! The orchestrator reports stage progress through a bounded channel. Sends
//! never block; when the consumer falls behind, updates are dropped.

use tokio::sync::mpsc;
use tracing::trace;

use storyreel_models::GenerationStage;

/// Progress reported at the start of each stage.
pub fn stage_progress(stage: GenerationStage) -> u8 {
    match stage {
        GenerationStage::Precondition => 5,
        GenerationStage::Storage => 8,
        GenerationStage::Image => 10,
        GenerationStage::Narration => 40,
        GenerationStage::Music => 55,
        GenerationStage::Mixing => 60,
        GenerationStage::Encoding => ENCODE_START,
        GenerationStage::Validation => 96,
        GenerationStage::Internal => 0,
    }
}

const ENCODE_START: u8 = 70;
const ENCODE_END: u8 = 95;

/// Progress while delivering the validated output.
pub const DELIVERY_PROGRESS: u8 = 98;

/// One progress update.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    StageStarted { stage: GenerationStage, progress: u8 },
    /// Encode progress with the completed fraction of the clip
    Encoding { progress: u8, fraction: f64 },
    Delivering,
}

impl ProgressEvent {
    pub fn stage(stage: GenerationStage) -> Self {
        Self::StageStarted {
            stage,
            progress: stage_progress(stage),
        }
    }

    pub fn encoding(fraction: f64) -> Self {
        let fraction = fraction.clamp(0.0, 1.0);
        let span = f64::from(ENCODE_END - ENCODE_START);
        Self::Encoding {
            progress: ENCODE_START + (fraction * span).round() as u8,
            fraction,
        }
    }

    pub fn progress(&self) -> u8 {
        match self {
            ProgressEvent::StageStarted { progress, .. } => *progress,
            ProgressEvent::Encoding { progress, .. } => *progress,
            ProgressEvent::Delivering => DELIVERY_PROGRESS,
        }
    }

    /// Step label shown on the record.
    pub fn step(&self) -> String {
        match self {
            ProgressEvent::StageStarted { stage, .. } => stage.label().to_string(),
            ProgressEvent::Encoding { fraction, .. } => {
                format!("Encoding video ({:.0}%)", fraction * 100.0)
            }
            ProgressEvent::Delivering => "Saving video".to_string(),
        }
    }
}

/// Non-blocking sender half.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: Option<mpsc::Sender<ProgressEvent>>,
}

impl ProgressSender {
    /// A sender that discards every event.
    pub fn noop() -> Self {
        Self { tx: None }
    }

    pub fn send(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            if let Err(e) = tx.try_send(event) {
                trace!("Dropped progress event: {}", e);
            }
        }
    }
}

/// Bounded progress channel.
pub fn channel(capacity: usize) -> (ProgressSender, mpsc::Receiver<ProgressEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ProgressSender { tx: Some(tx) }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_progress_is_monotonic() {
        let order = [
            GenerationStage::Precondition,
            GenerationStage::Storage,
            GenerationStage::Image,
            GenerationStage::Narration,
            GenerationStage::Music,
            GenerationStage::Mixing,
            GenerationStage::Encoding,
            GenerationStage::Validation,
        ];
        for pair in order.windows(2) {
            assert!(stage_progress(pair[0]) < stage_progress(pair[1]));
        }
        assert!(stage_progress(GenerationStage::Validation) < DELIVERY_PROGRESS);
    }

    #[test]
    fn test_encoding_progress_range() {
        assert_eq!(ProgressEvent::encoding(0.0).progress(), 70);
        assert_eq!(ProgressEvent::encoding(0.5).progress(), 83);
        assert_eq!(ProgressEvent::encoding(2.0).progress(), 95);
    }

    #[tokio::test]
    async fn test_full_channel_drops_events() {
        let (tx, mut rx) = channel(1);
        tx.send(ProgressEvent::stage(GenerationStage::Image));
        tx.send(ProgressEvent::stage(GenerationStage::Narration));
        drop(tx);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.progress(), 10);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_noop_sender() {
        ProgressSender::noop().send(ProgressEvent::Delivering);
    }
}
