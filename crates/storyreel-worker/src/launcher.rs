//! Background generation launcher.
//!
//! [`GenerationLauncher::launch`] marks the post as generating and returns at
//! once; the orchestrator runs in a spawned task that always settles the post
//! exactly once, panics included.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use validator::Validate;

use storyreel_models::{
    CostBreakdown, GenerationRequest, GenerationResult, GenerationStage, PostId, TransitionError,
};

use crate::config::WorkerConfig;
use crate::health::{check_health, HealthReport};
use crate::metrics;
use crate::orchestrator::GenerationOrchestrator;
use crate::progress;
use crate::retry::{retry_async_if, RetryConfig};
use crate::store::{GenerationUpdate, PostStore, ReviewNotifier, StoreError};

/// Buffered progress events per generation.
const PROGRESS_BUFFER: usize = 16;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Post not found: {0}")]
    NotFound(PostId),

    #[error("Generation already in progress for post {0}")]
    Conflict(PostId),

    #[error("Store error: {0}")]
    Store(StoreError),
}

/// Acknowledgment returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaunchAck {
    pub post_id: PostId,
    pub status: &'static str,
    pub accepted_at: DateTime<Utc>,
}

/// Handle to an accepted generation.
#[derive(Debug)]
pub struct GenerationTicket {
    pub post_id: PostId,
    pub accepted_at: DateTime<Utc>,
    handle: JoinHandle<GenerationResult>,
}

impl GenerationTicket {
    pub fn ack(&self) -> LaunchAck {
        LaunchAck {
            post_id: self.post_id.clone(),
            status: "accepted",
            accepted_at: self.accepted_at,
        }
    }

    /// Wait for settlement. The post record has been written when this returns.
    pub async fn wait(self) -> GenerationResult {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => GenerationResult::failure(
                GenerationStage::Internal,
                format!("launcher task failed: {e}"),
            ),
        }
    }
}

/// Launches generations without blocking the caller.
#[derive(Clone)]
pub struct GenerationLauncher {
    orchestrator: Arc<GenerationOrchestrator>,
    store: Arc<dyn PostStore>,
    notifier: Arc<dyn ReviewNotifier>,
    permits: Arc<Semaphore>,
    settle_retry: RetryConfig,
}

impl GenerationLauncher {
    pub fn new(
        orchestrator: Arc<GenerationOrchestrator>,
        store: Arc<dyn PostStore>,
        notifier: Arc<dyn ReviewNotifier>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            orchestrator,
            store,
            notifier,
            permits: Arc::new(Semaphore::new(config.max_concurrent_generations.max(1))),
            settle_retry: RetryConfig::new("settle_generation")
                .with_max_retries(config.settle_retries)
                .with_base_delay(Duration::from_millis(200)),
        }
    }

    /// Accept a generation for `post_id`.
    ///
    /// Returns once the post is marked generating with progress 0. Requests
    /// that fail validation are rejected before any state change.
    pub async fn launch(
        &self,
        post_id: &PostId,
        request: GenerationRequest,
    ) -> Result<GenerationTicket, LaunchError> {
        request
            .validate()
            .map_err(|e| LaunchError::InvalidRequest(e.to_string()))?;

        match self.store.apply(post_id, GenerationUpdate::Begin).await {
            Ok(_) => {}
            Err(StoreError::NotFound(id)) => return Err(LaunchError::NotFound(id)),
            Err(StoreError::Transition(TransitionError::AlreadyGenerating(_))) => {
                return Err(LaunchError::Conflict(post_id.clone()))
            }
            Err(e) => return Err(LaunchError::Store(e)),
        }

        let accepted_at = Utc::now();
        info!(
            post_id = %post_id,
            preset = %request.preset,
            "Generation accepted"
        );

        let launcher = self.clone();
        let id = post_id.clone();
        let handle = tokio::spawn(async move { launcher.run(id, request).await });

        Ok(GenerationTicket {
            post_id: post_id.clone(),
            accepted_at,
            handle,
        })
    }

    /// Cost estimate for a request; nothing is generated.
    pub fn estimate(&self, request: &GenerationRequest) -> Result<CostBreakdown, LaunchError> {
        request
            .validate()
            .map_err(|e| LaunchError::InvalidRequest(e.to_string()))?;
        Ok(self.orchestrator.estimate(request))
    }

    pub async fn health(&self) -> HealthReport {
        check_health(self.orchestrator.capabilities()).await
    }

    async fn run(self, post_id: PostId, request: GenerationRequest) -> GenerationResult {
        // Never closed
        let _permit = self.permits.clone().acquire_owned().await.ok();
        let started = Instant::now();

        let (sender, mut events) = progress::channel(PROGRESS_BUFFER);
        let store = self.store.clone();
        let id = post_id.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let update = GenerationUpdate::Progress {
                    progress: event.progress(),
                    step: event.step(),
                };
                if let Err(e) = store.apply(&id, update).await {
                    debug!(post_id = %id, "Progress update skipped: {}", e);
                }
            }
        });

        // Inner task so a panic in the pipeline surfaces as a JoinError here.
        let orchestrator = self.orchestrator.clone();
        let generation_id = post_id.clone();
        let generation_request = request.clone();
        let generation = tokio::spawn(async move {
            orchestrator
                .generate(&generation_id, &generation_request, &sender)
                .await
        });

        let result = match generation.await {
            Ok(result) => result,
            Err(e) => {
                let reason = if e.is_panic() {
                    format!("generation panicked: {}", panic_message(e.into_panic()))
                } else {
                    "generation task was cancelled".to_string()
                };
                error!(post_id = %post_id, "{}", reason);
                metrics::record_stage_failure(GenerationStage::Internal);
                GenerationResult::failure(GenerationStage::Internal, reason)
            }
        };

        // The sender is gone with the task, so the forwarder drains and stops.
        if let Err(e) = forwarder.await {
            warn!(post_id = %post_id, "Progress forwarder failed: {}", e);
        }

        self.settle(&post_id, &result).await;
        metrics::record_generation(
            result.outcome_label(),
            request.preset,
            started.elapsed().as_secs_f64(),
        );
        result
    }

    /// Write the final state. Retried; never returns an error.
    async fn settle(&self, post_id: &PostId, result: &GenerationResult) {
        let update = match result {
            GenerationResult::Success(video) => GenerationUpdate::Complete(video.clone()),
            GenerationResult::Failure(failure) => GenerationUpdate::Fail {
                error: failure.to_string(),
                stage: Some(failure.stage),
            },
        };
        let kind = update.kind();

        let store = &self.store;
        let outcome = retry_async_if(&self.settle_retry, StoreError::is_retryable, || {
            let update = update.clone();
            async move { store.apply(post_id, update).await }
        })
        .await;

        match outcome.into_result() {
            Ok(post) => {
                info!(
                    post_id = %post_id,
                    status = %post.status,
                    generation = %post.generation,
                    "Generation settled"
                );
                if result.is_success() {
                    if let Err(e) = self.notifier.video_ready(&post).await {
                        warn!(post_id = %post_id, "Review notification failed: {}", e);
                    }
                }
            }
            Err(e) => {
                error!(post_id = %post_id, update = kind, "Failed to settle generation: {}", e);
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new("bang".to_string())), "bang");
        assert_eq!(panic_message(Box::new(42u8)), "unknown panic");
    }
}
