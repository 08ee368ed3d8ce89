//! Post record persistence and review notification.
//!
//! The document store is an external collaborator; [`PostStore`] is the seam.
//! Every write goes through [`PostStore::apply`] so the state machine in
//! [`PostRecord`] is the only place transitions are decided.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use storyreel_models::{GeneratedVideo, GenerationStage, PostId, PostRecord, TransitionError};

use crate::capabilities::CapabilityResult;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Post not found: {0}")]
    NotFound(PostId),

    #[error("Invalid transition: {0}")]
    Transition(#[from] TransitionError),

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Whether repeating the write may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Backend(_))
    }
}

/// One generation-state write.
#[derive(Debug, Clone)]
pub enum GenerationUpdate {
    /// Mark generating with progress 0
    Begin,
    /// Advisory progress
    Progress { progress: u8, step: String },
    /// Settle with a finished video
    Complete(GeneratedVideo),
    /// Settle with a failure; the post returns to draft
    Fail {
        error: String,
        stage: Option<GenerationStage>,
    },
}

impl GenerationUpdate {
    pub fn apply_to(self, post: &mut PostRecord) -> Result<(), TransitionError> {
        match self {
            GenerationUpdate::Begin => post.mark_generating(),
            GenerationUpdate::Progress { progress, step } => post.record_progress(progress, &step),
            GenerationUpdate::Complete(video) => post.complete(video),
            GenerationUpdate::Fail { error, stage } => post.fail(error, stage),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GenerationUpdate::Begin => "begin",
            GenerationUpdate::Progress { .. } => "progress",
            GenerationUpdate::Complete(_) => "complete",
            GenerationUpdate::Fail { .. } => "fail",
        }
    }
}

/// Storage for post records.
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn get(&self, id: &PostId) -> StoreResult<Option<PostRecord>>;

    async fn insert(&self, post: PostRecord) -> StoreResult<()>;

    /// Apply an update atomically and return the new record.
    async fn apply(&self, id: &PostId, update: GenerationUpdate) -> StoreResult<PostRecord>;
}

/// In-process [`PostStore`].
#[derive(Debug, Default)]
pub struct InMemoryPostStore {
    posts: RwLock<HashMap<PostId, PostRecord>>,
}

impl InMemoryPostStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.posts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.posts.read().await.is_empty()
    }
}

#[async_trait]
impl PostStore for InMemoryPostStore {
    async fn get(&self, id: &PostId) -> StoreResult<Option<PostRecord>> {
        Ok(self.posts.read().await.get(id).cloned())
    }

    async fn insert(&self, post: PostRecord) -> StoreResult<()> {
        self.posts.write().await.insert(post.id.clone(), post);
        Ok(())
    }

    async fn apply(&self, id: &PostId, update: GenerationUpdate) -> StoreResult<PostRecord> {
        let mut posts = self.posts.write().await;
        let post = posts
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        // Apply to a copy so a rejected transition leaves the record untouched.
        let mut next = post.clone();
        update.apply_to(&mut next)?;
        *post = next.clone();
        Ok(next)
    }
}

/// Downstream review hook fired when a video is ready.
#[async_trait]
pub trait ReviewNotifier: Send + Sync {
    async fn video_ready(&self, post: &PostRecord) -> CapabilityResult<()>;
}

/// [`ReviewNotifier`] that only logs.
#[derive(Debug, Default, Clone)]
pub struct LogReviewNotifier;

#[async_trait]
impl ReviewNotifier for LogReviewNotifier {
    async fn video_ready(&self, post: &PostRecord) -> CapabilityResult<()> {
        info!(
            post_id = %post.id,
            video_path = ?post.video_path,
            "Video ready for review"
        );
        Ok(())
    }
}
