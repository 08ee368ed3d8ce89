//! Post record: the external entity that owns the generation state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::{GeneratedVideo, GenerationStage, GenerationState, TransitionError};

/// Unique identifier for a post.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub String);

impl PostId {
    /// Generate a new random post ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PostId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PostId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PostId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Editorial status of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    /// Editable; a failed generation returns the post here
    #[default]
    Draft,
    /// Video is being generated
    Generating,
    /// Video ready for review
    Ready,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Generating => "generating",
            PostStatus::Ready => "ready",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Post as seen by the generation subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: PostId,
    pub status: PostStatus,
    pub generation: GenerationState,
    /// Reference to the finished video
    pub video_path: Option<PathBuf>,
    /// Free-form metadata; generation metadata is merged in on success
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Last visible generation error
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PostRecord {
    pub fn new(id: PostId) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: PostStatus::Draft,
            generation: GenerationState::NotStarted,
            video_path: None,
            metadata: Map::new(),
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the post can be edited by the caller.
    pub fn is_editable(&self) -> bool {
        self.status == PostStatus::Draft
    }

    /// Mark the post as generating with progress 0.
    pub fn mark_generating(&mut self) -> Result<(), TransitionError> {
        let now = Utc::now();
        self.generation = self.generation.begin(now)?;
        self.status = PostStatus::Generating;
        self.last_error = None;
        self.updated_at = now;
        Ok(())
    }

    /// Advisory progress update.
    pub fn record_progress(&mut self, progress: u8, step: &str) -> Result<(), TransitionError> {
        self.generation = self.generation.advance(progress, step)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Settle a successful generation.
    pub fn complete(&mut self, video: GeneratedVideo) -> Result<(), TransitionError> {
        let now = Utc::now();
        let metadata = serde_json::to_value(&video.metadata).ok();
        let video_path = video.video_path.clone();

        self.generation = self.generation.complete(video, now)?;
        self.status = PostStatus::Ready;
        self.video_path = Some(video_path);
        self.last_error = None;
        if let Some(Value::Object(fields)) = metadata {
            self.merge_metadata(fields);
        }
        self.updated_at = now;
        Ok(())
    }

    /// Settle a failed generation, returning the post to draft.
    pub fn fail(
        &mut self,
        error: impl Into<String>,
        stage: Option<GenerationStage>,
    ) -> Result<(), TransitionError> {
        let now = Utc::now();
        let error = error.into();
        self.generation = self.generation.fail(error.clone(), stage, now)?;
        self.status = PostStatus::Draft;
        self.last_error = Some(error);
        self.updated_at = now;
        Ok(())
    }

    /// Merge metadata fields, overwriting existing keys.
    pub fn merge_metadata(&mut self, fields: Map<String, Value>) {
        for (key, value) in fields {
            self.metadata.insert(key, value);
        }
    }
}
