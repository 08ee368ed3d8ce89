//! Generation state machine for a post.
//!
//! Transitions are computed by pure methods that return the next state, so the
//! owner decides when (and whether) to persist it:
//!
//! ```text
//! not_started ─┐
//! completed ───┼─> initializing ─> generating ─┬─> completed
//! failed ──────┘         │            ▲  │      └─> failed
//!                        └────────────┘  └ advance (advisory)
//! ```
//!
//! `begin` may also skip `initializing` and go straight to `generating`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::{GeneratedVideo, GenerationStage};

/// Highest progress an in-flight generation may report.
pub const MAX_IN_FLIGHT_PROGRESS: u8 = 99;

/// Generation state carried on a post record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GenerationState {
    #[default]
    NotStarted,
    Initializing {
        started_at: DateTime<Utc>,
    },
    Generating {
        progress: u8,
        current_step: String,
        started_at: DateTime<Utc>,
    },
    Completed {
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        video: GeneratedVideo,
    },
    Failed {
        started_at: Option<DateTime<Utc>>,
        failed_at: DateTime<Utc>,
        error: String,
        stage: Option<GenerationStage>,
    },
}

/// Rejected state transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Generation already in progress ({0})")]
    AlreadyGenerating(&'static str),

    #[error("Cannot {action} from state {from}")]
    Invalid {
        action: &'static str,
        from: &'static str,
    },
}

impl GenerationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationState::NotStarted => "not_started",
            GenerationState::Initializing { .. } => "initializing",
            GenerationState::Generating { .. } => "generating",
            GenerationState::Completed { .. } => "completed",
            GenerationState::Failed { .. } => "failed",
        }
    }

    /// True while a generation is pending or running.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            GenerationState::Initializing { .. } | GenerationState::Generating { .. }
        )
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GenerationState::Completed { .. } | GenerationState::Failed { .. }
        )
    }

    /// Progress percentage (0-100).
    pub fn progress(&self) -> u8 {
        match self {
            GenerationState::Generating { progress, .. } => *progress,
            GenerationState::Completed { .. } => 100,
            _ => 0,
        }
    }

    pub fn current_step(&self) -> Option<&str> {
        match self {
            GenerationState::Initializing { .. } => Some("Initializing"),
            GenerationState::Generating { current_step, .. } => Some(current_step),
            GenerationState::Completed { .. } => Some("Complete"),
            _ => None,
        }
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        match self {
            GenerationState::NotStarted => None,
            GenerationState::Initializing { started_at }
            | GenerationState::Generating { started_at, .. }
            | GenerationState::Completed { started_at, .. } => Some(*started_at),
            GenerationState::Failed { started_at, .. } => *started_at,
        }
    }

    /// The finished video when completed.
    pub fn video(&self) -> Option<&GeneratedVideo> {
        match self {
            GenerationState::Completed { video, .. } => Some(video),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            GenerationState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Reserve the post for a generation that has not been launched yet.
    pub fn initialize(&self, now: DateTime<Utc>) -> Result<Self, TransitionError> {
        match self {
            GenerationState::NotStarted
            | GenerationState::Completed { .. }
            | GenerationState::Failed { .. } => Ok(GenerationState::Initializing { started_at: now }),
            GenerationState::Initializing { .. } | GenerationState::Generating { .. } => {
                Err(TransitionError::AlreadyGenerating(self.as_str()))
            }
        }
    }

    /// Launch: move to `generating` with progress 0.
    pub fn begin(&self, now: DateTime<Utc>) -> Result<Self, TransitionError> {
        let started_at = match self {
            GenerationState::Initializing { started_at } => *started_at,
            GenerationState::NotStarted
            | GenerationState::Completed { .. }
            | GenerationState::Failed { .. } => now,
            GenerationState::Generating { .. } => {
                return Err(TransitionError::AlreadyGenerating(self.as_str()))
            }
        };

        Ok(GenerationState::Generating {
            progress: 0,
            current_step: "Starting".to_string(),
            started_at,
        })
    }

    /// Advisory progress update. Progress never decreases and stays below 100
    /// until completion.
    pub fn advance(&self, progress: u8, step: impl Into<String>) -> Result<Self, TransitionError> {
        match self {
            GenerationState::Generating {
                progress: current,
                started_at,
                ..
            } => Ok(GenerationState::Generating {
                progress: progress.max(*current).min(MAX_IN_FLIGHT_PROGRESS),
                current_step: step.into(),
                started_at: *started_at,
            }),
            _ => Err(TransitionError::Invalid {
                action: "advance",
                from: self.as_str(),
            }),
        }
    }

    pub fn complete(
        &self,
        video: GeneratedVideo,
        now: DateTime<Utc>,
    ) -> Result<Self, TransitionError> {
        match self {
            GenerationState::Generating { started_at, .. } => Ok(GenerationState::Completed {
                started_at: *started_at,
                completed_at: now,
                video,
            }),
            _ => Err(TransitionError::Invalid {
                action: "complete",
                from: self.as_str(),
            }),
        }
    }

    /// Fail a pending or running generation.
    pub fn fail(
        &self,
        error: impl Into<String>,
        stage: Option<GenerationStage>,
        now: DateTime<Utc>,
    ) -> Result<Self, TransitionError> {
        if !self.is_in_flight() {
            return Err(TransitionError::Invalid {
                action: "fail",
                from: self.as_str(),
            });
        }

        Ok(GenerationState::Failed {
            started_at: self.started_at(),
            failed_at: now,
            error: error.into(),
            stage,
        })
    }
}

impl fmt::Display for GenerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
