//! Story video generation worker.
//!
//! This crate provides:
//! - Capability contracts for image, speech, music and text sources
//! - Narration excerpt selection
//! - The generation orchestrator and its multi-slide strategy
//! - The background launcher that owns the post generation state
//! - Cost estimation and health checks

pub mod capabilities;
pub mod config;
pub mod cost;
pub mod error;
pub mod health;
pub mod launcher;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod progress;
pub mod retry;
pub mod scene;
pub mod scratch;
pub mod store;

pub use config::{CapabilityEndpoints, WorkerConfig};
pub use cost::estimate_cost;
pub use error::{WorkerError, WorkerResult};
pub use health::{check_health, CheckStatus, HealthReport};
pub use launcher::{GenerationLauncher, GenerationTicket, LaunchAck, LaunchError};
pub use orchestrator::{Capabilities, GenerationOrchestrator};
pub use progress::{ProgressEvent, ProgressSender};
pub use scene::{SceneExcerpt, SceneSelector};
pub use store::{GenerationUpdate, InMemoryPostStore, LogReviewNotifier, PostStore, ReviewNotifier};
