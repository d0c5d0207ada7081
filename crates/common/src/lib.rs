//! Feed Engine Common Library
//!
//! Shared code for all feed engine processes:
//! - Domain types (`TypedUID`, `Activity`, `Source`, `Feed`, cursors)
//! - Error types and classification
//! - Configuration management
//! - Metrics and observability
//! - In-process TTL caching
//! - The process-wide type registry used for dynamic hydration

pub mod cache;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod registry;
pub mod types;

pub use config::AppConfig;
pub use errors::{AppError, ErrorCode, Result};
pub use types::{
    Activity, ActivitySummary, Cursor, DecoratedActivity, Feed, Source, StoredActivity,
    TopicQueryGroup, TypedUid,
};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
