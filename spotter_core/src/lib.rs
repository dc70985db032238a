#![forbid(unsafe_code)]

//! Core domain model and business logic for Spotter.
//!
//! This crate provides:
//! - Domain types (raw API workouts, simplified workouts, cache entries, analyses)
//! - Workout transformation and derived analytics (heatmap, monthly volume)
//! - Persistence (key-value store, cache slots, settings)
//! - Remote clients (workout source, inference API)
//! - Sync coordination and the coaching pipeline

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod store;
pub mod transform;
pub mod hevy;
pub mod inference;
pub mod prompts;
pub mod analytics;
pub mod sync;
pub mod coaching;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::{Config, Settings, SettingsStore};
pub use store::{CacheSlot, FileStore, KeyValueStore};
pub use transform::transform;
pub use analytics::{build_heatmap, monthly_volume};
pub use sync::{SyncCoordinator, SyncOptions, SyncSnapshot, SyncStatus};
pub use coaching::{CoachingOptions, CoachingPipeline, SessionWindow};
