//! Venture Match - founder/investor compatibility scoring
//!
//! This library provides the scoring core behind the matchmaking service:
//! per-entity feature encoders, a two-tower neural scorer, the offline
//! training procedure, versioned model bundles and the serving adapter that
//! turns two attribute records into a match percentage.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;
pub mod telemetry;

// Re-export commonly used types
pub use self::core::{
    train, DualBranchScorer, EntitySchema, FeatureEncoder, Matcher, ModelArtifact, TrainingConfig,
};
pub use self::models::{MatchPair, PredictRequest, PredictResponse, RawAttributeRecord};
pub use self::services::ArtifactStore;
