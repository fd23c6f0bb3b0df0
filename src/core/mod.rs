// Scoring core exports
pub mod artifact;
pub mod encoder;
pub mod labels;
pub mod matcher;
pub mod schedule;
pub mod schema;
pub mod scorer;
pub mod trainer;

pub use artifact::{ArtifactError, ModelArtifact};
pub use encoder::{EncoderError, FeatureEncoder};
pub use labels::{build_training_records, HeuristicLabelSource, LabelSource};
pub use matcher::{MatchError, MatchResult, Matcher};
pub use schedule::PlateauScheduler;
pub use schema::{EntityKind, EntitySchema, ValidationError};
pub use scorer::{ArchitectureConfig, DualBranchScorer, ScorerConfig, ScorerError};
pub use trainer::{train, TrainingConfig, TrainingError, TrainingOutcome, TrainingReport};
