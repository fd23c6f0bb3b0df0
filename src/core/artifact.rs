use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

use crate::core::encoder::{EncoderError, FeatureEncoder};
use crate::core::schema::EntityKind;
use crate::core::scorer::{DualBranchScorer, ScorerError};

/// Errors raised while assembling, storing or loading a model bundle
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("no current model bundle under {0}")]
    NoCurrentBundle(PathBuf),

    #[error("bundle {version}: checksum mismatch for {file}")]
    ChecksumMismatch { version: String, file: String },

    #[error("{file} belongs to bundle {found}, expected {expected}")]
    VersionSkew {
        file: String,
        expected: String,
        found: String,
    },

    #[error("incompatible bundle: {0}")]
    Incompatible(String),

    #[error("encoder error: {0}")]
    Encoder(#[from] EncoderError),

    #[error("scorer error: {0}")]
    Scorer(#[from] ScorerError),
}

/// Seeker encoder, provider encoder and scorer from one training run
///
/// The three parts are only ever constructed, stored and loaded together.
/// Construction checks that both encoders are fitted, the scorer is trained,
/// and encoder output widths equal the scorer's input widths.
#[derive(Debug)]
pub struct ModelArtifact {
    version: String,
    created_at: DateTime<Utc>,
    seeker_encoder: FeatureEncoder,
    provider_encoder: FeatureEncoder,
    scorer: DualBranchScorer,
}

impl ModelArtifact {
    /// Assemble a freshly trained bundle under a new version id
    pub fn new(
        seeker_encoder: FeatureEncoder,
        provider_encoder: FeatureEncoder,
        scorer: DualBranchScorer,
    ) -> Result<Self, ArtifactError> {
        let created_at = Utc::now();
        Self::from_parts(new_version(created_at), created_at, seeker_encoder, provider_encoder, scorer)
    }

    pub fn from_parts(
        version: String,
        created_at: DateTime<Utc>,
        seeker_encoder: FeatureEncoder,
        provider_encoder: FeatureEncoder,
        scorer: DualBranchScorer,
    ) -> Result<Self, ArtifactError> {
        if seeker_encoder.entity() != EntityKind::Seeker || provider_encoder.entity() != EntityKind::Provider {
            return Err(ArtifactError::Incompatible("encoders are attached to the wrong branches".to_string()));
        }
        if !scorer.is_trained() {
            return Err(ArtifactError::Scorer(ScorerError::NotFitted));
        }

        let config = scorer.config();
        for (encoder, expected) in [
            (&seeker_encoder, config.seeker_dim),
            (&provider_encoder, config.provider_dim),
        ] {
            let dim = encoder.output_dim().ok_or(EncoderError::NotFitted(encoder.entity()))?;
            if dim != expected {
                return Err(ArtifactError::Incompatible(format!(
                    "{} encoder emits {} features but scorer expects {}",
                    encoder.entity(),
                    dim,
                    expected
                )));
            }
        }

        Ok(Self { version, created_at, seeker_encoder, provider_encoder, scorer })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn seeker_encoder(&self) -> &FeatureEncoder {
        &self.seeker_encoder
    }

    pub fn provider_encoder(&self) -> &FeatureEncoder {
        &self.provider_encoder
    }

    pub fn scorer(&self) -> &DualBranchScorer {
        &self.scorer
    }
}

/// Sortable bundle id: UTC timestamp plus a short random suffix
pub fn new_version(created_at: DateTime<Utc>) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", created_at.format("%Y%m%dT%H%M%SZ"), &id[..8])
}
