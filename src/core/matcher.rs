use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::core::artifact::ModelArtifact;
use crate::core::encoder::EncoderError;
use crate::core::schema::ValidationError;
use crate::core::scorer::ScorerError;
use crate::models::{InvestorCandidate, RawAttributeRecord, ScoredMatch};

/// Errors surfaced by the serving adapter
#[derive(Debug, Error)]
pub enum MatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Encoder(#[from] EncoderError),

    #[error(transparent)]
    Scorer(#[from] ScorerError),
}

impl MatchError {
    /// True when the request itself was bad and should be rejected, not retried
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            MatchError::Validation(_) | MatchError::Encoder(EncoderError::SchemaMismatch { .. })
        )
    }
}

/// Result of ranking candidates for one founder
#[derive(Debug)]
pub struct MatchResult {
    pub matches: Vec<ScoredMatch>,
    pub total_candidates: usize,
}

/// Serving adapter: validate -> encode -> score -> percentage
///
/// Holds one immutable bundle behind an `Arc`; clones are cheap and share it,
/// so any number of workers can score concurrently without locking.
#[derive(Debug, Clone)]
pub struct Matcher {
    artifact: Arc<ModelArtifact>,
}

impl Matcher {
    pub fn new(artifact: Arc<ModelArtifact>) -> Self {
        Self { artifact }
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    pub fn model_version(&self) -> &str {
        self.artifact.version()
    }

    /// Score raw JSON objects for a founder and an investor
    pub fn score_json(
        &self,
        founder: &Map<String, Value>,
        investor: &Map<String, Value>,
    ) -> Result<f64, MatchError> {
        let founder = self.artifact.seeker_encoder().schema().parse_json(founder)?;
        let investor = self.artifact.provider_encoder().schema().parse_json(investor)?;
        self.score(&founder, &investor)
    }

    /// Score typed records; returns a percentage in [0, 100] with two decimals
    pub fn score(
        &self,
        founder: &RawAttributeRecord,
        investor: &RawAttributeRecord,
    ) -> Result<f64, MatchError> {
        let seeker_encoder = self.artifact.seeker_encoder();
        let provider_encoder = self.artifact.provider_encoder();
        seeker_encoder.schema().validate(founder)?;
        provider_encoder.schema().validate(investor)?;

        let seeker_vec = seeker_encoder.transform(founder)?;
        let provider_vec = provider_encoder.transform(investor)?;
        let probability = self.artifact.scorer().predict(&seeker_vec, &provider_vec)?;

        Ok(to_percentage(probability))
    }

    /// Score every candidate against one founder and return the best `limit`
    ///
    /// Sorted by score descending; equal scores keep their input order.
    pub fn rank(
        &self,
        founder: &RawAttributeRecord,
        candidates: Vec<InvestorCandidate>,
        limit: usize,
    ) -> Result<MatchResult, MatchError> {
        let total_candidates = candidates.len();
        let seeker_encoder = self.artifact.seeker_encoder();
        let provider_encoder = self.artifact.provider_encoder();

        seeker_encoder.schema().validate(founder)?;
        let seeker_vec = seeker_encoder.transform(founder)?;

        let mut provider_vecs = Vec::with_capacity(total_candidates);
        for candidate in &candidates {
            provider_encoder.schema().validate(&candidate.attributes)?;
            provider_vecs.push(provider_encoder.transform(&candidate.attributes)?);
        }
        let seeker_vecs = vec![seeker_vec; total_candidates];
        let scores = self.artifact.scorer().predict_batch(&seeker_vecs, &provider_vecs)?;

        let mut matches: Vec<ScoredMatch> = candidates
            .into_iter()
            .zip(scores)
            .map(|(candidate, score)| ScoredMatch {
                investor_id: candidate.investor_id,
                match_probability: to_percentage(score),
            })
            .collect();

        matches.sort_by(|a, b| {
            b.match_probability
                .partial_cmp(&a.match_probability)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(limit);

        Ok(MatchResult { matches, total_candidates })
    }
}

/// [0, 1] probability -> [0, 100] percentage rounded to two decimals
pub fn to_percentage(probability: f32) -> f64 {
    let pct = (probability as f64).clamp(0.0, 1.0) * 100.0;
    (pct * 100.0).round() / 100.0
}
