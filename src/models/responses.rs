use serde::{Deserialize, Serialize};
use crate::models::domain::ScoredMatch;

/// Response for the predict endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub match_probability: f64,
}

/// Response for the rank endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankResponse {
    pub matches: Vec<ScoredMatch>,
    pub total_candidates: usize,
    pub model_version: String,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub model_version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Loaded model description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfoResponse {
    pub version: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub seeker_features: Vec<String>,
    pub provider_features: Vec<String>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
