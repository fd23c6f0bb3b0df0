use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

/// Request to score one founder/investor pair
///
/// Both sides arrive as untyped JSON objects; they are checked against the
/// entity schemas before any encoding happens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    pub founder: Map<String, Value>,
    pub investor: Map<String, Value>,
}

/// Request to rank several investors for one founder
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RankRequest {
    pub founder: Map<String, Value>,
    #[validate(length(min = 1, max = 500))]
    pub investors: Vec<RankCandidate>,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: u16,
}

/// Candidate investor in a rank request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankCandidate {
    #[serde(rename = "investorId", alias = "investor_id")]
    pub investor_id: String,
    pub attributes: Map<String, Value>,
}

fn default_limit() -> u16 {
    20
}
