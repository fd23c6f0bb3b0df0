// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    AttributeValue, EncodedVector, FounderProfile, InvestorCandidate, InvestorProfile, MatchPair,
    ProfileSnapshot, RawAttributeRecord, ScoredMatch, TrainingDataFile, TrainingRecord,
};
pub use requests::{PredictRequest, RankCandidate, RankRequest};
pub use responses::{ErrorResponse, HealthResponse, ModelInfoResponse, PredictResponse, RankResponse};
