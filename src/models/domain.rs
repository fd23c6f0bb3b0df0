use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

/// Fixed-length numeric representation of one entity's attributes
pub type EncodedVector = Vec<f32>;

/// A single raw attribute value, either a number or a category label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Numeric(f64),
    Categorical(String),
}

impl AttributeValue {
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            AttributeValue::Numeric(v) => Some(*v),
            AttributeValue::Categorical(_) => None,
        }
    }

    pub fn as_categorical(&self) -> Option<&str> {
        match self {
            AttributeValue::Categorical(v) => Some(v.as_str()),
            AttributeValue::Numeric(_) => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            AttributeValue::Numeric(_) => "number",
            AttributeValue::Categorical(_) => "string",
        }
    }
}

/// Attribute name -> value mapping for one founder or one investor
///
/// Keys are kept in a `BTreeMap` so iteration and serialization order never
/// depend on insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawAttributeRecord {
    values: BTreeMap<String, AttributeValue>,
}

impl RawAttributeRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_numeric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.insert(name, AttributeValue::Numeric(value));
        self
    }

    pub fn with_categorical(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, AttributeValue::Categorical(value.into()));
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: AttributeValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.values.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Labeled (founder, investor) pair used for training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPair {
    pub seeker: RawAttributeRecord,
    pub provider: RawAttributeRecord,
    /// Compatibility strength in [0, 1]
    pub label: f32,
}

/// Founder profile as held by the platform, used to bootstrap labels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FounderProfile {
    pub user_id: String,
    pub fund_required: f64,
    pub industry: String,
    pub funding_stage: String,
}

/// Investor profile as held by the platform, used to bootstrap labels
///
/// `preferred_industries` drives the heuristic label but is not part of the
/// investor feature schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestorProfile {
    pub user_id: String,
    pub total_invested: f64,
    #[serde(default)]
    pub preferred_industries: Vec<String>,
    pub preferred_funding_stage: String,
    pub risk_tolerance: String,
}

/// One row of the training data file
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TrainingRecord {
    #[serde(default)]
    pub founder_id: String,
    #[serde(default)]
    pub investor_id: String,
    #[validate(range(min = 0.0))]
    pub fund_required: f64,
    #[validate(range(min = 0.0))]
    pub total_invested: f64,
    #[validate(length(min = 1))]
    pub industry: String,
    #[validate(length(min = 1))]
    pub funding_stage: String,
    #[validate(length(min = 1))]
    pub preferred_funding_stage: String,
    #[validate(length(min = 1))]
    pub risk_tolerance: String,
    #[validate(range(min = 0.0, max = 100.0))]
    pub match_percentage: f64,
}

impl TrainingRecord {
    pub fn seeker_record(&self) -> RawAttributeRecord {
        RawAttributeRecord::new()
            .with_numeric("fund_required", self.fund_required)
            .with_categorical("industry", self.industry.clone())
            .with_categorical("funding_stage", self.funding_stage.clone())
    }

    pub fn provider_record(&self) -> RawAttributeRecord {
        RawAttributeRecord::new()
            .with_numeric("total_invested", self.total_invested)
            .with_categorical("preferred_funding_stage", self.preferred_funding_stage.clone())
            .with_categorical("risk_tolerance", self.risk_tolerance.clone())
    }

    pub fn to_pair(&self) -> MatchPair {
        MatchPair {
            seeker: self.seeker_record(),
            provider: self.provider_record(),
            label: (self.match_percentage / 100.0) as f32,
        }
    }
}

/// Training data file: `{ "matches": [...] }`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingDataFile {
    #[serde(default)]
    pub matches: Vec<TrainingRecord>,
}

/// Profile export consumed by the labeling tool
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    #[serde(default)]
    pub founders: Vec<FounderProfile>,
    #[serde(default)]
    pub investors: Vec<InvestorProfile>,
}

/// Investor candidate for ranking against a single founder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestorCandidate {
    #[serde(rename = "investorId", alias = "investor_id")]
    pub investor_id: String,
    pub attributes: RawAttributeRecord,
}

/// Scored candidate result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMatch {
    #[serde(rename = "investorId")]
    pub investor_id: String,
    pub match_probability: f64,
}
