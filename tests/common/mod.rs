// Shared fixtures for integration tests
#![allow(dead_code)]

use std::sync::{Arc, OnceLock};
use venture_match::core::{
    build_training_records, train, ArchitectureConfig, HeuristicLabelSource, ModelArtifact, TrainingConfig,
};
use venture_match::models::{FounderProfile, InvestorProfile, MatchPair, RawAttributeRecord};

pub const INDUSTRIES: &[&str] = &["AI/ML", "Fintech", "Healthcare"];
pub const STAGES: &[&str] = &["Seed", "Series A", "Series B"];
pub const RISK_LEVELS: &[&str] = &["Moderate", "High", "Low"];

/// Investors with a given risk level prefer the industry at the same index
fn preferred_industry(risk: &str) -> &'static str {
    match risk {
        "Moderate" => "AI/ML",
        "High" => "Fintech",
        _ => "Healthcare",
    }
}

pub fn founders() -> Vec<FounderProfile> {
    let mut out = Vec::new();
    for (round, amount) in [250_000.0, 500_000.0, 2_000_000.0].iter().enumerate() {
        for industry in INDUSTRIES {
            for stage in STAGES {
                out.push(FounderProfile {
                    user_id: format!("f-{}-{}", out.len(), round),
                    fund_required: *amount,
                    industry: industry.to_string(),
                    funding_stage: stage.to_string(),
                });
            }
        }
    }
    out
}

pub fn investors() -> Vec<InvestorProfile> {
    let mut out = Vec::new();
    for stage in STAGES {
        for risk in RISK_LEVELS {
            out.push(InvestorProfile {
                user_id: format!("i-{}", out.len()),
                total_invested: 1_000_000.0 + 250_000.0 * out.len() as f64,
                preferred_industries: vec![preferred_industry(risk).to_string()],
                preferred_funding_stage: stage.to_string(),
                risk_tolerance: risk.to_string(),
            });
        }
    }
    out
}

/// Heuristically labeled cross product of the synthetic profiles
pub fn training_pairs(seed: u64) -> Vec<MatchPair> {
    let mut labels = HeuristicLabelSource::seeded(seed);
    build_training_records(&founders(), &investors(), &mut labels)
        .iter()
        .map(|r| r.to_pair())
        .collect()
}

/// Dropout off so a fixed seed fixes the trained weights
pub fn small_architecture() -> ArchitectureConfig {
    ArchitectureConfig {
        seeker_hidden: vec![32, 16],
        provider_hidden: vec![32, 16],
        latent_dim: 8,
        fusion_hidden: vec![16],
        branch_dropout: 0.0,
        fusion_dropout: 0.0,
    }
}

pub fn fast_config() -> TrainingConfig {
    TrainingConfig {
        epochs: 60,
        batch_size: 32,
        learning_rate: 1e-2,
        architecture: small_architecture(),
        ..TrainingConfig::default()
    }
}

/// Tiny run for tests that only need a valid bundle
pub fn quick_config() -> TrainingConfig {
    TrainingConfig { epochs: 2, ..fast_config() }
}

/// One trained bundle shared by every test in a binary
pub fn trained_artifact() -> Arc<ModelArtifact> {
    static ARTIFACT: OnceLock<Arc<ModelArtifact>> = OnceLock::new();
    ARTIFACT
        .get_or_init(|| {
            let outcome = train(&training_pairs(7), &fast_config()).expect("training should succeed");
            Arc::new(outcome.artifact)
        })
        .clone()
}

pub fn quick_artifact(seed: u64) -> ModelArtifact {
    let config = TrainingConfig { seed, ..quick_config() };
    train(&training_pairs(seed), &config).expect("training should succeed").artifact
}

pub fn founder(fund_required: f64, industry: &str, stage: &str) -> RawAttributeRecord {
    RawAttributeRecord::new()
        .with_numeric("fund_required", fund_required)
        .with_categorical("industry", industry)
        .with_categorical("funding_stage", stage)
}

pub fn investor(total_invested: f64, preferred_stage: &str, risk: &str) -> RawAttributeRecord {
    RawAttributeRecord::new()
        .with_numeric("total_invested", total_invested)
        .with_categorical("preferred_funding_stage", preferred_stage)
        .with_categorical("risk_tolerance", risk)
}
