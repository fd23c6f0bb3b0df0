//! Label sources for bootstrapping training pairs
//!
//! Real compatibility outcomes are not available yet, so training data is
//! labeled by a swappable [`LabelSource`]. The heuristic source below is a
//! placeholder; its thresholds carry no meaning beyond producing a learnable
//! signal.

use crate::models::{FounderProfile, InvestorProfile, TrainingRecord};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Produces a match percentage in [0, 100] for a founder/investor pair
pub trait LabelSource {
    fn match_percentage(&mut self, founder: &FounderProfile, investor: &InvestorProfile) -> f64;
}

/// Rule-of-thumb labels with seeded noise
///
/// Pairs where the founder's industry is one the investor prefers and the
/// funding stages agree draw from 70..=100, everything else from 0..=69.
#[derive(Debug, Clone)]
pub struct HeuristicLabelSource {
    rng: StdRng,
}

impl HeuristicLabelSource {
    pub fn seeded(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    pub fn is_aligned(founder: &FounderProfile, investor: &InvestorProfile) -> bool {
        investor.preferred_industries.iter().any(|i| i == &founder.industry)
            && founder.funding_stage == investor.preferred_funding_stage
    }
}

impl LabelSource for HeuristicLabelSource {
    fn match_percentage(&mut self, founder: &FounderProfile, investor: &InvestorProfile) -> f64 {
        let pct: u32 = if Self::is_aligned(founder, investor) {
            self.rng.gen_range(70..=100)
        } else {
            self.rng.gen_range(0..=69)
        };
        pct as f64
    }
}

/// Cross every founder with every investor and label each pair
pub fn build_training_records<L: LabelSource + ?Sized>(
    founders: &[FounderProfile],
    investors: &[InvestorProfile],
    labels: &mut L,
) -> Vec<TrainingRecord> {
    let mut records = Vec::with_capacity(founders.len() * investors.len());
    for founder in founders {
        for investor in investors {
            records.push(TrainingRecord {
                founder_id: founder.user_id.clone(),
                investor_id: investor.user_id.clone(),
                fund_required: founder.fund_required,
                total_invested: investor.total_invested,
                industry: founder.industry.clone(),
                funding_stage: founder.funding_stage.clone(),
                preferred_funding_stage: investor.preferred_funding_stage.clone(),
                risk_tolerance: investor.risk_tolerance.clone(),
                match_percentage: labels.match_percentage(founder, investor),
            });
        }
    }
    records
}
