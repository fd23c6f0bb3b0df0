use candle_core::Tensor;
use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::core::artifact::{ArtifactError, ModelArtifact};
use crate::core::encoder::{EncoderError, FeatureEncoder};
use crate::core::schedule::PlateauScheduler;
use crate::core::scorer::{ArchitectureConfig, DualBranchScorer, ScorerConfig, ScorerError};
use crate::models::{EncodedVector, MatchPair, RawAttributeRecord};

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("training set is empty")]
    EmptyDataset,

    #[error("invalid training configuration: {0}")]
    InvalidConfig(String),

    #[error("pair {index} has label {label}, expected a finite value in [0, 1]")]
    InvalidLabel { index: usize, label: f32 },

    #[error("encoder error: {0}")]
    Encoder(#[from] EncoderError),

    #[error("scorer error: {0}")]
    Scorer(#[from] ScorerError),

    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),
}

/// Hyperparameters of one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub validation_fraction: f64,
    pub seed: u64,
    pub lr_patience: usize,
    pub lr_factor: f64,
    pub min_learning_rate: f64,
    pub min_delta: f64,
    pub architecture: ArchitectureConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 50,
            batch_size: 32,
            learning_rate: 1e-3,
            validation_fraction: 0.2,
            seed: 42,
            lr_patience: 5,
            lr_factor: 0.5,
            min_learning_rate: 1e-5,
            min_delta: 1e-4,
            architecture: ArchitectureConfig::default(),
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), TrainingError> {
        let invalid = |msg: String| Err(TrainingError::InvalidConfig(msg));
        if self.epochs == 0 {
            return invalid("epochs must be at least 1".to_string());
        }
        if self.batch_size == 0 {
            return invalid("batch_size must be at least 1".to_string());
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return invalid(format!("learning_rate must be positive, got {}", self.learning_rate));
        }
        if !(0.0..1.0).contains(&self.validation_fraction) {
            return invalid(format!(
                "validation_fraction must be in [0, 1), got {}",
                self.validation_fraction
            ));
        }
        if !(self.lr_factor > 0.0 && self.lr_factor < 1.0) {
            return invalid(format!("lr_factor must be in (0, 1), got {}", self.lr_factor));
        }
        if self.min_learning_rate < 0.0 {
            return invalid("min_learning_rate must not be negative".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    pub epoch: usize,
    pub train_loss: f64,
    pub val_loss: Option<f64>,
    pub learning_rate: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingReport {
    pub train_size: usize,
    pub validation_size: usize,
    pub epochs: Vec<EpochStats>,
}

impl TrainingReport {
    pub fn final_train_loss(&self) -> Option<f64> {
        self.epochs.last().map(|e| e.train_loss)
    }

    pub fn final_val_loss(&self) -> Option<f64> {
        self.epochs.last().and_then(|e| e.val_loss)
    }
}

#[derive(Debug)]
pub struct TrainingOutcome {
    pub artifact: ModelArtifact,
    pub report: TrainingReport,
}

/// Reproducible train/validation split of `n` items
///
/// Returns `(train, validation)` index lists, each sorted ascending.
pub fn split_indices(n: usize, validation_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));

    let n_val = if validation_fraction <= 0.0 || n < 2 {
        0
    } else {
        ((n as f64 * validation_fraction).round() as usize).clamp(1, n - 1)
    };

    let mut validation = order[..n_val].to_vec();
    let mut train = order[n_val..].to_vec();
    validation.sort_unstable();
    train.sort_unstable();
    (train, validation)
}

/// Encoded tensors for one subset
struct EncodedSet {
    seekers: Tensor,
    providers: Tensor,
    labels: Tensor,
    len: usize,
}

impl EncodedSet {
    fn build(
        scorer: &DualBranchScorer,
        seekers: &[EncodedVector],
        providers: &[EncodedVector],
        labels: Vec<f32>,
    ) -> Result<Self, TrainingError> {
        let len = labels.len();
        let config = scorer.config();
        Ok(Self {
            seekers: scorer.matrix(seekers, config.seeker_dim)?,
            providers: scorer.matrix(providers, config.provider_dim)?,
            labels: Tensor::from_vec(labels, len, scorer.device())?,
            len,
        })
    }
}

fn mean_squared_error(scorer: &DualBranchScorer, set: &EncodedSet) -> Result<f64, TrainingError> {
    let preds = scorer.forward_t(&set.seekers, &set.providers, false)?.squeeze(1)?;
    let loss = candle_nn::loss::mse(&preds, &set.labels)?;
    Ok(loss.to_scalar::<f32>()? as f64)
}

fn subset(pairs: &[MatchPair], indices: &[usize]) -> (Vec<RawAttributeRecord>, Vec<RawAttributeRecord>, Vec<f32>) {
    let seekers = indices.iter().map(|&i| pairs[i].seeker.clone()).collect();
    let providers = indices.iter().map(|&i| pairs[i].provider.clone()).collect();
    let labels = indices.iter().map(|&i| pairs[i].label).collect();
    (seekers, providers, labels)
}

/// Fit both encoders and the scorer from labeled pairs
///
/// Encoders only ever see the training subset. The scorer minimises mean
/// squared error with Adam; the learning rate is reduced whenever the
/// validation loss (training loss if there is no validation subset) stops
/// improving for `lr_patience` epochs.
pub fn train(pairs: &[MatchPair], config: &TrainingConfig) -> Result<TrainingOutcome, TrainingError> {
    config.validate()?;
    if pairs.is_empty() {
        return Err(TrainingError::EmptyDataset);
    }
    if let Some((index, pair)) = pairs
        .iter()
        .enumerate()
        .find(|(_, p)| !(p.label.is_finite() && (0.0..=1.0).contains(&p.label)))
    {
        return Err(TrainingError::InvalidLabel { index, label: pair.label });
    }

    let (train_idx, val_idx) = split_indices(pairs.len(), config.validation_fraction, config.seed);
    info!(
        "Training on {} pairs ({} train / {} validation)",
        pairs.len(),
        train_idx.len(),
        val_idx.len()
    );

    let (train_seekers, train_providers, train_labels) = subset(pairs, &train_idx);
    let seeker_encoder = FeatureEncoder::seeker().fit(&train_seekers)?;
    let provider_encoder = FeatureEncoder::provider().fit(&train_providers)?;

    let scorer_config = ScorerConfig {
        seeker_dim: seeker_encoder.output_dim().ok_or(EncoderError::NotFitted(seeker_encoder.entity()))?,
        provider_dim: provider_encoder.output_dim().ok_or(EncoderError::NotFitted(provider_encoder.entity()))?,
        architecture: config.architecture.clone(),
    };
    info!(
        "Encoded widths: founder={}, investor={}",
        scorer_config.seeker_dim, scorer_config.provider_dim
    );
    let scorer = DualBranchScorer::seeded(scorer_config, config.seed)?;

    let train_set = EncodedSet::build(
        &scorer,
        &seeker_encoder.transform_all(&train_seekers)?,
        &provider_encoder.transform_all(&train_providers)?,
        train_labels,
    )?;
    let val_set = if val_idx.is_empty() {
        None
    } else {
        let (val_seekers, val_providers, val_labels) = subset(pairs, &val_idx);
        Some(EncodedSet::build(
            &scorer,
            &seeker_encoder.transform_all(&val_seekers)?,
            &provider_encoder.transform_all(&val_providers)?,
            val_labels,
        )?)
    };

    let mut optimizer = AdamW::new(
        scorer.trainable_vars(),
        ParamsAdamW {
            lr: config.learning_rate,
            weight_decay: 0.0,
            ..Default::default()
        },
    )?;
    let mut scheduler = PlateauScheduler::new(
        config.lr_patience,
        config.lr_factor,
        config.min_learning_rate,
        config.min_delta,
    );
    let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(1));
    let mut report = TrainingReport {
        train_size: train_set.len,
        validation_size: val_set.as_ref().map_or(0, |s| s.len),
        epochs: Vec::with_capacity(config.epochs),
    };

    for epoch in 1..=config.epochs {
        let mut order: Vec<u32> = (0..train_set.len as u32).collect();
        order.shuffle(&mut rng);

        let mut loss_sum = 0.0;
        for batch in order.chunks(config.batch_size) {
            let idx = Tensor::from_slice(batch, batch.len(), scorer.device())?;
            let seekers = train_set.seekers.index_select(&idx, 0)?;
            let providers = train_set.providers.index_select(&idx, 0)?;
            let labels = train_set.labels.index_select(&idx, 0)?;

            let preds = scorer.forward_t(&seekers, &providers, true)?.squeeze(1)?;
            let loss = candle_nn::loss::mse(&preds, &labels)?;
            optimizer.backward_step(&loss)?;
            loss_sum += loss.to_scalar::<f32>()? as f64 * batch.len() as f64;
        }

        let train_loss = loss_sum / train_set.len as f64;
        let val_loss = match &val_set {
            Some(set) => Some(mean_squared_error(&scorer, set)?),
            None => None,
        };
        let learning_rate = optimizer.learning_rate();

        match val_loss {
            Some(v) => info!(
                "Epoch {}/{}: loss={:.5} val_loss={:.5} lr={:.2e}",
                epoch, config.epochs, train_loss, v, learning_rate
            ),
            None => info!(
                "Epoch {}/{}: loss={:.5} lr={:.2e}",
                epoch, config.epochs, train_loss, learning_rate
            ),
        }
        report.epochs.push(EpochStats { epoch, train_loss, val_loss, learning_rate });

        if let Some(next) = scheduler.observe(val_loss.unwrap_or(train_loss), learning_rate) {
            info!("Loss plateaued, reducing learning rate {:.2e} -> {:.2e}", learning_rate, next);
            optimizer.set_learning_rate(next);
        }
    }

    debug!("Best monitored loss: {:.5}", scheduler.best_loss());
    drop(optimizer);

    let artifact = ModelArtifact::new(seeker_encoder, provider_encoder, scorer.into_trained())?;
    info!("Training finished, bundle version {}", artifact.version());
    Ok(TrainingOutcome { artifact, report })
}
