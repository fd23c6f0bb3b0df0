use candle_core::{DType, Device, Module, Tensor, Var};
use candle_nn::{BatchNorm, BatchNormConfig, Dropout, Linear, ModuleT, VarBuilder, VarMap};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::core::schema::EntityKind;

/// Errors raised by the dual-branch scorer
#[derive(Debug, Error)]
pub enum ScorerError {
    #[error("{branch} vector has {actual} features, model expects {expected}")]
    ShapeMismatch {
        branch: EntityKind,
        expected: usize,
        actual: usize,
    },

    #[error("scorer used before it was trained")]
    NotFitted,

    #[error("invalid scorer configuration: {0}")]
    InvalidConfig(String),

    #[error("batch has {seekers} founder vectors but {providers} investor vectors")]
    BatchMismatch { seekers: usize, providers: usize },

    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),
}

/// Layer widths and dropout rates of the two-tower network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureConfig {
    pub seeker_hidden: Vec<usize>,
    pub provider_hidden: Vec<usize>,
    pub latent_dim: usize,
    pub fusion_hidden: Vec<usize>,
    pub branch_dropout: f32,
    pub fusion_dropout: f32,
}

impl Default for ArchitectureConfig {
    fn default() -> Self {
        Self {
            seeker_hidden: vec![128, 64],
            provider_hidden: vec![64, 32],
            latent_dim: 16,
            fusion_hidden: vec![64, 32],
            branch_dropout: 0.2,
            fusion_dropout: 0.3,
        }
    }
}

/// Input shape plus architecture; fixed for the lifetime of a trained scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorerConfig {
    pub seeker_dim: usize,
    pub provider_dim: usize,
    pub architecture: ArchitectureConfig,
}

impl ScorerConfig {
    pub fn validate(&self) -> Result<(), ScorerError> {
        let arch = &self.architecture;
        if self.seeker_dim == 0 || self.provider_dim == 0 {
            return Err(ScorerError::InvalidConfig("input dimensions must be non-zero".to_string()));
        }
        if arch.latent_dim == 0 {
            return Err(ScorerError::InvalidConfig("latent_dim must be non-zero".to_string()));
        }
        for (name, widths) in [
            ("seeker_hidden", &arch.seeker_hidden),
            ("provider_hidden", &arch.provider_hidden),
            ("fusion_hidden", &arch.fusion_hidden),
        ] {
            if widths.is_empty() || widths.contains(&0) {
                return Err(ScorerError::InvalidConfig(format!(
                    "{} needs at least one non-zero layer width",
                    name
                )));
            }
        }
        for (name, p) in [("branch_dropout", arch.branch_dropout), ("fusion_dropout", arch.fusion_dropout)] {
            if !(0.0..1.0).contains(&p) {
                return Err(ScorerError::InvalidConfig(format!("{} must be in [0, 1), got {}", name, p)));
            }
        }
        Ok(())
    }
}

/// Running statistics move 1% per training batch; eps 1e-3
fn norm_config() -> BatchNormConfig {
    BatchNormConfig {
        eps: 1e-3,
        momentum: 0.01,
        ..BatchNormConfig::default()
    }
}

/// Linear -> ReLU -> BatchNorm -> Dropout
struct DenseBlock {
    linear: Linear,
    norm: BatchNorm,
    dropout: Dropout,
}

impl DenseBlock {
    fn new(in_dim: usize, out_dim: usize, dropout: f32, vb: VarBuilder) -> candle_core::Result<Self> {
        Ok(Self {
            linear: candle_nn::linear(in_dim, out_dim, vb.pp("linear"))?,
            norm: candle_nn::batch_norm(out_dim, norm_config(), vb.pp("norm"))?,
            dropout: Dropout::new(dropout),
        })
    }
}

impl ModuleT for DenseBlock {
    fn forward_t(&self, xs: &Tensor, train: bool) -> candle_core::Result<Tensor> {
        let xs = self.linear.forward(xs)?.relu()?;
        let xs = self.norm.forward_t(&xs, train)?;
        self.dropout.forward_t(&xs, train)
    }
}

fn dense_stack(
    in_dim: usize,
    widths: &[usize],
    dropout: f32,
    vb: VarBuilder,
) -> candle_core::Result<(Vec<DenseBlock>, usize)> {
    let mut blocks = Vec::with_capacity(widths.len());
    let mut width = in_dim;
    for (i, &out) in widths.iter().enumerate() {
        blocks.push(DenseBlock::new(width, out, dropout, vb.pp(format!("block{}", i)))?);
        width = out;
    }
    Ok((blocks, width))
}

/// One entity's projection into the shared latent space
struct Tower {
    blocks: Vec<DenseBlock>,
    projection: Linear,
}

impl Tower {
    fn new(
        in_dim: usize,
        hidden: &[usize],
        latent_dim: usize,
        dropout: f32,
        vb: VarBuilder,
    ) -> candle_core::Result<Self> {
        let (blocks, width) = dense_stack(in_dim, hidden, dropout, vb.clone())?;
        let projection = candle_nn::linear(width, latent_dim, vb.pp("latent"))?;
        Ok(Self { blocks, projection })
    }
}

impl ModuleT for Tower {
    fn forward_t(&self, xs: &Tensor, train: bool) -> candle_core::Result<Tensor> {
        let mut xs = xs.clone();
        for block in &self.blocks {
            xs = block.forward_t(&xs, train)?;
        }
        self.projection.forward(&xs)?.relu()
    }
}

struct TwoTowerNet {
    seeker: Tower,
    provider: Tower,
    fusion: Vec<DenseBlock>,
    head: Linear,
}

impl TwoTowerNet {
    fn new(config: &ScorerConfig, vb: VarBuilder) -> candle_core::Result<Self> {
        let arch = &config.architecture;
        let seeker = Tower::new(
            config.seeker_dim,
            &arch.seeker_hidden,
            arch.latent_dim,
            arch.branch_dropout,
            vb.pp("seeker"),
        )?;
        let provider = Tower::new(
            config.provider_dim,
            &arch.provider_hidden,
            arch.latent_dim,
            arch.branch_dropout,
            vb.pp("provider"),
        )?;
        let (fusion, width) = dense_stack(
            arch.latent_dim * 2,
            &arch.fusion_hidden,
            arch.fusion_dropout,
            vb.pp("fusion"),
        )?;
        let head = candle_nn::linear(width, 1, vb.pp("head"))?;
        Ok(Self { seeker, provider, fusion, head })
    }

    /// `(batch, seeker_dim)`, `(batch, provider_dim)` -> `(batch, 1)` in [0, 1]
    fn forward_t(&self, seekers: &Tensor, providers: &Tensor, train: bool) -> candle_core::Result<Tensor> {
        let s = self.seeker.forward_t(seekers, train)?;
        let p = self.provider.forward_t(providers, train)?;
        let mut xs = Tensor::cat(&[&s, &p], 1)?;
        for block in &self.fusion {
            xs = block.forward_t(&xs, train)?;
        }
        candle_nn::ops::sigmoid(&self.head.forward(&xs)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScorerState {
    Uninitialized,
    Trained,
}

/// Two-tower compatibility model
///
/// A scorer is either freshly initialized (random parameters, only usable by
/// the trainer) or trained. Training consumes an uninitialized scorer and
/// yields a trained one; a trained scorer is never mutated again.
pub struct DualBranchScorer {
    config: ScorerConfig,
    varmap: VarMap,
    net: TwoTowerNet,
    device: Device,
    state: ScorerState,
}

impl std::fmt::Debug for DualBranchScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualBranchScorer")
            .field("config", &self.config)
            .field("device", &format!("{:?}", self.device))
            .field("state", &self.state)
            .finish()
    }
}

impl DualBranchScorer {
    /// Build a scorer with parameters drawn from seed 0
    pub fn new(config: ScorerConfig) -> Result<Self, ScorerError> {
        Self::seeded(config, 0)
    }

    /// Build a scorer whose initial parameters are a pure function of `seed`
    pub fn seeded(config: ScorerConfig, seed: u64) -> Result<Self, ScorerError> {
        let scorer = Self::build(config)?;
        scorer.init_parameters(seed)?;
        debug!(
            "Initialized scorer (seeker_dim={}, provider_dim={}, latent_dim={}, seed={})",
            scorer.config.seeker_dim, scorer.config.provider_dim, scorer.config.architecture.latent_dim, seed
        );
        Ok(scorer)
    }

    /// Rebuild the network from `config` and load trained weights from a safetensors file
    pub fn load<P: AsRef<Path>>(config: ScorerConfig, weights: P) -> Result<Self, ScorerError> {
        let mut scorer = Self::build(config)?;
        scorer.varmap.load(weights)?;
        scorer.state = ScorerState::Trained;
        Ok(scorer)
    }

    fn build(config: ScorerConfig) -> Result<Self, ScorerError> {
        config.validate()?;
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let net = TwoTowerNet::new(&config, vb)?;
        Ok(Self {
            config,
            varmap,
            net,
            device,
            state: ScorerState::Uninitialized,
        })
    }

    /// Glorot-uniform dense weights and zero biases, drawn in parameter-name order
    ///
    /// Normalization parameters keep their identity initialization.
    fn init_parameters(&self, seed: u64) -> Result<(), ScorerError> {
        let vars = self
            .varmap
            .data()
            .lock()
            .map_err(|_| ScorerError::InvalidConfig("parameter store lock poisoned".to_string()))?;
        let mut names: Vec<&String> = vars.keys().filter(|name| !name.contains(".norm.")).collect();
        names.sort();

        let mut rng = StdRng::seed_from_u64(seed);
        for name in names {
            let var = &vars[name];
            let dims = var.dims().to_vec();
            let values: Vec<f32> = match dims.as_slice() {
                [fan_out, fan_in] => {
                    let limit = (6.0 / (fan_in + fan_out) as f64).sqrt() as f32;
                    (0..fan_out * fan_in).map(|_| rng.gen_range(-limit..limit)).collect()
                }
                _ => vec![0.0; var.elem_count()],
            };
            var.set(&Tensor::from_vec(values, dims, &self.device)?)?;
        }
        Ok(())
    }

    /// Write parameters (including normalization statistics) as safetensors
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ScorerError> {
        if self.state != ScorerState::Trained {
            return Err(ScorerError::NotFitted);
        }
        self.varmap.save(path)?;
        Ok(())
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    pub fn state(&self) -> ScorerState {
        self.state
    }

    pub fn is_trained(&self) -> bool {
        self.state == ScorerState::Trained
    }

    /// Score one encoded pair
    pub fn predict(&self, seeker: &[f32], provider: &[f32]) -> Result<f32, ScorerError> {
        self.ensure_trained()?;
        self.check_shape(EntityKind::Seeker, seeker.len())?;
        self.check_shape(EntityKind::Provider, provider.len())?;

        let seekers = Tensor::from_slice(seeker, (1, seeker.len()), &self.device)?;
        let providers = Tensor::from_slice(provider, (1, provider.len()), &self.device)?;
        let out = self.net.forward_t(&seekers, &providers, false)?;
        let score = out.flatten_all()?.to_vec1::<f32>()?;
        Ok(score.first().copied().unwrap_or(0.0).clamp(0.0, 1.0))
    }

    /// Score many encoded pairs in a single forward pass
    pub fn predict_batch(&self, seekers: &[Vec<f32>], providers: &[Vec<f32>]) -> Result<Vec<f32>, ScorerError> {
        self.ensure_trained()?;
        if seekers.len() != providers.len() {
            return Err(ScorerError::BatchMismatch { seekers: seekers.len(), providers: providers.len() });
        }
        if seekers.is_empty() {
            return Ok(Vec::new());
        }
        for v in seekers {
            self.check_shape(EntityKind::Seeker, v.len())?;
        }
        for v in providers {
            self.check_shape(EntityKind::Provider, v.len())?;
        }

        let seekers = self.matrix(seekers, self.config.seeker_dim)?;
        let providers = self.matrix(providers, self.config.provider_dim)?;
        let out = self.net.forward_t(&seekers, &providers, false)?;
        Ok(out
            .flatten_all()?
            .to_vec1::<f32>()?
            .into_iter()
            .map(|s| s.clamp(0.0, 1.0))
            .collect())
    }

    pub(crate) fn device(&self) -> &Device {
        &self.device
    }

    pub(crate) fn trainable_vars(&self) -> Vec<Var> {
        self.varmap.all_vars()
    }

    /// Forward pass over whole-batch tensors; `train` enables dropout and batch statistics
    pub(crate) fn forward_t(&self, seekers: &Tensor, providers: &Tensor, train: bool) -> candle_core::Result<Tensor> {
        self.net.forward_t(seekers, providers, train)
    }

    pub(crate) fn into_trained(mut self) -> Self {
        self.state = ScorerState::Trained;
        self
    }

    pub(crate) fn matrix(&self, rows: &[Vec<f32>], width: usize) -> Result<Tensor, ScorerError> {
        let flat: Vec<f32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Ok(Tensor::from_vec(flat, (rows.len(), width), &self.device)?)
    }

    fn ensure_trained(&self) -> Result<(), ScorerError> {
        match self.state {
            ScorerState::Trained => Ok(()),
            ScorerState::Uninitialized => Err(ScorerError::NotFitted),
        }
    }

    fn check_shape(&self, branch: EntityKind, actual: usize) -> Result<(), ScorerError> {
        let expected = match branch {
            EntityKind::Seeker => self.config.seeker_dim,
            EntityKind::Provider => self.config.provider_dim,
        };
        if actual != expected {
            return Err(ScorerError::ShapeMismatch { branch, expected, actual });
        }
        Ok(())
    }
}
