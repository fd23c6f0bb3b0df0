use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::core::{ArchitectureConfig, TrainingConfig};

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub model: ModelSettings,
    #[serde(default)]
    pub training: TrainingSettings,
    #[serde(default)]
    pub architecture: ArchitectureSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { host: default_host(), port: default_port(), workers: None }
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 4040 }

#[derive(Debug, Clone, Deserialize)]
pub struct ModelSettings {
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self { artifact_dir: default_artifact_dir() }
    }
}

fn default_artifact_dir() -> PathBuf { PathBuf::from("artifacts") }

#[derive(Debug, Clone, Deserialize)]
pub struct TrainingSettings {
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_validation_fraction")]
    pub validation_fraction: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_lr_patience")]
    pub lr_patience: usize,
    #[serde(default = "default_lr_factor")]
    pub lr_factor: f64,
    #[serde(default = "default_min_learning_rate")]
    pub min_learning_rate: f64,
    #[serde(default = "default_min_delta")]
    pub min_delta: f64,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            epochs: default_epochs(),
            batch_size: default_batch_size(),
            learning_rate: default_learning_rate(),
            validation_fraction: default_validation_fraction(),
            seed: default_seed(),
            lr_patience: default_lr_patience(),
            lr_factor: default_lr_factor(),
            min_learning_rate: default_min_learning_rate(),
            min_delta: default_min_delta(),
        }
    }
}

fn default_data_path() -> PathBuf { PathBuf::from("matchmaking_data.json") }
fn default_epochs() -> usize { 50 }
fn default_batch_size() -> usize { 32 }
fn default_learning_rate() -> f64 { 1e-3 }
fn default_validation_fraction() -> f64 { 0.2 }
fn default_seed() -> u64 { 42 }
fn default_lr_patience() -> usize { 5 }
fn default_lr_factor() -> f64 { 0.5 }
fn default_min_learning_rate() -> f64 { 1e-5 }
fn default_min_delta() -> f64 { 1e-4 }

#[derive(Debug, Clone, Deserialize)]
pub struct ArchitectureSettings {
    #[serde(default = "default_seeker_hidden")]
    pub seeker_hidden: Vec<usize>,
    #[serde(default = "default_provider_hidden")]
    pub provider_hidden: Vec<usize>,
    #[serde(default = "default_latent_dim")]
    pub latent_dim: usize,
    #[serde(default = "default_fusion_hidden")]
    pub fusion_hidden: Vec<usize>,
    #[serde(default = "default_branch_dropout")]
    pub branch_dropout: f32,
    #[serde(default = "default_fusion_dropout")]
    pub fusion_dropout: f32,
}

impl Default for ArchitectureSettings {
    fn default() -> Self {
        Self {
            seeker_hidden: default_seeker_hidden(),
            provider_hidden: default_provider_hidden(),
            latent_dim: default_latent_dim(),
            fusion_hidden: default_fusion_hidden(),
            branch_dropout: default_branch_dropout(),
            fusion_dropout: default_fusion_dropout(),
        }
    }
}

fn default_seeker_hidden() -> Vec<usize> { vec![128, 64] }
fn default_provider_hidden() -> Vec<usize> { vec![64, 32] }
fn default_latent_dim() -> usize { 16 }
fn default_fusion_hidden() -> Vec<usize> { vec![64, 32] }
fn default_branch_dropout() -> f32 { 0.2 }
fn default_fusion_dropout() -> f32 { 0.3 }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with VENTURE__)
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., VENTURE__SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("VENTURE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings = apply_env_shortcuts(settings)?;

        settings.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("VENTURE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// Hyperparameters for the training binary
    pub fn training_config(&self) -> TrainingConfig {
        let t = &self.training;
        TrainingConfig {
            epochs: t.epochs,
            batch_size: t.batch_size,
            learning_rate: t.learning_rate,
            validation_fraction: t.validation_fraction,
            seed: t.seed,
            lr_patience: t.lr_patience,
            lr_factor: t.lr_factor,
            min_learning_rate: t.min_learning_rate,
            min_delta: t.min_delta,
            architecture: self.architecture_config(),
        }
    }

    pub fn architecture_config(&self) -> ArchitectureConfig {
        let a = &self.architecture;
        ArchitectureConfig {
            seeker_hidden: a.seeker_hidden.clone(),
            provider_hidden: a.provider_hidden.clone(),
            latent_dim: a.latent_dim,
            fusion_hidden: a.fusion_hidden.clone(),
            branch_dropout: a.branch_dropout,
            fusion_dropout: a.fusion_dropout,
        }
    }
}

/// Short environment names for the two paths operators change most
///
/// `MODEL_DIR` -> model.artifact_dir, `TRAINING_DATA` -> training.data_path
fn apply_env_shortcuts(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let mut builder = Config::builder().add_source(settings);

    if let Ok(dir) = env::var("MODEL_DIR") {
        builder = builder.set_override("model.artifact_dir", dir)?;
    }
    if let Ok(path) = env::var("TRAINING_DATA") {
        builder = builder.set_override("training.data_path", path)?;
    }

    builder.build()
}
