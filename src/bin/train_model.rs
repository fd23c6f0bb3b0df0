/// Offline trainer for the founder/investor scorer
///
/// Reads a `{ "matches": [...] }` training file, fits both encoders and the
/// scorer, and stores the result as a new current bundle.
///
/// Run: cargo run --release --bin train-model [-- <training-data.json>]

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tracing::{info, warn};
use validator::Validate;
use venture_match::config::Settings;
use venture_match::models::{MatchPair, TrainingDataFile};
use venture_match::services::ArtifactStore;
use venture_match::{telemetry, train};

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    telemetry::init_tracing();

    let settings = Settings::load().context("failed to load configuration")?;
    let data_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| settings.training.data_path.clone());

    info!("Reading training data from {}", data_path.display());
    let raw = std::fs::read(&data_path)
        .with_context(|| format!("failed to read {}", data_path.display()))?;
    let data: TrainingDataFile = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse {}", data_path.display()))?;

    let mut pairs: Vec<MatchPair> = Vec::with_capacity(data.matches.len());
    let mut skipped = 0usize;
    for (index, record) in data.matches.iter().enumerate() {
        match record.validate() {
            Ok(()) => pairs.push(record.to_pair()),
            Err(e) => {
                warn!("Skipping record {} ({} / {}): {}", index, record.founder_id, record.investor_id, e);
                skipped += 1;
            }
        }
    }
    if pairs.is_empty() {
        bail!("no usable training records in {}", data_path.display());
    }
    info!("Loaded {} training pairs ({} skipped)", pairs.len(), skipped);

    let config = settings.training_config();
    let outcome = train(&pairs, &config).context("training failed")?;

    if let (Some(train_loss), val_loss) = (outcome.report.final_train_loss(), outcome.report.final_val_loss()) {
        info!(
            "Training finished after {} epochs: train loss {:.5}, validation loss {}",
            outcome.report.epochs.len(),
            train_loss,
            val_loss.map(|v| format!("{:.5}", v)).unwrap_or_else(|| "n/a".to_string())
        );
    }

    let store = ArtifactStore::open(&settings.model.artifact_dir).with_context(|| {
        format!("failed to open artifact store at {}", settings.model.artifact_dir.display())
    })?;
    let bundle_dir = store.save(&outcome.artifact).context("failed to store model bundle")?;

    info!("Saved model bundle {} to {}", outcome.artifact.version(), bundle_dir.display());
    Ok(())
}
