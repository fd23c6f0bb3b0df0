/// Training data generator
///
/// Crosses every founder with every investor from a profile export and labels
/// each pair with the heuristic label source, producing the file `train-model`
/// reads.
///
/// Run: cargo run --bin label-pairs -- <profiles.json> [output.json] [seed]

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;
use venture_match::config::Settings;
use venture_match::core::{build_training_records, HeuristicLabelSource};
use venture_match::models::{ProfileSnapshot, TrainingDataFile};
use venture_match::telemetry;

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    telemetry::init_tracing();

    let settings = Settings::load().context("failed to load configuration")?;
    let mut args = std::env::args().skip(1);
    let profiles_path = PathBuf::from(args.next().context("usage: label-pairs <profiles.json> [output.json] [seed]")?);
    let output_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| settings.training.data_path.clone());
    let seed = match args.next() {
        Some(s) => s.parse::<u64>().with_context(|| format!("invalid seed: {}", s))?,
        None => settings.training.seed,
    };

    let raw = std::fs::read(&profiles_path)
        .with_context(|| format!("failed to read {}", profiles_path.display()))?;
    let snapshot: ProfileSnapshot = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse {}", profiles_path.display()))?;
    info!(
        "Labeling {} founders x {} investors (seed {})",
        snapshot.founders.len(),
        snapshot.investors.len(),
        seed
    );

    let mut labels = HeuristicLabelSource::seeded(seed);
    let matches = build_training_records(&snapshot.founders, &snapshot.investors, &mut labels);
    let count = matches.len();

    let file = TrainingDataFile { matches };
    std::fs::write(&output_path, serde_json::to_vec_pretty(&file)?)
        .with_context(|| format!("failed to write {}", output_path.display()))?;

    info!("Generated {} match samples and saved to {}", count, output_path.display());
    Ok(())
}
