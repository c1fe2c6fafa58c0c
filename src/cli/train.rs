//! Train command - fit the risk model from a labeled dataset

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::resolve_config;
use crate::classifier::{DatasetStore, TrainingPipeline};

pub(super) fn run(
    config_path: Option<&Path>,
    data: Option<&Path>,
    model_out: Option<&Path>,
    seed: Option<u64>,
) -> Result<()> {
    let root = PathBuf::from(".");
    let config = resolve_config(config_path, &root);

    let store = DatasetStore::new(
        data.map(Path::to_path_buf)
            .unwrap_or_else(DatasetStore::default_path),
    );
    let examples = store
        .load_all()
        .with_context(|| format!("Failed to load training data from {}", store.path().display()))?;
    if examples.is_empty() {
        anyhow::bail!(
            "No training data found at {}. Provide a JSON Lines or CSV file with --data.",
            store.path().display()
        );
    }
    println!("{}", store.stats()?);

    let mut train_config = config.training.train_config();
    if let Some(seed) = seed {
        train_config.seed = seed;
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!(
        "Training on {} examples ({} grid combinations)...",
        examples.len(),
        train_config.grid.candidates().len()
    ));
    spinner.enable_steady_tick(Duration::from_millis(100));
    let progress = spinner.clone();
    let result = TrainingPipeline::new(train_config)
        .with_progress(move |done, total| {
            progress.set_message(format!("Cross-validating grid combination {done}/{total}..."));
        })
        .train(&examples);
    spinner.finish_and_clear();

    // On failure nothing is written, so an existing model stays in place.
    let report = result.context("Training failed")?;

    let model_path = model_out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.model.model_path(&root));
    report
        .model
        .save(&model_path)
        .with_context(|| format!("Failed to save model to {}", model_path.display()))?;

    println!("\n{report}");
    println!(
        "\n{}Model saved to {}",
        style("✓ ").green(),
        style(model_path.display()).cyan()
    );
    Ok(())
}
