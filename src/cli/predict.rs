//! Predict command - score a single before/after pair

use anyhow::{Context, Result};
use console::style;
use std::path::{Path, PathBuf};

use super::resolve_config;
use crate::classifier::{FeatureExtractor, GatingPolicy, RiskClassifier, TrainedModel};

pub(super) fn run(
    config_path: Option<&Path>,
    before: &Path,
    after: &Path,
    model: Option<&Path>,
    threshold: Option<f64>,
) -> Result<()> {
    let root = PathBuf::from(".");
    let config = resolve_config(config_path, &root);

    let read = |path: &Path| {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
    };
    let before_text = read(before)?;
    let after_text = read(after)?;

    let model_path = model
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.model.model_path(&root));
    let model = TrainedModel::load(&model_path).with_context(|| {
        format!(
            "Failed to load model {} (run `saferefactor train` first)",
            model_path.display()
        )
    })?;

    let features = FeatureExtractor::new().extract(&before_text, &after_text)?;
    let probability = model.predict(&features);
    let gate = GatingPolicy::new(threshold.unwrap_or(config.gating.threshold))?;

    let verdict = if probability <= gate.threshold() {
        style("accept").green()
    } else {
        style("reject").red()
    };
    println!(
        "Error probability: {:.3}  (threshold {:.2}: {})",
        probability,
        gate.threshold(),
        verdict
    );
    Ok(())
}
