//! Analyze command - detect, transform, gate and optionally apply

use anyhow::{Context, Result};
use console::style;
use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::resolve_config;
use crate::classifier::TrainedModel;
use crate::config::ExcludeConfig;
use crate::models::SourceUnit;
use crate::pipeline::{RefactorPipeline, UnitReport};
use crate::reporters::{self, OutputFormat};

/// File extensions analysed
const PYTHON_EXTENSIONS: &[&str] = &["py", "pyi"];

pub(super) struct AnalyzeArgs<'a> {
    pub path: &'a Path,
    pub config: Option<&'a Path>,
    pub format: OutputFormat,
    pub output: Option<&'a Path>,
    pub apply: bool,
    pub diff: bool,
    pub model: Option<&'a Path>,
    pub threshold: Option<f64>,
    pub no_gate: bool,
}

pub(super) fn run(args: AnalyzeArgs<'_>) -> Result<()> {
    let target = args
        .path
        .canonicalize()
        .with_context(|| format!("Path does not exist: {}", args.path.display()))?;
    let root = if target.is_dir() {
        target.clone()
    } else {
        target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    };

    let mut config = resolve_config(args.config, &root);
    if let Some(threshold) = args.threshold {
        config.gating.threshold = threshold;
    }
    let mut pipeline = RefactorPipeline::from_config(&config)?;

    if !args.no_gate {
        let model_path = args
            .model
            .map(Path::to_path_buf)
            .unwrap_or_else(|| config.model.model_path(&root));
        if model_path.exists() {
            let model = TrainedModel::load(&model_path)
                .with_context(|| format!("Failed to load model {}", model_path.display()))?;
            info!("Loaded model from {}", model_path.display());
            pipeline = pipeline.with_classifier(Arc::new(model));
        } else if args.model.is_some() {
            anyhow::bail!("Model file not found: {}", model_path.display());
        } else {
            info!("No model at {}; candidates will not be gated", model_path.display());
        }
    }

    let files = collect_python_files(&target, &config.exclude)?;
    let units = read_units(&files, &root);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(create_spinner_style());
    spinner.set_message(format!("Analyzing {} files...", units.len()));
    spinner.enable_steady_tick(Duration::from_millis(100));
    let reports = pipeline.analyze_batch(&units);
    spinner.finish_and_clear();

    print!("{}", reporters::render(&reports, args.format)?);

    if args.diff {
        if args.format == OutputFormat::Text {
            for report in &reports {
                print!("{}", report.diff());
            }
        } else {
            warn!("--diff is ignored with --format {}", args.format);
        }
    }

    if args.apply {
        let changed = apply_in_place(&reports, &root)?;
        eprintln!(
            "{}Rewrote {} file(s)",
            style("✓ ").green(),
            style(changed).cyan()
        );
    }

    if let Some(out_dir) = args.output {
        let written = write_output_tree(&reports, out_dir)?;
        eprintln!(
            "{}Wrote {} file(s) to {}",
            style("✓ ").green(),
            style(written).cyan(),
            style(out_dir.display()).cyan()
        );
    }

    Ok(())
}

fn create_spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Python files under `target` (or `target` itself), respecting .gitignore
/// and the configured exclusions. Sorted for stable output.
pub(crate) fn collect_python_files(target: &Path, exclude: &ExcludeConfig) -> Result<Vec<PathBuf>> {
    if target.is_file() {
        return Ok(vec![target.to_path_buf()]);
    }

    let mut overrides = OverrideBuilder::new(target);
    for pattern in &exclude.paths {
        overrides
            .add(&format!("!{pattern}"))
            .with_context(|| format!("Invalid exclude pattern '{pattern}'"))?;
    }

    let mut builder = WalkBuilder::new(target);
    builder
        .hidden(true)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .require_git(false)
        .overrides(overrides.build()?);

    let mut files = Vec::new();
    for entry in builder.build().flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            if PYTHON_EXTENSIONS.contains(&ext) {
                files.push(path.to_path_buf());
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Unit names are paths relative to `root`.
fn read_units(files: &[PathBuf], root: &Path) -> Vec<SourceUnit> {
    files
        .iter()
        .filter_map(|path| match std::fs::read_to_string(path) {
            Ok(text) => {
                let name = path.strip_prefix(root).unwrap_or(path);
                Some(SourceUnit::new(name.display().to_string(), text))
            }
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                None
            }
        })
        .collect()
}

fn apply_in_place(reports: &[UnitReport], root: &Path) -> Result<usize> {
    let mut changed = 0;
    for report in reports.iter().filter(|r| r.has_changes()) {
        let path = root.join(&report.unit);
        std::fs::write(&path, report.rewritten_source())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        changed += 1;
    }
    Ok(changed)
}

fn write_output_tree(reports: &[UnitReport], out_dir: &Path) -> Result<usize> {
    for report in reports {
        let path = out_dir.join(&report.unit);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(&path, report.rewritten_source())
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(reports.len())
}
