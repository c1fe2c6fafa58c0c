//! Training for the regression-risk classifier
//!
//! Flow: extract features for every labeled example, hold out a stratified
//! validation partition, grid-search forest hyperparameters with stratified
//! k-fold cross-validation on the rest, refit the winner on the whole
//! training partition and score it on the held-out data.
//!
//! Every random choice derives from `TrainConfig::seed`, so two runs over
//! the same data select the same parameters and produce the same forest.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::dataset::LabeledExample;
use super::features::FeatureExtractor;
use super::forest::{derive_seed, ForestParams, RandomForest, SplitCriterion};
use super::metrics::{EvaluationMetrics, SelectionMetric};
use super::model::TrainedModel;
use crate::errors::TrainError;

/// Minimum number of usable examples
pub const MIN_TRAINING_EXAMPLES: usize = 10;

/// Hyperparameter values to search; every combination is one trial.
#[derive(Debug, Clone, PartialEq)]
pub struct HyperparameterGrid {
    pub n_trees: Vec<usize>,
    pub max_depth: Vec<Option<usize>>,
    pub min_samples_split: Vec<usize>,
    pub criteria: Vec<SplitCriterion>,
}

impl Default for HyperparameterGrid {
    fn default() -> Self {
        Self {
            n_trees: vec![50, 100],
            max_depth: vec![None, Some(5)],
            min_samples_split: vec![2, 5],
            criteria: vec![SplitCriterion::Gini, SplitCriterion::Entropy],
        }
    }
}

impl HyperparameterGrid {
    /// A grid holding exactly one combination.
    pub fn single(params: ForestParams) -> Self {
        Self {
            n_trees: vec![params.n_trees],
            max_depth: vec![params.max_depth],
            min_samples_split: vec![params.min_samples_split],
            criteria: vec![params.criterion],
        }
    }

    /// All combinations in a fixed order (trees, depth, split size, criterion).
    pub fn candidates(&self) -> Vec<ForestParams> {
        let mut out = Vec::new();
        for &n_trees in &self.n_trees {
            for &max_depth in &self.max_depth {
                for &min_samples_split in &self.min_samples_split {
                    for &criterion in &self.criteria {
                        out.push(ForestParams {
                            n_trees,
                            max_depth,
                            min_samples_split,
                            criterion,
                        });
                    }
                }
            }
        }
        out
    }
}

/// Training configuration
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    pub seed: u64,
    /// Fraction of examples held out for validation (0.0 - 1.0, exclusive)
    pub validation_split: f64,
    pub cv_folds: usize,
    pub min_examples: usize,
    pub selection_metric: SelectionMetric,
    pub grid: HyperparameterGrid,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            validation_split: 0.2,
            cv_folds: 3,
            min_examples: MIN_TRAINING_EXAMPLES,
            selection_metric: SelectionMetric::default(),
            grid: HyperparameterGrid::default(),
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<(), TrainError> {
        if !(self.validation_split > 0.0 && self.validation_split < 1.0) {
            return Err(TrainError::InvalidConfig(format!(
                "validation split must be between 0 and 1, got {}",
                self.validation_split
            )));
        }
        if self.cv_folds < 2 {
            return Err(TrainError::InvalidConfig(format!(
                "need at least 2 cross-validation folds, got {}",
                self.cv_folds
            )));
        }
        let candidates = self.grid.candidates();
        if candidates.is_empty() {
            return Err(TrainError::InvalidConfig(
                "hyperparameter grid is empty".to_string(),
            ));
        }
        if candidates.iter().any(|p| p.n_trees == 0) {
            return Err(TrainError::InvalidConfig(
                "a forest needs at least one tree".to_string(),
            ));
        }
        Ok(())
    }
}

/// Shared flag to stop a training run between trials
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Cross-validation outcome of one grid combination
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialResult {
    pub index: usize,
    pub params: ForestParams,
    pub seed: u64,
    pub score: f64,
    pub fold_scores: Vec<f64>,
}

/// Everything a training run produced
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub model: TrainedModel,
    pub validation: EvaluationMetrics,
    pub selected: TrialResult,
    pub trials: Vec<TrialResult>,
    /// Examples dropped because a snippet did not parse
    pub skipped_examples: usize,
    pub training_examples: usize,
    pub validation_examples: usize,
}

impl std::fmt::Display for TrainReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Trained on {} examples, validated on {} ({} skipped)",
            self.training_examples, self.validation_examples, self.skipped_examples
        )?;
        writeln!(f, "Selected: {}", self.selected.params)?;
        writeln!(
            f,
            "Cross-validation score: {:.3} over {} trials",
            self.selected.score,
            self.trials.len()
        )?;
        writeln!(f, "Validation:")?;
        write!(f, "{}", self.validation)
    }
}

/// Feature matrix with labels
struct Dataset {
    rows: Vec<Vec<f64>>,
    labels: Vec<bool>,
}

impl Dataset {
    fn subset(&self, idx: &[usize]) -> (Vec<Vec<f64>>, Vec<bool>) {
        (
            idx.iter().map(|&i| self.rows[i].clone()).collect(),
            idx.iter().map(|&i| self.labels[i]).collect(),
        )
    }
}

/// Called with (finished trials, total trials) as the grid search advances.
/// May run on any worker thread.
pub type TrialProgress = Arc<dyn Fn(usize, usize) + Send + Sync>;

pub struct TrainingPipeline {
    config: TrainConfig,
    extractor: FeatureExtractor,
    cancel: CancellationToken,
    progress: Option<TrialProgress>,
}

impl TrainingPipeline {
    pub fn new(config: TrainConfig) -> Self {
        Self {
            config,
            extractor: FeatureExtractor::new(),
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_progress(mut self, progress: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        let progress: TrialProgress = Arc::new(progress);
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Train a model. No model is produced (and nothing is written) on error.
    pub fn train(&self, examples: &[LabeledExample]) -> Result<TrainReport, TrainError> {
        self.config.validate()?;

        let mut data = Dataset {
            rows: Vec::with_capacity(examples.len()),
            labels: Vec::with_capacity(examples.len()),
        };
        let mut skipped = 0;
        for (i, example) in examples.iter().enumerate() {
            match self
                .extractor
                .extract(&example.code_before, &example.code_after)
            {
                Ok(fv) => {
                    data.rows.push(fv.to_vec());
                    data.labels.push(example.error_introduced);
                }
                Err(e) => {
                    warn!("Skipping example {}: {}", i + 1, e);
                    skipped += 1;
                }
            }
        }

        let required = self.config.min_examples.max(2);
        if data.rows.len() < required {
            return Err(TrainError::InsufficientData {
                found: data.rows.len(),
                required,
            });
        }
        let positives = data.labels.iter().filter(|&&l| l).count();
        if positives == 0 || positives == data.labels.len() {
            return Err(TrainError::SingleClassData {
                label: u8::from(positives > 0),
            });
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let (train_idx, val_idx) =
            stratified_split(&data.labels, self.config.validation_split, &mut rng);
        info!(
            "Training on {} examples, validating on {} ({} skipped)",
            train_idx.len(),
            val_idx.len(),
            skipped
        );

        let (train_rows, train_labels) = data.subset(&train_idx);
        let folds = stratified_folds(&train_labels, self.config.cv_folds, &mut rng);
        let trials = self.run_trials(&train_rows, &train_labels, &folds)?;

        // Strictly greater keeps the lowest index on ties.
        let mut best = 0;
        for (i, trial) in trials.iter().enumerate() {
            if trial.score > trials[best].score {
                best = i;
            }
        }
        let selected = trials[best].clone();
        info!(
            "Selected trial {} ({}) with {} = {:.3}",
            selected.index, selected.params, self.config.selection_metric, selected.score
        );

        if self.cancel.is_cancelled() {
            return Err(TrainError::Cancelled);
        }
        let forest = RandomForest::fit(
            &train_rows,
            &train_labels,
            &selected.params,
            selected.seed,
        );

        let (val_rows, val_labels) = data.subset(&val_idx);
        let probabilities: Vec<f64> = val_rows.iter().map(|r| forest.predict_proba(r)).collect();
        let validation = EvaluationMetrics::from_predictions(&probabilities, &val_labels);
        info!(
            "Validation accuracy {:.1}%, F1 {:.3}",
            validation.accuracy * 100.0,
            validation.f1
        );

        let model = TrainedModel::new(
            forest,
            self.config.seed,
            selected.seed,
            validation,
            selected.score,
            train_idx.len(),
        );

        Ok(TrainReport {
            model,
            validation,
            selected,
            trials,
            skipped_examples: skipped,
            training_examples: train_idx.len(),
            validation_examples: val_idx.len(),
        })
    }

    fn run_trials(
        &self,
        rows: &[Vec<f64>],
        labels: &[bool],
        folds: &[Vec<usize>],
    ) -> Result<Vec<TrialResult>, TrainError> {
        let candidates = self.config.grid.candidates();
        let metric = self.config.selection_metric;
        let finished = AtomicUsize::new(0);

        candidates
            .par_iter()
            .enumerate()
            .map(|(index, params)| {
                if self.cancel.is_cancelled() {
                    return Err(TrainError::Cancelled);
                }
                let seed = derive_seed(self.config.seed, index as u64);
                let fold_scores = folds
                    .iter()
                    .enumerate()
                    .filter(|(_, held_out)| !held_out.is_empty())
                    .map(|(f, held_out)| {
                        if self.cancel.is_cancelled() {
                            return Err(TrainError::Cancelled);
                        }
                        Ok(score_fold(
                            rows,
                            labels,
                            held_out,
                            params,
                            derive_seed(seed, f as u64),
                            metric,
                        ))
                    })
                    .collect::<Result<Vec<f64>, TrainError>>()?;
                let score = if fold_scores.is_empty() {
                    0.0
                } else {
                    fold_scores.iter().sum::<f64>() / fold_scores.len() as f64
                };
                debug!("Trial {} ({}): {:.3}", index, params, score);
                if let Some(progress) = &self.progress {
                    let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
                    progress(done, candidates.len());
                }
                Ok(TrialResult {
                    index,
                    params: *params,
                    seed,
                    score,
                    fold_scores,
                })
            })
            .collect()
    }
}

fn score_fold(
    rows: &[Vec<f64>],
    labels: &[bool],
    held_out: &[usize],
    params: &ForestParams,
    seed: u64,
    metric: SelectionMetric,
) -> f64 {
    let mut is_held = vec![false; rows.len()];
    for &i in held_out {
        is_held[i] = true;
    }
    let (fit_rows, fit_labels): (Vec<Vec<f64>>, Vec<bool>) = (0..rows.len())
        .filter(|&i| !is_held[i])
        .map(|i| (rows[i].clone(), labels[i]))
        .unzip();
    let forest = RandomForest::fit(&fit_rows, &fit_labels, params, seed);

    let probabilities: Vec<f64> = held_out
        .iter()
        .map(|&i| forest.predict_proba(&rows[i]))
        .collect();
    let actual: Vec<bool> = held_out.iter().map(|&i| labels[i]).collect();
    EvaluationMetrics::from_predictions(&probabilities, &actual).score(metric)
}

/// Indices of each class, shuffled.
fn shuffled_classes(labels: &[bool], rng: &mut ChaCha8Rng) -> [Vec<usize>; 2] {
    let mut negatives: Vec<usize> = (0..labels.len()).filter(|&i| !labels[i]).collect();
    let mut positives: Vec<usize> = (0..labels.len()).filter(|&i| labels[i]).collect();
    negatives.shuffle(rng);
    positives.shuffle(rng);
    [negatives, positives]
}

/// Split preserving class proportions. Each class keeps at least one
/// example on the training side.
fn stratified_split(
    labels: &[bool],
    validation_split: f64,
    rng: &mut ChaCha8Rng,
) -> (Vec<usize>, Vec<usize>) {
    let mut train = Vec::new();
    let mut val = Vec::new();
    for class in shuffled_classes(labels, rng) {
        let held = ((class.len() as f64 * validation_split).round() as usize)
            .min(class.len().saturating_sub(1));
        val.extend_from_slice(&class[..held]);
        train.extend_from_slice(&class[held..]);
    }
    train.sort_unstable();
    val.sort_unstable();
    (train, val)
}

/// Assign each index to one of `k` folds, dealing each class round-robin.
fn stratified_folds(labels: &[bool], k: usize, rng: &mut ChaCha8Rng) -> Vec<Vec<usize>> {
    let mut folds = vec![Vec::new(); k];
    for class in shuffled_classes(labels, rng) {
        for (pos, i) in class.into_iter().enumerate() {
            folds[pos % k].push(i);
        }
    }
    for fold in &mut folds {
        fold.sort_unstable();
    }
    folds
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Safe pairs grow a comprehension; risky pairs rename the iterable.
    fn examples(n: usize) -> Vec<LabeledExample> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    LabeledExample::new(
                        format!("r = []\nfor x in xs{i}:\n    r.append(x)"),
                        format!("r = [x for x in xs{i}]"),
                        false,
                    )
                } else {
                    LabeledExample::new(
                        format!("if a{i}:\n    if b:\n        go()"),
                        format!("if a{i}:\n    if b:\n        go()\n    if c:\n        stop()\nwhile d:\n    e()"),
                        true,
                    )
                }
            })
            .collect()
    }

    fn small_config() -> TrainConfig {
        TrainConfig {
            grid: HyperparameterGrid {
                n_trees: vec![5, 10],
                max_depth: vec![None, Some(3)],
                min_samples_split: vec![2],
                criteria: vec![SplitCriterion::Gini],
            },
            ..TrainConfig::default()
        }
    }

    #[test]
    fn test_grid_candidates_order() {
        let grid = HyperparameterGrid::default();
        let candidates = grid.candidates();
        assert_eq!(candidates.len(), 16);
        assert_eq!(candidates[0].n_trees, 50);
        assert_eq!(candidates[0].criterion, SplitCriterion::Gini);
        assert_eq!(candidates[1].criterion, SplitCriterion::Entropy);
        assert_eq!(candidates[15].n_trees, 100);
    }

    #[test]
    fn test_train_end_to_end() {
        let report = TrainingPipeline::new(small_config())
            .train(&examples(30))
            .expect("should train");
        assert_eq!(report.trials.len(), 4);
        assert_eq!(report.skipped_examples, 0);
        assert_eq!(report.training_examples + report.validation_examples, 30);
        assert_eq!(report.validation_examples, 6);
        assert!(report.validation.accuracy >= 0.5);
        assert_eq!(report.model.training_examples, report.training_examples);
    }

    #[test]
    fn test_training_is_reproducible() {
        let data = examples(24);
        let a = TrainingPipeline::new(small_config()).train(&data).expect("train");
        let b = TrainingPipeline::new(small_config()).train(&data).expect("train");
        assert_eq!(a.selected, b.selected);
        assert_eq!(a.model.forest(), b.model.forest());
    }

    #[test]
    fn test_single_class_is_rejected() {
        let data: Vec<LabeledExample> = (0..12)
            .map(|i| LabeledExample::new(format!("x = {i}"), format!("y = {i}"), false))
            .collect();
        let err = TrainingPipeline::new(small_config())
            .train(&data)
            .expect_err("one class");
        assert_eq!(err, TrainError::SingleClassData { label: 0 });
    }

    #[test]
    fn test_insufficient_data_counts_usable_rows() {
        let mut data = examples(10);
        data[0].code_after = "r = [x for".to_string();
        let err = TrainingPipeline::new(small_config())
            .train(&data)
            .expect_err("too few");
        assert_eq!(
            err,
            TrainError::InsufficientData {
                found: 9,
                required: 10
            }
        );
    }

    #[test]
    fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let err = TrainingPipeline::new(small_config())
            .with_cancellation(token)
            .train(&examples(20))
            .expect_err("cancelled");
        assert_eq!(err, TrainError::Cancelled);
    }

    #[test]
    fn test_cancelled_while_trials_run() {
        let config = TrainConfig {
            grid: HyperparameterGrid {
                n_trees: vec![5, 10],
                max_depth: vec![None, Some(2), Some(3), Some(4)],
                min_samples_split: vec![2, 3],
                criteria: vec![SplitCriterion::Gini, SplitCriterion::Entropy],
            },
            ..TrainConfig::default()
        };
        let token = CancellationToken::new();
        let trigger = token.clone();
        let reports = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&reports);

        // The first finished trial cancels the run from a separate thread.
        let err = TrainingPipeline::new(config)
            .with_cancellation(token)
            .with_progress(move |_, total| {
                assert_eq!(total, 32);
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    let trigger = trigger.clone();
                    std::thread::spawn(move || trigger.cancel())
                        .join()
                        .expect("cancel thread");
                }
            })
            .train(&examples(40))
            .expect_err("cancelled");
        assert_eq!(err, TrainError::Cancelled);
        assert!(reports.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_progress_reports_every_trial() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        TrainingPipeline::new(small_config())
            .with_progress(move |_, total| {
                assert_eq!(total, 4);
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .train(&examples(30))
            .expect("should train");
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_model_records_base_and_forest_seeds() {
        let report = TrainingPipeline::new(small_config())
            .train(&examples(30))
            .expect("should train");
        assert_eq!(report.model.seed, TrainConfig::default().seed);
        assert_eq!(report.model.forest_seed, report.selected.seed);
        assert_eq!(
            report.model.forest_seed,
            derive_seed(report.model.seed, report.selected.index as u64)
        );
    }

    #[test]
    fn test_invalid_config() {
        let config = TrainConfig {
            cv_folds: 1,
            ..TrainConfig::default()
        };
        assert!(matches!(
            TrainingPipeline::new(config).train(&examples(20)),
            Err(TrainError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_stratified_split_keeps_both_classes_in_training() {
        let labels = vec![true, false, false, false, false];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let (train, val) = stratified_split(&labels, 0.5, &mut rng);
        assert!(train.iter().any(|&i| labels[i]));
        assert_eq!(train.len() + val.len(), labels.len());
    }

    #[test]
    fn test_stratified_folds_cover_everything_once() {
        let labels: Vec<bool> = (0..11).map(|i| i % 3 == 0).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let folds = stratified_folds(&labels, 3, &mut rng);
        let mut all: Vec<usize> = folds.concat();
        all.sort_unstable();
        assert_eq!(all, (0..11).collect::<Vec<_>>());
    }
}
