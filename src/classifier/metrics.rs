//! Binary classification metrics

use serde::{Deserialize, Serialize};

/// Probability above which a prediction counts as "error introduced"
pub const DECISION_BOUNDARY: f64 = 0.5;

/// Confusion counts, positive = error introduced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

impl ConfusionMatrix {
    pub fn record(&mut self, predicted: bool, actual: bool) {
        match (predicted, actual) {
            (true, true) => self.true_positives += 1,
            (true, false) => self.false_positives += 1,
            (false, false) => self.true_negatives += 1,
            (false, true) => self.false_negatives += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Validation metrics for a fitted model
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub balanced_accuracy: f64,
    pub confusion: ConfusionMatrix,
    pub support: usize,
}

impl EvaluationMetrics {
    /// Score `probabilities` against `labels` at the 0.5 boundary.
    pub fn from_predictions(probabilities: &[f64], labels: &[bool]) -> Self {
        let mut confusion = ConfusionMatrix::default();
        for (p, &actual) in probabilities.iter().zip(labels) {
            confusion.record(*p > DECISION_BOUNDARY, actual);
        }
        Self::from_confusion(confusion)
    }

    pub fn from_confusion(c: ConfusionMatrix) -> Self {
        let precision = ratio(c.true_positives, c.true_positives + c.false_positives);
        let recall = ratio(c.true_positives, c.true_positives + c.false_negatives);
        let specificity = ratio(c.true_negatives, c.true_negatives + c.false_positives);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            accuracy: ratio(c.true_positives + c.true_negatives, c.total()),
            precision,
            recall,
            f1,
            balanced_accuracy: (recall + specificity) / 2.0,
            confusion: c,
            support: c.total(),
        }
    }

    pub fn score(&self, metric: SelectionMetric) -> f64 {
        match metric {
            SelectionMetric::Accuracy => self.accuracy,
            SelectionMetric::BalancedAccuracy => self.balanced_accuracy,
            SelectionMetric::F1 => self.f1,
        }
    }
}

impl std::fmt::Display for EvaluationMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "  Accuracy:          {:.1}%", self.accuracy * 100.0)?;
        writeln!(f, "  Balanced accuracy: {:.1}%", self.balanced_accuracy * 100.0)?;
        writeln!(f, "  Precision:         {:.3}", self.precision)?;
        writeln!(f, "  Recall:            {:.3}", self.recall)?;
        writeln!(f, "  F1:                {:.3}", self.f1)?;
        write!(
            f,
            "  Confusion:         TP={} FP={} TN={} FN={}",
            self.confusion.true_positives,
            self.confusion.false_positives,
            self.confusion.true_negatives,
            self.confusion.false_negatives
        )
    }
}

/// Score used to rank hyperparameter trials
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionMetric {
    Accuracy,
    #[default]
    BalancedAccuracy,
    F1,
}

impl std::str::FromStr for SelectionMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "accuracy" => Ok(SelectionMetric::Accuracy),
            "balanced-accuracy" => Ok(SelectionMetric::BalancedAccuracy),
            "f1" => Ok(SelectionMetric::F1),
            other => Err(format!("unknown selection metric '{other}'")),
        }
    }
}

impl std::fmt::Display for SelectionMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionMetric::Accuracy => write!(f, "accuracy"),
            SelectionMetric::BalancedAccuracy => write!(f, "balanced-accuracy"),
            SelectionMetric::F1 => write!(f, "f1"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_from_predictions() {
        let probs = [0.9, 0.8, 0.2, 0.1, 0.7, 0.4];
        let labels = [true, true, false, false, false, true];
        let m = EvaluationMetrics::from_predictions(&probs, &labels);
        assert_eq!(m.confusion.true_positives, 2);
        assert_eq!(m.confusion.false_positives, 1);
        assert_eq!(m.confusion.true_negatives, 2);
        assert_eq!(m.confusion.false_negatives, 1);
        assert!((m.accuracy - 4.0 / 6.0).abs() < 1e-9);
        assert!((m.precision - 2.0 / 3.0).abs() < 1e-9);
        assert!((m.recall - 2.0 / 3.0).abs() < 1e-9);
        assert!((m.balanced_accuracy - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(m.support, 6);
    }

    #[test]
    fn test_boundary_is_exclusive() {
        let m = EvaluationMetrics::from_predictions(&[0.5], &[true]);
        assert_eq!(m.confusion.false_negatives, 1);
    }

    #[test]
    fn test_zero_denominators() {
        let m = EvaluationMetrics::from_predictions(&[0.1, 0.2], &[false, false]);
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.recall, 0.0);
        assert_eq!(m.f1, 0.0);
        assert_eq!(m.accuracy, 1.0);
    }

    #[test]
    fn test_selection_metric_parse() {
        assert_eq!(
            "balanced_accuracy".parse::<SelectionMetric>(),
            Ok(SelectionMetric::BalancedAccuracy)
        );
        assert!("auc".parse::<SelectionMetric>().is_err());
    }
}
