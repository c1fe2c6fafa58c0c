//! Accept/reject decisions for rewrite candidates
//!
//! A candidate is accepted iff its predicted error probability is at or
//! below the threshold. Anything uncertain (a NaN probability, a feature
//! mapping the classifier was not trained on) is never accepted.

use tracing::debug;

use super::features::FeatureExtractor;
use super::model::RiskClassifier;
use crate::errors::AnalysisError;
use crate::models::{GatingDecision, RewriteCandidate};

/// Default acceptance threshold
pub const DEFAULT_THRESHOLD: f64 = 0.3;

/// Reason recorded on rejected decisions
pub const RISK_ABOVE_THRESHOLD: &str = "RiskAboveThreshold";

#[derive(Debug, Clone)]
pub struct GatingPolicy {
    threshold: f64,
    extractor: FeatureExtractor,
}

impl Default for GatingPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            extractor: FeatureExtractor::new(),
        }
    }
}

impl GatingPolicy {
    /// Threshold must lie in [0, 1].
    pub fn new(threshold: f64) -> Result<Self, AnalysisError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(AnalysisError::InvalidThreshold(threshold));
        }
        Ok(Self {
            threshold,
            ..Self::default()
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Score `candidate` with `classifier` and decide.
    pub fn decide(
        &self,
        candidate: &RewriteCandidate,
        classifier: &dyn RiskClassifier,
    ) -> Result<GatingDecision, AnalysisError> {
        if classifier.feature_version() != self.extractor.version() {
            return Err(AnalysisError::FeatureVersionMismatch {
                expected: classifier.feature_version(),
                found: self.extractor.version(),
            });
        }
        let features = self
            .extractor
            .extract(&candidate.before_text, &candidate.after_text)?;
        let probability = classifier.predict(&features);
        Ok(self.decide_with_probability(candidate, probability))
    }

    /// Decide for an already-computed probability.
    pub fn decide_with_probability(
        &self,
        candidate: &RewriteCandidate,
        probability: f64,
    ) -> GatingDecision {
        let accepted = probability <= self.threshold;
        debug!(
            "{} at line {}: p={:.3} threshold={:.3} -> {}",
            candidate.kind,
            candidate.span.start.line,
            probability,
            self.threshold,
            if accepted { "accept" } else { "reject" }
        );
        GatingDecision {
            candidate: candidate.clone(),
            probability,
            threshold: self.threshold,
            accepted,
            reason: (!accepted).then(|| RISK_ABOVE_THRESHOLD.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::features::{FeatureVector, FEATURE_VERSION};
    use crate::models::{PatternKind, Position, Span};

    struct Fixed {
        probability: f64,
        version: u32,
    }

    impl RiskClassifier for Fixed {
        fn predict(&self, _features: &FeatureVector) -> f64 {
            self.probability
        }

        fn feature_version(&self) -> u32 {
            self.version
        }
    }

    fn candidate() -> RewriteCandidate {
        let pos = |line| Position { line, column: 0 };
        RewriteCandidate {
            kind: PatternKind::NestedConditional,
            span: Span {
                start: pos(1),
                end: pos(3),
                start_byte: 0,
                end_byte: 30,
            },
            before_text: "if a:\n  if b:\n    print(c)".to_string(),
            after_text: "if a and b:\n  print(c)".to_string(),
            indent: String::new(),
            description: "nested if".to_string(),
        }
    }

    fn fixed(probability: f64) -> Fixed {
        Fixed {
            probability,
            version: FEATURE_VERSION,
        }
    }

    #[test]
    fn test_threshold_moves_the_decision() {
        let c = candidate();
        let lenient = GatingPolicy::new(0.5).expect("valid");
        let strict = GatingPolicy::new(0.1).expect("valid");

        let accepted = lenient.decide(&c, &fixed(0.23)).expect("decide");
        assert!(accepted.accepted);
        assert_eq!(accepted.reason, None);

        let rejected = strict.decide(&c, &fixed(0.23)).expect("decide");
        assert!(!rejected.accepted);
        assert_eq!(rejected.reason.as_deref(), Some(RISK_ABOVE_THRESHOLD));
        assert_eq!(rejected.threshold, 0.1);
    }

    #[test]
    fn test_boundary_is_accepted() {
        let policy = GatingPolicy::new(0.3).expect("valid");
        assert!(policy.decide_with_probability(&candidate(), 0.3).accepted);
        assert!(!policy.decide_with_probability(&candidate(), 0.300001).accepted);
    }

    #[test]
    fn test_extreme_thresholds() {
        let zero = GatingPolicy::new(0.0).expect("valid");
        let one = GatingPolicy::new(1.0).expect("valid");
        assert!(zero.decide_with_probability(&candidate(), 0.0).accepted);
        assert!(!zero.decide_with_probability(&candidate(), 0.01).accepted);
        assert!(one.decide_with_probability(&candidate(), 1.0).accepted);
    }

    #[test]
    fn test_nan_is_rejected() {
        let policy = GatingPolicy::default();
        assert!(!policy.decide_with_probability(&candidate(), f64::NAN).accepted);
    }

    #[test]
    fn test_invalid_threshold() {
        assert_eq!(
            GatingPolicy::new(1.5).err(),
            Some(AnalysisError::InvalidThreshold(1.5))
        );
        assert!(GatingPolicy::new(-0.1).is_err());
        assert!(GatingPolicy::new(f64::NAN).is_err());
    }

    #[test]
    fn test_version_mismatch() {
        let classifier = Fixed {
            probability: 0.0,
            version: FEATURE_VERSION + 1,
        };
        let err = GatingPolicy::default()
            .decide(&candidate(), &classifier)
            .expect_err("mismatch");
        assert!(matches!(err, AnalysisError::FeatureVersionMismatch { .. }));
    }

    #[test]
    fn test_malformed_after_text() {
        let mut c = candidate();
        c.after_text = "if a and:\n  print(c)".to_string();
        let err = GatingPolicy::default()
            .decide(&c, &fixed(0.0))
            .expect_err("broken after");
        assert!(matches!(err, AnalysisError::MalformedSnippet { .. }));
    }
}
