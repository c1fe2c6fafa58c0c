//! Online refactoring pipeline
//!
//! Per source unit:
//! 1. Parse into a SyntaxIndex (failure → ParseError diagnostic, nothing else)
//! 2. Detect pattern matches
//! 3. Transform each match into a candidate (failure → UnsupportedPattern)
//! 4. Gate each candidate with the classifier, when one is loaded
//!
//! Units are independent; `analyze_batch` runs them in parallel and one
//! unit's failure never affects another.

use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use crate::classifier::{GatingPolicy, RiskClassifier};
use crate::config::ProjectConfig;
use crate::detectors::{PatternDetector, PatternMatch};
use crate::errors::AnalysisError;
use crate::fixes::{apply_candidates, unified_diff, Transformer};
use crate::models::{Diagnostic, GatingDecision, RewriteCandidate, SourceUnit};
use crate::parsers::SyntaxIndex;

/// Everything produced for one source unit
#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub unit: String,
    pub matches: Vec<PatternMatch>,
    /// Candidates produced without a classifier; never applied
    pub ungated: Vec<RewriteCandidate>,
    pub decisions: Vec<GatingDecision>,
    pub diagnostics: Vec<Diagnostic>,
    #[serde(skip)]
    source: Arc<str>,
}

impl UnitReport {
    fn empty(unit: &SourceUnit) -> Self {
        Self {
            unit: unit.name().to_string(),
            matches: Vec::new(),
            ungated: Vec::new(),
            decisions: Vec::new(),
            diagnostics: Vec::new(),
            source: unit.shared_text(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn accepted(&self) -> impl Iterator<Item = &GatingDecision> {
        self.decisions.iter().filter(|d| d.accepted)
    }

    pub fn rejected(&self) -> impl Iterator<Item = &GatingDecision> {
        self.decisions.iter().filter(|d| !d.accepted)
    }

    pub fn has_changes(&self) -> bool {
        self.accepted().next().is_some()
    }

    /// The unit's text with every accepted candidate applied.
    pub fn rewritten_source(&self) -> String {
        let (text, _) = apply_candidates(&self.source, self.accepted().map(|d| &d.candidate));
        text
    }

    /// Unified diff of the accepted candidates (empty when none apply).
    pub fn diff(&self) -> String {
        let (_, applied) = apply_candidates(&self.source, self.accepted().map(|d| &d.candidate));
        unified_diff(&self.unit, &self.source, &applied)
    }
}

pub struct RefactorPipeline {
    detector: PatternDetector,
    transformer: Transformer,
    gate: GatingPolicy,
    classifier: Option<Arc<dyn RiskClassifier>>,
}

impl Default for RefactorPipeline {
    fn default() -> Self {
        Self::new(PatternDetector::new(), GatingPolicy::default())
    }
}

impl RefactorPipeline {
    pub fn new(detector: PatternDetector, gate: GatingPolicy) -> Self {
        Self {
            detector,
            transformer: Transformer::new(),
            gate,
            classifier: None,
        }
    }

    /// Pipeline configured from a project config (rule table and threshold).
    pub fn from_config(config: &ProjectConfig) -> Result<Self, AnalysisError> {
        Ok(Self::new(
            PatternDetector::from_config(&config.rules),
            GatingPolicy::new(config.gating.threshold)?,
        ))
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn RiskClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn is_gated(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn gate(&self) -> &GatingPolicy {
        &self.gate
    }

    pub fn analyze(&self, unit: &SourceUnit) -> UnitReport {
        let mut report = UnitReport::empty(unit);

        let index = match SyntaxIndex::parse(unit) {
            Ok(index) => index,
            Err(e) => {
                warn!("{}", e);
                report.diagnostics.push(Diagnostic::from_error(unit.name(), &e));
                return report;
            }
        };

        let matches = self.detector.detect_in(&index);
        for m in &matches {
            let candidate = match self.transformer.transform(m) {
                Ok(candidate) => candidate,
                Err(e) => {
                    warn!("{}: skipping {}", unit.name(), e);
                    report
                        .diagnostics
                        .push(Diagnostic::from_error(unit.name(), &e).at(m.span, m.kind));
                    continue;
                }
            };

            let Some(classifier) = &self.classifier else {
                report.ungated.push(candidate);
                continue;
            };
            match self.gate.decide(&candidate, classifier.as_ref()) {
                Ok(decision) => report.decisions.push(decision),
                Err(e) => {
                    warn!("{}: cannot gate {} at line {}: {}", unit.name(), m.kind, m.span.start.line, e);
                    report
                        .diagnostics
                        .push(Diagnostic::from_error(unit.name(), &e).at(m.span, m.kind));
                }
            }
        }

        debug!(
            "{}: {} matches, {} accepted, {} diagnostics",
            unit.name(),
            matches.len(),
            report.accepted().count(),
            report.diagnostics.len()
        );
        report.matches = matches;
        report
    }

    /// Analyze units in parallel; reports come back in input order.
    pub fn analyze_batch(&self, units: &[SourceUnit]) -> Vec<UnitReport> {
        units.par_iter().map(|unit| self.analyze(unit)).collect()
    }
}
