//! Detection engine
//!
//! The PatternDetector runs every registered rule over every statement of a
//! unit and resolves overlapping matches:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    PatternDetector                      │
//! ├─────────────────────────────────────────────────────────┤
//! │  1. Parse unit into a SyntaxIndex (fail → ParseError)   │
//! │  2. Walk statements, offer each site to every rule      │
//! │  3. Drop matches that contain another match             │
//! │  4. Return matches in source order                      │
//! └─────────────────────────────────────────────────────────┘
//! ```

use std::cmp::Reverse;
use tracing::debug;

use crate::config::RulesConfig;
use crate::detectors::base::{PatternMatch, Rule};
use crate::detectors::{
    AccumulationLoopDetector, ConditionalChainDetector, NestedConditionalDetector,
};
use crate::errors::AnalysisError;
use crate::models::SourceUnit;
use crate::parsers::SyntaxIndex;

/// Runs the rule table over source units
pub struct PatternDetector {
    rules: Vec<Box<dyn Rule>>,
}

impl PatternDetector {
    /// Detector with every rule enabled, in table order.
    pub fn new() -> Self {
        Self::from_config(&RulesConfig::default())
    }

    /// Detector with the rules enabled in `config`.
    pub fn from_config(config: &RulesConfig) -> Self {
        let mut rules: Vec<Box<dyn Rule>> = Vec::new();
        if config.accumulation_loop {
            rules.push(Box::new(AccumulationLoopDetector::new()));
        }
        if config.nested_conditional {
            rules.push(Box::new(NestedConditionalDetector::new()));
        }
        if config.conditional_chain {
            rules.push(Box::new(
                ConditionalChainDetector::new().with_min_arms(config.min_chain_arms),
            ));
        }
        Self { rules }
    }

    /// Detector running exactly `rules`, whose order decides ties.
    pub fn with_rules(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules.iter().map(|r| r.as_ref())
    }

    /// Parse `unit` and return its non-overlapping matches in source order.
    pub fn detect(&self, unit: &SourceUnit) -> Result<Vec<PatternMatch>, AnalysisError> {
        let index = SyntaxIndex::parse(unit)?;
        Ok(self.detect_in(&index))
    }

    /// Run the rules over an already-parsed unit.
    pub fn detect_in(&self, index: &SyntaxIndex<'_>) -> Vec<PatternMatch> {
        let mut found = Vec::new();
        index.walk(&mut |site| {
            for (order, rule) in self.rules.iter().enumerate() {
                if let Some(m) = rule.check(site, index) {
                    found.push((order, m));
                }
            }
        });

        let total = found.len();
        let matches = resolve_overlaps(found);
        debug!(
            "{}: {} matches ({} suppressed as enclosing)",
            index.unit().name(),
            matches.len(),
            total - matches.len()
        );
        matches
    }
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Keep the innermost matches. A match is dropped when it contains another
/// match; for identical spans the rule earlier in the table wins.
fn resolve_overlaps(found: Vec<(usize, PatternMatch)>) -> Vec<PatternMatch> {
    let dropped: Vec<bool> = found
        .iter()
        .enumerate()
        .map(|(i, (order, m))| {
            found.iter().enumerate().any(|(j, (other_order, other))| {
                i != j
                    && m.span.contains(&other.span)
                    && (m.span != other.span || (*other_order, j) < (*order, i))
            })
        })
        .collect();

    let mut kept: Vec<PatternMatch> = found
        .into_iter()
        .zip(dropped)
        .filter(|(_, dropped)| !dropped)
        .map(|((_, m), _)| m)
        .collect();
    kept.sort_by_key(|m| (m.span.start_byte, Reverse(m.span.end_byte)));
    kept
}
