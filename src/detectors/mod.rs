//! Structural pattern detectors
//!
//! This module provides the rule framework and the three rules that find
//! mechanically-improvable Python shapes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     PatternDetector                         │
//! │  - Holds the rule table (order breaks ties)                 │
//! │  - Offers every statement site to every rule                │
//! │  - Keeps innermost matches, sorted by position              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Rule Trait                           │
//! │  - kind(): PatternKind produced                             │
//! │  - check(site, index): recognise or decline                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!              ┌───────────────┼───────────────┐
//!              ▼               ▼               ▼
//! ┌──────────────────┐ ┌──────────────┐ ┌──────────────────┐
//! │ AccumulationLoop │ │ Nested       │ │ Conditional      │
//! │ (comprehension)  │ │ Conditional  │ │ Chain (dict)     │
//! └──────────────────┘ └──────────────┘ └──────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let detector = PatternDetector::new();
//! let matches = detector.detect(&SourceUnit::new("a.py", source))?;
//! ```

mod accumulation_loop;
pub mod base;
mod conditional_chain;
mod engine;
mod nested_conditional;

pub use accumulation_loop::AccumulationLoopDetector;
pub use base::{Accumulation, Capture, ChainArm, PatternMatch, Rule};
pub use conditional_chain::{ConditionalChainDetector, MIN_CHAIN_ARMS};
pub use engine::PatternDetector;
pub use nested_conditional::NestedConditionalDetector;
