//! Output reporters for analysis results
//!
//! Supports two output formats:
//! - `text` - Terminal output with colors
//! - `json` - Machine-readable JSON

mod json;
mod text;

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::str::FromStr;

use crate::pipeline::UnitReport;

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" | "terminal" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(anyhow!("Unknown format '{}'. Valid formats: text, json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Counts across every unit of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisSummary {
    pub units: usize,
    pub matches: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub ungated: usize,
    pub diagnostics: usize,
}

impl AnalysisSummary {
    pub fn from_reports(reports: &[UnitReport]) -> Self {
        reports.iter().fold(
            AnalysisSummary {
                units: reports.len(),
                ..Default::default()
            },
            |mut s, r| {
                s.matches += r.matches.len();
                s.accepted += r.accepted().count();
                s.rejected += r.rejected().count();
                s.ungated += r.ungated.len();
                s.diagnostics += r.diagnostics.len();
                s
            },
        )
    }
}

/// Render unit reports in the specified format
pub fn render(reports: &[UnitReport], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => text::render(reports),
        OutputFormat::Json => json::render(reports),
    }
}
