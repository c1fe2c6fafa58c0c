//! JSON reporter
//!
//! Outputs every unit report plus a run summary as pretty-printed JSON.
//! Useful for machine consumption, piping to jq, or further processing.

use anyhow::Result;
use serde::Serialize;

use super::AnalysisSummary;
use crate::pipeline::UnitReport;

#[derive(Serialize)]
struct JsonReport<'a> {
    summary: AnalysisSummary,
    units: &'a [UnitReport],
}

/// Render reports as JSON
pub fn render(reports: &[UnitReport]) -> Result<String> {
    let report = JsonReport {
        summary: AnalysisSummary::from_reports(reports),
        units: reports,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporters::tests::test_reports;

    #[test]
    fn test_json_render_valid() {
        let json_str = render(&test_reports()).expect("render JSON");
        let parsed: serde_json::Value = serde_json::from_str(&json_str).expect("parse JSON");
        assert_eq!(parsed["summary"]["accepted"], 1);

        let units = parsed["units"].as_array().expect("units array");
        assert_eq!(units.len(), 3);
        let decision = &units[0]["decisions"][0];
        assert_eq!(decision["accepted"], true);
        assert_eq!(decision["threshold"], 0.3);
        assert_eq!(decision["candidate"]["kind"], "accumulation-loop");
        assert_eq!(units[2]["diagnostics"][0]["kind"], "parse-error");
    }

    #[test]
    fn test_json_empty() {
        let json_str = render(&[]).expect("render JSON");
        let parsed: serde_json::Value = serde_json::from_str(&json_str).expect("parse JSON");
        assert_eq!(parsed["units"].as_array().expect("units array").len(), 0);
    }
}
