//! Text (terminal) reporter with colors and formatting

use anyhow::Result;

use super::AnalysisSummary;
use crate::models::{GatingDecision, RewriteCandidate};
use crate::pipeline::UnitReport;

/// Reset ANSI color
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

fn candidate_line(unit: &str, candidate: &RewriteCandidate) -> String {
    format!(
        "{unit}:{} {BOLD}{}{RESET} {}\n",
        candidate.span.start.line, candidate.kind, candidate.description
    )
}

fn decision_lines(unit: &str, decision: &GatingDecision) -> String {
    let (tag, color) = if decision.accepted {
        ("[ACCEPT]", GREEN)
    } else {
        ("[REJECT]", RED)
    };
    let mut out = format!("  {color}{tag}{RESET} ");
    out.push_str(&candidate_line(unit, &decision.candidate));
    out.push_str(&format!(
        "           {DIM}p={:.3} threshold={:.2}{}{RESET}\n",
        decision.probability,
        decision.threshold,
        decision
            .reason
            .as_deref()
            .map(|r| format!(" ({r})"))
            .unwrap_or_default()
    ));
    out.push_str(&format!(
        "           {DIM}→ {}{RESET}\n",
        first_line(&decision.candidate.after_text)
    ));
    out
}

/// Render reports as formatted terminal output
pub fn render(reports: &[UnitReport]) -> Result<String> {
    let summary = AnalysisSummary::from_reports(reports);
    let mut out = String::new();

    out.push_str(&format!("\n{BOLD}SafeRefactor Analysis{RESET}\n"));
    out.push_str(&format!(
        "{DIM}──────────────────────────────────────{RESET}\n"
    ));
    out.push_str(&format!(
        "Files: {}  Matches: {}  Accepted: {GREEN}{}{RESET}  Rejected: {RED}{}{RESET}",
        summary.units, summary.matches, summary.accepted, summary.rejected
    ));
    if summary.ungated > 0 {
        out.push_str(&format!("  Ungated: {}", summary.ungated));
    }
    out.push_str("\n\n");

    let has_rewrites = reports
        .iter()
        .any(|r| !r.decisions.is_empty() || !r.ungated.is_empty());
    if has_rewrites {
        out.push_str(&format!("{BOLD}REWRITES{RESET}\n"));
        for report in reports {
            for decision in &report.decisions {
                out.push_str(&decision_lines(&report.unit, decision));
            }
            for candidate in &report.ungated {
                out.push_str(&format!("  {YELLOW}[NOGATE]{RESET} "));
                out.push_str(&candidate_line(&report.unit, candidate));
                out.push_str(&format!(
                    "           {DIM}→ {}{RESET}\n",
                    first_line(&candidate.after_text)
                ));
            }
        }
        out.push('\n');
    }

    if summary.diagnostics > 0 {
        out.push_str(&format!(
            "{BOLD}DIAGNOSTICS{RESET} ({} total)\n",
            summary.diagnostics
        ));
        for report in reports {
            for d in &report.diagnostics {
                let line = d
                    .span
                    .map(|s| format!(":{}", s.start.line))
                    .unwrap_or_default();
                out.push_str(&format!(
                    "  {YELLOW}{}{RESET} {}{line} {DIM}{}{RESET}\n",
                    d.kind, d.unit, d.message
                ));
            }
        }
        out.push('\n');
    }

    if summary.ungated > 0 && summary.accepted + summary.rejected == 0 {
        out.push_str(&format!(
            "{DIM}No model loaded: candidates were not gated and nothing will be applied.\nRun `saferefactor train` to build one.{RESET}\n"
        ));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporters::tests::test_reports;

    #[test]
    fn test_text_render() {
        let out = render(&test_reports()).expect("render text");
        assert!(out.contains("SafeRefactor Analysis"));
        assert!(out.contains("[ACCEPT]"));
        assert!(out.contains("app/loops.py:1"));
        assert!(out.contains("result = [i * 2 for i in items]"));
        assert!(out.contains("DIAGNOSTICS"));
        assert!(out.contains("app/broken.py"));
    }

    #[test]
    fn test_text_render_empty() {
        let out = render(&[]).expect("render text");
        assert!(out.contains("Files: 0"));
        assert!(!out.contains("REWRITES"));
    }
}
