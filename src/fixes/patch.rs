//! Applying candidates to a buffer and rendering unified diffs

use tracing::warn;

use super::snippet::dedent_text;
use crate::models::RewriteCandidate;

/// Lines of context around each hunk
const CONTEXT_LINES: usize = 3;

/// Splice `candidates` into `source`, in position order.
///
/// A candidate is skipped (with a warning) when it overlaps one already
/// applied, or when the text under its span no longer matches its
/// `before_text`. Returns the new text and the candidates actually applied.
pub fn apply_candidates<'c>(
    source: &str,
    candidates: impl IntoIterator<Item = &'c RewriteCandidate>,
) -> (String, Vec<&'c RewriteCandidate>) {
    let mut ordered: Vec<&RewriteCandidate> = candidates.into_iter().collect();
    ordered.sort_by_key(|c| (c.span.start_byte, c.span.end_byte));

    let mut out = String::with_capacity(source.len());
    let mut applied = Vec::new();
    let mut cursor = 0;

    for candidate in ordered {
        let span = candidate.span;
        if span.start_byte < cursor {
            warn!(
                "Skipping {} at line {}: overlaps an earlier rewrite",
                candidate.kind, span.start.line
            );
            continue;
        }
        let Some(original) = source.get(span.start_byte..span.end_byte) else {
            warn!(
                "Skipping {} at line {}: span is outside the source",
                candidate.kind, span.start.line
            );
            continue;
        };
        if dedent_text(original, &candidate.indent).as_deref() != Ok(candidate.before_text.as_str())
        {
            warn!(
                "Skipping {} at line {}: source no longer matches",
                candidate.kind, span.start.line
            );
            continue;
        }

        out.push_str(source.get(cursor..span.start_byte).unwrap_or_default());
        out.push_str(&candidate.replacement_text());
        cursor = span.end_byte;
        applied.push(candidate);
    }

    out.push_str(source.get(cursor..).unwrap_or_default());
    (out, applied)
}

/// One changed run of whole lines (0-based, inclusive).
struct LineEdit {
    first: usize,
    last: usize,
    new_lines: Vec<String>,
}

fn line_edit(source: &str, candidate: &RewriteCandidate) -> Option<LineEdit> {
    let span = candidate.span;
    let line_start = source.get(..span.start_byte)?.rfind('\n').map_or(0, |i| i + 1);
    let line_end = source
        .get(span.end_byte..)?
        .find('\n')
        .map_or(source.len(), |i| span.end_byte + i);

    let new_text = format!(
        "{}{}{}",
        source.get(line_start..span.start_byte)?,
        candidate.replacement_text(),
        source.get(span.end_byte..line_end)?
    );
    Some(LineEdit {
        first: (span.start.line as usize).saturating_sub(1),
        last: (span.end.line as usize).saturating_sub(1),
        new_lines: new_text.lines().map(str::to_string).collect(),
    })
}

/// Render the effect of `applied` on `source` as a unified diff.
/// Returns an empty string when nothing changed.
pub fn unified_diff(path: &str, source: &str, applied: &[&RewriteCandidate]) -> String {
    let old_lines: Vec<&str> = source.lines().collect();
    let old_line = |i: usize| old_lines.get(i).copied().unwrap_or_default();

    let mut edits: Vec<LineEdit> = applied.iter().filter_map(|c| line_edit(source, c)).collect();
    edits.sort_by_key(|e| e.first);
    if edits.is_empty() {
        return String::new();
    }

    let mut out = format!("--- a/{path}\n+++ b/{path}\n");
    let mut delta: isize = 0;
    let mut i = 0;

    while i < edits.len() {
        // Edits whose context windows touch share a hunk.
        let mut j = i;
        while j + 1 < edits.len() && edits[j + 1].first <= edits[j].last + 1 + 2 * CONTEXT_LINES {
            j += 1;
        }

        let start = edits[i].first.saturating_sub(CONTEXT_LINES);
        let end = (edits[j].last + 1 + CONTEXT_LINES).min(old_lines.len());
        let mut body = Vec::new();
        let (mut old_count, mut new_count) = (0usize, 0usize);
        let mut line = start;

        for edit in &edits[i..=j] {
            for l in line..edit.first {
                body.push(format!(" {}", old_line(l)));
                old_count += 1;
                new_count += 1;
            }
            for l in edit.first..=edit.last {
                body.push(format!("-{}", old_line(l)));
                old_count += 1;
            }
            for new in &edit.new_lines {
                body.push(format!("+{new}"));
                new_count += 1;
            }
            line = edit.last + 1;
        }
        for l in line..end {
            body.push(format!(" {}", old_line(l)));
            old_count += 1;
            new_count += 1;
        }

        let new_start = start as isize + delta + 1;
        out.push_str(&format!(
            "@@ -{},{} +{},{} @@\n",
            start + 1,
            old_count,
            new_start,
            new_count
        ));
        for b in body {
            out.push_str(&b);
            out.push('\n');
        }

        delta += new_count as isize - old_count as isize;
        i = j + 1;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::PatternDetector;
    use crate::fixes::Transformer;
    use crate::models::SourceUnit;

    fn rewrite_all(source: &str) -> Vec<RewriteCandidate> {
        let unit = SourceUnit::new("t.py", source);
        let transformer = Transformer::new();
        PatternDetector::new()
            .detect(&unit)
            .expect("should parse")
            .iter()
            .filter_map(|m| transformer.transform(m).ok())
            .collect()
    }

    #[test]
    fn test_apply_and_diff() {
        let source = "import os\n\nresult = []\nfor i in items:\n    result.append(i)\nprint(result)\n";
        let candidates = rewrite_all(source);
        let (text, applied) = apply_candidates(source, &candidates);
        assert_eq!(applied.len(), 1);
        assert_eq!(
            text,
            "import os\n\nresult = [i for i in items]\nprint(result)\n"
        );

        let diff = unified_diff("t.py", source, &applied);
        assert!(diff.starts_with("--- a/t.py\n+++ b/t.py\n"));
        assert!(diff.contains("@@ -1,6 +1,4 @@"));
        assert!(diff.contains("-for i in items:"));
        assert!(diff.contains("+result = [i for i in items]"));
    }

    #[test]
    fn test_apply_skips_stale_candidates() {
        let source = "r = []\nfor i in xs:\n    r.append(i)\n";
        let candidates = rewrite_all(source);
        let changed = source.replace("xs", "ys");
        let (text, applied) = apply_candidates(&changed, &candidates);
        assert!(applied.is_empty());
        assert_eq!(text, changed);
    }

    #[test]
    fn test_apply_nested_indentation() {
        let source = "def f():\n    if a:\n        if b:\n            go()\n    return 1\n";
        let candidates = rewrite_all(source);
        let (text, applied) = apply_candidates(source, &candidates);
        assert_eq!(applied.len(), 1);
        assert_eq!(text, "def f():\n    if a and b:\n        go()\n    return 1\n");
    }

    #[test]
    fn test_empty_diff_when_nothing_applied() {
        assert_eq!(unified_diff("t.py", "x = 1\n", &[]), "");
    }
}
