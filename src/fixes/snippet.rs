//! Text helpers for cutting statements out of a buffer and re-seating them
//! at a different indentation.

use crate::detectors::PatternMatch;
use crate::models::Span;

/// Remove `indent` from every line after the first. Blank lines may be
/// shorter than `indent`; any other shorter line is an error since the
/// text would not survive a round trip.
pub fn dedent_text(raw: &str, indent: &str) -> Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    for (i, line) in raw.split('\n').enumerate() {
        if i == 0 {
            out.push_str(line);
            continue;
        }
        out.push('\n');
        if let Some(rest) = line.strip_prefix(indent) {
            out.push_str(rest);
        } else if !line.trim().is_empty() {
            return Err(format!(
                "line {} is indented less than the statement it belongs to",
                i + 1
            ));
        }
    }
    Ok(out)
}

/// Prefix every non-empty line after the first with `indent`.
pub fn reindent_text(text: &str, indent: &str) -> String {
    let mut out = String::with_capacity(text.len() + indent.len() * 4);
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
            if !line.is_empty() {
                out.push_str(indent);
            }
        }
        out.push_str(line);
    }
    out
}

/// A matched region opened for rewriting.
pub(crate) struct Snippet<'a> {
    source: &'a str,
    indent: &'a str,
    comments: &'a [Span],
}

impl<'a> Snippet<'a> {
    pub fn open(m: &'a PatternMatch) -> Result<Self, String> {
        let source: &str = &m.source;
        let indent = line_indent(source, m.span.start_byte)?;
        Ok(Self {
            source,
            indent,
            comments: &m.comments,
        })
    }

    /// Indentation of the line the match starts on.
    pub fn indent(&self) -> &'a str {
        self.indent
    }

    /// Indentation of the line containing `byte`, which must be the first
    /// non-blank character on it.
    pub fn indent_at(&self, byte: usize) -> Result<&'a str, String> {
        line_indent(self.source, byte)
    }

    pub fn raw(&self, start: usize, end: usize) -> Result<&'a str, String> {
        self.source
            .get(start..end)
            .ok_or_else(|| format!("byte range {start}..{end} is outside the source"))
    }

    /// Text of `span` dedented by the match indentation.
    pub fn piece(&self, span: Span) -> Result<String, String> {
        dedent_text(self.raw(span.start_byte, span.end_byte)?, self.indent)
    }

    /// Fail if a comment inside the match would not survive the rewrite.
    pub fn ensure_comments_kept(&self, kept: &[Span]) -> Result<(), String> {
        match self
            .comments
            .iter()
            .find(|c| !kept.iter().any(|k| k.contains(c)))
        {
            Some(lost) => Err(format!(
                "comment on line {} would be lost",
                lost.start.line
            )),
            None => Ok(()),
        }
    }
}

fn line_indent(source: &str, byte: usize) -> Result<&str, String> {
    let before = source
        .get(..byte)
        .ok_or_else(|| format!("byte {byte} is outside the source"))?;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let indent = &before[line_start..];
    if indent.chars().all(|c| c == ' ' || c == '\t') {
        Ok(indent)
    } else {
        Err("statement shares its line with other code".to_string())
    }
}

/// Span covering a raw byte range, for comment bookkeeping.
pub(crate) fn byte_span(start_byte: usize, end_byte: usize) -> Span {
    Span {
        start_byte,
        end_byte,
        ..Span::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedent_and_reindent() {
        let raw = "if a:\n        go()\n\n        stop()";
        let dedented = dedent_text(raw, "    ").expect("dedent");
        assert_eq!(dedented, "if a:\n    go()\n\n    stop()");
        assert_eq!(reindent_text(&dedented, "    "), raw);
    }

    #[test]
    fn test_dedent_rejects_outdented_lines() {
        let raw = "x = '''\ntext'''";
        assert!(dedent_text(raw, "    ").is_err());
    }

    #[test]
    fn test_line_indent_requires_leading_whitespace() {
        assert_eq!(line_indent("    x = 1", 4), Ok("    "));
        assert!(line_indent("y = 2; x = 1", 7).is_err());
    }
}
