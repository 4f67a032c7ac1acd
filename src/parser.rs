//! Line parser for the `>label: value` wire format.
//!
//! Two grammars are supported, selected once per [`LineParser`]:
//!
//! - [`Grammar::Tagged`] scans the whole line for every `>label: value`
//!   occurrence. A tag whose value is not a number is skipped and scanning
//!   continues with the rest of the line.
//! - [`Grammar::Strict`] accepts exactly one `>label: value` at the start of
//!   the line. Anything malformed drops the whole line.
//!
//! Labels are `[A-Za-z0-9_]+` and are lower-cased. Values are signed decimals
//! with an optional fractional part.

use serde::{Deserialize, Serialize};

/// Which wire grammar a [`LineParser`] accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grammar {
    /// Any number of `>label: value` tags anywhere in the line.
    #[default]
    Tagged,
    /// A single `>label: value` at the start of the line.
    Strict,
}

/// One `(label, value)` pair extracted from a line.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSample {
    pub label: String,
    pub value: f64,
}

impl ParsedSample {
    fn new(label: &str, value: f64) -> Self {
        Self {
            label: label.to_ascii_lowercase(),
            value,
        }
    }
}

/// Stateless line parser; cheap to copy into the ingestion thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineParser {
    grammar: Grammar,
}

impl LineParser {
    pub fn new(grammar: Grammar) -> Self {
        Self { grammar }
    }

    pub fn grammar(&self) -> Grammar {
        self.grammar
    }

    /// Extract all samples from `line`, in left-to-right order.
    pub fn parse(&self, line: &str) -> Vec<ParsedSample> {
        match self.grammar {
            Grammar::Tagged => parse_tagged(line),
            Grammar::Strict => parse_strict(line).into_iter().collect(),
        }
    }
}

fn is_label_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Scan for every `>label:\s*-?\d+(\.\d*)?` occurrence.
///
/// Matching restarts one byte after a failed `>`, and after the end of a
/// successful match, so `>a>b: 1` yields only `b`.
pub fn parse_tagged(line: &str) -> Vec<ParsedSample> {
    let bytes = line.as_bytes();
    let mut out = Vec::new();
    let mut pos = 0;

    while let Some(offset) = bytes[pos..].iter().position(|&b| b == b'>') {
        let start = pos + offset;
        match match_tag(bytes, start) {
            Some((label, number, end)) => {
                // `label` and `number` are ASCII-only slices, so the str views are valid.
                let label = &line[label.0..label.1];
                match line[number.0..number.1].parse::<f64>() {
                    Ok(value) => out.push(ParsedSample::new(label, value)),
                    Err(_) => tracing::trace!(label, "discarding tag with unparsable value"),
                }
                pos = end;
            }
            None => pos = start + 1,
        }
    }
    out
}

/// Try to match one tag whose `>` sits at `start`.
///
/// Returns the byte ranges of the label and the number, and the index just
/// past the number.
fn match_tag(bytes: &[u8], start: usize) -> Option<((usize, usize), (usize, usize), usize)> {
    let mut i = start + 1;

    let label_start = i;
    while i < bytes.len() && is_label_byte(bytes[i]) {
        i += 1;
    }
    if i == label_start {
        return None;
    }
    let label_end = i;

    if bytes.get(i) != Some(&b':') {
        return None;
    }
    i += 1;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }

    let number_start = i;
    if bytes.get(i) == Some(&b'-') {
        i += 1;
    }
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == digits_start {
        return None;
    }
    if bytes.get(i) == Some(&b'.') {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }

    Some(((label_start, label_end), (number_start, i), i))
}

/// Parse a line of the form `>label: value`.
///
/// The label runs from the leading `>` to the first `": "`. The value is the
/// text after it up to the next `": "` or `>`, trimmed, and must be a finite
/// number. Any deviation rejects the whole line.
pub fn parse_strict(line: &str) -> Option<ParsedSample> {
    let body = line.trim().strip_prefix('>')?;
    let body = body.split('>').next().unwrap_or(body);
    let mut fields = body.split(": ");
    let label = fields.next()?;
    let value = fields.next()?;

    if label.is_empty() || !label.bytes().all(is_label_byte) {
        return None;
    }
    let value: f64 = value.trim().parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(ParsedSample::new(label, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(samples: &[ParsedSample]) -> Vec<(&str, f64)> {
        samples.iter().map(|s| (s.label.as_str(), s.value)).collect()
    }

    #[test]
    fn tagged_single_sample() {
        let out = parse_tagged(">temp: 21.5");
        assert_eq!(pairs(&out), vec![("temp", 21.5)]);
    }

    #[test]
    fn tagged_multiple_samples_keep_order() {
        let out = parse_tagged(">temp: 21.5 >hum: 60");
        assert_eq!(pairs(&out), vec![("temp", 21.5), ("hum", 60.0)]);
    }

    #[test]
    fn tagged_negative_and_no_space() {
        let out = parse_tagged(">a:-3.25>b:  7.");
        assert_eq!(pairs(&out), vec![("a", -3.25), ("b", 7.0)]);
    }

    #[test]
    fn tagged_skips_malformed_segment_and_continues() {
        let out = parse_tagged(">temp: abc >hum: 60 >x: - >y: 2");
        assert_eq!(pairs(&out), vec![("hum", 60.0), ("y", 2.0)]);
    }

    #[test]
    fn tagged_restarts_after_failed_marker() {
        let out = parse_tagged(">a>b: 1");
        assert_eq!(pairs(&out), vec![("b", 1.0)]);
    }

    #[test]
    fn tagged_lowercases_label() {
        let out = parse_tagged("noise >Temp_1: 4 trailing");
        assert_eq!(pairs(&out), vec![("temp_1", 4.0)]);
    }

    #[test]
    fn tagged_garbage_yields_nothing() {
        assert!(parse_tagged("garbage").is_empty());
        assert!(parse_tagged("").is_empty());
        assert!(parse_tagged(">").is_empty());
        assert!(parse_tagged(">: 5").is_empty());
    }

    #[test]
    fn tagged_takes_numeric_prefix_only() {
        let out = parse_tagged(">v: 12abc");
        assert_eq!(pairs(&out), vec![("v", 12.0)]);
    }

    #[test]
    fn tagged_ignores_non_ascii_text_around_tags() {
        let out = parse_tagged("température >t: 1 ✓");
        assert_eq!(pairs(&out), vec![("t", 1.0)]);
    }

    #[test]
    fn strict_accepts_single_sample() {
        let s = parse_strict(">Temperature: 25.5\r\n").expect("sample");
        assert_eq!(s.label, "temperature");
        assert_eq!(s.value, 25.5);
    }

    #[test]
    fn strict_drops_whole_line_on_bad_value() {
        assert!(parse_strict(">temp: 2x").is_none());
        assert!(parse_strict(">temp: nan").is_none());
        assert!(parse_strict(">temp:5").is_none());
        assert!(parse_strict("temp: 5").is_none());
        assert!(parse_strict(">bad label: 5").is_none());
    }

    #[test]
    fn strict_only_reads_first_tag() {
        let parser = LineParser::new(Grammar::Strict);
        let out = parser.parse(">temp: 21.5 >hum: 60");
        assert_eq!(pairs(&out), vec![("temp", 21.5)]);
    }

    #[test]
    fn strict_value_stops_at_next_separator() {
        let s = parse_strict(">a: 1: 2").expect("sample");
        assert_eq!((s.label.as_str(), s.value), ("a", 1.0));
    }
}
