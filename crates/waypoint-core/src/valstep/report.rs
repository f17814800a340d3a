//! ValStep batch-report framing.
//!
//! Per fed batch, the tool's stdout carries optional `Posted action N`
//! acknowledgements, then a `Seeing <N> changed lits` marker followed by the
//! value-change lines, `<name> - now (true|false|<number>)`. Prompts (`?`)
//! act as implicit line breaks. Functions are allowed not to be counted
//! toward N, so the completeness check is `expected <= parsed`, never strict
//! equality. An incomplete report is the expected common case while stdout
//! drains; only a timeout while still incomplete escalates to failure.

use once_cell::sync::Lazy;
use regex::Regex;

use super::VariableValue;

static CHANGED_LITS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)seeing\s+(\d+)\s+changed\s+lits").expect("changed-lits pattern")
});

static VALUE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(.+?)\s+-\s+now\s+(true|false|[-+]?\d+(?:\.\d+)?)\s*$")
        .expect("value line pattern")
});

static POSTED_ACTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*posted\s+action\s+\d+\s*$").expect("posted pattern"));

/// One complete batch report: the tool's claimed change count and the parsed
/// value changes (possibly more than claimed, for functions).
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    /// The `N` from `Seeing N changed lits`.
    pub expected: usize,
    /// Parsed `<name> - now <value>` changes, in output order.
    pub values: Vec<(String, VariableValue)>,
}

/// A line segment of tool output; `?` prompts break lines too.
fn segments(buffer: &str) -> impl Iterator<Item = (usize, &str)> {
    // Each item carries the byte offset one past the segment's end.
    buffer
        .split_inclusive(['\n', '?'])
        .scan(0usize, |offset, piece| {
            *offset += piece.len();
            Some((*offset, piece.trim_end_matches(['\n', '?'])))
        })
}

/// Strips one surrounding paren pair so report names match the bare
/// `(:init …)`-seeded variable names.
fn normalize_name(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .map(str::trim)
        .unwrap_or(trimmed)
        .to_string()
}

fn parse_value(text: &str) -> VariableValue {
    match text {
        "true" => VariableValue::Bool(true),
        "false" => VariableValue::Bool(false),
        number => VariableValue::Num(number.parse().unwrap_or(0.0)),
    }
}

/// Attempts to consume one complete report from the front of `buffer`.
///
/// Returns `None` while the report is incomplete (no marker yet, or fewer
/// than the claimed number of value lines). On success the consumed prefix
/// is drained from the buffer; value lines already present beyond the
/// claimed count (uncounted functions) are consumed greedily so they are
/// applied with their batch.
pub fn try_consume_report(buffer: &mut String) -> Option<BatchReport> {
    let terminated = buffer.ends_with(['\n', '?']);

    let mut expected: Option<usize> = None;
    let mut values: Vec<(String, VariableValue)> = Vec::new();
    let mut consumed_end = 0usize;
    let mut complete = false;

    let all: Vec<(usize, &str)> = segments(buffer).collect();
    for (index, (end, segment)) in all.iter().enumerate() {
        let is_final_partial = index + 1 == all.len() && !terminated;

        let Some(claimed) = expected else {
            if is_final_partial {
                break;
            }
            if let Some(caps) = CHANGED_LITS.captures(segment) {
                expected = caps.get(1).and_then(|m| m.as_str().parse().ok());
                consumed_end = *end;
                if expected == Some(0) {
                    complete = true;
                }
            }
            // Acknowledgements and chatter before the marker are skipped.
            continue;
        };

        if is_final_partial {
            break;
        }
        if let Some(caps) = VALUE_LINE.captures(segment) {
            let name = caps.get(1).map(|m| normalize_name(m.as_str()))?;
            let value = parse_value(caps.get(2)?.as_str());
            values.push((name, value));
            consumed_end = *end;
            if values.len() >= claimed {
                complete = true;
            }
            continue;
        }
        if segment.trim().is_empty() || POSTED_ACTION.is_match(segment) {
            if !complete {
                consumed_end = *end;
            }
            continue;
        }
        // A non-value segment: stop consuming once complete, otherwise it is
        // inter-report chatter.
        if complete {
            break;
        }
        consumed_end = *end;
    }

    if !complete {
        return None;
    }
    let report = BatchReport {
        expected: expected.unwrap_or(0),
        values,
    };
    buffer.drain(..consumed_end);
    Some(report)
}

/// Parses a complete output dump into successive batch reports (batch mode,
/// after the tool has exited).
pub fn parse_all_reports(output: &str) -> Vec<BatchReport> {
    let mut buffer = output.to_string();
    if !buffer.ends_with('\n') {
        buffer.push('\n');
    }
    let mut reports = Vec::new();
    while let Some(report) = try_consume_report(&mut buffer) {
        reports.push(report);
    }
    reports
}
