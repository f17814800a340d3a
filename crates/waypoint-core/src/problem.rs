//! Minimal PDDL problem reading: the `(:init …)` block.
//!
//! A ValStep session needs the problem's declared initial state to seed its
//! variable values before any happening is replayed. This reader extracts
//! exactly that: ground literals become boolean values, `(= (fn …) n)`
//! assignments become numeric values. Timed initial literals
//! (`(at <number> (…))`) take effect later and are not part of time 0, so
//! they are skipped. Everything else in the problem file is ignored.

use crate::valstep::{TimedVariableValue, VariableValue};

/// Extracts the initial state declared by a PDDL problem, at time 0.
pub fn parse_initial_state(problem: &str) -> Vec<TimedVariableValue> {
    let source = strip_comments(problem);
    let Some(block) = init_block(&source) else {
        return Vec::new();
    };

    let mut values = Vec::new();
    for expr in top_level_expressions(block) {
        if let Some(value) = parse_init_expression(expr, true) {
            values.push(value);
        }
    }
    values
}

/// Removes `;` line comments.
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let code = line.split(';').next().unwrap_or("");
        out.push_str(code);
        out.push('\n');
    }
    out
}

/// Finds the balanced contents of the `(:init …)` block.
fn init_block(text: &str) -> Option<&str> {
    let lower = text.to_lowercase();
    let open = lower.find("(:init")?;
    let body_start = open + "(:init".len();
    let mut depth = 1usize;
    for (offset, ch) in text[body_start..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[body_start..body_start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits a block into its balanced top-level `(…)` expressions.
fn top_level_expressions(block: &str) -> Vec<&str> {
    let mut expressions = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (offset, ch) in block.char_indices() {
        match ch {
            '(' => {
                if depth == 0 {
                    start = offset;
                }
                depth += 1;
            }
            ')' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        expressions.push(&block[start..=offset]);
                    }
                }
            }
            _ => {}
        }
    }
    expressions
}

/// Parses one init expression into a timed value at time 0.
fn parse_init_expression(expr: &str, positive: bool) -> Option<TimedVariableValue> {
    let inner = expr.trim().strip_prefix('(')?.strip_suffix(')')?.trim();
    let head = inner.split_whitespace().next()?;

    if head.eq_ignore_ascii_case("not") {
        let nested = inner[head.len()..].trim();
        return parse_init_expression(nested, !positive);
    }

    if head == "=" {
        let rest = inner[1..].trim();
        let (function, remainder) = balanced_prefix(rest)?;
        let value: f64 = remainder.trim().parse().ok()?;
        return Some(TimedVariableValue {
            time: 0.0,
            variable: normalize_variable(function),
            value: VariableValue::Num(value),
        });
    }

    // `(at 5 (…))` is a timed initial literal, not part of the time-0 state.
    if head.eq_ignore_ascii_case("at") {
        let second = inner.split_whitespace().nth(1)?;
        if second.parse::<f64>().is_ok() {
            return None;
        }
    }

    Some(TimedVariableValue {
        time: 0.0,
        variable: normalize_whitespace(inner),
        value: VariableValue::Bool(positive),
    })
}

/// Returns the leading balanced `(…)` of `text` (contents only) and the rest.
fn balanced_prefix(text: &str) -> Option<(&str, &str)> {
    let trimmed = text.trim_start();
    if !trimmed.starts_with('(') {
        // A bare fluent name without parameters.
        let mut parts = trimmed.splitn(2, char::is_whitespace);
        let name = parts.next()?;
        return Some((name, parts.next().unwrap_or("")));
    }
    let mut depth = 0usize;
    for (offset, ch) in trimmed.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some((&trimmed[1..offset], &trimmed[offset + 1..]));
                }
            }
            _ => {}
        }
    }
    None
}

fn normalize_variable(text: &str) -> String {
    normalize_whitespace(text.trim())
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBLEM: &str = "\
(define (problem logistics-1) (:domain logistics)
  (:objects truck1 depot city)
  (:init
    (at truck1 depot) ; starting position
    (= (fuel truck1) 10.5)
    (not (loaded truck1))
    (at 5 (open depot))
  )
  (:goal (at truck1 city)))
";

    #[test]
    fn reads_literals_and_fluents() {
        let values = parse_initial_state(PROBLEM);
        assert_eq!(values.len(), 3);
        assert_eq!(values[0].variable, "at truck1 depot");
        assert_eq!(values[0].value, VariableValue::Bool(true));
        assert_eq!(values[0].time, 0.0);
        assert_eq!(values[1].variable, "fuel truck1");
        assert_eq!(values[1].value, VariableValue::Num(10.5));
        assert_eq!(values[2].variable, "loaded truck1");
        assert_eq!(values[2].value, VariableValue::Bool(false));
    }

    #[test]
    fn timed_initial_literals_are_skipped() {
        let values = parse_initial_state("(:init (at 5 (open depot)))");
        assert!(values.is_empty());
    }

    #[test]
    fn missing_init_yields_empty_state() {
        assert!(parse_initial_state("(define (problem p))").is_empty());
    }

    #[test]
    fn comments_do_not_confuse_the_reader() {
        let values = parse_initial_state("(:init ; (ghost)\n  (real fact))");
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].variable, "real fact");
    }
}
