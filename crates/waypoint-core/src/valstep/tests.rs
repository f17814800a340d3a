//! Tests for ValStep state tracking and report framing.

use super::report::{parse_all_reports, try_consume_report};
use super::*;
use crate::happenings::HappeningKind;

fn happening(time: f64, kind: HappeningKind, name: &str) -> Happening {
    Happening {
        time,
        kind,
        full_action_name: name.to_string(),
        repetition: 0,
        line_index: None,
    }
}

#[test]
fn report_is_incomplete_until_enough_value_lines() {
    let mut buffer = "? Seeing 3 changed lits\n(a) - now true\n(b) - now false\n".to_string();
    assert!(try_consume_report(&mut buffer).is_none());

    buffer.push_str("(c) - now 7.5\n");
    let report = try_consume_report(&mut buffer).expect("complete");
    assert_eq!(report.expected, 3);
    assert_eq!(report.values.len(), 3);
    assert_eq!(report.values[2], ("c".to_string(), VariableValue::Num(7.5)));
}

#[test]
fn extra_function_lines_beyond_the_count_are_allowed() {
    let mut buffer =
        "? Seeing 1 changed lits\n(a) - now true\n(fuel t1) - now 4\n".to_string();
    let report = try_consume_report(&mut buffer).expect("complete");
    assert_eq!(report.expected, 1);
    assert_eq!(report.values.len(), 2);
    assert!(buffer.is_empty());
}

#[test]
fn zero_changed_lits_completes_immediately() {
    let mut buffer = "? Seeing 0 changed lits\n".to_string();
    let report = try_consume_report(&mut buffer).expect("complete");
    assert_eq!(report.expected, 0);
    assert!(report.values.is_empty());
}

#[test]
fn posted_action_acknowledgements_are_skipped() {
    let mut buffer =
        "Posted action 1\nPosted action 2\n? Seeing 1 changed lits\n(a) - now true\n".to_string();
    let report = try_consume_report(&mut buffer).expect("complete");
    assert_eq!(report.values.len(), 1);
}

#[test]
fn prompts_break_lines_in_framing() {
    let mut buffer = "? Seeing 1 changed lits?(a) - now true?".to_string();
    let report = try_consume_report(&mut buffer).expect("complete");
    assert_eq!(report.values[0].0, "a");
}

#[test]
fn report_names_are_stripped_of_surrounding_parens() {
    let mut buffer = "? Seeing 1 changed lits\n(at truck1 depot) - now false\n".to_string();
    let report = try_consume_report(&mut buffer).expect("complete");
    assert_eq!(report.values[0].0, "at truck1 depot");
}

#[test]
fn trailing_partial_line_is_not_consumed_early() {
    let mut buffer = "? Seeing 1 changed lits\n(a) - now tr".to_string();
    assert!(try_consume_report(&mut buffer).is_none());
    buffer.push_str("ue\n");
    assert!(try_consume_report(&mut buffer).is_some());
}

#[test]
fn successive_reports_parse_in_order() {
    let output = "\
Posted action 1
? Seeing 1 changed lits
(driving t1) - now true
Posted action 2
? Seeing 2 changed lits
(driving t1) - now false
(at t1 city) - now true
";
    let reports = parse_all_reports(output);
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].values.len(), 1);
    assert_eq!(reports[1].values.len(), 2);
}

#[test]
fn state_tracks_one_value_per_case_insensitive_name() {
    let mut state = VariableState::default();
    assert!(state.apply(0.0, "(at t1 depot)", VariableValue::Bool(true)).is_some());
    // Same value is a no-op.
    assert!(state.apply(1.0, "(AT t1 depot)", VariableValue::Bool(true)).is_none());
    // A different value updates time and value in place.
    let updated = state
        .apply(2.0, "(AT t1 depot)", VariableValue::Bool(false))
        .expect("changed");
    assert_eq!(updated.time, 2.0);
    assert_eq!(state.values().len(), 1);
    assert_eq!(state.get("(at T1 depot)").map(|v| v.time), Some(2.0));
}

#[test]
fn numeric_values_update_like_literals() {
    let mut state = VariableState::default();
    state.apply(0.0, "(fuel t1)", VariableValue::Num(10.0));
    assert!(state.apply(1.0, "(fuel t1)", VariableValue::Num(10.0)).is_none());
    assert!(state.apply(2.0, "(fuel t1)", VariableValue::Num(9.0)).is_some());
}

#[test]
fn groups_preserve_submission_order_within_a_timestamp() {
    let happenings = vec![
        happening(0.0, HappeningKind::Start, "drive t1 a b"),
        happening(4.5, HappeningKind::End, "drive t1 a b"),
        happening(0.0, HappeningKind::Start, "load c1 t1"),
        happening(1.0, HappeningKind::End, "load c1 t1"),
    ];
    let groups = group_by_time(&happenings);
    assert_eq!(groups.len(), 3);
    assert_eq!(groups[0].time, 0.0);
    assert_eq!(groups[0].happenings.len(), 2);
    // Submission order preserved within the shared timestamp.
    assert_eq!(groups[0].happenings[0].full_action_name, "drive t1 a b");
    assert_eq!(groups[1].time, 1.0);
    assert_eq!(groups[2].time, 4.5);
}

#[test]
fn session_seeds_state_from_problem_init() {
    let problem = "(define (problem p)\n  (:init (at t1 depot) (= (fuel t1) 10))\n  (:goal (at t1 city)))";
    let session = ValStepSession::new("(define (domain d))", problem, ValStepOptions::new("valstep"));
    assert_eq!(session.variable_values().len(), 2);
    assert_eq!(session.initial_values().len(), 2);
    assert_eq!(
        session.variable_values()[1].value,
        VariableValue::Num(10.0)
    );
}

#[test]
fn export_case_writes_reproduction_files() {
    let parent = tempfile::tempdir().expect("tempdir");
    let context = SessionContext {
        domain: "(define (domain d))".to_string(),
        problem: "(define (problem p))".to_string(),
        transcript: "0.00000: (a)\nq\n".to_string(),
    };
    let case = context.export_case(parent.path()).expect("export");
    assert_eq!(
        std::fs::read_to_string(&case.domain).expect("domain"),
        context.domain
    );
    assert_eq!(
        std::fs::read_to_string(&case.input).expect("input"),
        context.transcript
    );
    assert!(case.directory.starts_with(parent.path()));
}
