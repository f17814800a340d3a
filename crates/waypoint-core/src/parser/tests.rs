//! Tests for the incremental plan parser.

use super::*;
use crate::step::DEFAULT_EPSILON;

fn parse_all(text: &str) -> Vec<Plan> {
    let mut parser = PlanParser::new(ParserOptions::default());
    parser.append_buffer(text);
    parser.finish()
}

#[test]
fn parses_instant_step_line() {
    let plans = parse_all("0.00000: (drive truck1 depot city)\n");
    assert_eq!(plans.len(), 1);
    let step = &plans[0].steps[0];
    assert_eq!(step.start_time(), Some(0.0));
    assert_eq!(step.action_name(), "drive");
    assert_eq!(step.objects(), vec!["truck1", "depot", "city"]);
    assert!(!step.is_durative());
    assert_eq!(step.duration(DEFAULT_EPSILON), 1e-3);
    // Instantaneous step's end equals its start.
    assert_eq!(plans[0].makespan, 0.0);
}

#[test]
fn parses_durative_step_line() {
    let plans = parse_all("1: (unload crane1 c1 loc1) [3.5]\n");
    let step = &plans[0].steps[0];
    assert_eq!(step.start_time(), Some(1.0));
    assert!(step.is_durative());
    assert_eq!(step.duration(DEFAULT_EPSILON), 3.5);
    assert_eq!(step.end_time(), 4.5);
    assert_eq!(plans[0].makespan, 4.5);
}

#[test]
fn untimed_steps_schedule_back_to_back_at_makespan() {
    let plans = parse_all("(drive a) [2.0]\n(drive b) [3.0]\n");
    let steps = &plans[0].steps;
    assert_eq!(steps[0].start_time(), Some(0.0));
    assert_eq!(steps[1].start_time(), Some(2.0));
    assert_eq!(plans[0].makespan, 5.0);
}

#[test]
fn chatter_is_never_fatal() {
    let plans = parse_all("Planning...\nsearching with bound 4\n0.0: (a)\nall done\n");
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].steps.len(), 1);
}

#[test]
fn extracts_cost_and_states_evaluated() {
    let text = "; States evaluated: 421\n; Cost: 36.01\n0.0: (a)\n";
    let plans = parse_all(text);
    assert_eq!(plans[0].states_evaluated, Some(421));
    assert_eq!(plans[0].cost, Some(36.01));
}

#[test]
fn first_metadata_match_wins_per_plan() {
    let text = "; Cost: 10\n0.0: (a)\n; Cost: 99\n";
    let plans = parse_all(text);
    assert_eq!(plans[0].cost, Some(10.0));
}

#[test]
fn anytime_planner_emits_multiple_plans() {
    let text = "\
0.0: (a)
1.0: (b)
found better plan
0.0: (a)
";
    let plans = parse_all(text);
    assert_eq!(plans.len(), 2);
    assert_eq!(plans[0].steps.len(), 2);
    assert_eq!(plans[1].steps.len(), 1);
}

#[test]
fn buffering_is_split_invariant() {
    let text = "Planning...\n0.00000: (drive truck1 depot city)\n1.00000: (unload crane1 c1 loc1) [3.50000]\n; Cost: 4.5\n";
    let whole = parse_all(text);
    for split in 1..text.len() {
        if !text.is_char_boundary(split) {
            continue;
        }
        let mut parser = PlanParser::new(ParserOptions::default());
        parser.append_buffer(&text[..split]);
        parser.append_buffer(&text[split..]);
        let chunked = parser.finish();
        assert_eq!(chunked, whole, "split at byte {split}");
    }
}

#[test]
fn final_flush_replays_retained_partial_line() {
    let mut parser = PlanParser::new(ParserOptions::default());
    parser.append_buffer("0.0: (a)\n1.0: (b)");
    let plans = parser.finish();
    assert_eq!(plans[0].steps.len(), 2);
}

#[test]
fn empty_output_surfaces_one_expected_empty_plan() {
    let mut parser = PlanParser::new(ParserOptions::default());
    parser.append_buffer("No plan found.\n");
    let plans = parser.finish();
    assert_eq!(plans.len(), 1);
    assert!(plans[0].is_empty());

    let mut parser = PlanParser::new(ParserOptions {
        expected_plan_count: 0,
        ..ParserOptions::default()
    });
    parser.append_buffer("No plan found.\n");
    assert!(parser.finish().is_empty());
}

#[test]
fn plan_text_round_trips() {
    let original = vec![
        PlanStep::instant(0.0, "drive truck1 depot city"),
        PlanStep::durative(1.0, "unload crane1 c1 loc1", 3.5),
    ];
    let text: String = original
        .iter()
        .map(|s| format!("{s}\n"))
        .collect();
    let plans = parse_all(&text);
    assert_eq!(plans[0].steps.len(), original.len());
    for (parsed, expected) in plans[0].steps.iter().zip(&original) {
        assert!(parsed.equals(expected, DEFAULT_EPSILON));
    }
}

const XML_PLAN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Plan>
  <Actions>
    <OrderedHappening>
      <Happening>
        <ActionStart>
          <Name>drive</Name>
          <ExpectedStartTime>PT0S</ExpectedStartTime>
          <ExpectedDuration>PT4.5S</ExpectedDuration>
          <Parameters>
            <Parameter><Symbol>truck1</Symbol></Parameter>
            <Parameter><Symbol>depot</Symbol></Parameter>
          </Parameters>
        </ActionStart>
      </Happening>
    </OrderedHappening>
    <OrderedHappening>
      <Happening>
        <ActionStart>
          <Name>report</Name>
          <ExpectedStartTime>PT5S</ExpectedStartTime>
        </ActionStart>
      </Happening>
    </OrderedHappening>
  </Actions>
</Plan>"#;

#[test]
fn xml_payload_parses_action_starts() {
    let mut parser = PlanParser::new(ParserOptions::default());
    parser.append_buffer(XML_PLAN);
    let plans = parser.finish();
    assert_eq!(plans.len(), 1);
    let steps = &plans[0].steps;
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].full_action_name(), "drive truck1 depot");
    assert_eq!(steps[0].start_time(), Some(0.0));
    assert_eq!(steps[0].duration(DEFAULT_EPSILON), 4.5);
    assert!(!steps[1].is_durative());
    assert_eq!(steps[1].start_time(), Some(5.0));
    assert_eq!(plans[0].makespan, 5.0);
}

#[test]
fn xml_payload_honors_time_unit_factor() {
    let mut parser = PlanParser::new(ParserOptions {
        xml_time_unit: 0.001,
        ..ParserOptions::default()
    });
    parser.append_buffer(XML_PLAN);
    let plans = parser.finish();
    assert!((plans[0].steps[0].duration(DEFAULT_EPSILON) - 0.0045).abs() < 1e-9);
}

#[test]
fn xml_payload_split_mid_document() {
    let split = XML_PLAN.len() / 3;
    let mut parser = PlanParser::new(ParserOptions::default());
    parser.append_buffer(&XML_PLAN[..split]);
    parser.append_buffer(&XML_PLAN[split..]);
    let plans = parser.finish();
    assert_eq!(plans[0].steps.len(), 2);
}

#[test]
fn malformed_xml_is_dropped_and_parsing_continues() {
    let mut parser = PlanParser::new(ParserOptions::default());
    parser.append_buffer("<?xml version=\"1.0\"?><Actions></Plan>\n0.0: (a)\n");
    let plans = parser.finish();
    // The XML payload is dropped; the following ordinary step line survives.
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].steps.len(), 1);
    assert_eq!(plans[0].steps[0].action_name(), "a");
}

#[test]
fn json_payload_parses_steps_and_strips_parens() {
    let text = r#"[
        {"time": 0.0, "duration": 4.5, "name": "(drive truck1 depot city)"},
        {"time": 5.0, "name": "report"}
    ]"#;
    let payload = PlanPayload::detect(text);
    assert!(matches!(payload, PlanPayload::Json(_)));
    let plans = payload.into_plans(&ParserOptions::default()).expect("json");
    let steps = &plans[0].steps;
    assert_eq!(steps[0].full_action_name(), "drive truck1 depot city");
    assert!(steps[0].is_durative());
    assert!(!steps[1].is_durative());
}

#[test]
fn malformed_json_payload_errors() {
    let error = PlanPayload::Json("[{".to_string())
        .into_plans(&ParserOptions::default())
        .unwrap_err();
    assert!(matches!(
        error,
        crate::error::WaypointError::PayloadMalformed { format: "json", .. }
    ));
}

#[test]
fn payload_detection_is_decided_once() {
    assert!(matches!(
        PlanPayload::detect("  <?xml version=\"1.0\"?><Plan/>"),
        PlanPayload::Xml(_)
    ));
    assert!(matches!(
        PlanPayload::detect("0.0: (a)\n"),
        PlanPayload::PlainText(_)
    ));
}
