//! XML plan payload deserialization.
//!
//! Reads the `Plan/Actions/OrderedHappening/Happening/ActionStart` document
//! shape: each `ActionStart` carries a `Name`, an `ExpectedStartTime`, an
//! optional `ExpectedDuration` (both ISO-8601-style duration strings), and
//! optional `Parameters/Parameter/Symbol` bindings. Times and durations are
//! scaled by the caller-supplied time-unit factor.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{Result, WaypointError};
use crate::parser::{ParserOptions, PlanBuilder};
use crate::plan::Plan;
use crate::step::{PlanStep, Timing};

/// Element whose text content is currently being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    None,
    Name,
    StartTime,
    Duration,
    Symbol,
}

/// Accumulator for one `ActionStart` element.
#[derive(Debug, Default)]
struct ActionStart {
    name: String,
    start_time: Option<f64>,
    duration: Option<f64>,
    symbols: Vec<String>,
}

fn malformed(reason: impl Into<String>) -> WaypointError {
    WaypointError::PayloadMalformed {
        format: "xml",
        reason: reason.into(),
    }
}

/// Parses an ISO-8601-style duration (e.g. `PT0.001S`) into seconds; plain
/// numeric values are accepted as-is.
fn parse_duration_value(text: &str) -> Result<f64> {
    if let Ok(value) = text.trim().parse::<f64>() {
        return Ok(value);
    }
    let span: jiff::Span = text
        .trim()
        .parse()
        .map_err(|e| malformed(format!("invalid duration '{text}': {e}")))?;
    span.total(jiff::Unit::Second)
        .map_err(|e| malformed(format!("invalid duration '{text}': {e}")))
}

/// Deserializes an XML plan document into a [`Plan`].
pub fn parse_xml_plan(text: &str, options: &ParserOptions) -> Result<Plan> {
    let mut reader = Reader::from_str(text);

    let mut builder = PlanBuilder::new(options.epsilon);
    let mut field = Field::None;
    let mut action: Option<ActionStart> = None;
    let mut saw_plan_root = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) => {
                match element.local_name().as_ref() {
                    b"Plan" => saw_plan_root = true,
                    b"ActionStart" => action = Some(ActionStart::default()),
                    b"Name" => field = Field::Name,
                    b"ExpectedStartTime" => field = Field::StartTime,
                    b"ExpectedDuration" => field = Field::Duration,
                    b"Symbol" => field = Field::Symbol,
                    _ => field = Field::None,
                }
            }
            Ok(Event::Text(content)) => {
                let text = content
                    .unescape()
                    .map_err(|e| malformed(format!("bad text content: {e}")))?;
                let Some(current) = action.as_mut() else {
                    continue;
                };
                match field {
                    Field::Name => current.name = text.trim().to_string(),
                    Field::StartTime => {
                        current.start_time =
                            Some(parse_duration_value(&text)? * options.xml_time_unit);
                    }
                    Field::Duration => {
                        current.duration =
                            Some(parse_duration_value(&text)? * options.xml_time_unit);
                    }
                    Field::Symbol => current.symbols.push(text.trim().to_string()),
                    Field::None => {}
                }
            }
            Ok(Event::End(element)) => {
                field = Field::None;
                if element.local_name().as_ref() == b"ActionStart" {
                    let finished = action
                        .take()
                        .ok_or_else(|| malformed("unexpected ActionStart close"))?;
                    builder.add(action_to_step(finished)?);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(malformed(e.to_string())),
        }
    }

    if !saw_plan_root {
        return Err(malformed("missing Plan root element"));
    }
    Ok(builder.build())
}

/// Converts a finished `ActionStart` accumulator into a plan step.
fn action_to_step(action: ActionStart) -> Result<PlanStep> {
    if action.name.is_empty() {
        return Err(malformed("ActionStart without a Name"));
    }
    let mut full_name = action.name;
    for symbol in &action.symbols {
        full_name.push(' ');
        full_name.push_str(symbol);
    }
    let timing = match action.duration {
        Some(duration) => Timing::Durative { duration },
        None => Timing::Instant,
    };
    Ok(PlanStep::new(action.start_time, full_name, timing))
}
