//! JSON plan payload deserialization.
//!
//! Asynchronous planning services return plans as a JSON array of
//! `{time, duration, name}` objects; `name` may carry surrounding
//! parentheses, which are stripped.

use serde::Deserialize;

use crate::error::{Result, WaypointError};
use crate::parser::{ParserOptions, PlanBuilder};
use crate::plan::Plan;
use crate::step::{PlanStep, Timing};

#[derive(Debug, Deserialize)]
struct JsonPlanStep {
    time: f64,
    #[serde(default)]
    duration: Option<f64>,
    name: String,
}

/// Deserializes a JSON step array into a [`Plan`].
pub fn parse_json_plan(text: &str, options: &ParserOptions) -> Result<Plan> {
    let raw: Vec<JsonPlanStep> =
        serde_json::from_str(text).map_err(|e| WaypointError::PayloadMalformed {
            format: "json",
            reason: e.to_string(),
        })?;

    let mut builder = PlanBuilder::new(options.epsilon);
    for entry in raw {
        let name = entry
            .name
            .trim()
            .trim_start_matches('(')
            .trim_end_matches(')')
            .trim();
        let timing = match entry.duration {
            Some(duration) => Timing::Durative { duration },
            None => Timing::Instant,
        };
        builder.add(PlanStep::new(Some(entry.time), name, timing));
    }
    Ok(builder.build())
}
