//! The [`Plan`] model: an ordered sequence of steps plus planner metadata.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::step::PlanStep;

/// An ordered sequence of plan steps with planner-reported metadata.
///
/// Step order is parse/insertion order, not necessarily time-sorted;
/// consumers that need a schedule sort explicitly. Built incrementally by
/// [`crate::parser::PlanBuilder`] and frozen on finalization; one parsing
/// session may yield several plans (anytime planners report successive
/// improving plans).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Steps in insertion order.
    pub steps: Vec<PlanStep>,

    /// Maximum end time over all steps; 0 when empty.
    pub makespan: f64,

    /// Planner-reported metric/cost, when present in the output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,

    /// Planner-reported states-evaluated counter, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub states_evaluated: Option<u64>,
}

impl Plan {
    /// Creates a plan from steps, deriving the makespan.
    pub fn from_steps(steps: Vec<PlanStep>) -> Self {
        let makespan = steps.iter().map(PlanStep::end_time).fold(0.0, f64::max);
        Self {
            steps,
            makespan,
            cost: None,
            states_evaluated: None,
        }
    }

    /// Whether the plan has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl fmt::Display for Plan {
    /// Renders the `.plan` text form: one step line each, then metadata as
    /// `;` comment lines.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            writeln!(f, "{step}")?;
        }
        if let Some(cost) = self.cost {
            writeln!(f, "; Cost: {cost}")?;
        }
        if let Some(states) = self.states_evaluated {
            writeln!(f, "; States evaluated: {states}")?;
        }
        writeln!(f, "; Makespan: {:.5}", self.makespan)
    }
}
