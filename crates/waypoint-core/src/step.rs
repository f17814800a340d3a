//! Plan step value types.
//!
//! A [`PlanStep`] is one scheduled occurrence of a grounded action, either
//! instantaneous or durative. Steps are immutable values with no I/O; the
//! incremental parser in [`crate::parser`] produces them and the happenings
//! machinery in [`crate::happenings`] decomposes them into start/end events.
//!
//! Two formatting/comparison rules here are load-bearing for the rest of the
//! system:
//!
//! 1. [`PlanStep::to_plan_text`] emits the exact `.plan` line grammar that
//!    downstream tools and the parser read back (`<time>: (<action>)
//!    [<duration>]`, five decimal places).
//! 2. [`PlanStep::equals`] compares times within `1.1 × epsilon` so plans
//!    that round-tripped through text or a subprocess echo can be compared
//!    without assuming exact floating-point equality.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default epsilon substituted for the duration of instantaneous steps and
/// used as the comparison tolerance base.
pub const DEFAULT_EPSILON: f64 = 1e-3;

/// Scheduling shape of a step. A durative step without a duration is
/// unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timing {
    /// The action takes effect at a single instant.
    Instant,
    /// The action spans `[start, start + duration]`.
    Durative { duration: f64 },
}

impl Timing {
    /// Whether this is a durative step.
    pub fn is_durative(&self) -> bool {
        matches!(self, Timing::Durative { .. })
    }

    /// The step's duration; instantaneous steps report the substituted
    /// `epsilon` because the planner omitted timing for them.
    pub fn duration(&self, epsilon: f64) -> f64 {
        match self {
            Timing::Instant => epsilon,
            Timing::Durative { duration } => *duration,
        }
    }
}

/// Marks which part of a step belongs to an already-decided plan head versus
/// a heuristic's relaxed-plan estimate (search-debugger scenarios).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    /// The whole step is part of the decided plan.
    Committed,
    /// The step started in the plan head but ends in the relaxed plan.
    EndsInRelaxedPlan,
    /// The step exists only in the relaxed-plan estimate.
    StartsInRelaxedPlan,
}

/// One scheduled action occurrence within a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Scheduling time. `None` only for synthesized steps whose source
    /// carried no timestamp; parser-produced steps always have a time.
    start_time: Option<f64>,
    /// Action name followed by bound object names, e.g.
    /// `"drive truck1 depot city"`.
    full_action_name: String,
    timing: Timing,
    /// Provenance back to the source text line, when known.
    line_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    commitment: Option<Commitment>,
}

impl PlanStep {
    /// Creates a step with an explicit timing shape.
    pub fn new(start_time: Option<f64>, full_action_name: impl Into<String>, timing: Timing) -> Self {
        Self {
            start_time,
            full_action_name: full_action_name.into(),
            timing,
            line_index: None,
            commitment: None,
        }
    }

    /// Creates an instantaneous step at the given time.
    pub fn instant(start_time: f64, full_action_name: impl Into<String>) -> Self {
        Self::new(Some(start_time), full_action_name, Timing::Instant)
    }

    /// Creates a durative step at the given time.
    pub fn durative(start_time: f64, full_action_name: impl Into<String>, duration: f64) -> Self {
        Self::new(
            Some(start_time),
            full_action_name,
            Timing::Durative { duration },
        )
    }

    /// Attaches the source line index.
    pub fn with_line_index(mut self, line_index: usize) -> Self {
        self.line_index = Some(line_index);
        self
    }

    /// Attaches a commitment marker.
    pub fn with_commitment(mut self, commitment: Commitment) -> Self {
        self.commitment = Some(commitment);
        self
    }

    /// Scheduling time, when known.
    pub fn start_time(&self) -> Option<f64> {
        self.start_time
    }

    /// Action name with bound objects.
    pub fn full_action_name(&self) -> &str {
        &self.full_action_name
    }

    /// The step's timing shape.
    pub fn timing(&self) -> Timing {
        self.timing
    }

    /// Whether this is a durative step.
    pub fn is_durative(&self) -> bool {
        self.timing.is_durative()
    }

    /// Duration, substituting `epsilon` for instantaneous steps.
    pub fn duration(&self, epsilon: f64) -> f64 {
        self.timing.duration(epsilon)
    }

    /// Source line index, when known.
    pub fn line_index(&self) -> Option<usize> {
        self.line_index
    }

    /// Commitment marker, when set.
    pub fn commitment(&self) -> Option<Commitment> {
        self.commitment
    }

    /// The lifted action name (first whitespace-separated token).
    pub fn action_name(&self) -> &str {
        self.full_action_name
            .split_whitespace()
            .next()
            .unwrap_or("")
    }

    /// The bound object names (remaining tokens).
    pub fn objects(&self) -> Vec<&str> {
        self.full_action_name.split_whitespace().skip(1).collect()
    }

    /// End time: `start + duration` for durative steps, `start` for
    /// instantaneous ones. A missing start counts as 0.
    pub fn end_time(&self) -> f64 {
        let start = self.start_time.unwrap_or(0.0);
        match self.timing {
            Timing::Instant => start,
            Timing::Durative { duration } => start + duration,
        }
    }

    /// Epsilon-tolerant equality: action names match case-insensitively and
    /// times (and durations, if durative) match within `1.1 × epsilon`.
    pub fn equals(&self, other: &PlanStep, epsilon: f64) -> bool {
        if !self
            .full_action_name
            .eq_ignore_ascii_case(&other.full_action_name)
        {
            return false;
        }
        let tolerance = 1.1 * epsilon;
        let times_match = match (self.start_time, other.start_time) {
            (Some(a), Some(b)) => (a - b).abs() < tolerance,
            (None, None) => true,
            _ => false,
        };
        if !times_match {
            return false;
        }
        match (self.timing, other.timing) {
            (Timing::Instant, Timing::Instant) => true,
            (Timing::Durative { duration: a }, Timing::Durative { duration: b }) => {
                (a - b).abs() < tolerance
            }
            _ => false,
        }
    }

    /// Formats the step as a `.plan` text line.
    pub fn to_plan_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(time) = self.start_time {
            write!(f, "{time:.5}: ")?;
        }
        write!(f, "({})", self.full_action_name)?;
        if let Timing::Durative { duration } = self.timing {
            write!(f, " [{duration:.5}]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instant_step_derives_action_and_objects() {
        let step = PlanStep::instant(0.0, "drive truck1 depot city");
        assert_eq!(step.action_name(), "drive");
        assert_eq!(step.objects(), vec!["truck1", "depot", "city"]);
        assert!(!step.is_durative());
        assert_eq!(step.duration(DEFAULT_EPSILON), DEFAULT_EPSILON);
        assert_eq!(step.end_time(), 0.0);
    }

    #[test]
    fn durative_step_end_time() {
        let step = PlanStep::durative(1.0, "unload crane1 c1 loc1", 3.5);
        assert_eq!(step.end_time(), 4.5);
        assert_eq!(step.duration(DEFAULT_EPSILON), 3.5);
    }

    #[test]
    fn plan_text_formats_five_decimals() {
        let step = PlanStep::durative(1.0, "unload crane1 c1 loc1", 3.5);
        assert_eq!(
            step.to_plan_text(),
            "1.00000: (unload crane1 c1 loc1) [3.50000]"
        );
        let instant = PlanStep::instant(0.0, "drive truck1 depot city");
        assert_eq!(instant.to_plan_text(), "0.00000: (drive truck1 depot city)");
    }

    #[test]
    fn plan_text_omits_missing_time() {
        let step = PlanStep::new(None, "noop", Timing::Instant);
        assert_eq!(step.to_plan_text(), "(noop)");
    }

    #[test]
    fn equals_is_case_insensitive_and_tolerant() {
        let a = PlanStep::durative(1.0, "Drive T1 D C", 3.5);
        let b = PlanStep::durative(1.0005, "drive t1 d c", 3.4995);
        assert!(a.equals(&b, DEFAULT_EPSILON));

        let c = PlanStep::durative(1.01, "drive t1 d c", 3.5);
        assert!(!a.equals(&c, DEFAULT_EPSILON));

        let d = PlanStep::instant(1.0, "drive t1 d c");
        assert!(!a.equals(&d, DEFAULT_EPSILON));
    }
}
