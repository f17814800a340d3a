//! Happening model and conversions.
//!
//! A happening is a single START/END/INSTANTANEOUS event derived from a plan
//! step. A durative [`PlanStep`] yields exactly one start and one end
//! happening carrying the same repetition index; an instantaneous step
//! yields one instantaneous happening. Repetition indices count prior steps
//! with the same action full name so that concurrent identical actions (two
//! simultaneous `load` calls, say) pair up correctly when converting back.
//!
//! This module is the single owner of the happenings line syntax, which
//! doubles as the command syntax fed to the ValStep subprocess
//! ([`crate::valstep`]).

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WaypointError};
use crate::step::{PlanStep, Timing};

/// Happenings line grammar: optional time, optional `start`/`end` qualifier
/// (absence means instantaneous), parenthesized action, optional `#N`
/// repetition suffix for the 2nd+ occurrence of an action.
static HAPPENING_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*((\d+|\d+\.\d+)\s*:)?\s*(start|end)?\s*\((.*)\)\s*(#(\d+))?\s*$")
        .expect("happenings line pattern")
});

/// Kind of event a happening represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HappeningKind {
    /// Start of a durative action.
    Start,
    /// End of a durative action.
    End,
    /// An instantaneous action.
    Instantaneous,
}

impl HappeningKind {
    /// Line-syntax qualifier; empty for instantaneous happenings.
    pub fn qualifier(&self) -> &'static str {
        match self {
            HappeningKind::Start => "start ",
            HappeningKind::End => "end ",
            HappeningKind::Instantaneous => "",
        }
    }
}

/// One start/end/instantaneous event at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Happening {
    /// Time at which the event occurs.
    pub time: f64,
    /// Event kind.
    pub kind: HappeningKind,
    /// Action name with bound objects.
    pub full_action_name: String,
    /// Count of prior happenings of the same action name; pairs concurrent
    /// identical actions.
    pub repetition: usize,
    /// Source line provenance, when read from a listing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_index: Option<usize>,
}

impl Happening {
    /// The lifted action name (first token).
    pub fn action_name(&self) -> &str {
        self.full_action_name
            .split_whitespace()
            .next()
            .unwrap_or("")
    }
}

impl fmt::Display for Happening {
    /// Formats one happenings/ValStep line, e.g. `4.50000: end (drive t1 a b) #2`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.5}: {}({})",
            self.time,
            self.kind.qualifier(),
            self.full_action_name
        )?;
        if self.repetition >= 1 {
            write!(f, " #{}", self.repetition + 1)?;
        }
        Ok(())
    }
}

/// Derives the flat happening sequence for a plan's steps, in step order.
///
/// Start/end pairs of a durative step share one repetition index; repetition
/// counts earlier steps with the same case-insensitive action full name.
pub fn plan_happenings(steps: &[PlanStep]) -> Vec<Happening> {
    let mut counters: HashMap<String, usize> = HashMap::new();
    let mut happenings = Vec::new();
    for step in steps {
        let key = step.full_action_name().to_lowercase();
        let repetition = *counters
            .entry(key)
            .and_modify(|c| *c += 1)
            .or_insert(0);
        let start = step.start_time().unwrap_or(0.0);
        match step.timing() {
            Timing::Instant => happenings.push(Happening {
                time: start,
                kind: HappeningKind::Instantaneous,
                full_action_name: step.full_action_name().to_string(),
                repetition,
                line_index: step.line_index(),
            }),
            Timing::Durative { duration } => {
                happenings.push(Happening {
                    time: start,
                    kind: HappeningKind::Start,
                    full_action_name: step.full_action_name().to_string(),
                    repetition,
                    line_index: step.line_index(),
                });
                happenings.push(Happening {
                    time: start + duration,
                    kind: HappeningKind::End,
                    full_action_name: step.full_action_name().to_string(),
                    repetition,
                    line_index: step.line_index(),
                });
            }
        }
    }
    happenings
}

/// Serializes happenings into the line syntax, sorted ascending by time with
/// ties broken by action full-name lexical order.
pub fn serialize_happenings(happenings: &[Happening]) -> String {
    let mut sorted: Vec<&Happening> = happenings.iter().collect();
    sorted.sort_by(|a, b| {
        a.time
            .partial_cmp(&b.time)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.full_action_name.cmp(&b.full_action_name))
    });
    let mut out = String::new();
    for happening in sorted {
        out.push_str(&happening.to_string());
        out.push('\n');
    }
    out
}

/// Parses a happenings listing.
///
/// Lines that do not match the grammar (comments, blank lines, chatter) are
/// skipped. A line without a time inherits the previous happening's time
/// (0 at the start of the listing); ties keep file order.
pub fn parse_happenings(text: &str) -> Vec<Happening> {
    let mut happenings = Vec::new();
    let mut current_time = 0.0;
    for (line_index, line) in text.lines().enumerate() {
        let Some(caps) = HAPPENING_LINE.captures(line) else {
            continue;
        };
        let Some(action) = caps.get(4).map(|m| m.as_str().trim()) else {
            continue;
        };
        if action.is_empty() {
            continue;
        }
        if let Some(time) = caps.get(2).and_then(|m| m.as_str().parse::<f64>().ok()) {
            current_time = time;
        }
        let kind = match caps.get(3).map(|m| m.as_str()) {
            Some("start") => HappeningKind::Start,
            Some("end") => HappeningKind::End,
            _ => HappeningKind::Instantaneous,
        };
        // `#N` marks the Nth occurrence (N >= 2); repetition is zero-based.
        let repetition = caps
            .get(6)
            .and_then(|m| m.as_str().parse::<usize>().ok())
            .map_or(0, |n| n.saturating_sub(1));
        happenings.push(Happening {
            time: current_time,
            kind,
            full_action_name: action.to_string(),
            repetition,
            line_index: Some(line_index),
        });
    }
    happenings
}

/// Rebuilds plan steps from a happenings sequence (file order authoritative).
///
/// Every start is matched to the next unmatched end with the same
/// case-insensitive action name and repetition index. An end with no open
/// start is a hard error; starts left open at end of input become durative
/// steps of duration 0.
pub fn happenings_to_steps(happenings: &[Happening]) -> Result<Vec<PlanStep>> {
    struct OpenStart {
        key: String,
        repetition: usize,
        slot: usize,
    }

    let mut steps: Vec<PlanStep> = Vec::new();
    let mut open: Vec<OpenStart> = Vec::new();

    for happening in happenings {
        let key = happening.full_action_name.to_lowercase();
        match happening.kind {
            HappeningKind::Instantaneous => {
                let mut step = PlanStep::instant(happening.time, &happening.full_action_name);
                if let Some(line) = happening.line_index {
                    step = step.with_line_index(line);
                }
                steps.push(step);
            }
            HappeningKind::Start => {
                let mut step = PlanStep::durative(happening.time, &happening.full_action_name, 0.0);
                if let Some(line) = happening.line_index {
                    step = step.with_line_index(line);
                }
                open.push(OpenStart {
                    key,
                    repetition: happening.repetition,
                    slot: steps.len(),
                });
                steps.push(step);
            }
            HappeningKind::End => {
                let position = open
                    .iter()
                    .position(|o| o.key == key && o.repetition == happening.repetition)
                    .ok_or_else(|| WaypointError::HappeningMismatch {
                        action: happening.full_action_name.clone(),
                        line: happening.line_index.unwrap_or(0),
                    })?;
                let matched = open.remove(position);
                let start = &steps[matched.slot];
                let start_time = start.start_time().unwrap_or(0.0);
                let mut step = PlanStep::durative(
                    start_time,
                    start.full_action_name(),
                    happening.time - start_time,
                );
                if let Some(line) = start.line_index() {
                    step = step.with_line_index(line);
                }
                steps[matched.slot] = step;
            }
        }
    }
    Ok(steps)
}
