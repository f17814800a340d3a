//! Incremental plan-output parsing.
//!
//! Planner output arrives in arbitrary-sized chunks on process-output
//! callbacks. [`PlanParser`] turns that stream into ordered [`Plan`]s without
//! losing or duplicating partial lines: `append_buffer` retains any trailing
//! partial line across calls, and `finish` replays it before closing out.
//!
//! Three payload shapes exist, selected once at the entry point as a tagged
//! [`PlanPayload`]: plain planner stdout (step lines interleaved with
//! chatter and metadata), an XML plan document, and the JSON array returned
//! by asynchronous planning services. The streaming parser only ever sniffs
//! XML at stream start; a malformed XML payload is dropped with a logged
//! warning and subsequent lines are processed as ordinary step lines.
//!
//! # Example
//!
//! ```rust
//! use waypoint_core::parser::{ParserOptions, PlanParser};
//!
//! let mut parser = PlanParser::new(ParserOptions::default());
//! parser.append_buffer("0.00000: (drive truck1 ");
//! parser.append_buffer("depot city)\n1.00000: (unload crane1 c1 loc1) [3.5]\n");
//! let plans = parser.finish();
//! assert_eq!(plans.len(), 1);
//! assert_eq!(plans[0].steps.len(), 2);
//! assert_eq!(plans[0].makespan, 4.5);
//! ```

pub mod json;
pub mod xml;

#[cfg(test)]
mod tests;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Result;
use crate::plan::Plan;
use crate::step::{PlanStep, Timing, DEFAULT_EPSILON};

/// Plan-step line grammar: optional leading `<time>:`, a parenthesized
/// action with arguments, an optional trailing `[<duration>]` whose presence
/// marks the step durative.
static PLAN_STEP_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*((\d+|\d+\.\d+)\s*:)?\s*\((.*)\)\s*(\[\s*(\d+|\d+\.\d+)\s*\])?\s*$")
        .expect("plan step pattern")
});

/// States-evaluated metadata line, e.g. `; States evaluated: 421`.
static STATES_EVALUATED_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*;?\s*states?\s+evaluated\D*(\d+)").expect("states pattern"));

/// Cost/metric metadata line, e.g. `; Cost: 36.01` or `Metric = 12`.
static COST_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*;?\s*(?:plan\s+)?(?:cost|metric)\s*[:=]?\s*([-+]?\d+(?:\.\d+)?)")
        .expect("cost pattern")
});

/// Parser configuration shared across payload deserializers.
#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Duration substituted for instantaneous steps and base comparison
    /// tolerance.
    pub epsilon: f64,
    /// Minimum number of plans the caller expects this session to surface.
    /// A closed-out plan with zero steps is emitted only while this count
    /// has not been reached, so planners reporting "no plan found" still
    /// produce one explicit empty result.
    pub expected_plan_count: usize,
    /// Scale factor applied to XML-payload times and durations.
    pub xml_time_unit: f64,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
            expected_plan_count: 1,
            xml_time_unit: 1.0,
        }
    }
}

/// A plan payload with its format decided once, up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanPayload {
    /// Ordinary planner stdout: step lines, metadata, chatter.
    PlainText(String),
    /// An XML plan document (`<Plan>…</Plan>`).
    Xml(String),
    /// A JSON step array from an asynchronous planning service.
    Json(String),
}

impl PlanPayload {
    /// Classifies a complete payload by its leading content.
    pub fn detect(text: &str) -> Self {
        let trimmed = text.trim_start();
        if trimmed.starts_with("<?xml") {
            Self::Xml(text.to_string())
        } else if trimmed.starts_with('[') || trimmed.starts_with('{') {
            Self::Json(text.to_string())
        } else {
            Self::PlainText(text.to_string())
        }
    }

    /// Deserializes the payload into plans with its format's deserializer.
    pub fn into_plans(self, options: &ParserOptions) -> Result<Vec<Plan>> {
        match self {
            Self::PlainText(text) => {
                let mut parser = PlanParser::new(options.clone());
                parser.append_buffer(&text);
                Ok(parser.finish())
            }
            Self::Xml(text) => xml::parse_xml_plan(&text, options).map(|plan| vec![plan]),
            Self::Json(text) => json::parse_json_plan(&text, options).map(|plan| vec![plan]),
        }
    }
}

/// Accumulates one plan's steps and metadata, then freezes into a [`Plan`].
#[derive(Debug)]
pub struct PlanBuilder {
    epsilon: f64,
    steps: Vec<PlanStep>,
    makespan: f64,
    cost: Option<f64>,
    states_evaluated: Option<u64>,
}

impl PlanBuilder {
    /// Creates an empty builder.
    pub fn new(epsilon: f64) -> Self {
        Self {
            epsilon,
            steps: Vec::new(),
            makespan: 0.0,
            cost: None,
            states_evaluated: None,
        }
    }

    /// Attempts to parse one line as a plan step.
    ///
    /// A line without an explicit timestamp is scheduled back-to-back at the
    /// current running makespan.
    pub fn try_parse_step(&self, line: &str, line_index: Option<usize>) -> Option<PlanStep> {
        let caps = PLAN_STEP_LINE.captures(line)?;
        let action = caps.get(3)?.as_str().trim();
        if action.is_empty() {
            return None;
        }
        let time = caps
            .get(2)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(self.makespan);
        let timing = match caps.get(5).and_then(|m| m.as_str().parse::<f64>().ok()) {
            Some(duration) => Timing::Durative { duration },
            None => Timing::Instant,
        };
        let mut step = PlanStep::new(Some(time), action, timing);
        if let Some(line_index) = line_index {
            step = step.with_line_index(line_index);
        }
        Some(step)
    }

    /// Adds a step, advancing the running makespan to `max(makespan,
    /// step.end_time())`.
    pub fn add(&mut self, step: PlanStep) {
        self.makespan = self.makespan.max(step.end_time());
        self.steps.push(step);
    }

    /// Attempts to extract cost or states-evaluated metadata from a non-step
    /// line; first match wins per plan. Returns whether the line was
    /// consumed.
    pub fn try_parse_metadata(&mut self, line: &str) -> bool {
        if self.states_evaluated.is_none() {
            if let Some(caps) = STATES_EVALUATED_LINE.captures(line) {
                self.states_evaluated = caps.get(1).and_then(|m| m.as_str().parse().ok());
                return self.states_evaluated.is_some();
            }
        }
        if self.cost.is_none() {
            if let Some(caps) = COST_LINE.captures(line) {
                self.cost = caps.get(1).and_then(|m| m.as_str().parse().ok());
                return self.cost.is_some();
            }
        }
        false
    }

    /// Whether any steps have accumulated.
    pub fn has_steps(&self) -> bool {
        !self.steps.is_empty()
    }

    /// The running makespan.
    pub fn makespan(&self) -> f64 {
        self.makespan
    }

    /// The epsilon this builder substitutes for instantaneous durations.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Freezes the accumulated state into an immutable plan.
    pub fn build(self) -> Plan {
        let mut plan = Plan::from_steps(self.steps);
        plan.cost = self.cost;
        plan.states_evaluated = self.states_evaluated;
        plan
    }
}

/// Streaming mode, decided once from the first non-whitespace content.
#[derive(Debug, PartialEq, Eq)]
enum StreamMode {
    /// Not enough content yet to classify the stream.
    Undecided,
    /// Line-oriented planner output.
    Text,
    /// Accumulating an XML document until its closing `</Plan>` tag.
    Xml,
}

/// Incremental parser over planner process output.
///
/// Feed chunks with [`append_buffer`](Self::append_buffer) at any split
/// granularity, then call [`finish`](Self::finish) to flush the retained
/// partial line and collect the plans.
pub struct PlanParser {
    options: ParserOptions,
    /// Unconsumed input: at most one partial line in text mode, or the
    /// accumulating document in XML mode.
    buffer: String,
    mode: StreamMode,
    line_index: usize,
    builder: PlanBuilder,
    plans: Vec<Plan>,
}

impl PlanParser {
    /// Creates a parser session.
    pub fn new(options: ParserOptions) -> Self {
        let builder = PlanBuilder::new(options.epsilon);
        Self {
            options,
            buffer: String::new(),
            mode: StreamMode::Undecided,
            line_index: 0,
            builder,
            plans: Vec::new(),
        }
    }

    /// Appends a chunk of planner output; chunk boundaries may fall anywhere,
    /// including inside a line or a multi-byte token.
    pub fn append_buffer(&mut self, chunk: &str) {
        self.buffer.push_str(chunk);
        if self.mode == StreamMode::Undecided {
            self.classify_stream();
        }
        match self.mode {
            StreamMode::Undecided => {}
            StreamMode::Text => self.drain_lines(),
            StreamMode::Xml => self.drain_xml(),
        }
    }

    /// Flushes any retained partial input and closes out the session,
    /// returning the plans in the order they were completed.
    pub fn finish(&mut self) -> Vec<Plan> {
        match self.mode {
            StreamMode::Xml => {
                if !self.buffer.trim().is_empty() {
                    log::warn!("dropping incomplete XML plan payload at end of stream");
                }
                self.buffer.clear();
            }
            _ => {
                let remainder = std::mem::take(&mut self.buffer);
                if !remainder.trim().is_empty() {
                    self.process_line(&remainder);
                }
            }
        }
        if self.builder.has_steps() || self.plans.len() < self.options.expected_plan_count {
            self.close_current_plan();
        }
        std::mem::take(&mut self.plans)
    }

    /// Decides the stream mode from the first non-whitespace content. Waits
    /// while the buffer could still be a prefix of the XML prolog.
    fn classify_stream(&mut self) {
        let head = self.buffer.trim_start();
        if head.is_empty() {
            return;
        }
        if head.len() < 5 && "<?xml".starts_with(head) {
            return;
        }
        self.mode = if head.starts_with("<?xml") {
            StreamMode::Xml
        } else {
            StreamMode::Text
        };
    }

    /// Consumes complete lines from the buffer, retaining the trailing
    /// partial line.
    fn drain_lines(&mut self) {
        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            self.process_line(line.trim_end_matches(['\n', '\r']));
        }
    }

    /// Accumulates until the closing `</Plan>` tag, then deserializes the
    /// document. Malformed XML drops the payload and continues in text mode.
    fn drain_xml(&mut self) {
        const CLOSE_TAG: &str = "</Plan>";
        let Some(position) = self.buffer.find(CLOSE_TAG) else {
            return;
        };
        let document: String = self.buffer.drain(..position + CLOSE_TAG.len()).collect();
        match xml::parse_xml_plan(&document, &self.options) {
            Ok(plan) => self.plans.push(plan),
            Err(error) => log::warn!("dropping malformed XML plan payload: {error}"),
        }
        self.mode = StreamMode::Text;
        self.drain_lines();
    }

    /// Routes one complete line: step, metadata, or chatter. Chatter after
    /// accumulated steps closes out the current plan.
    fn process_line(&mut self, line: &str) {
        let line_index = self.line_index;
        self.line_index += 1;

        if let Some(step) = self.builder.try_parse_step(line, Some(line_index)) {
            self.builder.add(step);
            return;
        }
        if self.builder.try_parse_metadata(line) {
            return;
        }
        if self.builder.has_steps() {
            self.close_current_plan();
        }
    }

    /// Freezes the current builder into a plan and starts a fresh one. Empty
    /// plans are surfaced only while the expected plan count is unmet.
    fn close_current_plan(&mut self) {
        let builder = std::mem::replace(&mut self.builder, PlanBuilder::new(self.options.epsilon));
        let plan = builder.build();
        if !plan.is_empty() || self.plans.len() < self.options.expected_plan_count {
            self.plans.push(plan);
        }
    }
}
