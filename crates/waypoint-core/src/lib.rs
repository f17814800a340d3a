//! Core library for the Waypoint PDDL tooling.
//!
//! This crate provides the planner-output data model and the two consumers
//! built on it: the incremental plan parser and the ValStep replay session.
//!
//! # Architecture
//!
//! Control flows leaf-first through the crate:
//!
//! ```text
//! planner stdout / .plan / XML / JSON
//!          │
//!          ▼
//!   parser::PlanParser ──▶ plan::Plan (ordered step::PlanStep)
//!          │
//!          ▼
//!   happenings::plan_happenings ──▶ [Happening]
//!          │
//!          ▼
//!   valstep::ValStepSession ──▶ per-timestep variable-value deltas
//! ```
//!
//! The parser and the ValStep session are independent consumers/producers of
//! the same `PlanStep`/`Happening` model: plans can be parsed without ever
//! replaying them, and happenings listings can be replayed without a parse.
//!
//! # Quick start
//!
//! ```rust
//! use waypoint_core::{happenings, parser::{ParserOptions, PlanParser}};
//!
//! let mut parser = PlanParser::new(ParserOptions::default());
//! parser.append_buffer("0.00000: (drive truck1 depot city)\n");
//! parser.append_buffer("1.00000: (unload crane1 c1 loc1) [3.50000]\n");
//! let plans = parser.finish();
//! assert_eq!(plans[0].makespan, 4.5);
//!
//! let events = happenings::plan_happenings(&plans[0].steps);
//! assert_eq!(events.len(), 3);
//! ```

pub mod error;
pub mod happenings;
pub mod parser;
pub mod plan;
pub mod problem;
pub mod step;
pub mod valstep;

// Re-export commonly used types
pub use error::{Result, WaypointError};
pub use happenings::{Happening, HappeningKind};
pub use parser::{ParserOptions, PlanBuilder, PlanParser, PlanPayload};
pub use plan::Plan;
pub use step::{Commitment, PlanStep, Timing, DEFAULT_EPSILON};
pub use valstep::{
    SessionContext, StateUpdate, TimedVariableValue, ValStepOptions, ValStepSession,
    VariableState, VariableValue,
};
