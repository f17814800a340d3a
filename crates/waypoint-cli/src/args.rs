//! Command-line argument definitions using clap's derive API.
//!
//! The argument structures here stay CLI-specific; each converts into the
//! core option types before any domain logic runs, keeping clap concerns out
//! of `waypoint-core`.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use waypoint_core::parser::ParserOptions;
use waypoint_core::{ValStepOptions, DEFAULT_EPSILON};

/// Waypoint: PDDL plan parsing, happenings conversion, and ValStep replay
#[derive(Parser)]
#[command(version, about, name = "wp")]
pub struct Args {
    /// Epsilon substituted for instantaneous step durations and used as the
    /// comparison tolerance base
    #[arg(long, global = true, default_value_t = DEFAULT_EPSILON)]
    pub epsilon: f64,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for the Waypoint CLI
#[derive(Subcommand)]
pub enum Commands {
    /// Parse planner output (plain text, XML, or JSON) into normalized plans
    Parse(ParseArgs),
    /// Convert a plan into its happenings listing
    Happenings(HappeningsArgs),
    /// Rebuild a plan from a happenings listing
    Plan(PlanArgs),
    /// Replay a plan against a ValStep executable and print the state
    Evaluate(EvaluateArgs),
}

/// Parse planner output into plans
#[derive(ClapArgs)]
pub struct ParseArgs {
    /// Planner output file (payload format is detected from its content)
    pub file: PathBuf,

    /// Print plans as JSON instead of plan text
    #[arg(long)]
    pub json: bool,

    /// Scale factor applied to XML-payload times and durations
    #[arg(long, default_value_t = 1.0)]
    pub xml_time_unit: f64,

    /// Minimum number of plans expected from the output
    #[arg(long, default_value_t = 1)]
    pub expected_plans: usize,
}

impl ParseArgs {
    /// Builds the core parser options from CLI arguments.
    pub fn parser_options(&self, epsilon: f64) -> ParserOptions {
        ParserOptions {
            epsilon,
            expected_plan_count: self.expected_plans,
            xml_time_unit: self.xml_time_unit,
        }
    }
}

/// Convert a plan file into a happenings listing
#[derive(ClapArgs)]
pub struct HappeningsArgs {
    /// Plan file (plain text, XML, or JSON)
    pub file: PathBuf,
}

/// Rebuild a plan from a happenings listing
#[derive(ClapArgs)]
pub struct PlanArgs {
    /// Happenings listing file
    pub file: PathBuf,
}

/// Replay a plan against a ValStep executable
#[derive(ClapArgs)]
pub struct EvaluateArgs {
    /// Plan file to replay
    pub plan: PathBuf,

    /// PDDL domain file
    #[arg(long)]
    pub domain: PathBuf,

    /// PDDL problem file
    #[arg(long)]
    pub problem: PathBuf,

    /// Path to the ValStep executable
    #[arg(long, default_value = "valstep")]
    pub valstep: PathBuf,

    /// Drip-feed one time group at a time, printing each state delta
    #[arg(long)]
    pub interactive: bool,

    /// Per-batch timeout in seconds (interactive mode)
    #[arg(long, default_value_t = 5)]
    pub batch_timeout: u64,

    /// Overall wall-clock timeout in seconds (batch mode)
    #[arg(long, default_value_t = 60)]
    pub timeout: u64,

    /// Directory to export a reproduction case into when the session fails
    #[arg(long)]
    pub export_dir: Option<PathBuf>,
}

impl EvaluateArgs {
    /// Builds the core session options from CLI arguments.
    pub fn valstep_options(&self) -> ValStepOptions {
        let mut options = ValStepOptions::new(&self.valstep);
        options.batch_timeout = std::time::Duration::from_secs(self.batch_timeout);
        options.overall_timeout = std::time::Duration::from_secs(self.timeout);
        options
    }
}
