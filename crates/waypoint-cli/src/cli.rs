//! Command handlers bridging CLI arguments to the core library.

use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use tokio::sync::mpsc;
use waypoint_core::happenings::{
    happenings_to_steps, parse_happenings, plan_happenings, serialize_happenings,
};
use waypoint_core::parser::ParserOptions;
use waypoint_core::{Plan, PlanPayload, ValStepSession};

use crate::args::{EvaluateArgs, HappeningsArgs, ParseArgs, PlanArgs};

/// Command dispatcher carrying the shared epsilon.
pub struct Cli {
    epsilon: f64,
}

impl Cli {
    /// Creates a dispatcher.
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }

    fn read_to_string(path: &Path) -> Result<String> {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read '{}'", path.display()))
    }

    fn load_plans(&self, path: &Path, options: &ParserOptions) -> Result<Vec<Plan>> {
        let text = Self::read_to_string(path)?;
        PlanPayload::detect(&text)
            .into_plans(options)
            .with_context(|| format!("Failed to parse plan payload '{}'", path.display()))
    }

    fn default_options(&self) -> ParserOptions {
        ParserOptions {
            epsilon: self.epsilon,
            ..ParserOptions::default()
        }
    }

    /// `wp parse`: normalize planner output and print each plan.
    pub fn handle_parse(&self, args: &ParseArgs) -> Result<()> {
        let options = args.parser_options(self.epsilon);
        let plans = self.load_plans(&args.file, &options)?;
        info!("parsed {} plan(s) from {}", plans.len(), args.file.display());

        if args.json {
            println!("{}", serde_json::to_string_pretty(&plans)?);
            return Ok(());
        }
        for (index, plan) in plans.iter().enumerate() {
            if plans.len() > 1 {
                println!("; Plan {}", index + 1);
            }
            print!("{plan}");
        }
        Ok(())
    }

    /// `wp happenings`: print a plan's happenings listing.
    pub fn handle_happenings(&self, args: &HappeningsArgs) -> Result<()> {
        let plans = self.load_plans(&args.file, &self.default_options())?;
        let plan = plans
            .first()
            .context("The input contained no plan to convert")?;
        print!("{}", serialize_happenings(&plan_happenings(&plan.steps)));
        Ok(())
    }

    /// `wp plan`: rebuild a plan from a happenings listing.
    pub fn handle_plan(&self, args: &PlanArgs) -> Result<()> {
        let text = Self::read_to_string(&args.file)?;
        let steps = happenings_to_steps(&parse_happenings(&text))
            .context("The happenings listing is inconsistent")?;
        print!("{}", Plan::from_steps(steps));
        Ok(())
    }

    /// `wp evaluate`: replay a plan through a ValStep session.
    pub async fn handle_evaluate(&self, args: &EvaluateArgs) -> Result<()> {
        let plans = self.load_plans(&args.plan, &self.default_options())?;
        let plan = plans
            .first()
            .context("The input contained no plan to evaluate")?;
        let happenings = plan_happenings(&plan.steps);

        let domain = Self::read_to_string(&args.domain)?;
        let problem = Self::read_to_string(&args.problem)?;
        let mut session =
            ValStepSession::new(domain, problem, args.valstep_options());

        let outcome = if args.interactive {
            let (tx, mut rx) = mpsc::channel::<waypoint_core::StateUpdate>(16);
            let printer = tokio::spawn(async move {
                while let Some(update) = rx.recv().await {
                    for value in &update.changed {
                        println!("{:.5}: {} := {}", update.time, value.variable, value.value);
                    }
                }
            });
            let outcome = session.execute_incremental(&happenings, tx).await;
            let _ = printer.await;
            outcome
        } else {
            session.execute(&happenings).await
        };

        match outcome {
            Ok(values) => {
                println!("; Final state after {} happenings", happenings.len());
                let mut sorted = values;
                sorted.sort_by(|a, b| a.variable.cmp(&b.variable));
                for value in &sorted {
                    println!("{} = {}", value.variable, value.value);
                }
                Ok(())
            }
            Err(error) => {
                if let (Some(directory), Some(context)) =
                    (&args.export_dir, error.session_context())
                {
                    let case = context.export_case(directory).with_context(|| {
                        format!("Failed to export case into '{}'", directory.display())
                    })?;
                    eprintln!(
                        "Reproduction case exported to {}",
                        case.directory.display()
                    );
                }
                Err(error).context("ValStep session failed")
            }
        }
    }
}
