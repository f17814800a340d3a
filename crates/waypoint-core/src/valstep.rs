//! ValStep session: replaying a plan's happenings against an external
//! state-evaluator subprocess.
//!
//! The session owns exactly one subprocess for its lifetime. Happenings are
//! grouped by timestamp and fed strictly in ascending order with one batch
//! in flight at a time — the tool's internal state is cumulative and its
//! report framing assumes a single outstanding request. Each batch's report
//! updates the tracked variable values; only genuine changes propagate.
//!
//! Two operating modes:
//!
//! - [`ValStepSession::execute`] feeds the entire happening sequence and
//!   blocks until the complete output dump is available (headless "give me
//!   the final state" queries), bounded by a wall-clock limit and a maximum
//!   output size.
//! - [`ValStepSession::execute_incremental`] drip-feeds one time group at a
//!   time and delivers a [`StateUpdate`] per completed batch over a channel,
//!   enforcing a per-batch liveness timeout.
//!
//! Every failure carries the domain, problem, and full input transcript
//! ([`SessionContext`]) so a session can be reproduced outside the host by
//! replaying the same files and commands; see
//! [`SessionContext::export_case`].

pub mod report;

#[cfg(test)]
mod tests;

use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};

use crate::error::{Result, WaypointError};
use crate::happenings::Happening;
use crate::problem::parse_initial_state;

use report::BatchReport;

/// A ground fluent's value: a literal truth value or a numeric function
/// value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VariableValue {
    Bool(bool),
    Num(f64),
}

impl fmt::Display for VariableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableValue::Bool(value) => write!(f, "{value}"),
            VariableValue::Num(value) => write!(f, "{value}"),
        }
    }
}

/// A variable's value together with the time it last changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimedVariableValue {
    pub time: f64,
    pub variable: String,
    pub value: VariableValue,
}

/// The running variable-value state of a replay.
///
/// At most one value is tracked per case-insensitive variable name; an
/// update either inserts a new timed value or rewrites an existing entry's
/// time and value in place.
#[derive(Debug, Clone, Default)]
pub struct VariableState {
    values: Vec<TimedVariableValue>,
}

impl VariableState {
    /// Seeds the state, keeping the last entry per case-insensitive name.
    pub fn new(initial: Vec<TimedVariableValue>) -> Self {
        let mut state = Self::default();
        for value in initial {
            state.apply(value.time, &value.variable, value.value);
        }
        state
    }

    /// Looks up a variable's tracked value.
    pub fn get(&self, variable: &str) -> Option<&TimedVariableValue> {
        self.values
            .iter()
            .find(|v| v.variable.eq_ignore_ascii_case(variable))
    }

    /// Applies one reported value. Returns the updated entry when the value
    /// was new or genuinely different, `None` when it was a no-op.
    pub fn apply(
        &mut self,
        time: f64,
        variable: &str,
        value: VariableValue,
    ) -> Option<TimedVariableValue> {
        match self
            .values
            .iter_mut()
            .find(|v| v.variable.eq_ignore_ascii_case(variable))
        {
            Some(existing) => {
                if existing.value == value {
                    return None;
                }
                existing.time = time;
                existing.value = value;
                Some(existing.clone())
            }
            None => {
                let entry = TimedVariableValue {
                    time,
                    variable: variable.to_string(),
                    value,
                };
                self.values.push(entry.clone());
                Some(entry)
            }
        }
    }

    /// All tracked values.
    pub fn values(&self) -> &[TimedVariableValue] {
        &self.values
    }
}

/// Everything needed to reproduce a session offline.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Domain text the session was constructed with.
    pub domain: String,
    /// Problem text the session was constructed with.
    pub problem: String,
    /// Full text written to the subprocess's stdin so far.
    pub transcript: String,
}

/// Files written by [`SessionContext::export_case`].
#[derive(Debug)]
pub struct ExportedCase {
    pub directory: PathBuf,
    pub domain: PathBuf,
    pub problem: PathBuf,
    pub input: PathBuf,
}

impl SessionContext {
    /// Writes the domain, problem, and input transcript to a fresh uniquely
    /// named directory under `parent`, so the failing session can be
    /// replayed by hand: `valstep domain.pddl problem.pddl <
    /// valstep-input.txt`.
    pub fn export_case(&self, parent: &Path) -> Result<ExportedCase> {
        let directory = tempfile::Builder::new()
            .prefix("waypoint-case-")
            .tempdir_in(parent)
            .map_err(|e| WaypointError::file_system(parent, e))?
            .keep();
        let case = ExportedCase {
            domain: directory.join("domain.pddl"),
            problem: directory.join("problem.pddl"),
            input: directory.join("valstep-input.txt"),
            directory,
        };
        std::fs::write(&case.domain, &self.domain)
            .map_err(|e| WaypointError::file_system(&case.domain, e))?;
        std::fs::write(&case.problem, &self.problem)
            .map_err(|e| WaypointError::file_system(&case.problem, e))?;
        std::fs::write(&case.input, &self.transcript)
            .map_err(|e| WaypointError::file_system(&case.input, e))?;
        Ok(case)
    }
}

/// Session configuration.
#[derive(Debug, Clone)]
pub struct ValStepOptions {
    /// Path to the ValStep executable.
    pub executable: PathBuf,
    /// Liveness bound per batch in incremental mode.
    pub batch_timeout: Duration,
    /// Wall-clock bound for the whole batch-mode run.
    pub overall_timeout: Duration,
    /// Maximum accepted output size in batch mode.
    pub max_output_bytes: usize,
}

impl ValStepOptions {
    /// Options for the given executable with default limits.
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            batch_timeout: Duration::from_secs(5),
            overall_timeout: Duration::from_secs(60),
            max_output_bytes: 10 * 1024 * 1024,
        }
    }
}

/// One completed batch's state delta, emitted in incremental mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateUpdate {
    /// The batch's reference time.
    pub time: f64,
    /// Values that genuinely changed in this batch.
    pub changed: Vec<TimedVariableValue>,
}

/// Happenings sharing one timestamp, in submission order.
#[derive(Debug, Clone)]
struct HappeningGroup {
    time: f64,
    happenings: Vec<Happening>,
}

impl HappeningGroup {
    /// The serialized input lines for this group.
    fn lines(&self) -> String {
        let mut out = String::new();
        for happening in &self.happenings {
            out.push_str(&happening.to_string());
            out.push('\n');
        }
        out
    }
}

/// Stable-sorts by time and chunks equal timestamps, preserving submission
/// order within each group.
fn group_by_time(happenings: &[Happening]) -> Vec<HappeningGroup> {
    let mut sorted: Vec<Happening> = happenings.to_vec();
    sorted.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(Ordering::Equal));

    let mut groups: Vec<HappeningGroup> = Vec::new();
    for happening in sorted {
        match groups.last_mut() {
            Some(group) if group.time == happening.time => group.happenings.push(happening),
            _ => groups.push(HappeningGroup {
                time: happening.time,
                happenings: vec![happening],
            }),
        }
    }
    groups
}

/// A replay session against one ValStep subprocess.
pub struct ValStepSession {
    options: ValStepOptions,
    domain: String,
    problem: String,
    state: VariableState,
    initial_values: Vec<TimedVariableValue>,
    transcript: String,
}

impl ValStepSession {
    /// Constructs a session, seeding the tracked state from the problem's
    /// declared initial state.
    pub fn new(
        domain: impl Into<String>,
        problem: impl Into<String>,
        options: ValStepOptions,
    ) -> Self {
        let domain = domain.into();
        let problem = problem.into();
        let initial_values = parse_initial_state(&problem);
        let state = VariableState::new(initial_values.clone());
        Self {
            options,
            domain,
            problem,
            state,
            initial_values,
            transcript: String::new(),
        }
    }

    /// The current tracked variable values.
    pub fn variable_values(&self) -> &[TimedVariableValue] {
        self.state.values()
    }

    /// The initial-state snapshot taken at construction, for diffing.
    pub fn initial_values(&self) -> &[TimedVariableValue] {
        &self.initial_values
    }

    fn context(&self) -> Box<SessionContext> {
        Box::new(SessionContext {
            domain: self.domain.clone(),
            problem: self.problem.clone(),
            transcript: self.transcript.clone(),
        })
    }

    /// Writes the domain/problem to a fresh temp directory and spawns the
    /// tool with those file paths as its arguments.
    async fn launch(&self) -> Result<(Child, tempfile::TempDir)> {
        let directory = tempfile::Builder::new()
            .prefix("waypoint-valstep-")
            .tempdir()
            .map_err(|e| WaypointError::file_system(std::env::temp_dir(), e))?;
        let domain_path = directory.path().join("domain.pddl");
        let problem_path = directory.path().join("problem.pddl");
        tokio::fs::write(&domain_path, &self.domain)
            .await
            .map_err(|e| WaypointError::file_system(&domain_path, e))?;
        tokio::fs::write(&problem_path, &self.problem)
            .await
            .map_err(|e| WaypointError::file_system(&problem_path, e))?;

        let child = Command::new(&self.options.executable)
            .arg(&domain_path)
            .arg(&problem_path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| WaypointError::ToolSpawn {
                executable: self.options.executable.clone(),
                source: e,
                context: self.context(),
            })?;
        Ok((child, directory))
    }

    fn input_error(&self, source: std::io::Error) -> WaypointError {
        WaypointError::ToolInput {
            source,
            context: self.context(),
        }
    }

    /// Applies one batch report at its group's reference time, returning the
    /// genuinely changed values.
    fn apply_report(&mut self, time: f64, report: &BatchReport) -> Vec<TimedVariableValue> {
        let mut changed = Vec::new();
        for (variable, value) in &report.values {
            if let Some(update) = self.state.apply(time, variable, value.clone()) {
                changed.push(update);
            }
        }
        changed
    }

    /// Batch mode: feeds the entire happening sequence, waits for the
    /// complete output dump, and returns the final state.
    pub async fn execute(&mut self, happenings: &[Happening]) -> Result<Vec<TimedVariableValue>> {
        let groups = group_by_time(happenings);
        let (mut child, _files) = self.launch().await?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| self.input_error(unavailable_pipe()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| self.input_error(unavailable_pipe()))?;

        // Drain stdout concurrently so a chatty tool cannot dead-lock the
        // feed on a full pipe.
        let cap = self.options.max_output_bytes;
        let reader = tokio::spawn(read_capped(stdout, cap));

        for group in &groups {
            let lines = group.lines();
            log::debug!("feeding batch at time {}", group.time);
            self.transcript.push_str(&lines);
            stdin
                .write_all(lines.as_bytes())
                .await
                .map_err(|e| self.input_error(e))?;
        }
        self.transcript.push_str("q\n");
        stdin
            .write_all(b"q\n")
            .await
            .map_err(|e| self.input_error(e))?;
        drop(stdin);

        let last_time = groups.last().map_or(0.0, |g| g.time);
        let read_result = match timeout(self.options.overall_timeout, reader).await {
            Ok(joined) => joined.map_err(|e| WaypointError::ReportMalformed {
                reason: format!("output reader failed: {e}"),
                context: self.context(),
            })?,
            Err(_) => {
                let _ = child.kill().await;
                return Err(WaypointError::ReportTimeout {
                    time: last_time,
                    context: self.context(),
                });
            }
        };
        let (output, truncated) = read_result.map_err(|e| self.input_error(e))?;
        if truncated {
            let _ = child.kill().await;
            return Err(WaypointError::ReportMalformed {
                reason: format!("output exceeded {cap} bytes"),
                context: self.context(),
            });
        }

        let status = child.wait().await.map_err(|e| self.input_error(e))?;
        if !status.success() {
            return Err(WaypointError::ToolExit {
                code: status.code(),
                context: self.context(),
            });
        }

        let reports = report::parse_all_reports(&output);
        if reports.len() < groups.len() {
            return Err(WaypointError::ReportMalformed {
                reason: format!(
                    "expected {} batch reports, found {}",
                    groups.len(),
                    reports.len()
                ),
                context: self.context(),
            });
        }
        for (group, batch) in groups.iter().zip(&reports) {
            self.apply_report(group.time, batch);
        }
        Ok(self.state.values().to_vec())
    }

    /// Interactive mode: feeds one time group at a time, delivering a
    /// [`StateUpdate`] per completed batch on `updates`. Each batch is
    /// bounded by the per-batch timeout; on expiry the subprocess is killed
    /// and the error names the offending timestamp.
    pub async fn execute_incremental(
        &mut self,
        happenings: &[Happening],
        updates: mpsc::Sender<StateUpdate>,
    ) -> Result<Vec<TimedVariableValue>> {
        let groups = group_by_time(happenings);
        let (mut child, _files) = self.launch().await?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| self.input_error(unavailable_pipe()))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| self.input_error(unavailable_pipe()))?;
        let mut pending = String::new();

        for group in &groups {
            let lines = group.lines();
            log::debug!("feeding batch at time {}", group.time);
            self.transcript.push_str(&lines);
            stdin
                .write_all(lines.as_bytes())
                .await
                .map_err(|e| self.input_error(e))?;
            stdin.flush().await.map_err(|e| self.input_error(e))?;

            let batch = match self.await_report(&mut stdout, &mut pending, group.time).await {
                Ok(batch) => batch,
                Err(error) => {
                    let _ = child.kill().await;
                    return Err(error);
                }
            };
            log::debug!(
                "batch at time {} reported {} value change(s)",
                group.time,
                batch.values.len()
            );
            let changed = self.apply_report(group.time, &batch);
            if updates
                .send(StateUpdate {
                    time: group.time,
                    changed,
                })
                .await
                .is_err()
            {
                // Receiver dropped: the caller no longer wants updates.
                break;
            }
        }

        self.transcript.push_str("q\n");
        stdin
            .write_all(b"q\n")
            .await
            .map_err(|e| self.input_error(e))?;
        drop(stdin);

        // Keep draining trailing output so the exiting tool cannot block on
        // a full pipe, and bound the wait so a tool that lingers after `q`
        // cannot hang the session past its per-batch liveness window.
        let drain = tokio::spawn(async move {
            let mut sink = [0u8; 4096];
            while matches!(stdout.read(&mut sink).await, Ok(read) if read > 0) {}
        });
        let last_time = groups.last().map_or(0.0, |g| g.time);
        let status = match timeout(self.options.batch_timeout, child.wait()).await {
            Ok(waited) => waited.map_err(|e| self.input_error(e))?,
            Err(_) => {
                let _ = child.kill().await;
                drain.abort();
                return Err(WaypointError::ReportTimeout {
                    time: last_time,
                    context: self.context(),
                });
            }
        };
        let _ = drain.await;
        if !status.success() {
            return Err(WaypointError::ToolExit {
                code: status.code(),
                context: self.context(),
            });
        }
        Ok(self.state.values().to_vec())
    }

    /// Reads subprocess output until one complete batch report can be
    /// consumed from `pending`, or the per-batch timeout expires.
    async fn await_report(
        &self,
        stdout: &mut ChildStdout,
        pending: &mut String,
        batch_time: f64,
    ) -> Result<BatchReport> {
        let deadline = Instant::now() + self.options.batch_timeout;
        let mut chunk = [0u8; 4096];
        loop {
            if let Some(batch) = report::try_consume_report(pending) {
                return Ok(batch);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(WaypointError::ReportTimeout {
                    time: batch_time,
                    context: self.context(),
                });
            }
            match timeout(remaining, stdout.read(&mut chunk)).await {
                Ok(Ok(0)) => {
                    return Err(WaypointError::ReportMalformed {
                        reason: format!(
                            "output ended before the batch at time {batch_time} completed"
                        ),
                        context: self.context(),
                    });
                }
                Ok(Ok(read)) => {
                    pending.push_str(&String::from_utf8_lossy(&chunk[..read]));
                }
                Ok(Err(e)) => return Err(self.input_error(e)),
                Err(_) => {
                    return Err(WaypointError::ReportTimeout {
                        time: batch_time,
                        context: self.context(),
                    });
                }
            }
        }
    }
}

fn unavailable_pipe() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::BrokenPipe, "subprocess pipe unavailable")
}

/// Reads the stream to EOF or until `cap` bytes, reporting truncation.
async fn read_capped(mut stdout: ChildStdout, cap: usize) -> std::io::Result<(String, bool)> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let read = stdout.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
        if buffer.len() > cap {
            return Ok((String::from_utf8_lossy(&buffer).into_owned(), true));
        }
    }
    Ok((String::from_utf8_lossy(&buffer).into_owned(), false))
}
