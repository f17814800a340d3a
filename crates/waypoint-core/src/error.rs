//! Error types for the waypoint library.

use std::path::PathBuf;

use thiserror::Error;

use crate::valstep::SessionContext;

/// Comprehensive error type for all waypoint operations.
#[derive(Error, Debug)]
pub enum WaypointError {
    /// An XML or JSON plan payload failed to deserialize.
    ///
    /// The streaming parser logs and drops these; the one-shot payload entry
    /// points surface them to the caller.
    #[error("Malformed {format} plan payload: {reason}")]
    PayloadMalformed { format: &'static str, reason: String },

    /// A happenings listing contains an `end` with no matching unmatched
    /// `start`. The sequence is contractually broken; there is no recovery.
    #[error("Happening 'end ({action})' at line {line} has no matching start")]
    HappeningMismatch { action: String, line: usize },

    /// The ValStep executable could not be spawned.
    #[error("Failed to launch ValStep executable '{executable}': {source}")]
    ToolSpawn {
        executable: PathBuf,
        source: std::io::Error,
        context: Box<SessionContext>,
    },

    /// The ValStep subprocess exited with a non-zero status.
    #[error("ValStep exited with status {code:?}")]
    ToolExit {
        code: Option<i32>,
        context: Box<SessionContext>,
    },

    /// Writing to the ValStep subprocess's stdin failed (e.g. broken pipe).
    #[error("Failed to write to ValStep input: {source}")]
    ToolInput {
        source: std::io::Error,
        context: Box<SessionContext>,
    },

    /// No complete batch report arrived within the allowed window.
    #[error("ValStep produced no complete report for the batch at time {time} before the timeout")]
    ReportTimeout { time: f64, context: Box<SessionContext> },

    /// The ValStep output ended without forming a well-formed report.
    #[error("Malformed ValStep output: {reason}")]
    ReportMalformed {
        reason: String,
        context: Box<SessionContext>,
    },

    /// File system operation errors
    #[error("File system error at path '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl WaypointError {
    /// Creates a file system error for a path.
    pub fn file_system(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileSystem {
            path: path.into(),
            source,
        }
    }

    /// The ValStep session context attached to this error, if any.
    ///
    /// Every subprocess-level failure carries the domain, problem, and input
    /// transcript so the session can be reproduced outside the caller.
    pub fn session_context(&self) -> Option<&SessionContext> {
        match self {
            Self::ToolSpawn { context, .. }
            | Self::ToolExit { context, .. }
            | Self::ToolInput { context, .. }
            | Self::ReportTimeout { context, .. }
            | Self::ReportMalformed { context, .. } => Some(context),
            _ => None,
        }
    }
}

/// Result type alias for waypoint operations
pub type Result<T> = std::result::Result<T, WaypointError>;
