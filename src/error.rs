//! Error taxonomy for export runs and the terminal status handed back to the job host.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Everything that can go wrong while exporting a feed.
///
/// The variant decides how the pipeline reacts: configuration problems stop the run before
/// any file is touched, entity problems skip one record, resource problems retire one
/// writer, and runtime problems abort the run after every writer has been closed.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Missing job parameter or site preference, unusable locale-key JSON, no active groups.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A single source record that cannot be turned into output.
    #[error("entity {id}: {reason}")]
    Entity { id: String, reason: String },

    /// Filesystem failure while creating, writing or closing a feed file.
    #[error("I/O error on {}: {source}", .path.display())]
    Resource {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("runtime error: {0:#}")]
    Runtime(#[from] anyhow::Error),
}

impl ExportError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn entity(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Entity { id: id.into(), reason: reason.into() }
    }

    pub fn resource(path: &Path, source: io::Error) -> Self {
        Self::Resource { path: path.to_path_buf(), source }
    }

    #[inline]
    pub fn is_entity(&self) -> bool {
        matches!(self, Self::Entity { .. })
    }

    #[inline]
    pub fn is_resource(&self) -> bool {
        matches!(self, Self::Resource { .. })
    }
}

/// How a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Disabled,
    ConfigurationError,
    RuntimeError,
}

impl Outcome {
    pub fn is_ok(self) -> bool {
        matches!(self, Outcome::Success | Outcome::Disabled)
    }

    /// Status code as the scheduler reports it.
    pub fn code(self) -> &'static str {
        if self.is_ok() { "OK" } else { "ERROR" }
    }
}

/// Counters collected while a run streams its source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub entities_read: u64,
    pub entities_skipped: u64,
    pub records_written: u64,
    pub files: Vec<PathBuf>,
}

/// Terminal status of one job-step invocation.
#[derive(Clone, Debug)]
pub struct RunResult {
    pub outcome: Outcome,
    pub message: String,
    pub stats: RunStats,
}

impl RunResult {
    pub fn success(message: impl Into<String>, stats: RunStats) -> Self {
        Self { outcome: Outcome::Success, message: message.into(), stats }
    }

    pub fn disabled(message: impl Into<String>) -> Self {
        Self { outcome: Outcome::Disabled, message: message.into(), stats: RunStats::default() }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self { outcome: Outcome::ConfigurationError, message: message.into(), stats: RunStats::default() }
    }

    pub fn runtime(message: impl Into<String>, stats: RunStats) -> Self {
        Self { outcome: Outcome::RuntimeError, message: message.into(), stats }
    }

    /// Map an error that ended the run to its status. `context` prefixes the message.
    pub fn from_error(context: &str, err: &ExportError, stats: RunStats) -> Self {
        match err {
            ExportError::Configuration(msg) => Self::configuration(msg.clone()),
            other => Self::runtime(format!("{context}. Error message: {other}"), stats),
        }
    }

    #[inline]
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.outcome.code(), self.message)
    }
}
