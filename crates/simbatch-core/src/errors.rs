//! Structured error types shared across simbatch crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`BatchError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (paths, indices, names).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

/// Canonical error type for campaign planning and execution.
///
/// Schema errors (`AxisNameConflict`, `InvalidAxis`, `DuplicateInput`,
/// `UnknownInput`) are raised synchronously at declaration time. Execution
/// errors (`ConfigMissing`, `ProcessFailed`) are scoped to a single run and are
/// collected by the campaign instead of aborting sibling runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", content = "detail")]
pub enum BatchError {
    /// An axis with the same name was already declared.
    #[error("axis name conflict: {0}")]
    AxisNameConflict(ErrorInfo),
    /// An axis was declared without candidate values.
    #[error("invalid axis: {0}")]
    InvalidAxis(ErrorInfo),
    /// An experiment input with the same name was already declared.
    #[error("duplicate input: {0}")]
    DuplicateInput(ErrorInfo),
    /// An experiment input was read or written without being declared.
    #[error("unknown input: {0}")]
    UnknownInput(ErrorInfo),
    /// A sandbox was asked to run without a main configuration artifact.
    #[error("config missing: {0}")]
    ConfigMissing(ErrorInfo),
    /// A sandbox directory already exists at the requested path.
    #[error("sandbox path collision: {0}")]
    SandboxPathCollision(ErrorInfo),
    /// The external job exited with a nonzero status.
    #[error("process failed with exit code {}: {info}", display_code(.code))]
    ProcessFailed {
        /// Exit code reported by the OS, `None` when terminated by a signal.
        code: Option<i32>,
        /// Diagnostic payload.
        info: ErrorInfo,
    },
    /// The external job exceeded its deadline. Reserved; never produced yet.
    #[error("timeout: {0}")]
    Timeout(ErrorInfo),
    /// A host path could not be expressed in the job's addressable root.
    #[error("path translation error: {0}")]
    PathTranslation(ErrorInfo),
    /// Filesystem or process I/O errors.
    #[error("io error: {0}")]
    Io(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
    /// Invalid campaign plan.
    #[error("plan error: {0}")]
    Plan(ErrorInfo),
    /// One or more runs of a campaign failed.
    #[error("campaign failed: {0}")]
    Campaign(FailureReport),
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "<signal>".to_string(),
    }
}

impl BatchError {
    /// Returns a reference to the payload describing the error.
    ///
    /// Aggregate campaign failures expose the payload of their summary.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            BatchError::AxisNameConflict(info)
            | BatchError::InvalidAxis(info)
            | BatchError::DuplicateInput(info)
            | BatchError::UnknownInput(info)
            | BatchError::ConfigMissing(info)
            | BatchError::SandboxPathCollision(info)
            | BatchError::Timeout(info)
            | BatchError::PathTranslation(info)
            | BatchError::Io(info)
            | BatchError::Serde(info)
            | BatchError::Plan(info) => info,
            BatchError::ProcessFailed { info, .. } => info,
            BatchError::Campaign(report) => &report.summary,
        }
    }

    /// Builds an I/O error from any displayable source.
    pub fn io(code: &str, err: impl ToString) -> Self {
        BatchError::Io(ErrorInfo::new(code, err.to_string()))
    }

    /// Builds a serialization error from any displayable source.
    pub fn serde(code: &str, err: impl ToString) -> Self {
        BatchError::Serde(ErrorInfo::new(code, err.to_string()))
    }

    /// Exit code carried by a [`BatchError::ProcessFailed`] error.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            BatchError::ProcessFailed { code, .. } => *code,
            _ => None,
        }
    }
}

/// One failed run inside a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    /// Position of the run in enumeration order.
    pub index: usize,
    /// Sandbox root of the failed run.
    pub sandbox: String,
    /// Error raised by the run.
    pub error: BatchError,
}

/// Aggregate report naming every failed run index and its cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    /// Summary payload (counts and campaign root).
    pub summary: ErrorInfo,
    /// Failures sorted by run index.
    pub failures: Vec<RunFailure>,
}

impl FailureReport {
    /// Builds a report from the collected failures out of `total` runs.
    pub fn new(root: &str, total: usize, mut failures: Vec<RunFailure>) -> Self {
        failures.sort_by_key(|failure| failure.index);
        let indices = failures
            .iter()
            .map(|failure| failure.index.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let summary = ErrorInfo::new(
            "campaign.runs_failed",
            format!("{} of {} runs failed", failures.len(), total),
        )
        .with_context("root", root)
        .with_context("indices", indices);
        Self { summary, failures }
    }

    /// Indices of the failed runs in ascending order.
    pub fn indices(&self) -> Vec<usize> {
        self.failures.iter().map(|failure| failure.index).collect()
    }
}

impl Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary)?;
        for failure in &self.failures {
            write!(f, "\n  run {} ({}): {}", failure.index, failure.sandbox, failure.error)?;
        }
        Ok(())
    }
}
