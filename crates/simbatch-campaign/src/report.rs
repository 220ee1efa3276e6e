use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use simbatch_core::{from_json_slice, to_canonical_json_bytes, BatchError, ErrorInfo};
use simbatch_exp::ParameterPoint;

use crate::plan::AxisSpec;

/// File name of the report written at the campaign root.
pub const REPORT_FILE: &str = "campaign.json";

/// Outcome of one run as persisted in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Position in enumeration order.
    pub index: usize,
    /// Sandbox root, relative to the campaign root.
    pub sandbox: String,
    /// Parameter values of the run.
    pub point: ParameterPoint,
    /// `succeeded` or `failed`.
    pub status: String,
    /// Error of a failed run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BatchError>,
}

/// Deterministic summary of a campaign execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignReport {
    /// Canonical hash of the swept axes.
    pub space_hash: String,
    /// Local time at which the campaign started (RFC 3339).
    pub created_at: String,
    /// Declared axes in declaration order.
    pub axes: Vec<AxisSpec>,
    /// Runs in enumeration order.
    pub runs: Vec<RunRecord>,
    /// Number of successful runs.
    pub succeeded: usize,
    /// Number of failed runs.
    pub failed: usize,
}

impl CampaignReport {
    /// Writes the report as canonical JSON under `root`.
    pub fn write(&self, root: &Path) -> Result<(), BatchError> {
        let bytes = to_canonical_json_bytes(self)?;
        let path = root.join(REPORT_FILE);
        fs::write(&path, bytes).map_err(|err| {
            BatchError::Io(
                ErrorInfo::new("report.write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    /// Loads a report previously written by [`CampaignReport::write`].
    pub fn load(root: &Path) -> Result<Self, BatchError> {
        let path = root.join(REPORT_FILE);
        let bytes = fs::read(&path).map_err(|err| {
            BatchError::Io(
                ErrorInfo::new("report.read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        from_json_slice(&bytes)
    }
}
