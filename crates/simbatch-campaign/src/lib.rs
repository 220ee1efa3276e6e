#![deny(missing_docs)]
#![doc = "Campaign driver: enumerate a parameter space, build one sandbox per point and run every job under a bounded pool."]

/// Campaign execution and ordered result assembly.
pub mod campaign;
/// Plan-driven experiment built from a YAML campaign plan.
pub mod experiment;
/// YAML campaign plans.
pub mod plan;
/// Shared completion counter and observers.
pub mod progress;
/// Campaign report persisted next to the runs.
pub mod report;
/// Collision-free timestamped campaign roots.
pub mod stamp;

pub use campaign::{Campaign, CampaignConfig, CampaignResult, CampaignRun, RunStatus};
pub use experiment::PlanExperiment;
pub use plan::{load_plan, AxisSpec, CampaignPlan, InputSpec, LauncherSpec};
pub use progress::{LogProgress, Progress, ProgressObserver};
pub use report::{CampaignReport, RunRecord, REPORT_FILE};
pub use stamp::{create_timestamp_dir, TIMESTAMP_FORMAT};
