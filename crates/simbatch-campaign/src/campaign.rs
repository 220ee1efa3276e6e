use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use chrono::Local;
use rayon::prelude::*;
use simbatch_core::{stable_hash_string, BatchError, ErrorInfo, FailureReport, RunFailure};
use simbatch_exp::{ExperimentSpec, ParameterPoint, ParameterSpace};
use simbatch_host::{supervise, FileSink, LineSink, RunSandbox, SandboxRuntime};
use tracing::{info, warn};

use crate::plan::AxisSpec;
use crate::progress::{Progress, ProgressObserver};
use crate::report::{CampaignReport, RunRecord};
use crate::stamp::create_timestamp_dir;

/// Directory holding one sandbox per run, under the campaign root.
pub const RUNS_DIR: &str = "runs";
/// Captured output of the prepare step, under the campaign root.
pub const BUILD_LOG: &str = "build.txt";

fn io_error(code: &str, path: &Path, err: impl ToString) -> BatchError {
    BatchError::Io(ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()))
}

/// Options governing campaign execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignConfig {
    /// Parent directory of every campaign root.
    pub output_root: PathBuf,
    /// Maximum number of concurrently running jobs; host parallelism when unset.
    pub parallelism: Option<usize>,
    /// Run the launcher's prepare step before the first job.
    pub prepare: bool,
}

impl CampaignConfig {
    /// Default options writing below `output_root`.
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            parallelism: None,
            prepare: true,
        }
    }

    /// Overrides the worker pool size.
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = Some(parallelism);
        self
    }

    /// Skips the launcher's prepare step.
    pub fn without_prepare(mut self) -> Self {
        self.prepare = false;
        self
    }

    fn worker_count(&self, jobs: usize) -> usize {
        let requested = self.parallelism.unwrap_or_else(|| {
            thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        });
        requested.max(1).min(jobs.max(1))
    }
}

/// Final state of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// The job exited with status zero.
    Succeeded,
    /// The run failed; siblings were not affected.
    Failed(BatchError),
}

impl RunStatus {
    /// True for [`RunStatus::Failed`].
    pub fn is_failed(&self) -> bool {
        matches!(self, RunStatus::Failed(_))
    }

    /// Error of a failed run.
    pub fn error(&self) -> Option<&BatchError> {
        match self {
            RunStatus::Succeeded => None,
            RunStatus::Failed(err) => Some(err),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed(_) => "failed",
        }
    }
}

/// One sandbox paired with the experiment that built it.
#[derive(Debug)]
pub struct CampaignRun<S> {
    /// Position in enumeration order.
    pub index: usize,
    /// Parameter values applied to the experiment.
    pub point: ParameterPoint,
    /// Sandbox holding the run's artifacts and output.
    pub sandbox: RunSandbox,
    /// Experiment instance configured for this point.
    pub spec: S,
    /// Outcome of the job.
    pub status: RunStatus,
}

/// Every run of a campaign in enumeration order, plus the failure report.
#[derive(Debug)]
pub struct CampaignResult<S> {
    root: PathBuf,
    runs: Vec<CampaignRun<S>>,
    failures: Option<FailureReport>,
    report: CampaignReport,
    report_error: Option<BatchError>,
}

impl<S> CampaignResult<S> {
    /// Campaign root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Runs ordered by index, failed runs included.
    pub fn runs(&self) -> &[CampaignRun<S>] {
        &self.runs
    }

    /// Consumes the result, keeping the runs.
    pub fn into_runs(self) -> Vec<CampaignRun<S>> {
        self.runs
    }

    /// Aggregate report of failed runs, if any.
    pub fn failures(&self) -> Option<&FailureReport> {
        self.failures.as_ref()
    }

    /// True when every run succeeded.
    pub fn is_success(&self) -> bool {
        self.failures.is_none()
    }

    /// Report persisted at the campaign root.
    pub fn report(&self) -> &CampaignReport {
        &self.report
    }

    /// Error raised while persisting the report, if any.
    pub fn report_error(&self) -> Option<&BatchError> {
        self.report_error.as_ref()
    }

    /// Fails with [`BatchError::Campaign`] when any run failed, otherwise
    /// with the report write error if the report could not be persisted.
    pub fn check(&self) -> Result<(), BatchError> {
        if let Some(report) = &self.failures {
            return Err(BatchError::Campaign(report.clone()));
        }
        match &self.report_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// Runs an experiment for every point of a parameter space.
pub struct Campaign {
    config: CampaignConfig,
    runtime: SandboxRuntime,
    observers: Vec<Arc<dyn ProgressObserver>>,
}

impl Campaign {
    /// Creates a campaign launching jobs through `runtime`.
    pub fn new(config: CampaignConfig, runtime: SandboxRuntime) -> Self {
        Self {
            config,
            runtime,
            observers: Vec::new(),
        }
    }

    /// Registers a progress observer.
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Execution options.
    pub fn config(&self) -> &CampaignConfig {
        &self.config
    }

    /// Builds one sandbox per point of `space`, sequentially and before any
    /// job starts, then runs every job on a bounded pool.
    ///
    /// Setup errors abort the campaign. Job failures do not: every run is
    /// carried to completion and the returned runs are in enumeration order,
    /// failed ones flagged. Use [`CampaignResult::check`] to treat any failure
    /// as fatal.
    pub fn run<S, F>(
        &self,
        mut spec_factory: F,
        space: &ParameterSpace,
    ) -> Result<CampaignResult<S>, BatchError>
    where
        S: ExperimentSpec,
        F: FnMut() -> S,
    {
        let total = space.size();
        let created_at = Local::now().to_rfc3339();
        let root = create_timestamp_dir(&self.config.output_root)?;
        let runs_dir = root.join(RUNS_DIR);
        fs::create_dir(&runs_dir).map_err(|err| io_error("campaign.runs_dir", &runs_dir, err))?;
        info!(root = %root.display(), total, "campaign started");

        if self.config.prepare {
            self.prepare(&root)?;
        }

        let width = index_width(total);
        let mut points = Vec::with_capacity(total);
        let mut sandboxes = Vec::with_capacity(total);
        let mut specs = Vec::with_capacity(total);
        for (index, point) in space.enumerate().enumerate() {
            let mut spec = spec_factory();
            for (name, value) in point.iter() {
                spec.set(name, value.clone())?;
            }
            let path = runs_dir.join(format!("{index:0width$}"));
            let mut sandbox = RunSandbox::create(path, self.runtime.clone())?;
            spec.build(&mut sandbox)?;
            points.push(point);
            sandboxes.push(sandbox);
            specs.push(spec);
        }

        let progress = Progress::new(total, self.observers.clone());
        let outcomes = self.execute(&sandboxes, &progress)?;

        let mut runs = Vec::with_capacity(total);
        let mut failures = Vec::new();
        let mut records = Vec::with_capacity(total);
        let parts = points.into_iter().zip(sandboxes).zip(specs).zip(outcomes);
        for (index, (((point, sandbox), spec), outcome)) in parts.enumerate() {
            let relative = sandbox
                .root()
                .strip_prefix(&root)
                .unwrap_or(sandbox.root())
                .to_string_lossy()
                .into_owned();
            let status = match outcome {
                Ok(()) => RunStatus::Succeeded,
                Err(err) => {
                    failures.push(RunFailure {
                        index,
                        sandbox: relative.clone(),
                        error: err.clone(),
                    });
                    RunStatus::Failed(err)
                }
            };
            records.push(RunRecord {
                index,
                sandbox: relative,
                point: point.clone(),
                status: status.label().to_string(),
                error: status.error().cloned(),
            });
            runs.push(CampaignRun {
                index,
                point,
                sandbox,
                spec,
                status,
            });
        }

        let failed = failures.len();
        let axes: Vec<AxisSpec> = space.axes().iter().map(AxisSpec::from).collect();
        let report = CampaignReport {
            space_hash: stable_hash_string(&axes)?,
            created_at,
            axes,
            runs: records,
            succeeded: total - failed,
            failed,
        };
        // Every job has finished; a failed write must not discard the runs.
        let report_error = report.write(&root).err();
        if let Some(err) = &report_error {
            warn!(root = %root.display(), error = %err, "campaign report not written");
        }

        let failures = if failures.is_empty() {
            info!(root = %root.display(), total, "campaign finished");
            None
        } else {
            let summary = FailureReport::new(&root.display().to_string(), total, failures);
            warn!(
                root = %root.display(),
                failed,
                indices = ?summary.indices(),
                "campaign finished with failures"
            );
            Some(summary)
        };

        Ok(CampaignResult {
            root,
            runs,
            failures,
            report,
            report_error,
        })
    }

    fn execute(
        &self,
        sandboxes: &[RunSandbox],
        progress: &Progress,
    ) -> Result<Vec<Result<(), BatchError>>, BatchError> {
        let workers = self.config.worker_count(sandboxes.len());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|idx| format!("simbatch-worker-{idx}"))
            .build()
            .map_err(|err| BatchError::Io(ErrorInfo::new("campaign.thread_pool", err.to_string())))?;

        let mut outcomes: Vec<(usize, Result<(), BatchError>)> = pool.install(|| {
            sandboxes
                .par_iter()
                .enumerate()
                .map(|(index, sandbox)| {
                    let outcome = sandbox.run();
                    if let Err(err) = &outcome {
                        warn!(index, error = %err, "run failed");
                    }
                    progress.advance();
                    (index, outcome)
                })
                .collect()
        });

        // Completion order is arbitrary; results are keyed by enumeration index.
        outcomes.sort_by_key(|(index, _)| *index);
        Ok(outcomes.into_iter().map(|(_, outcome)| outcome).collect())
    }

    fn prepare(&self, root: &Path) -> Result<(), BatchError> {
        let Some(command) = self.runtime.launcher().prepare_command() else {
            return Ok(());
        };
        let log_path = root.join(BUILD_LOG);
        let mut sink =
            FileSink::create(&log_path).map_err(|err| io_error("campaign.build_log", &log_path, err))?;
        info!(log = %log_path.display(), "preparing external job");
        let status = supervise(command, &mut sink)?;
        sink.finish()
            .map_err(|err| io_error("campaign.build_log", &log_path, err))?;
        if status.success() {
            return Ok(());
        }
        let code = status.code();
        warn!(exit_code = ?code, "prepare step failed");
        Err(BatchError::ProcessFailed {
            code,
            info: ErrorInfo::new("campaign.prepare_failed", "prepare step exited unsuccessfully")
                .with_context("log", log_path.display().to_string()),
        })
    }
}

/// Digits needed to print the largest run index.
fn index_width(total: usize) -> usize {
    total.saturating_sub(1).to_string().len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_counts_digits_of_last_index() {
        assert_eq!(index_width(0), 1);
        assert_eq!(index_width(1), 1);
        assert_eq!(index_width(10), 1);
        assert_eq!(index_width(11), 2);
        assert_eq!(index_width(100), 2);
        assert_eq!(index_width(101), 3);
    }

    #[test]
    fn worker_count_is_bounded_by_jobs() {
        let config = CampaignConfig::new("out").with_parallelism(8);
        assert_eq!(config.worker_count(3), 3);
        assert_eq!(config.worker_count(0), 1);
        let config = CampaignConfig::new("out").with_parallelism(0);
        assert_eq!(config.worker_count(5), 1);
        assert!(CampaignConfig::new("out").worker_count(64) >= 1);
    }
}
