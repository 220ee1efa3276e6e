use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use simbatch_core::{to_artifact_bytes, to_normalized_value, BatchError, ErrorInfo};
use tracing::{debug, info, warn};

use crate::launcher::{LaunchRequest, ProcessLauncher};
use crate::process::supervise;
use crate::sink::{FileSink, LineSink};
use crate::translate::PathTranslator;

/// Name of the artifact that must exist before a sandbox may run.
pub const MAIN_CONFIG: &str = "config.json";
/// Directory receiving materialized artifacts.
pub const CONFIG_DIR: &str = "config";
/// Directory receiving the job log and the job's own results.
pub const OUT_DIR: &str = "out";
/// Captured combined output of the external job, under [`OUT_DIR`].
pub const LOG_FILE: &str = "stdout.txt";

/// Collaborators a sandbox needs to start its job.
#[derive(Clone)]
pub struct SandboxRuntime {
    launcher: Arc<dyn ProcessLauncher>,
    translator: Arc<dyn PathTranslator>,
}

impl SandboxRuntime {
    pub fn new(launcher: Arc<dyn ProcessLauncher>, translator: Arc<dyn PathTranslator>) -> Self {
        Self {
            launcher,
            translator,
        }
    }

    pub fn launcher(&self) -> &dyn ProcessLauncher {
        self.launcher.as_ref()
    }

    pub fn translator(&self) -> &dyn PathTranslator {
        self.translator.as_ref()
    }
}

impl fmt::Debug for SandboxRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SandboxRuntime").finish_non_exhaustive()
    }
}

/// One isolated run directory: `{root}/config/` for artifacts and `{root}/out/`
/// for the job log and results.
///
/// The directory is created by [`RunSandbox::create`] and never reused: creation
/// fails if the path exists, and a sandbox runs its job at most once.
#[derive(Debug)]
pub struct RunSandbox {
    root: PathBuf,
    artifacts: BTreeMap<String, Value>,
    runtime: SandboxRuntime,
    started: AtomicBool,
}

impl RunSandbox {
    /// Creates the directory tree at `path`. Missing parents are created; the
    /// sandbox root itself must not exist yet.
    pub fn create(path: impl Into<PathBuf>, runtime: SandboxRuntime) -> Result<Self, BatchError> {
        let root = path.into();
        if let Some(parent) = root.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                BatchError::Io(
                    ErrorInfo::new("sandbox.parent_dir", err.to_string())
                        .with_context("path", parent.display().to_string()),
                )
            })?;
        }
        match fs::create_dir(&root) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                return Err(BatchError::SandboxPathCollision(
                    ErrorInfo::new("sandbox.path_collision", "sandbox path already exists")
                        .with_context("path", root.display().to_string())
                        .with_hint("sandbox paths must be unique per run"),
                ));
            }
            Err(err) => {
                return Err(BatchError::Io(
                    ErrorInfo::new("sandbox.root_dir", err.to_string())
                        .with_context("path", root.display().to_string()),
                ));
            }
        }
        for dir in [CONFIG_DIR, OUT_DIR] {
            fs::create_dir(root.join(dir)).map_err(|err| {
                BatchError::Io(
                    ErrorInfo::new("sandbox.sub_dir", err.to_string())
                        .with_context("path", root.join(dir).display().to_string()),
                )
            })?;
        }
        Ok(Self {
            root,
            artifacts: BTreeMap::new(),
            runtime,
            started: AtomicBool::new(false),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_dir(&self) -> PathBuf {
        self.root.join(CONFIG_DIR)
    }

    pub fn out_dir(&self) -> PathBuf {
        self.root.join(OUT_DIR)
    }

    pub fn log_path(&self) -> PathBuf {
        self.out_dir().join(LOG_FILE)
    }

    pub fn main_config_path(&self) -> PathBuf {
        self.config_dir().join(MAIN_CONFIG)
    }

    /// Stores `data` under `name`, replacing any earlier payload of that name.
    pub fn add_artifact<T: Serialize + ?Sized>(
        &mut self,
        name: &str,
        data: &T,
    ) -> Result<(), BatchError> {
        validate_artifact_name(name)?;
        let value = to_normalized_value(data)?;
        if self.artifacts.insert(name.to_string(), value).is_some() {
            debug!(sandbox = %self.root.display(), artifact = name, "artifact replaced");
        }
        Ok(())
    }

    pub fn artifact(&self, name: &str) -> Option<&Value> {
        self.artifacts.get(name)
    }

    pub fn artifact_names(&self) -> impl Iterator<Item = &str> {
        self.artifacts.keys().map(String::as_str)
    }

    /// Writes every stored artifact to its own file under `config/`.
    pub fn materialize(&self) -> Result<Vec<PathBuf>, BatchError> {
        let config_dir = self.config_dir();
        let mut written = Vec::with_capacity(self.artifacts.len());
        for (name, value) in &self.artifacts {
            let path = config_dir.join(name);
            let bytes = to_artifact_bytes(value)?;
            fs::write(&path, bytes).map_err(|err| {
                BatchError::Io(
                    ErrorInfo::new("sandbox.artifact_write", err.to_string())
                        .with_context("path", path.display().to_string()),
                )
            })?;
            written.push(path);
        }
        Ok(written)
    }

    /// Materializes the artifacts, runs the external job and captures its
    /// output into `out/stdout.txt`.
    ///
    /// The log file is flushed and closed before any error is returned.
    pub fn run(&self) -> Result<(), BatchError> {
        self.ensure_runnable()?;
        let log_path = self.log_path();
        let mut sink = FileSink::create(&log_path).map_err(|err| {
            BatchError::Io(
                ErrorInfo::new("sandbox.log_open", err.to_string())
                    .with_context("path", log_path.display().to_string()),
            )
        })?;
        let outcome = self.execute(&mut sink);
        drop(sink);
        outcome
    }

    /// Same as [`RunSandbox::run`] but streams job output into `sink`.
    pub fn run_with_sink(&self, sink: &mut dyn LineSink) -> Result<(), BatchError> {
        self.ensure_runnable()?;
        self.execute(sink)
    }

    fn ensure_runnable(&self) -> Result<(), BatchError> {
        if !self.artifacts.contains_key(MAIN_CONFIG) {
            return Err(BatchError::ConfigMissing(
                ErrorInfo::new("sandbox.config_missing", "no main configuration artifact")
                    .with_context("sandbox", self.root.display().to_string())
                    .with_context("expected", MAIN_CONFIG),
            ));
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(BatchError::SandboxPathCollision(
                ErrorInfo::new("sandbox.reused", "sandbox already ran its job")
                    .with_context("sandbox", self.root.display().to_string()),
            ));
        }
        Ok(())
    }

    fn execute(&self, sink: &mut dyn LineSink) -> Result<(), BatchError> {
        self.materialize()?;
        let config_path = self.runtime.translator().translate(&self.main_config_path())?;
        let request = LaunchRequest {
            config_path: &config_path,
            sandbox_root: &self.root,
        };
        let command = self.runtime.launcher().command(&request)?;
        info!(sandbox = %self.root.display(), config = %config_path, "starting job");
        let supervised = supervise(command, sink);
        let finished = sink.finish().map_err(|err| {
            BatchError::Io(
                ErrorInfo::new("sandbox.log_flush", err.to_string())
                    .with_context("sandbox", self.root.display().to_string()),
            )
        });
        let status = supervised?;
        finished?;
        if status.success() {
            info!(sandbox = %self.root.display(), "job finished");
            return Ok(());
        }
        let code = status.code();
        warn!(sandbox = %self.root.display(), exit_code = ?code, "job failed");
        let mut info = ErrorInfo::new("sandbox.process_failed", "external job exited unsuccessfully")
            .with_context("sandbox", self.root.display().to_string())
            .with_hint(format!("inspect {}", self.log_path().display()));
        if let Some(code) = code {
            info = info.with_context("exit_code", code.to_string());
        }
        Err(BatchError::ProcessFailed { code, info })
    }
}

fn validate_artifact_name(name: &str) -> Result<(), BatchError> {
    let plain = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\');
    if plain {
        Ok(())
    } else {
        Err(BatchError::Serde(
            ErrorInfo::new("sandbox.artifact_name", "artifact name must be a plain file name")
                .with_context("name", name),
        ))
    }
}
