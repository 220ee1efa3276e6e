use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use simbatch_core::{BatchError, ErrorInfo};
use simbatch_exp::{Axis, ParameterSpace};
use simbatch_host::{
    CommandLauncher, HostPath, MakeLauncher, PathTranslator, ProcessLauncher, ProjectRelative,
    SandboxRuntime,
};

use crate::campaign::CampaignConfig;

fn io_error(code: &str, path: &Path, err: impl ToString) -> BatchError {
    BatchError::Io(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

fn default_prepare() -> bool {
    true
}

fn default_target() -> String {
    "run".to_string()
}

fn default_config_key() -> String {
    "app_config".to_string()
}

/// Axis declaration as written in a plan or report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisSpec {
    /// Axis name; must match a declared input.
    pub name: String,
    /// Candidate values in sweep order.
    pub values: Vec<Value>,
}

impl From<&Axis> for AxisSpec {
    fn from(axis: &Axis) -> Self {
        Self {
            name: axis.name().to_string(),
            values: axis.values().to_vec(),
        }
    }
}

/// Experiment input declared by a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSpec {
    /// Input name.
    pub name: String,
    /// Human readable description.
    #[serde(default)]
    pub description: String,
    /// Value used when no axis sets the input.
    #[serde(default)]
    pub default: Value,
    /// Main configuration key receiving the input value, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_key: Option<String>,
}

/// How the external job is started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum LauncherSpec {
    /// `make -C <project_root> <target> <config_key>=<config> <extra_args...>`.
    Make {
        /// Project root visible to the job; config paths are made relative to it.
        project_root: PathBuf,
        /// Target running one job.
        #[serde(default = "default_target")]
        target: String,
        /// Variable receiving the main configuration path.
        #[serde(default = "default_config_key")]
        config_key: String,
        /// Extra arguments appended to every invocation.
        #[serde(default)]
        extra_args: Vec<String>,
        /// Target run once before the campaign, e.g. `build`.
        #[serde(default)]
        build_target: Option<String>,
    },
    /// `<program> <args...> <config_key>=<config>`.
    Command {
        /// Program to execute.
        program: String,
        /// Leading arguments.
        #[serde(default)]
        args: Vec<String>,
        /// Key receiving the main configuration path.
        #[serde(default = "default_config_key")]
        config_key: String,
        /// Working directory; config paths are made relative to it when set.
        #[serde(default)]
        working_dir: Option<PathBuf>,
    },
}

/// YAML campaign description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignPlan {
    /// Parent directory of the timestamped campaign roots.
    pub output_root: PathBuf,
    /// Worker pool size; host parallelism when omitted.
    #[serde(default)]
    pub parallelism: Option<usize>,
    /// Whether the launcher's prepare step runs first.
    #[serde(default = "default_prepare")]
    pub prepare: bool,
    /// Launcher configuration.
    pub launcher: LauncherSpec,
    /// JSON object merged into every main configuration.
    #[serde(default)]
    pub base_config: Option<PathBuf>,
    /// JSON topology copied into every run.
    #[serde(default)]
    pub topology: Option<PathBuf>,
    /// JSON flow list copied into every run.
    #[serde(default)]
    pub flows: Option<PathBuf>,
    /// Add `topology_file` / `flow_file` references to the main configuration.
    #[serde(default)]
    pub link_companions: bool,
    /// Declared experiment inputs.
    #[serde(default)]
    pub inputs: Vec<InputSpec>,
    /// Swept axes, first declared outermost.
    #[serde(default)]
    pub axes: Vec<AxisSpec>,
    /// Directory the plan was loaded from (ignored when serializing).
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl CampaignPlan {
    /// Parses a plan from YAML text; relative paths resolve against `base_dir`.
    pub fn from_yaml_str(text: &str, base_dir: impl Into<PathBuf>) -> Result<Self, BatchError> {
        let mut plan: CampaignPlan = serde_yaml::from_str(text)
            .map_err(|err| BatchError::Plan(ErrorInfo::new("plan.yaml", err.to_string())))?;
        plan.base_dir = base_dir.into();
        plan.validate()?;
        Ok(plan)
    }

    /// Checks that every axis drives a declared input.
    pub fn validate(&self) -> Result<(), BatchError> {
        for (idx, input) in self.inputs.iter().enumerate() {
            if self.inputs[..idx].iter().any(|other| other.name == input.name) {
                return Err(BatchError::DuplicateInput(
                    ErrorInfo::new("plan.duplicate_input", "input declared twice")
                        .with_context("name", input.name.clone()),
                ));
            }
        }
        for axis in &self.axes {
            if !self.inputs.iter().any(|input| input.name == axis.name) {
                return Err(BatchError::UnknownInput(
                    ErrorInfo::new("plan.axis_input", "axis does not match a declared input")
                        .with_context("name", axis.name.clone()),
                ));
            }
        }
        Ok(())
    }

    /// Resolves `path` against the plan directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Parameter space declared by the plan.
    pub fn parameter_space(&self) -> Result<ParameterSpace, BatchError> {
        let mut space = ParameterSpace::new();
        for axis in &self.axes {
            space.add_axis(axis.name.clone(), axis.values.iter().cloned())?;
        }
        Ok(space)
    }

    /// Campaign options; creates the output root so it can be canonicalized.
    pub fn campaign_config(&self) -> Result<CampaignConfig, BatchError> {
        let output_root = self.resolve(&self.output_root);
        fs::create_dir_all(&output_root)
            .map_err(|err| io_error("plan.output_root", &output_root, err))?;
        let output_root = fs::canonicalize(&output_root)
            .map_err(|err| io_error("plan.output_root", &output_root, err))?;
        Ok(CampaignConfig {
            output_root,
            parallelism: self.parallelism,
            prepare: self.prepare,
        })
    }

    /// Launcher and path translator described by the plan.
    pub fn runtime(&self) -> Result<SandboxRuntime, BatchError> {
        let (launcher, translator): (Arc<dyn ProcessLauncher>, Arc<dyn PathTranslator>) =
            match &self.launcher {
                LauncherSpec::Make {
                    project_root,
                    target,
                    config_key,
                    extra_args,
                    build_target,
                } => {
                    let root = self.canonical_dir(project_root)?;
                    let launcher = MakeLauncher {
                        target: target.clone(),
                        config_key: config_key.clone(),
                        extra_args: extra_args.clone(),
                        build_target: build_target.clone(),
                        ..MakeLauncher::new(root.clone())
                    };
                    (Arc::new(launcher), Arc::new(ProjectRelative::new(root)))
                }
                LauncherSpec::Command {
                    program,
                    args,
                    config_key,
                    working_dir,
                } => {
                    let launcher = CommandLauncher {
                        args: args.clone(),
                        ..CommandLauncher::new(program.clone()).config_key(config_key.clone())
                    };
                    match working_dir {
                        Some(dir) => {
                            let dir = self.canonical_dir(dir)?;
                            let launcher = launcher.working_dir(dir.clone());
                            (Arc::new(launcher), Arc::new(ProjectRelative::new(dir)))
                        }
                        None => (Arc::new(launcher), Arc::new(HostPath)),
                    }
                }
            };
        Ok(SandboxRuntime::new(launcher, translator))
    }

    /// Reads a JSON file referenced by the plan.
    pub fn read_json(&self, path: &Path) -> Result<Value, BatchError> {
        let resolved = self.resolve(path);
        let bytes = fs::read(&resolved).map_err(|err| io_error("plan.read", &resolved, err))?;
        serde_json::from_slice(&bytes).map_err(|err| {
            BatchError::Plan(
                ErrorInfo::new("plan.json", err.to_string())
                    .with_context("path", resolved.display().to_string()),
            )
        })
    }

    fn canonical_dir(&self, path: &Path) -> Result<PathBuf, BatchError> {
        let resolved = self.resolve(path);
        let canonical =
            fs::canonicalize(&resolved).map_err(|err| io_error("plan.dir", &resolved, err))?;
        if !canonical.is_dir() {
            return Err(BatchError::Plan(
                ErrorInfo::new("plan.dir", "expected a directory")
                    .with_context("path", canonical.display().to_string()),
            ));
        }
        Ok(canonical)
    }
}

/// Loads a plan from disk, resolving relative paths against its directory.
pub fn load_plan<P: AsRef<Path>>(path: P) -> Result<CampaignPlan, BatchError> {
    let plan_path = path.as_ref();
    let text = fs::read_to_string(plan_path).map_err(|err| io_error("plan.read", plan_path, err))?;
    let base_dir = plan_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    CampaignPlan::from_yaml_str(&text, base_dir)
}
