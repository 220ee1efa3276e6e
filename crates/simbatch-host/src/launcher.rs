use std::path::{Path, PathBuf};
use std::process::Command;

use simbatch_core::BatchError;

/// Inputs handed to a launcher when a sandbox starts its job.
#[derive(Debug, Clone, Copy)]
pub struct LaunchRequest<'a> {
    /// Main configuration path, already translated into the job's root.
    pub config_path: &'a str,
    /// Host path of the sandbox owning the job.
    pub sandbox_root: &'a Path,
}

/// Builds the command that runs the external job.
///
/// The sandbox owns spawning, output capture and exit handling; launchers
/// only decide what gets executed.
pub trait ProcessLauncher: Send + Sync {
    fn command(&self, request: &LaunchRequest<'_>) -> Result<Command, BatchError>;

    /// One-off step run before any job of a campaign, such as a build.
    fn prepare_command(&self) -> Option<Command> {
        None
    }
}

/// Runs a build-tool target: `make -C <project_root> <target> <key>=<config> <extra...>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MakeLauncher {
    pub program: String,
    pub project_root: PathBuf,
    pub target: String,
    pub config_key: String,
    pub extra_args: Vec<String>,
    pub build_target: Option<String>,
}

impl MakeLauncher {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            program: "make".to_string(),
            project_root: project_root.into(),
            target: "run".to_string(),
            config_key: "app_config".to_string(),
            extra_args: Vec::new(),
            build_target: None,
        }
    }

    pub fn with_build_target(mut self, target: impl Into<String>) -> Self {
        self.build_target = Some(target.into());
        self
    }

    pub fn with_extra_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    fn base_command(&self, target: &str) -> Command {
        let mut command = Command::new(&self.program);
        command.arg("-C").arg(&self.project_root).arg(target);
        command
    }
}

impl ProcessLauncher for MakeLauncher {
    fn command(&self, request: &LaunchRequest<'_>) -> Result<Command, BatchError> {
        let mut command = self.base_command(&self.target);
        command
            .arg(format!("{}={}", self.config_key, request.config_path))
            .args(&self.extra_args);
        Ok(command)
    }

    fn prepare_command(&self) -> Option<Command> {
        self.build_target.as_ref().map(|target| {
            let mut command = self.base_command(target);
            command.args(&self.extra_args);
            command
        })
    }
}

/// Runs an arbitrary program: `<program> <args...> <key>=<config>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLauncher {
    pub program: String,
    pub args: Vec<String>,
    pub config_key: String,
    pub working_dir: Option<PathBuf>,
}

impl CommandLauncher {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            config_key: "app_config".to_string(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn config_key(mut self, key: impl Into<String>) -> Self {
        self.config_key = key.into();
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

impl ProcessLauncher for CommandLauncher {
    fn command(&self, request: &LaunchRequest<'_>) -> Result<Command, BatchError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(format!("{}={}", self.config_key, request.config_path));
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(command: &Command) -> Vec<String> {
        std::iter::once(command.get_program())
            .chain(command.get_args())
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn make_launcher_passes_single_key_value_argument() {
        let launcher = MakeLauncher::new("/repo").with_extra_arg("docker_interactive=");
        let request = LaunchRequest {
            config_path: "out/1/config/config.json",
            sandbox_root: Path::new("/repo/out/1"),
        };
        let command = launcher.command(&request).unwrap();
        assert_eq!(
            argv(&command),
            vec![
                "make",
                "-C",
                "/repo",
                "run",
                "app_config=out/1/config/config.json",
                "docker_interactive="
            ]
        );
        assert!(launcher.prepare_command().is_none());
    }

    #[test]
    fn make_launcher_prepare_uses_build_target() {
        let launcher = MakeLauncher::new("/repo").with_build_target("build");
        let command = launcher.prepare_command().expect("prepare");
        assert_eq!(argv(&command), vec!["make", "-C", "/repo", "build"]);
    }

    #[test]
    fn command_launcher_appends_config_argument() {
        let launcher = CommandLauncher::new("sh")
            .arg("job.sh")
            .config_key("cfg")
            .working_dir("/repo");
        let request = LaunchRequest {
            config_path: "config/config.json",
            sandbox_root: Path::new("/repo"),
        };
        let command = launcher.command(&request).unwrap();
        assert_eq!(argv(&command), vec!["sh", "job.sh", "cfg=config/config.json"]);
        assert_eq!(command.get_current_dir(), Some(Path::new("/repo")));
    }
}
