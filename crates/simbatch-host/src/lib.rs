//! Isolated run sandboxes and supervision of the external jobs they launch.

mod launcher;
mod process;
mod sandbox;
mod sink;
mod translate;

pub use launcher::{CommandLauncher, LaunchRequest, MakeLauncher, ProcessLauncher};
pub use process::supervise;
pub use sandbox::{RunSandbox, SandboxRuntime, CONFIG_DIR, LOG_FILE, MAIN_CONFIG, OUT_DIR};
pub use sink::{FileSink, LineSink, MemorySink};
pub use translate::{HostPath, PathTranslator, ProjectRelative};
