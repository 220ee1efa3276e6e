use std::io::{self, BufRead, BufReader, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;

use simbatch_core::{BatchError, ErrorInfo};
use tracing::{debug, warn};

use crate::sink::LineSink;

fn program_name(command: &Command) -> String {
    command.get_program().to_string_lossy().into_owned()
}

/// Spawns `command`, streams its combined stdout/stderr into `sink` line by
/// line and blocks until the process exits.
///
/// Both pipes are always drained to the end, even when the sink reports an
/// error, so the child can never stall on a full pipe. The first sink error is
/// returned after the process has exited.
pub fn supervise(mut command: Command, sink: &mut dyn LineSink) -> Result<ExitStatus, BatchError> {
    let program = program_name(&command);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = command.spawn().map_err(|err| {
        BatchError::Io(
            ErrorInfo::new("process.spawn", err.to_string()).with_context("program", program.clone()),
        )
    })?;
    debug!(program = %program, pid = child.id(), "spawned external job");

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let (sender, receiver) = mpsc::channel::<String>();

    let sink_result = thread::scope(|scope| {
        if let Some(pipe) = stdout {
            let sender = sender.clone();
            scope.spawn(move || forward_lines(pipe, sender));
        }
        if let Some(pipe) = stderr {
            let sender = sender.clone();
            scope.spawn(move || forward_lines(pipe, sender));
        }
        drop(sender);

        let mut first_error: Option<io::Error> = None;
        for line in receiver {
            if first_error.is_some() {
                continue;
            }
            if let Err(err) = sink.append_line(&line) {
                warn!(program = %program, error = %err, "log sink rejected output line");
                first_error = Some(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    });

    let status = child.wait().map_err(|err| {
        BatchError::Io(
            ErrorInfo::new("process.wait", err.to_string()).with_context("program", program.clone()),
        )
    })?;
    sink_result.map_err(|err| {
        BatchError::Io(ErrorInfo::new("process.log_write", err.to_string()).with_context("program", program))
    })?;
    Ok(status)
}

fn forward_lines<R: Read>(pipe: R, sender: mpsc::Sender<String>) {
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                if buf.ends_with(b"\n") {
                    buf.pop();
                    if buf.ends_with(b"\r") {
                        buf.pop();
                    }
                }
                let line = String::from_utf8_lossy(&buf).into_owned();
                if sender.send(line).is_err() {
                    break;
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                warn!(error = %err, "failed to read job output");
                break;
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    fn shell(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        command
    }

    #[test]
    fn captures_stdout_and_stderr_lines() {
        let handle = MemorySink::new();
        let mut sink = handle.clone();
        let status = supervise(shell("echo out; echo err 1>&2; printf tail"), &mut sink).unwrap();
        assert!(status.success());
        let mut lines = handle.lines();
        lines.sort();
        assert_eq!(lines, vec!["err", "out", "tail"]);
    }

    #[test]
    fn reports_nonzero_exit_status() {
        let mut sink = MemorySink::new();
        let status = supervise(shell("echo before; exit 7"), &mut sink).unwrap();
        assert_eq!(status.code(), Some(7));
        assert_eq!(sink.lines(), vec!["before"]);
    }

    #[test]
    fn missing_program_is_an_io_error() {
        let mut sink = MemorySink::new();
        let err = supervise(Command::new("/nonexistent/simbatch-job"), &mut sink).unwrap_err();
        assert_eq!(err.info().code, "process.spawn");
    }

    #[test]
    fn output_order_within_one_stream_is_preserved() {
        let mut sink = MemorySink::new();
        supervise(shell("for i in 1 2 3 4 5; do echo line$i; done"), &mut sink).unwrap();
        assert_eq!(sink.lines(), vec!["line1", "line2", "line3", "line4", "line5"]);
    }
}
