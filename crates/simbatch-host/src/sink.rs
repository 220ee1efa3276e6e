use std::fs::File;
use std::io::{self, LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Push-based consumer of decoded output lines.
///
/// Process supervision calls [`LineSink::append_line`] once per line (without
/// its terminator) as soon as the line is read, then [`LineSink::finish`] once
/// the stream is drained.
pub trait LineSink {
    fn append_line(&mut self, line: &str) -> io::Result<()>;

    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Appends lines to a file, flushing at every newline so partial output
/// survives a crash of either side.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    writer: LineWriter<File>,
}

impl FileSink {
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self {
            path,
            writer: LineWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LineSink for FileSink {
    fn append_line(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")
    }

    fn finish(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }
}

/// In-memory capture, cloneable so a test can keep a handle on the lines.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
    finished: Arc<Mutex<bool>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|lines| lines.clone()).unwrap_or_default()
    }

    pub fn is_finished(&self) -> bool {
        self.finished.lock().map(|flag| *flag).unwrap_or(false)
    }
}

impl LineSink for MemorySink {
    fn append_line(&mut self, line: &str) -> io::Result<()> {
        let mut lines = self
            .lines
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory sink poisoned"))?;
        lines.push(line.to_string());
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        if let Ok(mut flag) = self.finished.lock() {
            *flag = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_sink_writes_each_line_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stdout.txt");
        let mut sink = FileSink::create(&path).unwrap();
        sink.append_line("first").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\n");
        sink.append_line("second").unwrap();
        sink.finish().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn memory_sink_shares_lines_between_clones() {
        let handle = MemorySink::new();
        let mut sink = handle.clone();
        sink.append_line("a").unwrap();
        sink.finish().unwrap();
        assert_eq!(handle.lines(), vec!["a".to_string()]);
        assert!(handle.is_finished());
    }
}
