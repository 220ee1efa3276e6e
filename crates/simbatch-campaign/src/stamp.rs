use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;

use chrono::Local;
use simbatch_core::{BatchError, ErrorInfo};
use tracing::debug;

/// Directory name format of campaign roots, sub-second resolution.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%Hh%M-%S.%f";

/// Creates a fresh directory under `parent` named after the current local time.
///
/// The leaf is created with a single `create_dir`, so concurrent callers racing
/// for the same name never share a directory: the loser sees `AlreadyExists`,
/// leaves nothing behind and retries with a new timestamp.
pub fn create_timestamp_dir(parent: &Path) -> Result<PathBuf, BatchError> {
    fs::create_dir_all(parent).map_err(|err| {
        BatchError::Io(
            ErrorInfo::new("stamp.parent_dir", err.to_string())
                .with_context("path", parent.display().to_string()),
        )
    })?;
    loop {
        let name = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let path = parent.join(&name);
        match fs::create_dir(&path) {
            Ok(()) => return Ok(path),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                debug!(path = %path.display(), "campaign root taken, retrying");
                thread::yield_now();
            }
            Err(err) => {
                return Err(BatchError::Io(
                    ErrorInfo::new("stamp.create_dir", err.to_string())
                        .with_context("path", path.display().to_string()),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    #[test]
    fn concurrent_callers_get_distinct_directories() {
        let temp = tempfile::tempdir().unwrap();
        let parent = Arc::new(temp.path().to_path_buf());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let parent = Arc::clone(&parent);
                thread::spawn(move || create_timestamp_dir(&parent).unwrap())
            })
            .collect();
        let dirs: BTreeSet<PathBuf> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(dirs.len(), 16);
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 16);
    }

    #[test]
    fn name_follows_timestamp_format() {
        let temp = tempfile::tempdir().unwrap();
        let dir = create_timestamp_dir(&temp.path().join("nested/out")).unwrap();
        let name = dir.file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(name.len(), "20260101-09h05-07.123456789".len(), "{name}");
        assert_eq!(&name[8..9], "-");
        assert_eq!(&name[11..12], "h");
        assert!(name[18..].chars().all(|c| c.is_ascii_digit()), "{name}");
    }
}
