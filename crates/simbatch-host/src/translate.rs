use std::path::{Component, Path, PathBuf};

use simbatch_core::{BatchError, ErrorInfo};

/// Maps a host path to the form the external job can address.
pub trait PathTranslator: Send + Sync {
    fn translate(&self, host_path: &Path) -> Result<String, BatchError>;
}

/// Expresses paths relative to a project root that is visible to the job
/// (for example a repository mounted as the container's working directory).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRelative {
    root: PathBuf,
}

impl ProjectRelative {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl PathTranslator for ProjectRelative {
    fn translate(&self, host_path: &Path) -> Result<String, BatchError> {
        let relative = host_path.strip_prefix(&self.root).map_err(|_| {
            BatchError::PathTranslation(
                ErrorInfo::new(
                    "translate.outside_root",
                    "path is not inside the project root",
                )
                .with_context("path", host_path.display().to_string())
                .with_context("root", self.root.display().to_string()),
            )
        })?;
        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                Component::CurDir => {}
                _ => {
                    return Err(BatchError::PathTranslation(
                        ErrorInfo::new("translate.component", "unsupported path component")
                            .with_context("path", host_path.display().to_string()),
                    ))
                }
            }
        }
        Ok(parts.join("/"))
    }
}

/// Passes host paths through unchanged, for jobs running on the host itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostPath;

impl PathTranslator for HostPath {
    fn translate(&self, host_path: &Path) -> Result<String, BatchError> {
        Ok(host_path.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_use_forward_slashes() {
        let translator = ProjectRelative::new("/work/repo");
        let path = Path::new("/work/repo/analysis/out/run/config/config.json");
        assert_eq!(
            translator.translate(path).unwrap(),
            "analysis/out/run/config/config.json"
        );
    }

    #[test]
    fn paths_outside_root_are_rejected() {
        let translator = ProjectRelative::new("/work/repo");
        let err = translator.translate(Path::new("/tmp/config.json")).unwrap_err();
        assert_eq!(err.info().code, "translate.outside_root");
    }

    #[test]
    fn parent_components_are_rejected() {
        let translator = ProjectRelative::new("/work/repo");
        let err = translator
            .translate(Path::new("/work/repo/../etc/passwd"))
            .unwrap_err();
        assert_eq!(err.info().code, "translate.component");
    }
}
