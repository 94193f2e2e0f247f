//! External parser invocation.
//!
//! The parser is an opaque executable called as `<parser> <path>`; exit status
//! 0 means the artifact was consumed. Its output is diagnostic text only.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Output captured from a successful parser run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParserOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs the external parser on a single artifact.
///
/// Implementations block until the parser exits.
pub trait ParserRunner {
    /// Hand `path` to the parser. `Ok` only when the parser exited with status 0.
    fn run(&self, path: &Path) -> Result<ParserOutput>;
}

/// Parser backed by a child process.
#[derive(Debug, Clone)]
pub struct ProcessParser {
    executable: PathBuf,
}

impl ProcessParser {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }
}

impl ParserRunner for ProcessParser {
    fn run(&self, path: &Path) -> Result<ParserOutput> {
        debug!("Running {:?} {:?}", self.executable, path);

        let output = Command::new(&self.executable)
            .arg(path)
            .output()
            .map_err(|source| Error::ParserSpawn {
                executable: self.executable.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            return Err(Error::parser_failed(path, output.status.code(), stdout, stderr));
        }

        Ok(ParserOutput { stdout, stderr })
    }
}

/// Resolve a configured parser location to an executable path.
///
/// - absolute paths are used as given
/// - relative paths with a directory component are tried against `base_dir`
///   (normally the directory of the running binary), then the working directory
/// - bare names are looked up on `PATH`
///
/// Returns `None` when nothing matching exists.
pub fn resolve_executable(configured: &Path, base_dir: Option<&Path>) -> Option<PathBuf> {
    if configured.is_absolute() {
        return configured.exists().then(|| configured.to_path_buf());
    }

    if configured.components().count() > 1 {
        if let Some(candidate) = base_dir.map(|dir| dir.join(configured)) {
            if candidate.exists() {
                return Some(candidate);
            }
        }
        return configured.exists().then(|| configured.to_path_buf());
    }

    match which::which(configured) {
        Ok(path) => {
            debug!("Found parser at: {:?}", path);
            Some(path)
        }
        Err(_) => None,
    }
}
