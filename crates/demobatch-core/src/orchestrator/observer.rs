//! Progress reporting hooks for a dispatch run.

use crate::artifact::{ArtifactKind, ExportKind};
use crate::error::Error;
use crate::state::RunState;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Outcome of processing a single artifact.
#[derive(Debug)]
pub struct FileReport {
    /// Path as supplied or discovered (the compressed path for compressed captures).
    pub path: PathBuf,
    pub kind: ArtifactKind,
    /// Sub-kind, for tabular exports only.
    pub export_kind: Option<ExportKind>,
    /// Decompressed sibling, for compressed captures that extracted.
    pub extracted: Option<PathBuf>,
    /// Extracted captures deleted while handling this artifact.
    pub cleaned: Vec<PathBuf>,
    pub elapsed: Duration,
    pub error: Option<Error>,
}

impl FileReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Receives progress events from the orchestrator.
///
/// Every method has a no-op default so observers only implement what they show.
pub trait RunObserver {
    /// A directory input was enumerated.
    fn directory_listed(&mut self, _dir: &Path, _files: &[PathBuf]) {}

    /// An artifact finished processing. Counters in `state` already include it.
    fn file_finished(&mut self, _report: &FileReport, _state: &RunState) {}

    /// An input was neither a file nor a directory.
    fn invalid_input(&mut self, _path: &Path) {}

    /// Processing `input` failed outright; no further inputs will be processed.
    fn run_aborted(&mut self, _input: &Path, _error: &Error) {}
}

/// Observer that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentObserver;

impl RunObserver for SilentObserver {}
