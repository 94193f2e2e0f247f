//! Run-scoped bookkeeping.
//!
//! Every path the run touches is tracked with one explicit [`ArtifactState`]
//! rather than membership in two parallel sets. The "extracted set" and the
//! "processed set" are views over that map, so they cannot drift apart.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Lifecycle of a tracked path within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactState {
    /// Decompressed by this run, not yet consumed by the parser.
    Extracted,
    /// Decompressed by this run and consumed by the parser.
    ExtractedParsed,
    /// Supplied by the operator and consumed by the parser.
    Parsed,
}

impl ArtifactState {
    pub fn is_extracted(self) -> bool {
        matches!(self, ArtifactState::Extracted | ArtifactState::ExtractedParsed)
    }

    pub fn is_processed(self) -> bool {
        matches!(self, ArtifactState::ExtractedParsed | ArtifactState::Parsed)
    }
}

/// Counters and artifact bookkeeping for a single run.
#[derive(Debug)]
pub struct RunState {
    pub seen: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub invalid_inputs: usize,
    started_at: DateTime<Utc>,
    started: Instant,
    artifacts: BTreeMap<PathBuf, ArtifactState>,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    pub fn new() -> Self {
        Self {
            seen: 0,
            succeeded: 0,
            failed: 0,
            invalid_inputs: 0,
            started_at: Utc::now(),
            started: Instant::now(),
            artifacts: BTreeMap::new(),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Current state of a path, if the run has touched it.
    pub fn state_of(&self, path: &Path) -> Option<ArtifactState> {
        self.artifacts.get(path).copied()
    }

    /// Record that this run decompressed `path`.
    ///
    /// Fresh content has not been parsed yet, so any earlier parse of the
    /// same path no longer counts.
    pub fn mark_extracted(&mut self, path: &Path) {
        self.artifacts
            .insert(path.to_path_buf(), ArtifactState::Extracted);
    }

    /// Record that the parser consumed `path` successfully.
    pub fn mark_parsed(&mut self, path: &Path) {
        let next = match self.state_of(path) {
            Some(state) if state.is_extracted() => ArtifactState::ExtractedParsed,
            _ => ArtifactState::Parsed,
        };
        self.artifacts.insert(path.to_path_buf(), next);
    }

    /// A path may be deleted only if this run created it and the parser
    /// consumed it.
    pub fn is_cleanup_eligible(&self, path: &Path) -> bool {
        self.state_of(path) == Some(ArtifactState::ExtractedParsed)
    }

    /// Drop all bookkeeping for a path that no longer exists on disk.
    pub fn forget(&mut self, path: &Path) -> Option<ArtifactState> {
        self.artifacts.remove(path)
    }

    /// Paths this run decompressed that are still on disk.
    pub fn extracted_paths(&self) -> Vec<PathBuf> {
        self.paths_where(ArtifactState::is_extracted)
    }

    /// Paths the parser consumed successfully during this run.
    pub fn processed_paths(&self) -> Vec<PathBuf> {
        self.paths_where(ArtifactState::is_processed)
    }

    fn paths_where(&self, pred: impl Fn(ArtifactState) -> bool) -> Vec<PathBuf> {
        self.artifacts
            .iter()
            .filter(|(_, state)| pred(**state))
            .map(|(path, _)| path.clone())
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.invalid_inputs > 0
    }

    /// Snapshot of the run for reporting.
    pub fn summarize(&self) -> RunSummary {
        RunSummary {
            started_at: self.started_at,
            elapsed_secs: self.elapsed().as_secs_f64(),
            processed: self.seen,
            successful: self.succeeded,
            failed: self.failed,
            invalid_inputs: self.invalid_inputs,
            leftover_extracted: self.extracted_paths(),
        }
    }
}

/// Final report of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub invalid_inputs: usize,
    /// Decompressed files that were never cleaned up.
    pub leftover_extracted: Vec<PathBuf>,
}

impl RunSummary {
    /// Elapsed time split into whole minutes and seconds.
    pub fn minutes_seconds(&self) -> (u64, u64) {
        let total = self.elapsed_secs as u64;
        (total / 60, total % 60)
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.invalid_inputs == 0
    }
}
