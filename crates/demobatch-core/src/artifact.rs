//! Artifact classification.
//!
//! An artifact's kind is never stored; it is recomputed from the path (and, for
//! tabular exports, from the first line of the file) every time it is needed.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

/// UTF-8 byte-order mark as decoded text.
const BOM: char = '\u{feff}';

/// UTF-8 byte-order mark mis-decoded as Latin-1.
const MOJIBAKE_BOM: &str = "ï»¿";

/// File-naming conventions for replay artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactLayout {
    /// Extension of raw captures (without the dot)
    pub capture_extension: String,

    /// Suffix appended to a raw capture's name by the compression wrapper
    pub compressed_extension: String,

    /// Extension of tabular exports
    pub export_extension: String,

    /// First line identifying a kill-event export
    pub kill_event_header: String,

    /// First line identifying a tick-by-tick export
    pub tick_by_tick_header: String,
}

impl Default for ArtifactLayout {
    fn default() -> Self {
        Self {
            capture_extension: "dem".to_string(),
            compressed_extension: "gz".to_string(),
            export_extension: "csv".to_string(),
            kill_event_header: "[KILL_COLLECTION]".to_string(),
            tick_by_tick_header: "[DEMO_INFO]".to_string(),
        }
    }
}

/// Kind of artifact inferred from a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    RawCapture,
    CompressedCapture,
    TabularExport,
    Unsupported,
}

/// Sub-kind of a tabular export, sniffed from its header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    KillEvent,
    TickByTick,
    Unknown,
}

impl ExportKind {
    /// Whether a successful parse of this export releases extracted captures.
    pub fn sweeps_extracted(self) -> bool {
        matches!(self, ExportKind::TickByTick)
    }
}

impl std::fmt::Display for ExportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportKind::KillEvent => write!(f, "kill-event"),
            ExportKind::TickByTick => write!(f, "tick-by-tick"),
            ExportKind::Unknown => write!(f, "unknown"),
        }
    }
}

impl ArtifactLayout {
    /// Reject layouts that could never match anything.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("capture_extension", &self.capture_extension),
            ("compressed_extension", &self.compressed_extension),
            ("export_extension", &self.export_extension),
        ] {
            let trimmed = value.trim_start_matches('.');
            if trimmed.is_empty() || trimmed.contains(['.', '/', '\\']) {
                return Err(Error::Config(format!("{} must be a plain extension, got {:?}", name, value)));
            }
        }
        if self.kill_event_header.trim() == self.tick_by_tick_header.trim() {
            return Err(Error::Config(
                "kill_event_header and tick_by_tick_header must differ".to_string(),
            ));
        }
        Ok(())
    }

    /// Classify a path by its suffixes.
    pub fn classify(&self, path: &Path) -> ArtifactKind {
        if self.is_compressed_capture(path) {
            ArtifactKind::CompressedCapture
        } else if has_extension(path, &self.capture_extension) {
            ArtifactKind::RawCapture
        } else if has_extension(path, &self.export_extension) {
            ArtifactKind::TabularExport
        } else {
            ArtifactKind::Unsupported
        }
    }

    /// A compressed capture ends in the compression suffix and its stem ends in
    /// the capture suffix (`match.dem.gz`).
    pub fn is_compressed_capture(&self, path: &Path) -> bool {
        has_extension(path, &self.compressed_extension)
            && path
                .file_stem()
                .map(|stem| has_extension(Path::new(stem), &self.capture_extension))
                .unwrap_or(false)
    }

    /// Sibling path a compressed capture decompresses to.
    pub fn extracted_path(&self, compressed: &Path) -> Option<PathBuf> {
        if !self.is_compressed_capture(compressed) {
            return None;
        }
        let stem = compressed.file_stem()?;
        Some(compressed.with_file_name(stem))
    }

    /// Sniff the export kind from the first line of a tabular file.
    ///
    /// Unreadable files are reported as [`ExportKind::Unknown`].
    pub fn classify_export(&self, path: &Path) -> ExportKind {
        match read_header(path) {
            Ok(Some(header)) => {
                debug!("Header of {:?}: {:?}", path, header);
                self.match_header(&header)
            }
            Ok(None) => {
                debug!("{:?} is empty", path);
                ExportKind::Unknown
            }
            Err(e) => {
                debug!("Could not read header of {:?}: {}", path, e);
                ExportKind::Unknown
            }
        }
    }

    /// Compare a raw first line against the configured sentinels.
    pub fn match_header(&self, line: &str) -> ExportKind {
        let header = clean_header(line);
        if header == self.kill_event_header.trim() {
            ExportKind::KillEvent
        } else if header == self.tick_by_tick_header.trim() {
            ExportKind::TickByTick
        } else {
            ExportKind::Unknown
        }
    }
}

/// Case-insensitive check of the last extension of `path`.
fn has_extension(path: &Path, extension: &str) -> bool {
    let wanted = extension.trim_start_matches('.');
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(wanted))
        .unwrap_or(false)
}

fn read_header(path: &Path) -> std::io::Result<Option<String>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut raw = Vec::new();
    if reader.read_until(b'\n', &mut raw)? == 0 {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&raw).into_owned()))
}

fn clean_header(line: &str) -> &str {
    let line = line.trim();
    let line = line.trim_start_matches(BOM);
    let line = line.strip_prefix(MOJIBAKE_BOM).unwrap_or(line);
    line.trim()
}
