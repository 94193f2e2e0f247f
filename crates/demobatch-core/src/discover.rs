//! Recursive discovery of artifacts beneath a directory.

use crate::artifact::{ArtifactKind, ArtifactLayout};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

/// Hidden files and directories are skipped, as shell `**` globs skip them.
fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// Enumerate the artifacts beneath `dir` in processing order.
///
/// Raw captures come first, then compressed captures, then tabular exports.
/// Within each group paths keep walk order. Nothing is deduplicated.
pub fn enumerate(dir: &Path, layout: &ArtifactLayout) -> Result<Vec<PathBuf>> {
    let mut raw = Vec::new();
    let mut compressed = Vec::new();
    let mut exports = Vec::new();

    let walker = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(Error::Walk {
                    path: dir.to_path_buf(),
                    message: e.to_string(),
                });
            }
            Err(e) => {
                warn!("Skipping unreadable entry under {:?}: {}", dir, e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.into_path();
        match layout.classify(&path) {
            ArtifactKind::RawCapture => raw.push(path),
            ArtifactKind::CompressedCapture => compressed.push(path),
            ArtifactKind::TabularExport => exports.push(path),
            ArtifactKind::Unsupported => {}
        }
    }

    raw.append(&mut compressed);
    raw.append(&mut exports);
    Ok(raw)
}
