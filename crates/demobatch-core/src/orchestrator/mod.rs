//! Sequential dispatch of replay artifacts to the external parser.
//!
//! One artifact is handled start to finish (decompress, parse, clean up)
//! before the next begins. Per-artifact failures are counted and reported,
//! never propagated; only a directory that cannot be walked at all escapes
//! [`Orchestrator::process_input`].
//!
//! ## Artifact lifecycle
//!
//! ```text
//! Discovered ─┬─ unsupported ───────────────────────────────→ Failed
//!             ├─ compressed ─→ Extracting ─┬─ error ─────────→ Failed
//!             │                            └─ Extracted ─→ Parsing ─┬─ ok ───→ Parsed
//!             │                                                     └─ error ─→ Failed (+ discard)
//!             ├─ raw ────────→ Parsing ─┬─ ok ───→ Parsed
//!             │                         └─ error ─→ Failed
//!             └─ export ─────→ Parsing ─┬─ ok ───→ Parsed (+ sweep if tick-by-tick)
//!                                       └─ error ─→ Failed
//! ```
//!
//! An extracted capture is deleted by a sweep only once it has been parsed;
//! operator-supplied captures are never deleted.

mod observer;

pub use observer::*;

use crate::artifact::{ArtifactKind, ArtifactLayout, ExportKind};
use crate::discover;
use crate::error::{Error, Result};
use crate::extract;
use crate::parser::{ParserOutput, ParserRunner};
use crate::state::{ArtifactState, RunState, RunSummary};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Behaviour switches for a dispatch run.
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    /// Leave a decompressed capture on disk when its parse fails, so it can
    /// be inspected. It is then reported as a leftover.
    pub keep_failed_extractions: bool,
}

/// Drives one run over a set of inputs.
pub struct Orchestrator<P> {
    parser: P,
    layout: ArtifactLayout,
    options: DispatchOptions,
    state: RunState,
}

impl<P: ParserRunner> Orchestrator<P> {
    pub fn new(parser: P, layout: ArtifactLayout) -> Self {
        Self {
            parser,
            layout,
            options: DispatchOptions::default(),
            state: RunState::new(),
        }
    }

    pub fn with_options(mut self, options: DispatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn parser(&self) -> &P {
        &self.parser
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Decompress a compressed capture next to itself.
    ///
    /// The output is registered as extracted only on success.
    pub fn extract(&mut self, compressed: &Path) -> Result<PathBuf> {
        let target = self
            .layout
            .extracted_path(compressed)
            .ok_or_else(|| Error::UnsupportedFile(compressed.to_path_buf()))?;

        debug!("Extracting {:?} to {:?}", compressed, target);
        extract::gunzip(compressed, &target)?;
        self.state.mark_extracted(&target);
        Ok(target)
    }

    /// Delete `raw` if this run extracted it and the parser consumed it.
    ///
    /// Returns whether the file was deleted. Deletion errors are logged and
    /// the path stays tracked.
    pub fn cleanup(&mut self, raw: &Path) -> bool {
        if !self.state.is_cleanup_eligible(raw) {
            debug!("Not cleaning {:?}: not an extracted, parsed capture", raw);
            return false;
        }
        self.remove_tracked(raw)
    }

    /// Handle an extracted capture whose parse just failed.
    ///
    /// Deletes it unless `keep_failed_extractions` is set. Returns whether the
    /// file was deleted.
    pub fn discard_failed(&mut self, raw: &Path) -> bool {
        if !self.state.state_of(raw).is_some_and(ArtifactState::is_extracted) {
            return false;
        }
        if self.options.keep_failed_extractions {
            info!("Keeping {:?} for inspection after failed parse", raw);
            return false;
        }
        self.remove_tracked(raw)
    }

    fn remove_tracked(&mut self, raw: &Path) -> bool {
        match fs::remove_file(raw) {
            Ok(()) => {
                self.state.forget(raw);
                debug!("Cleaned up extracted capture: {:?}", raw);
                true
            }
            Err(source) => {
                let err = Error::Cleanup {
                    path: raw.to_path_buf(),
                    source,
                };
                warn!("{}", err);
                false
            }
        }
    }

    /// Run the parser on `path`, recording it as processed on success.
    pub fn invoke_parser(&mut self, path: &Path) -> Result<ParserOutput> {
        debug!("Parsing {:?}", path);
        let output = self.parser.run(path)?;
        if !output.stdout.trim().is_empty() {
            debug!("Parser output for {:?}:\n{}", path, output.stdout.trim_end());
        }
        self.state.mark_parsed(path);
        Ok(output)
    }

    /// Clean up every currently extracted capture that is eligible.
    pub fn sweep(&mut self) -> Vec<PathBuf> {
        self.state
            .extracted_paths()
            .into_iter()
            .filter(|path| self.cleanup(path))
            .collect()
    }

    pub fn classify_export(&self, path: &Path) -> ExportKind {
        self.layout.classify_export(path)
    }

    /// Process a single artifact and update the counters.
    pub fn process_one(&mut self, path: &Path, observer: &mut dyn RunObserver) -> bool {
        self.state.seen += 1;
        let started = Instant::now();

        let kind = self.layout.classify(path);
        let mut report = FileReport {
            path: path.to_path_buf(),
            kind,
            export_kind: None,
            extracted: None,
            cleaned: Vec::new(),
            elapsed: Duration::ZERO,
            error: None,
        };

        let result = match kind {
            ArtifactKind::CompressedCapture => self.process_compressed(path, &mut report),
            ArtifactKind::RawCapture => self.invoke_parser(path).map(|_| ()),
            ArtifactKind::TabularExport => self.process_export(path, &mut report),
            ArtifactKind::Unsupported => Err(Error::UnsupportedFile(path.to_path_buf())),
        };

        match result {
            Ok(()) => self.state.succeeded += 1,
            Err(e) => {
                self.state.failed += 1;
                debug!("{}", e);
                report.error = Some(e);
            }
        }
        report.elapsed = started.elapsed();

        observer.file_finished(&report, &self.state);
        report.succeeded()
    }

    fn process_compressed(&mut self, path: &Path, report: &mut FileReport) -> Result<()> {
        let extracted = self.extract(path)?;
        report.extracted = Some(extracted.clone());

        if let Err(e) = self.invoke_parser(&extracted) {
            if self.discard_failed(&extracted) {
                report.cleaned.push(extracted);
            }
            return Err(e);
        }
        Ok(())
    }

    fn process_export(&mut self, path: &Path, report: &mut FileReport) -> Result<()> {
        let export_kind = self.classify_export(path);
        report.export_kind = Some(export_kind);

        match export_kind {
            ExportKind::TickByTick => {
                debug!("{:?} is a tick-by-tick export; extracted captures are cleaned up after it", path)
            }
            ExportKind::KillEvent => {
                debug!("{:?} is a kill-event export; extracted captures are kept", path)
            }
            ExportKind::Unknown => {
                debug!("{:?} has an unrecognized header; extracted captures are kept", path)
            }
        }

        self.invoke_parser(path)?;

        if export_kind.sweeps_extracted() {
            report.cleaned.extend(self.sweep());
        }
        Ok(())
    }

    /// Enumerate the artifacts beneath a directory in processing order.
    pub fn enumerate(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        discover::enumerate(dir, &self.layout)
    }

    /// Process a file or every artifact beneath a directory.
    ///
    /// Invalid paths are reported and counted; they do not stop the run.
    pub fn process_input(&mut self, path: &Path, observer: &mut dyn RunObserver) -> Result<()> {
        if path.is_dir() {
            let files = self.enumerate(path)?;
            observer.directory_listed(path, &files);
            for file in &files {
                self.process_one(file, observer);
            }
        } else if path.is_file() {
            self.process_one(path, observer);
        } else {
            debug!("{}", Error::InvalidPath(path.to_path_buf()));
            self.state.invalid_inputs += 1;
            observer.invalid_input(path);
        }
        Ok(())
    }

    /// Process every input in order and summarize.
    ///
    /// An error escaping an input stops the loop; the summary is produced
    /// regardless.
    pub fn run(&mut self, inputs: &[PathBuf], observer: &mut dyn RunObserver) -> RunSummary {
        for input in inputs {
            if let Err(e) = self.process_input(input, observer) {
                debug!("Stopping run at {:?}: {}", input, e);
                observer.run_aborted(input, &e);
                break;
            }
        }
        self.summarize()
    }

    pub fn summarize(&self) -> RunSummary {
        self.state.summarize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::cell::RefCell;
    use std::io::Write;
    use tempfile::tempdir;

    /// Parser double that records each call and whether the file existed.
    #[derive(Default)]
    struct FakeParser {
        failing: Vec<&'static str>,
        /// Fail every call from this zero-based index on.
        failing_from_call: Option<usize>,
        calls: RefCell<Vec<(PathBuf, bool)>>,
    }

    impl FakeParser {
        fn failing(names: &[&'static str]) -> Self {
            Self {
                failing: names.to_vec(),
                ..Self::default()
            }
        }

        fn failing_from_call(index: usize) -> Self {
            Self {
                failing_from_call: Some(index),
                ..Self::default()
            }
        }

        fn called(&self) -> Vec<PathBuf> {
            self.calls.borrow().iter().map(|(p, _)| p.clone()).collect()
        }
    }

    impl ParserRunner for FakeParser {
        fn run(&self, path: &Path) -> Result<ParserOutput> {
            let index = self.calls.borrow().len();
            self.calls.borrow_mut().push((path.to_path_buf(), path.exists()));
            let name = path.file_name().unwrap_or_default().to_string_lossy();
            let past_cutoff = self.failing_from_call.is_some_and(|from| index >= from);
            if past_cutoff || self.failing.iter().any(|f| *f == name) {
                return Err(Error::parser_failed(path, Some(1), "", "boom"));
            }
            Ok(ParserOutput::default())
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        listed: Vec<(PathBuf, usize)>,
        finished: Vec<(PathBuf, bool, Option<ExportKind>, Vec<PathBuf>)>,
        invalid: Vec<PathBuf>,
    }

    impl RunObserver for RecordingObserver {
        fn directory_listed(&mut self, dir: &Path, files: &[PathBuf]) {
            self.listed.push((dir.to_path_buf(), files.len()));
        }

        fn file_finished(&mut self, report: &FileReport, state: &RunState) {
            self.finished.push((
                report.path.clone(),
                report.succeeded(),
                report.export_kind,
                state.extracted_paths(),
            ));
        }

        fn invalid_input(&mut self, path: &Path) {
            self.invalid.push(path.to_path_buf());
        }
    }

    fn write_gz(path: &Path, body: &[u8]) {
        let mut encoder = GzEncoder::new(fs::File::create(path).unwrap(), Compression::default());
        encoder.write_all(body).unwrap();
        encoder.finish().unwrap();
    }

    fn cap_layout() -> ArtifactLayout {
        ArtifactLayout {
            capture_extension: "cap".to_string(),
            export_extension: "export".to_string(),
            ..ArtifactLayout::default()
        }
    }

    #[test]
    fn test_end_to_end_sweep_after_tick_by_tick_export() {
        let temp = tempdir().expect("Failed to create temp dir");
        let dir = temp.path();
        fs::write(dir.join("a.cap"), "raw").unwrap();
        write_gz(&dir.join("b.cap.gz"), b"compressed");
        fs::write(dir.join("c.export"), "[KILL_COLLECTION]\nround,killer\n").unwrap();
        fs::write(dir.join("d.export"), "[DEMO_INFO]\ntick,x,y\n").unwrap();

        let mut orch = Orchestrator::new(FakeParser::default(), cap_layout());
        let mut observer = RecordingObserver::default();
        orch.process_input(dir, &mut observer).expect("Failed to process");

        let calls = orch.parser().calls.borrow().clone();
        let mut by_name: Vec<_> = calls
            .iter()
            .map(|(p, existed)| (p.file_name().unwrap().to_string_lossy().to_string(), *existed))
            .collect();
        // exports come last; relative order inside a group follows the walk
        let exports = by_name.split_off(2);
        assert_eq!(by_name, vec![("a.cap".to_string(), true), ("b.cap".to_string(), true)]);
        let mut export_names: Vec<_> = exports.into_iter().map(|(n, _)| n).collect();
        export_names.sort();
        assert_eq!(export_names, vec!["c.export", "d.export"]);

        let b_cap = dir.join("b.cap");
        for (path, ok, export_kind, extracted) in &observer.finished {
            assert!(*ok, "{:?} should succeed", path);
            match path.file_name().unwrap().to_str().unwrap() {
                "b.cap.gz" => assert_eq!(extracted, &vec![b_cap.clone()]),
                "c.export" => assert_eq!(*export_kind, Some(ExportKind::KillEvent)),
                "d.export" => {
                    assert_eq!(*export_kind, Some(ExportKind::TickByTick));
                    assert!(extracted.is_empty());
                }
                _ => {}
            }
        }

        assert!(!b_cap.exists());
        assert!(dir.join("b.cap.gz").exists());
        assert!(dir.join("a.cap").exists());

        let summary = orch.summarize();
        assert_eq!(summary.processed, 4);
        assert_eq!(summary.successful, 4);
        assert_eq!(summary.failed, 0);
        assert!(summary.leftover_extracted.is_empty());
        assert_eq!(observer.listed, vec![(dir.to_path_buf(), 4)]);
    }

    #[test]
    fn test_kill_event_export_keeps_extracted_captures() {
        let temp = tempdir().expect("Failed to create temp dir");
        let dir = temp.path();
        write_gz(&dir.join("b.cap.gz"), b"compressed");
        fs::write(dir.join("c.export"), "[KILL_COLLECTION]\n").unwrap();

        let mut orch = Orchestrator::new(FakeParser::default(), cap_layout());
        orch.process_input(dir, &mut SilentObserver).expect("Failed to process");

        let summary = orch.summarize();
        assert_eq!(summary.successful, 2);
        assert_eq!(summary.leftover_extracted, vec![dir.join("b.cap")]);
        assert!(dir.join("b.cap").exists());
    }

    #[test]
    fn test_failed_parse_discards_extraction() {
        let temp = tempdir().expect("Failed to create temp dir");
        let dir = temp.path();
        write_gz(&dir.join("b.cap.gz"), b"compressed");

        let mut orch = Orchestrator::new(FakeParser::failing(&["b.cap"]), cap_layout());
        let ok = orch.process_one(&dir.join("b.cap.gz"), &mut SilentObserver);

        assert!(!ok);
        assert!(!dir.join("b.cap").exists());
        assert_eq!(orch.parser().calls.borrow()[0], (dir.join("b.cap"), true));

        let summary = orch.summarize();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.failed, 1);
        assert!(summary.leftover_extracted.is_empty());
    }

    #[test]
    fn test_failed_parse_of_reextracted_capture_is_discarded() {
        let temp = tempdir().expect("Failed to create temp dir");
        let dir = temp.path();
        // b.dem left behind by an earlier run, next to its archive
        fs::write(dir.join("b.dem"), "stale").unwrap();
        write_gz(&dir.join("b.dem.gz"), b"compressed");

        let mut orch = Orchestrator::new(FakeParser::failing_from_call(1), ArtifactLayout::default());
        orch.process_input(dir, &mut SilentObserver).expect("Failed to process");

        assert_eq!(
            orch.parser().called(),
            vec![dir.join("b.dem"), dir.join("b.dem")]
        );
        assert!(!dir.join("b.dem").exists());
        assert!(orch.state().state_of(&dir.join("b.dem")).is_none());

        let summary = orch.summarize();
        assert_eq!(summary.successful, 1);
        assert_eq!(summary.failed, 1);
        assert!(summary.leftover_extracted.is_empty());
    }

    #[test]
    fn test_keep_failed_extractions_leaves_file_for_inspection() {
        let temp = tempdir().expect("Failed to create temp dir");
        let dir = temp.path();
        write_gz(&dir.join("e.dem.gz"), b"compressed");
        fs::write(dir.join("pov.csv"), "[DEMO_INFO]\n").unwrap();

        let mut orch = Orchestrator::new(FakeParser::failing(&["e.dem"]), ArtifactLayout::default())
            .with_options(DispatchOptions {
                keep_failed_extractions: true,
            });
        orch.process_input(dir, &mut SilentObserver).expect("Failed to process");

        // the tick-by-tick sweep must not touch a capture that never parsed
        assert!(dir.join("e.dem").exists());
        let summary = orch.summarize();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.successful, 1);
        assert_eq!(summary.leftover_extracted, vec![dir.join("e.dem")]);
    }

    #[test]
    fn test_sweep_never_deletes_supplied_captures() {
        let temp = tempdir().expect("Failed to create temp dir");
        let dir = temp.path();
        fs::write(dir.join("a.dem"), "raw").unwrap();
        write_gz(&dir.join("b.dem.gz"), b"compressed");
        fs::write(dir.join("pov.csv"), "[DEMO_INFO]\n").unwrap();

        let mut orch = Orchestrator::new(FakeParser::default(), ArtifactLayout::default());
        orch.process_input(dir, &mut SilentObserver).expect("Failed to process");

        assert!(dir.join("a.dem").exists());
        assert!(!dir.join("b.dem").exists());
        assert_eq!(orch.state().state_of(&dir.join("a.dem")), Some(ArtifactState::Parsed));
    }

    #[test]
    fn test_failed_tick_by_tick_parse_does_not_sweep() {
        let temp = tempdir().expect("Failed to create temp dir");
        let dir = temp.path();
        write_gz(&dir.join("b.dem.gz"), b"compressed");
        fs::write(dir.join("pov.csv"), "[DEMO_INFO]\n").unwrap();

        let mut orch = Orchestrator::new(FakeParser::failing(&["pov.csv"]), ArtifactLayout::default());
        orch.process_input(dir, &mut SilentObserver).expect("Failed to process");

        assert!(dir.join("b.dem").exists());
        assert_eq!(orch.summarize().leftover_extracted, vec![dir.join("b.dem")]);
    }

    #[test]
    fn test_unknown_export_is_still_parsed_without_sweep() {
        let temp = tempdir().expect("Failed to create temp dir");
        let dir = temp.path();
        write_gz(&dir.join("b.dem.gz"), b"compressed");
        fs::write(dir.join("other.csv"), "\u{feff}[SOMETHING_ELSE]\n").unwrap();

        let mut orch = Orchestrator::new(FakeParser::default(), ArtifactLayout::default());
        let mut observer = RecordingObserver::default();
        orch.process_input(dir, &mut observer).expect("Failed to process");

        assert_eq!(orch.parser().called().len(), 2);
        assert_eq!(observer.finished[1].2, Some(ExportKind::Unknown));
        assert!(dir.join("b.dem").exists());
    }

    #[test]
    fn test_cleanup_requires_extracted_and_processed() {
        let temp = tempdir().expect("Failed to create temp dir");
        let dir = temp.path();
        write_gz(&dir.join("b.dem.gz"), b"compressed");
        fs::write(dir.join("a.dem"), "raw").unwrap();

        let mut orch = Orchestrator::new(FakeParser::default(), ArtifactLayout::default());

        let extracted = orch.extract(&dir.join("b.dem.gz")).expect("Failed to extract");
        assert_eq!(extracted, dir.join("b.dem"));
        assert!(!orch.cleanup(&extracted));
        assert!(extracted.exists());

        orch.invoke_parser(&dir.join("a.dem")).expect("Failed to parse");
        assert!(!orch.cleanup(&dir.join("a.dem")));
        assert!(dir.join("a.dem").exists());

        orch.invoke_parser(&extracted).expect("Failed to parse");
        assert!(orch.cleanup(&extracted));
        assert!(!extracted.exists());
        assert!(orch.state().state_of(&extracted).is_none());
        assert!(!orch.state().processed_paths().contains(&extracted));

        // already gone: nothing left to do
        assert!(!orch.cleanup(&extracted));
    }

    #[test]
    fn test_unsupported_file_fails_without_parsing() {
        let temp = tempdir().expect("Failed to create temp dir");
        let path = temp.path().join("notes.txt");
        fs::write(&path, "hello").unwrap();

        let mut orch = Orchestrator::new(FakeParser::default(), ArtifactLayout::default());
        let mut observer = RecordingObserver::default();
        orch.process_input(&path, &mut observer).expect("Failed to process");

        assert!(orch.parser().called().is_empty());
        assert_eq!(orch.state().seen, 1);
        assert_eq!(orch.state().failed, 1);
        assert!(!observer.finished[0].1);
    }

    #[test]
    fn test_extraction_failure_skips_parser() {
        let temp = tempdir().expect("Failed to create temp dir");
        let path = temp.path().join("broken.dem.gz");
        fs::write(&path, "not gzip at all").unwrap();

        let mut orch = Orchestrator::new(FakeParser::default(), ArtifactLayout::default());
        let ok = orch.process_one(&path, &mut SilentObserver);

        assert!(!ok);
        assert!(orch.parser().called().is_empty());
        assert!(orch.state().extracted_paths().is_empty());
        assert_eq!(orch.state().failed, 1);
    }

    #[test]
    fn test_invalid_input_does_not_stop_run() {
        let temp = tempdir().expect("Failed to create temp dir");
        let good = temp.path().join("a.dem");
        fs::write(&good, "raw").unwrap();
        let missing = temp.path().join("missing");

        let mut orch = Orchestrator::new(FakeParser::default(), ArtifactLayout::default());
        let mut observer = RecordingObserver::default();
        let summary = orch.run(&[missing.clone(), good.clone()], &mut observer);

        assert_eq!(observer.invalid, vec![missing]);
        assert_eq!(orch.parser().called(), vec![good]);
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.successful, 1);
        assert_eq!(summary.invalid_inputs, 1);
        assert!(!summary.is_clean());
    }

    #[test]
    fn test_directory_attempts_every_artifact_once() {
        let temp = tempdir().expect("Failed to create temp dir");
        let dir = temp.path();
        fs::create_dir_all(dir.join("s1/s2/s3")).unwrap();
        for name in ["a.dem", "s1/b.dem", "s1/s2/s3/c.dem"] {
            fs::write(dir.join(name), "raw").unwrap();
        }
        for name in ["d.dem.gz", "s1/s2/e.dem.gz"] {
            write_gz(&dir.join(name), b"compressed");
        }
        for name in ["kills.csv", "s1/s2/s3/more.csv"] {
            fs::write(dir.join(name), "[KILL_COLLECTION]\n").unwrap();
        }

        let mut orch = Orchestrator::new(FakeParser::default(), ArtifactLayout::default());
        orch.process_input(dir, &mut SilentObserver).expect("Failed to process");

        let called = orch.parser().called();
        assert_eq!(called.len(), 3 + 2 + 2);
        let mut unique = called.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), called.len());
        assert_eq!(orch.state().seen, 7);
    }

    #[test]
    fn test_second_run_reprocesses_everything() {
        let temp = tempdir().expect("Failed to create temp dir");
        let dir = temp.path();
        fs::write(dir.join("a.dem"), "raw").unwrap();
        write_gz(&dir.join("b.dem.gz"), b"compressed");
        fs::write(dir.join("pov.csv"), "[DEMO_INFO]\n").unwrap();

        for _ in 0..2 {
            let mut orch = Orchestrator::new(FakeParser::default(), ArtifactLayout::default());
            let summary = orch.run(&[dir.to_path_buf()], &mut SilentObserver);

            assert_eq!(summary.processed, 3);
            assert_eq!(summary.successful, 3);
            assert!(summary.is_clean());
            assert!(summary.leftover_extracted.is_empty());
            assert!(!dir.join("b.dem").exists());
        }
    }
}
