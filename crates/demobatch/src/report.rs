//! Console output for a dispatch run.

use colored::Colorize;
use demobatch_core::{ArtifactKind, Error, FileReport, RunObserver, RunState, RunSummary};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Prints per-file progress lines as the run goes.
///
/// Progress is written to `out`; with `--json` that is stderr, so stdout
/// carries nothing but the summary document.
#[derive(Debug)]
pub struct ConsoleReporter<W> {
    out: W,
    aborted: bool,
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            aborted: false,
        }
    }

    /// Whether an input stopped the run early.
    pub fn aborted(&self) -> bool {
        self.aborted
    }

    fn write_listing(&mut self, dir: &Path, files: &[PathBuf]) -> io::Result<()> {
        writeln!(self.out)?;
        writeln!(
            self.out,
            "{}",
            format!("Processing folder: {}", dir.display()).cyan().bold()
        )?;
        writeln!(self.out, "Listing directory contents:")?;
        for file in files {
            writeln!(self.out, "  {}", file.display())?;
        }
        writeln!(self.out)
    }

    fn write_file(&mut self, report: &FileReport, state: &RunState) -> io::Result<()> {
        if report.kind == ArtifactKind::Unsupported {
            return writeln!(
                self.out,
                "{} Unsupported file type: {}",
                "✗".red(),
                report.path.display()
            );
        }

        if let Some(kind) = report.export_kind {
            writeln!(self.out, "  {} export: {}", kind, report.path.display())?;
        }
        if let Some(ref extracted) = report.extracted {
            writeln!(
                self.out,
                "  Extracted {} to {}",
                report.path.display(),
                extracted.display()
            )?;
        }
        if let Some(ref error) = report.error {
            write_failure(&mut self.out, &report.path, error)?;
        }
        for path in &report.cleaned {
            writeln!(
                self.out,
                "  {} Cleaned up extracted demo: {}",
                "✓".green(),
                path.display()
            )?;
        }

        writeln!(
            self.out,
            "Processed {} files (Success: {}, Failed: {}) - Last file took {:.1} seconds",
            state.seen,
            state.succeeded.to_string().green(),
            failed_count(state.failed),
            report.elapsed.as_secs_f64()
        )?;
        writeln!(self.out)
    }
}

// A closed console must not abort the dispatch loop, so write errors are dropped.
impl<W: Write> RunObserver for ConsoleReporter<W> {
    fn directory_listed(&mut self, dir: &Path, files: &[PathBuf]) {
        let _ = self.write_listing(dir, files);
    }

    fn file_finished(&mut self, report: &FileReport, state: &RunState) {
        let _ = self.write_file(report, state);
    }

    fn invalid_input(&mut self, path: &Path) {
        let _ = writeln!(self.out, "{} Invalid path: {}", "✗".red(), path.display());
    }

    fn run_aborted(&mut self, input: &Path, error: &Error) {
        self.aborted = true;
        let _ = writeln!(
            self.out,
            "{}",
            format!("Error: {} ({})", error, input.display()).red().bold()
        );
    }
}

fn write_failure(out: &mut impl Write, path: &Path, error: &Error) -> io::Result<()> {
    writeln!(out, "{} Failed to process {}", "✗".red(), path.display())?;
    match error.parser_output() {
        Some((stdout, stderr)) => {
            if !stderr.trim().is_empty() {
                writeln!(out, "{} {}", "Error:".red(), stderr.trim_end())?;
            }
            if !stdout.trim().is_empty() {
                writeln!(out, "{} {}", "Output:".yellow(), stdout.trim_end())?;
            }
            Ok(())
        }
        None => writeln!(out, "{} {}", "Error:".red(), error),
    }
}

fn failed_count(failed: usize) -> colored::ColoredString {
    if failed == 0 {
        failed.to_string().normal()
    } else {
        failed.to_string().red()
    }
}

/// Write the final summary, including any leftover decompressed files.
pub fn write_summary(out: &mut impl Write, summary: &RunSummary) -> io::Result<()> {
    let (minutes, seconds) = summary.minutes_seconds();

    writeln!(out)?;
    writeln!(out, "{}", "Processing complete.".cyan().bold())?;
    writeln!(out, "{}", "─".repeat(50))?;
    writeln!(out, "  Total files processed: {}", summary.processed)?;
    writeln!(out, "  Successful:            {}", summary.successful.to_string().green())?;
    writeln!(out, "  Failed:                {}", failed_count(summary.failed))?;
    if summary.invalid_inputs > 0 {
        writeln!(
            out,
            "  Invalid paths:         {}",
            summary.invalid_inputs.to_string().red()
        )?;
    }
    writeln!(out, "  Total time:            {} minutes {} seconds", minutes, seconds)?;

    if !summary.leftover_extracted.is_empty() {
        writeln!(out)?;
        writeln!(
            out,
            "{}",
            "⚠ Warning: Some extracted demo files were not cleaned up:".yellow().bold()
        )?;
        for path in &summary.leftover_extracted {
            writeln!(out, "  - {}", path.display())?;
        }
    }
    Ok(())
}

/// Write the final summary as JSON for scripts.
pub fn write_summary_json(out: &mut impl Write, summary: &RunSummary) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, summary)?;
    writeln!(out)?;
    Ok(())
}
