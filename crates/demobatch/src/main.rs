//! demobatch - Replay batch dispatcher
//!
//! Feeds replay captures, compressed captures and tabular exports to an
//! external parser one at a time, and removes the captures it decompressed
//! once the tick-by-tick pass has consumed them.

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use demobatch_core::parser::resolve_executable;
use demobatch_core::{DispatchOptions, Orchestrator, ParserRunner, ProcessParser, RunSummary};
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cli;
mod config;
mod report;

use cli::Cli;
use report::ConsoleReporter;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize tracing
    let directive = if cli.verbose { "demobatch=debug" } else { "demobatch=info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();

    let interactive = std::io::stdin().is_terminal();

    if cli.paths.is_empty() {
        write_usage(&mut io::stdout())?;
        wait_for_enter(should_wait(!cli.no_wait, interactive));
        return Ok(ExitCode::SUCCESS);
    }

    // Load configuration
    let mut config = match config::Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            wait_for_enter(should_wait(!cli.no_wait, interactive));
            return Ok(ExitCode::FAILURE);
        }
    };
    config.apply_cli(&cli);

    let parser = ProcessParser::new(resolve_parser(&config.parser.executable));
    let mut orchestrator = Orchestrator::new(parser, config.layout.clone()).with_options(
        DispatchOptions {
            keep_failed_extractions: config.run.keep_failed_extractions,
        },
    );

    let (summary, aborted) = dispatch(
        &mut orchestrator,
        &cli.paths,
        cli.json,
        &mut io::stdout(),
        &mut io::stderr(),
    )?;

    wait_for_enter(should_wait(config.run.wait_for_keypress, interactive));

    Ok(ExitCode::from(exit_status(&summary, aborted)))
}

fn write_usage(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Please drag files or folders onto this program")?;
    writeln!(out, "Usage: demobatch [OPTIONS] <PATHS>...")
}

/// Run every input and write the summary.
///
/// With `json` set, progress goes to `stderr` and `stdout` receives only the
/// summary document. Returns the summary and whether an input aborted the run.
fn dispatch<P: ParserRunner>(
    orchestrator: &mut Orchestrator<P>,
    paths: &[PathBuf],
    json: bool,
    stdout: &mut impl Write,
    stderr: &mut impl Write,
) -> Result<(RunSummary, bool)> {
    let (summary, aborted) = if json {
        run_reported(orchestrator, paths, &mut *stderr)
    } else {
        run_reported(orchestrator, paths, &mut *stdout)
    };

    if json {
        report::write_summary_json(stdout, &summary)?;
    } else {
        report::write_summary(stdout, &summary)?;
    }
    Ok((summary, aborted))
}

fn run_reported<P: ParserRunner>(
    orchestrator: &mut Orchestrator<P>,
    paths: &[PathBuf],
    progress: impl Write,
) -> (RunSummary, bool) {
    let mut reporter = ConsoleReporter::new(progress);
    let summary = orchestrator.run(paths, &mut reporter);
    (summary, reporter.aborted())
}

/// 0 only when every artifact succeeded, every input was valid and no input
/// aborted the run.
fn exit_status(summary: &RunSummary, aborted: bool) -> u8 {
    if summary.is_clean() && !aborted { 0 } else { 1 }
}

fn should_wait(wait_for_keypress: bool, interactive: bool) -> bool {
    wait_for_keypress && interactive
}

/// Locate the parser; an unresolvable one is kept as configured so each
/// invocation reports the launch failure.
fn resolve_parser(configured: &Path) -> PathBuf {
    let base_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));

    match resolve_executable(configured, base_dir.as_deref()) {
        Some(path) => {
            info!("Using parser {}", path.display());
            path
        }
        None => {
            warn!(
                "Parser executable {} not found; artifacts will fail to dispatch",
                configured.display()
            );
            configured.to_path_buf()
        }
    }
}

/// Keep the console open until the operator acknowledges.
fn wait_for_enter(enabled: bool) {
    if !enabled {
        return;
    }
    println!();
    let _ = dialoguer::Input::<String>::new()
        .with_prompt("Press Enter to exit")
        .allow_empty(true)
        .interact_text();
}
