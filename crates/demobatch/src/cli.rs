//! CLI argument definitions using clap derive macros.

use clap::Parser;
use std::path::PathBuf;

/// Replay batch dispatcher
///
/// Hands every replay capture, compressed capture and tabular export found in
/// the given files and folders to the external parser, decompressing and
/// cleaning up captures along the way.
#[derive(Parser, Debug)]
#[command(name = "demobatch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Files and/or folders to process, in order
    pub paths: Vec<PathBuf>,

    /// Parser executable (overrides the config file)
    #[arg(long, env = "DEMOBATCH_PARSER")]
    pub parser: Option<PathBuf>,

    /// Config file to load instead of the default location
    #[arg(long, env = "DEMOBATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Exit without waiting for Enter
    #[arg(long)]
    pub no_wait: bool,

    /// Keep decompressed captures whose parse failed
    #[arg(long)]
    pub keep_failed_extractions: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}
