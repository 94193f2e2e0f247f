//! demobatch-core - Core library for demobatch
//!
//! This crate provides the dispatch logic behind the demobatch CLI:
//!
//! - **artifact**: Classification of captures and exports by name and header
//! - **discover**: Recursive enumeration of artifacts beneath a directory
//! - **extract**: Gzip decompression of compressed captures
//! - **parser**: Invocation of the external parser executable
//! - **state**: Run-scoped counters and artifact bookkeeping
//! - **orchestrator**: Sequential processing, cleanup and sweeps

pub mod artifact;
pub mod discover;
pub mod error;
pub mod extract;
pub mod orchestrator;
pub mod parser;
pub mod state;

// Re-export commonly used types
pub use artifact::{ArtifactKind, ArtifactLayout, ExportKind};
pub use error::{Error, Result};
pub use orchestrator::{DispatchOptions, FileReport, Orchestrator, RunObserver, SilentObserver};
pub use parser::{ParserOutput, ParserRunner, ProcessParser};
pub use state::{ArtifactState, RunState, RunSummary};
