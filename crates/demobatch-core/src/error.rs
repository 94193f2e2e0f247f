//! Error types for demobatch-core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using demobatch-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for dispatch operations
#[derive(Error, Debug)]
pub enum Error {
    // Extraction errors
    #[error("Failed to extract {}: {source}", .path.display())]
    Extraction {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Parser errors
    #[error("Failed to launch parser {}: {source}", .executable.display())]
    ParserSpawn {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parser failed on {} ({})", .path.display(), exit_label(.code))]
    ParserFailed {
        path: PathBuf,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    // Cleanup errors
    #[error("Failed to delete {}: {source}", .path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Input errors
    #[error("Invalid path: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("Unsupported file type: {}", .0.display())]
    UnsupportedFile(PathBuf),

    #[error("Failed to walk {}: {message}", .path.display())]
    Walk { path: PathBuf, message: String },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create an error from a parser run that exited unsuccessfully
    pub fn parser_failed(
        path: impl Into<PathBuf>,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::ParserFailed {
            path: path.into(),
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Captured parser output, if this error carries any.
    pub fn parser_output(&self) -> Option<(&str, &str)> {
        match self {
            Self::ParserFailed { stdout, stderr, .. } => Some((stdout, stderr)),
            _ => None,
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}
