//! Error and warning types for covinfolib

use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Fatal errors that abort a coverage extraction run.
#[derive(Error, Debug)]
pub enum CovinfoError {
    /// Bad arguments or unusable input given by the caller
    #[error("{0}")]
    Usage(String),

    /// The build tree is not laid out the way extraction requires
    #[error("{0}")]
    Configuration(String),

    /// The binary metadata file is malformed
    #[error("malformed metadata file '{path}': {message}")]
    Format { path: PathBuf, message: String },

    /// The external annotation tool exited unsuccessfully
    #[error("{tool} failed with {status}{}", format_stderr(.stderr))]
    ExternalTool {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },

    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to create or write a file
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Path does not exist
    #[error("path does not exist: {0}")]
    PathNotFound(PathBuf),

    /// Invalid glob pattern
    #[error("invalid glob pattern '{pattern}': {message}")]
    InvalidGlob { pattern: String, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CovinfoError {
    /// Whether the error stems from the caller's input rather than from processing.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            CovinfoError::Usage(_) | CovinfoError::PathNotFound(_) | CovinfoError::InvalidGlob { .. }
        )
    }

    pub(crate) fn format(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        CovinfoError::Format {
            path: path.into(),
            message: message.into(),
        }
    }
}

fn format_stderr(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

/// Recoverable per-file conditions. The offending item is skipped and the run continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationWarning {
    /// The annotation tool produced nothing for a raw data file
    #[error("no annotated files produced for '{0}'")]
    NoAnnotatedFiles(PathBuf),

    /// An annotated file held no lines
    #[error("annotated file '{0}' is empty, skipping")]
    EmptyAnnotatedFile(PathBuf),

    /// No metadata source path matches the annotated file's name
    #[error("could not find a source file for '{0}', skipping")]
    NoMatchingSource(PathBuf),

    /// Several metadata source paths share the annotated file's name
    #[error("annotated file '{annotated}' matches several source files ({}), skipping", join_paths(.candidates))]
    AmbiguousSource {
        annotated: PathBuf,
        candidates: Vec<PathBuf>,
    },
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
