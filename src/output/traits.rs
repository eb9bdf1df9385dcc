//! Record writer trait and output errors
//!
//! A record writer is the outward-facing collaborator of the export run: it
//! receives one validated [`Workout`] and a target path and either durably
//! writes it or fails. Writers carry no retry or concurrency guarantees of
//! their own.

use crate::record::Workout;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to format record {id}: {message}")]
    Format { id: u64, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Writes one record to one artifact
///
/// Implementations must be thread-safe; the export run calls `write` from
/// several tasks at once, each with a distinct path.
pub trait RecordWriter: Send + Sync {
    /// File extension of the artifacts this writer produces, without the dot
    fn extension(&self) -> &str;

    /// Writes `record` to `path`, replacing any previous artifact
    ///
    /// Must not return `Ok` before the artifact is durable.
    fn write(&self, record: &Workout, path: &Path) -> OutputResult<()>;
}
