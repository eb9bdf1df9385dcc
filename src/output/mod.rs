//! Output module for record artifacts and run summaries
//!
//! This module handles:
//! - The [`RecordWriter`] interface external formatters implement
//! - The default JSON writer
//! - Artifact naming and removal for resets
//! - Summaries of export runs and of the persisted state

mod artifacts;
mod json;
mod summary;
mod traits;

pub use artifacts::{artifact_id, artifact_name, remove_artifacts, ArtifactSelection};
pub use json::JsonRecordWriter;
pub use summary::{ExportFailure, RunStatus, RunSummary, StateStatus};
pub use traits::{OutputError, OutputResult, RecordWriter};
