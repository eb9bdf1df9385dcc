//! JSON record writer
//!
//! Writes one pretty-printed JSON document per record. The document is
//! written to a temporary file beside the target and renamed over it, so a
//! crash never leaves a truncated artifact at the final path.

use crate::output::traits::{OutputError, OutputResult, RecordWriter};
use crate::record::Workout;
use std::io::Write;
use std::path::Path;

/// Default [`RecordWriter`]: one JSON document per record
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRecordWriter;

impl JsonRecordWriter {
    pub fn new() -> Self {
        Self
    }
}

impl RecordWriter for JsonRecordWriter {
    fn extension(&self) -> &str {
        "json"
    }

    fn write(&self, record: &Workout, path: &Path) -> OutputResult<()> {
        let json = serde_json::to_string_pretty(record).map_err(|e| OutputError::Format {
            id: record.id,
            message: e.to_string(),
        })?;

        let write_err = |source| OutputError::Write {
            path: path.to_path_buf(),
            source,
        };

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent).map_err(write_err)?;

        let mut temp_file = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
        temp_file.write_all(json.as_bytes()).map_err(write_err)?;
        temp_file.write_all(b"\n").map_err(write_err)?;
        temp_file.flush().map_err(write_err)?;
        temp_file.as_file().sync_all().map_err(write_err)?;
        temp_file.persist(path).map_err(|e| write_err(e.error))?;

        tracing::debug!("Wrote record {} to {}", record.id, path.display());
        Ok(())
    }
}
