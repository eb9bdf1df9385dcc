//! Artifact naming and removal
//!
//! Every record lands at `{YYYY-MM-DD}_wid{id}.{ext}` in the output
//! directory. The identifier suffix is what resets match on, so the date
//! prefix may change between exports without leaving strays behind.

use crate::output::traits::{OutputError, OutputResult};
use crate::record::Workout;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Which artifacts to remove
#[derive(Debug, Clone, Copy)]
pub enum ArtifactSelection<'a> {
    All,
    Ids(&'a BTreeSet<u64>),
}

/// File name of `record`'s artifact, e.g. `2023-03-05_wid101.json`
pub fn artifact_name(record: &Workout, extension: &str) -> String {
    format!(
        "{}_wid{}.{}",
        record.local_date().format("%Y-%m-%d"),
        record.id,
        extension
    )
}

/// Identifier encoded in an artifact file name, if it is one
pub fn artifact_id(file_name: &str, extension: &str) -> Option<u64> {
    let stem = file_name.strip_suffix(extension)?.strip_suffix('.')?;
    let (_, id) = stem.rsplit_once("_wid")?;
    id.parse().ok()
}

/// Deletes the selected artifacts from `dir`
///
/// A missing directory holds no artifacts. Returns the removed paths, sorted.
pub fn remove_artifacts(
    dir: &Path,
    extension: &str,
    selection: ArtifactSelection<'_>,
) -> OutputResult<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(OutputError::Write {
                path: dir.to_path_buf(),
                source: e,
            })
        }
    };

    let mut removed = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        let selected = match selection {
            ArtifactSelection::All => path.extension().and_then(|e| e.to_str()) == Some(extension),
            ArtifactSelection::Ids(ids) => artifact_id(name, extension)
                .map(|id| ids.contains(&id))
                .unwrap_or(false),
        };

        if selected {
            std::fs::remove_file(&path).map_err(|source| OutputError::Write {
                path: path.clone(),
                source,
            })?;
            tracing::debug!("Removed artifact {}", path.display());
            removed.push(path);
        }
    }

    removed.sort();
    Ok(removed)
}
