//! Resumable state persistence
//!
//! The whole state is one JSON document rewritten after every mutation.
//! Writes go to a temporary file in the same directory which is then
//! atomically renamed over the previous document.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Current state schema version
pub const STATE_VERSION: u32 = 2;

/// Errors that can occur during state operations
#[derive(Debug, Error)]
pub enum StateError {
    #[error("IO error on state file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Record {0} cannot be completed before it is discovered")]
    Undiscovered(u64),

    #[error("State lock poisoned")]
    Poisoned,
}

/// Result type for state operations
pub type StateResult<T> = Result<T, StateError>;

/// Crawl and export progress for one entity
///
/// Sets are ordered, so the document always lists them ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentState {
    /// Identifiers whose artifact has been durably written
    #[serde(default)]
    pub done_wids: BTreeSet<u64>,

    /// Listing pages whose identifiers have been merged into `discovered_wids`
    #[serde(default)]
    pub processed_workout_list_pages: BTreeSet<u32>,

    /// Every identifier ever seen on the listing
    #[serde(default)]
    pub discovered_wids: BTreeSet<u64>,

    #[serde(default = "legacy_version")]
    pub version: u32,
}

fn legacy_version() -> u32 {
    1
}

impl Default for PersistentState {
    fn default() -> Self {
        Self {
            done_wids: BTreeSet::new(),
            processed_workout_list_pages: BTreeSet::new(),
            discovered_wids: BTreeSet::new(),
            version: STATE_VERSION,
        }
    }
}

impl PersistentState {
    /// Discovered identifiers not yet completed, newest (highest) first
    pub fn pending(&self) -> Vec<u64> {
        self.discovered_wids
            .iter()
            .rev()
            .filter(|id| !self.done_wids.contains(id))
            .copied()
            .collect()
    }

    /// Returns true if every completed identifier is also discovered
    pub fn is_consistent(&self) -> bool {
        self.done_wids.is_subset(&self.discovered_wids)
    }

    /// Brings an older document up to the current schema
    ///
    /// Version 1 documents may list completed identifiers that were never
    /// recorded as discovered.
    fn migrate(&mut self) -> bool {
        let mut changed = false;

        if !self.is_consistent() {
            let missing = self.done_wids.difference(&self.discovered_wids).count();
            tracing::info!(
                "Merging {} completed identifiers missing from the discovered set",
                missing
            );
            self.discovered_wids.extend(self.done_wids.iter().copied());
            changed = true;
        }

        if self.version < STATE_VERSION {
            tracing::info!(
                "Upgrading state schema from version {} to {}",
                self.version,
                STATE_VERSION
            );
            self.version = STATE_VERSION;
            changed = true;
        }

        changed
    }
}

/// Which part of the export progress to forget
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetScope {
    /// Clear the whole completed set
    AllCompleted,
    /// Clear only these identifiers from the completed set
    Completed(BTreeSet<u64>),
    /// Clear everything, including discovery progress
    Everything,
}

/// Owner of the persistent state of one entity
///
/// All mutations and their persist run under one lock, so no two callers can
/// interleave a partial write. Running two processes against the same path is
/// not supported.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    state: Mutex<PersistentState>,
}

impl StateStore {
    /// Loads the state document at `path`
    ///
    /// A missing, unreadable or corrupt document yields a fresh empty state;
    /// the latter two are logged as warnings.
    pub fn load(path: &Path) -> Self {
        let state = match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<PersistentState>(&content) {
                Ok(mut state) => {
                    if state.migrate() {
                        tracing::debug!("State at {} migrated in memory", path.display());
                    }
                    tracing::debug!(
                        "Loaded state from {}: {} discovered, {} done, {} pages",
                        path.display(),
                        state.discovered_wids.len(),
                        state.done_wids.len(),
                        state.processed_workout_list_pages.len()
                    );
                    state
                }
                Err(e) => {
                    tracing::warn!(
                        "State file {} is corrupted or not valid JSON ({}). Starting with a new state.",
                        path.display(),
                        e
                    );
                    PersistentState::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No state file at {}, starting fresh", path.display());
                PersistentState::default()
            }
            Err(e) => {
                tracing::warn!(
                    "Could not read state file {} ({}). Starting with a new state.",
                    path.display(),
                    e
                );
                PersistentState::default()
            }
        };

        Self {
            path: path.to_path_buf(),
            state: Mutex::new(state),
        }
    }

    /// Path of the backing document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A copy of the current in-memory state
    pub fn snapshot(&self) -> StateResult<PersistentState> {
        Ok(self.lock()?.clone())
    }

    /// Identifiers still to export, newest first
    pub fn pending(&self) -> StateResult<Vec<u64>> {
        Ok(self.lock()?.pending())
    }

    /// Writes the current state to disk
    pub fn save(&self) -> StateResult<()> {
        let state = self.lock()?;
        self.persist(&state)
    }

    /// Merges the identifiers found on listing page `page` and marks the page processed
    ///
    /// Returns how many identifiers were new.
    pub fn record_page(&self, page: u32, ids: &BTreeSet<u64>) -> StateResult<usize> {
        let mut state = self.lock()?;
        let before = state.discovered_wids.len();
        state.discovered_wids.extend(ids.iter().copied());
        state.processed_workout_list_pages.insert(page);
        self.persist(&state)?;
        Ok(state.discovered_wids.len() - before)
    }

    /// Merges identifiers into the discovered set
    pub fn add_discovered(&self, ids: &BTreeSet<u64>) -> StateResult<usize> {
        let mut state = self.lock()?;
        let before = state.discovered_wids.len();
        state.discovered_wids.extend(ids.iter().copied());
        self.persist(&state)?;
        Ok(state.discovered_wids.len() - before)
    }

    /// Marks `id` as exported
    ///
    /// Only call once the record's artifact is durably written.
    pub fn mark_complete(&self, id: u64) -> StateResult<()> {
        let mut state = self.lock()?;
        if !state.discovered_wids.contains(&id) {
            return Err(StateError::Undiscovered(id));
        }
        state.done_wids.insert(id);
        self.persist(&state)
    }

    /// Forgets progress according to `scope`
    ///
    /// Returns the identifiers removed from the completed set.
    pub fn reset(&self, scope: &ResetScope) -> StateResult<Vec<u64>> {
        let mut state = self.lock()?;

        let removed: Vec<u64> = match scope {
            ResetScope::AllCompleted => std::mem::take(&mut state.done_wids).into_iter().collect(),
            ResetScope::Completed(ids) => ids
                .iter()
                .copied()
                .filter(|id| state.done_wids.remove(id))
                .collect(),
            ResetScope::Everything => {
                let removed = state.done_wids.iter().copied().collect();
                *state = PersistentState::default();
                removed
            }
        };

        self.persist(&state)?;
        tracing::info!(
            "Reset {:?}: {} completed identifiers cleared",
            scope,
            removed.len()
        );
        Ok(removed)
    }

    fn lock(&self) -> StateResult<MutexGuard<'_, PersistentState>> {
        self.state.lock().map_err(|_| StateError::Poisoned)
    }

    fn persist(&self, state: &PersistentState) -> StateResult<()> {
        let io_err = |source| StateError::Io {
            path: self.path.clone(),
            source,
        };

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent).map_err(io_err)?;

        let json = serde_json::to_string_pretty(state)?;

        let mut temp_file = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;
        temp_file.write_all(json.as_bytes()).map_err(io_err)?;
        temp_file.flush().map_err(io_err)?;
        temp_file.as_file().sync_all().map_err(io_err)?;
        temp_file
            .persist(&self.path)
            .map_err(|e| io_err(e.error))?;

        tracing::trace!("State saved to {}", self.path.display());
        Ok(())
    }
}
