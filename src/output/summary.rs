//! Run summary
//!
//! Every export run ends in a [`RunSummary`], whatever happened. Its
//! `Display` rendering is what the command line prints.

use crate::state::PersistentState;
use std::fmt;
use std::time::Duration;

/// Terminal state of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// Nothing was pending
    Empty,
    /// Pending records were attempted; some may have failed
    Ok,
    /// Discovery failed, nothing was exported
    Fatal { reason: String },
}

impl RunStatus {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }
}

/// A record that could not be exported this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFailure {
    pub id: u64,
    pub reason: String,
}

/// Outcome of one export run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub status: RunStatus,

    /// Exported identifiers, descending
    pub exported: Vec<u64>,

    /// Failed identifiers with reasons, descending by identifier
    pub failed: Vec<ExportFailure>,

    /// How many of `failed` were refused with 401/403 or a login redirect
    pub auth_failures: usize,

    /// Identifiers known after discovery
    pub discovered: usize,

    /// Identifiers that were pending when exporting began
    pub pending: usize,

    /// Pending identifiers left for a later run by the record cap
    pub deferred: usize,

    pub pages_fetched: usize,
    pub pages_failed: usize,

    /// Identifiers cleared from the completed set by a reset
    pub reset_cleared: usize,
    pub artifacts_removed: usize,

    pub elapsed: Duration,
}

impl RunSummary {
    pub fn new(status: RunStatus) -> Self {
        Self {
            status,
            exported: Vec::new(),
            failed: Vec::new(),
            auth_failures: 0,
            discovered: 0,
            pending: 0,
            deferred: 0,
            pages_fetched: 0,
            pages_failed: 0,
            reset_cleared: 0,
            artifacts_removed: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Failed identifiers, in the order reported
    pub fn failed_ids(&self) -> Vec<u64> {
        self.failed.iter().map(|f| f.id).collect()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Export Summary ===")?;
        writeln!(f)?;

        match &self.status {
            RunStatus::Empty => writeln!(f, "Status: empty (nothing to export)")?,
            RunStatus::Ok => writeln!(f, "Status: ok")?,
            RunStatus::Fatal { reason } => writeln!(f, "Status: FATAL: {}", reason)?,
        }

        if self.reset_cleared > 0 || self.artifacts_removed > 0 {
            writeln!(
                f,
                "Reset: {} completed identifiers cleared, {} artifacts removed",
                self.reset_cleared, self.artifacts_removed
            )?;
        }

        writeln!(f, "Discovery:")?;
        writeln!(f, "  Identifiers known: {}", self.discovered)?;
        writeln!(f, "  Listing pages fetched: {}", self.pages_fetched)?;
        if self.pages_failed > 0 {
            writeln!(f, "  Listing pages failed: {}", self.pages_failed)?;
        }

        writeln!(f, "Export:")?;
        writeln!(f, "  Pending: {}", self.pending)?;
        writeln!(f, "  Exported: {}", self.exported.len())?;
        writeln!(f, "  Failed: {}", self.failed.len())?;
        if self.auth_failures > 0 {
            writeln!(
                f,
                "  Refused by authentication: {} (check the session cookie)",
                self.auth_failures
            )?;
        }
        if self.deferred > 0 {
            writeln!(f, "  Deferred to next run: {}", self.deferred)?;
        }

        if !self.failed.is_empty() {
            writeln!(f)?;
            writeln!(f, "Failures:")?;
            for failure in &self.failed {
                writeln!(f, "  - {}: {}", failure.id, failure.reason)?;
            }
        }

        writeln!(f)?;
        write!(f, "Elapsed: {:.1}s", self.elapsed.as_secs_f64())
    }
}

/// Progress counts read from a state document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateStatus {
    pub discovered: usize,
    pub completed: usize,
    pub pending: usize,
    pub pages_processed: usize,
    pub highest_page: Option<u32>,
    pub newest_pending: Option<u64>,
    pub version: u32,
}

impl StateStatus {
    pub fn from_state(state: &PersistentState) -> Self {
        let pending = state.pending();
        Self {
            discovered: state.discovered_wids.len(),
            completed: state.done_wids.len(),
            pending: pending.len(),
            pages_processed: state.processed_workout_list_pages.len(),
            highest_page: state.processed_workout_list_pages.iter().next_back().copied(),
            newest_pending: pending.first().copied(),
            version: state.version,
        }
    }

    /// Share of discovered identifiers already exported, in percent
    pub fn completion_rate(&self) -> f64 {
        if self.discovered == 0 {
            return 0.0;
        }
        (self.completed as f64 / self.discovered as f64) * 100.0
    }
}

impl fmt::Display for StateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Export State ===")?;
        writeln!(f)?;
        writeln!(f, "Schema version: {}", self.version)?;
        writeln!(f, "Identifiers discovered: {}", self.discovered)?;
        writeln!(
            f,
            "Identifiers exported: {} ({:.1}%)",
            self.completed,
            self.completion_rate()
        )?;
        writeln!(f, "Identifiers pending: {}", self.pending)?;
        if let Some(id) = self.newest_pending {
            writeln!(f, "  Next up: {}", id)?;
        }
        write!(f, "Listing pages processed: {}", self.pages_processed)?;
        if let Some(page) = self.highest_page {
            write!(f, " (highest: {})", page)?;
        }
        Ok(())
    }
}
