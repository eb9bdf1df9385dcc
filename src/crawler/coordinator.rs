//! Export coordinator - main run orchestration logic
//!
//! One run goes through these phases:
//! - Apply any operator reset (state first, then artifacts)
//! - Discover identifiers from the paginated listing
//! - Compute the pending set (discovered minus completed), newest first
//! - Export each pending record: fetch, parse, write, mark complete
//! - Summarize
//!
//! Per-record failures are collected in the summary and never abort the
//! run. Only a discovery failure ends a run early, as `Fatal`.

use crate::config::{parse_timezone, Config};
use crate::crawler::discovery::{Discoverer, DiscoveryError, DiscoveryReport};
use crate::crawler::fetcher::{build_http_client, Fetcher};
use crate::crawler::limiter::RateLimiter;
use crate::crawler::retry::RetryPolicy;
use crate::output::{
    artifact_name, remove_artifacts, ArtifactSelection, ExportFailure, JsonRecordWriter,
    RecordWriter, RunStatus, RunSummary,
};
use crate::record::parse_workout;
use crate::state::{ResetScope, StateStore};
use crate::url::Endpoints;
use crate::HarvestError;
use chrono_tz::Tz;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

/// Per-run options chosen by the operator
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Reset applied before discovery begins
    pub reset: Option<ResetScope>,
    /// Overrides the configured export concurrency
    pub concurrency: Option<usize>,
}

/// Everything an export task needs, shared across tasks
struct ExportContext {
    fetcher: Arc<Fetcher>,
    limiter: Arc<RateLimiter>,
    state: Arc<StateStore>,
    writer: Arc<dyn RecordWriter>,
    entity: String,
    tz: Tz,
    output_dir: PathBuf,
}

impl ExportContext {
    /// Fetches, parses, writes and completes one record
    async fn export_one(&self, id: u64) -> Result<PathBuf, HarvestError> {
        let url = self.fetcher.endpoints().detail_url(&self.entity, id);
        let body = self.fetcher.fetch(&url, &self.limiter).await?;
        let record = parse_workout(&body, id, self.tz)?;

        let path = self
            .output_dir
            .join(artifact_name(&record, self.writer.extension()));
        self.writer.write(&record, &path)?;

        // Only after the artifact is durable
        self.state.mark_complete(id)?;
        Ok(path)
    }
}

/// Main export coordinator
pub struct Coordinator {
    entity: String,
    tz: Tz,
    output_dir: PathBuf,
    concurrency: usize,
    max_records_per_session: Option<usize>,
    fetcher: Arc<Fetcher>,
    detail_limiter: Arc<RateLimiter>,
    listing_limiter: Arc<RateLimiter>,
    discoverer: Discoverer,
    state: Arc<StateStore>,
    writer: Arc<dyn RecordWriter>,
}

impl Coordinator {
    /// Creates a coordinator writing JSON artifacts
    pub fn new(config: &Config) -> Result<Self, HarvestError> {
        Self::with_writer(config, Arc::new(JsonRecordWriter::new()))
    }

    /// Creates a coordinator handing records to `writer`
    ///
    /// Loads the entity's state document; a missing or corrupt document
    /// starts from an empty state.
    pub fn with_writer(
        config: &Config,
        writer: Arc<dyn RecordWriter>,
    ) -> Result<Self, HarvestError> {
        let endpoints = Endpoints::from_config(&config.target)?;
        let tz = parse_timezone(&config.export.source_timezone)?;
        let client = build_http_client(&config.http)?;

        let fetcher = Arc::new(Fetcher::new(
            client,
            RetryPolicy::from_config(&config.retry),
            endpoints,
            config.http.max_redirects,
        ));

        let detail_limiter = Arc::new(RateLimiter::per_secs(
            config.rate_limit.detail_rate,
            config.rate_limit.detail_per_secs,
        ));
        let listing_limiter = Arc::new(RateLimiter::per_secs(
            config.rate_limit.listing_rate,
            config.rate_limit.listing_per_secs,
        ));

        let mut discoverer = Discoverer::new(
            fetcher.clone(),
            config.export.concurrency,
            config.export.max_pages_per_session,
        );
        if config.export.save_debug_html {
            discoverer = discoverer.with_debug_dir(config.debug_dir());
        }

        let state_path = config.state_path();
        tracing::debug!("Using state file {}", state_path.display());
        let state = Arc::new(StateStore::load(&state_path));

        Ok(Self {
            entity: config.target.entity_id.clone(),
            tz,
            output_dir: config.output_dir(),
            concurrency: config.export.concurrency.max(1),
            max_records_per_session: config.export.max_records_per_session,
            fetcher,
            detail_limiter,
            listing_limiter,
            discoverer,
            state,
            writer,
        })
    }

    /// The state store this coordinator mutates
    pub fn state(&self) -> &Arc<StateStore> {
        &self.state
    }

    /// Runs discovery alone
    pub async fn discover(&self) -> Result<DiscoveryReport, DiscoveryError> {
        self.discoverer
            .discover(&self.entity, self.listing_limiter.clone(), self.state.clone())
            .await
    }

    /// Applies an operator reset: state first, then the matching artifacts
    ///
    /// Returns how many completed identifiers were cleared and how many
    /// artifacts were removed.
    pub fn apply_reset(&self, scope: &ResetScope) -> Result<(usize, usize), HarvestError> {
        let cleared = self.state.reset(scope)?;

        let extension = self.writer.extension();
        let removed = match scope {
            ResetScope::AllCompleted | ResetScope::Everything => {
                remove_artifacts(&self.output_dir, extension, ArtifactSelection::All)?
            }
            ResetScope::Completed(ids) => {
                remove_artifacts(&self.output_dir, extension, ArtifactSelection::Ids(ids))?
            }
        };

        tracing::info!(
            "Reset cleared {} completed identifiers and removed {} artifacts",
            cleared.len(),
            removed.len()
        );
        Ok((cleared.len(), removed.len()))
    }

    /// Runs one complete export
    ///
    /// Returns `Err` only when a reset or the state store fails; discovery
    /// failures come back as a `Fatal` summary.
    pub async fn run(&self, options: RunOptions) -> Result<RunSummary, HarvestError> {
        let started = Instant::now();
        let concurrency = options.concurrency.unwrap_or(self.concurrency).max(1);

        let (reset_cleared, artifacts_removed) = match &options.reset {
            Some(scope) => self.apply_reset(scope)?,
            None => (0, 0),
        };

        tracing::info!("Starting export for entity {}", self.entity);

        let report = match self.discover().await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("Discovery failed, nothing will be exported: {}", e);
                let mut summary = RunSummary::new(RunStatus::Fatal {
                    reason: e.to_string(),
                });
                summary.reset_cleared = reset_cleared;
                summary.artifacts_removed = artifacts_removed;
                summary.discovered = self.state.snapshot()?.discovered_wids.len();
                summary.elapsed = started.elapsed();
                return Ok(summary);
            }
        };

        let mut pending = self.state.pending()?;
        let pending_total = pending.len();
        let mut deferred = 0;
        if let Some(cap) = self.max_records_per_session {
            if pending.len() > cap {
                deferred = pending.len() - cap;
                pending.truncate(cap);
                tracing::warn!(
                    "Exporting {} of {} pending records this session; run again for the rest",
                    cap,
                    pending_total
                );
            }
        }

        let mut summary = RunSummary::new(RunStatus::Ok);
        summary.discovered = report.identifiers.len();
        summary.pending = pending_total;
        summary.deferred = deferred;
        summary.pages_fetched = report.pages_fetched;
        summary.pages_failed = report.pages_failed.len();
        summary.reset_cleared = reset_cleared;
        summary.artifacts_removed = artifacts_removed;

        if pending.is_empty() {
            tracing::info!("No pending records, nothing to export");
            summary.status = RunStatus::Empty;
            summary.elapsed = started.elapsed();
            return Ok(summary);
        }

        tracing::info!(
            "Exporting {} records with concurrency {}",
            pending.len(),
            concurrency
        );

        self.export(&pending, concurrency, &mut summary).await;

        summary.elapsed = started.elapsed();
        tracing::info!(
            "Export finished: {} exported, {} failed in {:.1}s",
            summary.exported.len(),
            summary.failed.len(),
            summary.elapsed.as_secs_f64()
        );

        Ok(summary)
    }

    /// Exports `ids` in the given order, at most `concurrency` at a time
    async fn export(&self, ids: &[u64], concurrency: usize, summary: &mut RunSummary) {
        let context = Arc::new(ExportContext {
            fetcher: self.fetcher.clone(),
            limiter: self.detail_limiter.clone(),
            state: self.state.clone(),
            writer: self.writer.clone(),
            entity: self.entity.clone(),
            tz: self.tz,
            output_dir: self.output_dir.clone(),
        });

        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut handles = Vec::with_capacity(ids.len());

        for &id in ids {
            // Admission happens here so tasks start in submission order
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    summary.failed.push(ExportFailure {
                        id,
                        reason: format!("admission failed: {}", e),
                    });
                    continue;
                }
            };

            let context = context.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;

                match context.export_one(id).await {
                    Ok(path) => {
                        tracing::info!("Exported record {} to {}", id, path.display());
                        Ok(())
                    }
                    Err(e) => {
                        tracing::error!("Failed to export record {}: {}", id, e);
                        let auth = matches!(&e, HarvestError::Fetch(fetch_err) if fetch_err.is_auth());
                        Err((e.to_string(), auth))
                    }
                }
            });
            handles.push((id, handle));
        }

        for (id, handle) in handles {
            match handle.await {
                Ok(Ok(())) => summary.exported.push(id),
                Ok(Err((reason, auth))) => {
                    if auth {
                        summary.auth_failures += 1;
                    }
                    summary.failed.push(ExportFailure { id, reason });
                }
                Err(e) => summary.failed.push(ExportFailure {
                    id,
                    reason: format!("task failed: {}", e),
                }),
            }
        }

        if summary.auth_failures > 0 {
            tracing::warn!(
                "{} records were refused with an authentication error; the session cookie may have expired",
                summary.auth_failures
            );
        }
    }
}
