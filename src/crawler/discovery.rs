//! Pagination-driven identifier discovery
//!
//! Page 1 of the listing is fetched on every run to read the pagination
//! controls. Every page in `2..=max` not yet processed is then fetched
//! concurrently; each page's identifiers are merged into the state store and
//! persisted before the page counts as processed.

use crate::crawler::fetcher::{FetchError, Fetcher};
use crate::crawler::limiter::RateLimiter;
use crate::crawler::listing::{parse_listing, ListingPage};
use crate::state::{StateError, StateStore};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;

/// Failures that abort the whole discovery phase
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Failed to fetch first listing page: {0}")]
    FirstPage(#[source] FetchError),

    #[error("No pagination controls found on first listing page ({url})")]
    MissingPagination { url: String },

    #[error("Failed to persist discovery progress: {0}")]
    State(#[from] StateError),
}

/// What one discovery call accomplished
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Every identifier known after this call, prior runs included
    pub identifiers: BTreeSet<u64>,
    /// Highest page number advertised by page 1
    pub max_page: u32,
    /// Pages fetched and merged this call, page 1 included
    pub pages_fetched: usize,
    /// Pages that answered 404 and were treated as past the end
    pub pages_past_end: Vec<u32>,
    /// Pages whose task failed, with the reason
    pub pages_failed: Vec<(u32, String)>,
    /// Identifiers first seen during this call
    pub new_identifiers: usize,
    /// True if the session page cap stopped the call early
    pub capped: bool,
}

/// Outcome of one page task
#[derive(Debug)]
enum PageOutcome {
    Merged { new_ids: usize },
    PastEnd,
    Failed(String),
    Capped,
}

/// Walks the paginated listing of one entity
#[derive(Debug, Clone)]
pub struct Discoverer {
    fetcher: Arc<Fetcher>,
    concurrency: usize,
    max_pages_per_session: usize,
    debug_dir: Option<PathBuf>,
}

impl Discoverer {
    pub fn new(fetcher: Arc<Fetcher>, concurrency: usize, max_pages_per_session: usize) -> Self {
        Self {
            fetcher,
            concurrency: concurrency.max(1),
            max_pages_per_session: max_pages_per_session.max(1),
            debug_dir: None,
        }
    }

    /// Saves the body of listing pages that yield no identifiers under `dir`
    pub fn with_debug_dir(mut self, dir: PathBuf) -> Self {
        self.debug_dir = Some(dir);
        self
    }

    /// Discovers every identifier listed for `entity`
    ///
    /// `state` is updated and persisted after each page, so an interrupted
    /// call loses at most the pages in flight.
    pub async fn discover(
        &self,
        entity: &str,
        limiter: Arc<RateLimiter>,
        state: Arc<StateStore>,
    ) -> Result<DiscoveryReport, DiscoveryError> {
        let endpoints = self.fetcher.endpoints();
        let first_url = endpoints.listing_url(entity, 1);

        tracing::info!("Fetching first listing page to determine pagination: {}", first_url);
        let body = self
            .fetcher
            .fetch(&first_url, &limiter)
            .await
            .map_err(DiscoveryError::FirstPage)?;

        let first = parse_listing(&body, endpoints.matcher());
        let max_page = match first.max_page {
            Some(max) => max.max(1),
            None => {
                tracing::error!(
                    "Could not determine total number of listing pages from pagination controls at {}",
                    first_url
                );
                self.save_debug_html(1, &body).await;
                return Err(DiscoveryError::MissingPagination {
                    url: first_url.to_string(),
                });
            }
        };

        let mut report = DiscoveryReport {
            max_page,
            ..DiscoveryReport::default()
        };

        if first.record_ids.is_empty() {
            tracing::warn!("No identifiers found on listing page 1");
            self.save_debug_html(1, &body).await;
        }
        report.new_identifiers += state.record_page(1, &first.record_ids)?;
        report.pages_fetched += 1;

        let processed = state.snapshot()?.processed_workout_list_pages;
        let missing: Vec<u32> = (2..=max_page)
            .filter(|page| !processed.contains(page))
            .collect();

        if missing.is_empty() {
            tracing::info!("All {} listing pages already processed", max_page);
        } else {
            tracing::info!(
                "Listing has {} pages, {} still to fetch",
                max_page,
                missing.len()
            );
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let started = Arc::new(AtomicUsize::new(report.pages_fetched));
        let mut handles = Vec::with_capacity(missing.len());

        for page in missing {
            let discoverer = self.clone();
            let entity = entity.to_string();
            let limiter = limiter.clone();
            let state = state.clone();
            let semaphore = semaphore.clone();
            let started = started.clone();

            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(e) => return PageOutcome::Failed(e.to_string()),
                };

                if started.fetch_add(1, Ordering::SeqCst) >= discoverer.max_pages_per_session {
                    return PageOutcome::Capped;
                }

                discoverer.process_page(&entity, page, &limiter, &state).await
            });
            handles.push((page, handle));
        }

        for (page, handle) in handles {
            match handle.await {
                Ok(PageOutcome::Merged { new_ids }) => {
                    report.pages_fetched += 1;
                    report.new_identifiers += new_ids;
                }
                Ok(PageOutcome::PastEnd) => report.pages_past_end.push(page),
                Ok(PageOutcome::Failed(reason)) => report.pages_failed.push((page, reason)),
                Ok(PageOutcome::Capped) => report.capped = true,
                Err(e) => report.pages_failed.push((page, format!("task failed: {}", e))),
            }
        }

        if report.capped {
            tracing::warn!(
                "Discovery stopped after reaching the session cap of {} pages. Run again to continue.",
                self.max_pages_per_session
            );
        }

        report.identifiers = state.snapshot()?.discovered_wids;

        tracing::info!(
            "Finished discovery: {} identifiers known ({} new), {} pages fetched, {} failed, {} past end",
            report.identifiers.len(),
            report.new_identifiers,
            report.pages_fetched,
            report.pages_failed.len(),
            report.pages_past_end.len()
        );

        Ok(report)
    }

    /// Fetches one listing page and merges its identifiers
    async fn process_page(
        &self,
        entity: &str,
        page: u32,
        limiter: &RateLimiter,
        state: &StateStore,
    ) -> PageOutcome {
        let url = self.fetcher.endpoints().listing_url(entity, page);
        tracing::debug!("Fetching listing page {}: {}", page, url);

        let body = match self.fetcher.fetch(&url, limiter).await {
            Ok(body) => body,
            Err(e) if e.status() == Some(404) => {
                tracing::info!("Received 404 for listing page {}. Assuming end of listing.", page);
                return PageOutcome::PastEnd;
            }
            Err(e) => {
                tracing::error!("Failed to fetch listing page {}: {}", page, e);
                return PageOutcome::Failed(e.to_string());
            }
        };

        let ListingPage { record_ids, .. } = parse_listing(&body, self.fetcher.endpoints().matcher());
        if record_ids.is_empty() {
            tracing::warn!("No identifiers found on listing page {}", page);
            self.save_debug_html(page, &body).await;
        }

        match state.record_page(page, &record_ids) {
            Ok(new_ids) => {
                tracing::debug!(
                    "Listing page {} processed: {} identifiers, {} new",
                    page,
                    record_ids.len(),
                    new_ids
                );
                PageOutcome::Merged { new_ids }
            }
            Err(e) => {
                tracing::error!("Failed to persist listing page {}: {}", page, e);
                PageOutcome::Failed(e.to_string())
            }
        }
    }

    async fn save_debug_html(&self, page: u32, body: &str) {
        let Some(dir) = &self.debug_dir else {
            return;
        };

        let path = dir.join(format!("listing_page_{}.html", page));
        let result = match tokio::fs::create_dir_all(dir).await {
            Ok(()) => tokio::fs::write(&path, body).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => tracing::info!("Saved listing page {} HTML to {}", page, path.display()),
            Err(e) => tracing::error!("Failed to save debug HTML for page {}: {}", page, e),
        }
    }
}
