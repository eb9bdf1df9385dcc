//! URL handling module for Runlog
//!
//! This module builds the listing and detail URLs of the remote service,
//! recognizes the login page a stale session is redirected to, and extracts
//! record identifiers from detail links.

mod matcher;

use crate::config::TargetConfig;
use crate::ConfigError;
use ::url::Url;

pub use matcher::DetailLinkMatcher;

/// URL templates for one remote service
///
/// Listing pages live at `{listing-path}?{entity-param}={entity}&page={n}` and
/// detail pages at `{detail-path}/{id}?{entity-param}={entity}`.
#[derive(Debug, Clone)]
pub struct Endpoints {
    listing_base: Url,
    detail_base: Url,
    entity_param: String,
    login_path: String,
    matcher: DetailLinkMatcher,
}

impl Endpoints {
    /// Builds the endpoint set from the `[target]` configuration section
    pub fn from_config(target: &TargetConfig) -> Result<Self, ConfigError> {
        let base = Url::parse(&target.base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", target.base_url, e)))?;

        let listing_base = base
            .join(&target.listing_path)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", target.listing_path, e)))?;

        let detail_base = base
            .join(target.detail_path.trim_end_matches('/'))
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", target.detail_path, e)))?;

        let matcher = DetailLinkMatcher::new(&target.detail_path)?;

        Ok(Self {
            listing_base,
            detail_base,
            entity_param: target.entity_param.clone(),
            login_path: target.login_path.to_ascii_lowercase(),
            matcher,
        })
    }

    /// URL of listing page `page` for `entity`
    pub fn listing_url(&self, entity: &str, page: u32) -> Url {
        let mut url = self.listing_base.clone();
        url.query_pairs_mut()
            .clear()
            .append_pair(&self.entity_param, entity)
            .append_pair("page", &page.to_string());
        url
    }

    /// URL of the detail page of record `id`
    pub fn detail_url(&self, entity: &str, id: u64) -> Url {
        let mut url = self.detail_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(&id.to_string());
        }
        url.query_pairs_mut()
            .clear()
            .append_pair(&self.entity_param, entity);
        url
    }

    /// Returns true if `url` points at the login page
    pub fn is_login_url(&self, url: &Url) -> bool {
        url.path().to_ascii_lowercase().starts_with(&self.login_path)
    }

    /// Matcher recognizing links to detail pages
    pub fn matcher(&self) -> &DetailLinkMatcher {
        &self.matcher
    }
}
