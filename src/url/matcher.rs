use crate::ConfigError;
use regex::Regex;

/// Recognizes links to record detail pages and extracts their identifier
///
/// A detail link is `{detail-path}/{digits}` followed by a query, fragment or
/// the end of the href. Edit and create links (`/edit`, `/new`) never match.
///
/// # Examples
///
/// ```
/// use runlog::url::DetailLinkMatcher;
///
/// let matcher = DetailLinkMatcher::new("/workouts").unwrap();
/// assert_eq!(matcher.record_id("/workouts/123?athleteid=9"), Some(123));
/// assert_eq!(matcher.record_id("/workouts/123/edit"), None);
/// assert_eq!(matcher.record_id("/workouts/new"), None);
/// ```
#[derive(Debug, Clone)]
pub struct DetailLinkMatcher {
    pattern: Regex,
}

impl DetailLinkMatcher {
    /// Builds a matcher for detail pages living under `detail_path`
    pub fn new(detail_path: &str) -> Result<Self, ConfigError> {
        let prefix = regex::escape(detail_path.trim_end_matches('/'));
        let pattern = Regex::new(&format!(r"{}/(\d+)(?:[?#&]|$)", prefix))
            .map_err(|e| ConfigError::Validation(format!("Invalid detail-path: {}", e)))?;
        Ok(Self { pattern })
    }

    /// Returns the record identifier `href` links to, if it is a detail link
    pub fn record_id(&self, href: &str) -> Option<u64> {
        let href = href.trim();
        if href.contains("/edit") || href.contains("/new") {
            return None;
        }

        self.pattern
            .captures(href)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .filter(|id| *id > 0)
    }
}
