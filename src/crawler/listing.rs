//! Listing page parser
//!
//! This module extracts from one page of the paginated listing:
//! - The identifiers of every record linked from the listing table
//! - The highest page number advertised by the pagination controls

use crate::url::DetailLinkMatcher;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;

static PAGE_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[?&]page=(\d+)").expect("page parameter regex is valid"));

/// Extracted information from a listing page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    /// Record identifiers linked from the page body
    pub record_ids: BTreeSet<u64>,

    /// Highest page number linked from the pagination controls
    pub max_page: Option<u32>,
}

/// Parses a listing page
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href>` links inside `table.content` whose target is a detail page
///
/// **Exclude:**
/// - Edit and create links
/// - Links outside the listing table (sidebars, navigation)
/// - Links inside `div.pagination`
///
/// # Example
///
/// ```
/// use runlog::crawler::parse_listing;
/// use runlog::url::DetailLinkMatcher;
///
/// let html = r#"<table class="content"><tr><td><a href="/workouts/7">Run</a></td></tr></table>
/// <div class="pagination"><a href="/workouts?athleteid=1&page=4">4</a></div>"#;
/// let matcher = DetailLinkMatcher::new("/workouts").unwrap();
/// let page = parse_listing(html, &matcher);
/// assert_eq!(page.record_ids.into_iter().collect::<Vec<_>>(), vec![7]);
/// assert_eq!(page.max_page, Some(4));
/// ```
pub fn parse_listing(html: &str, matcher: &DetailLinkMatcher) -> ListingPage {
    let document = Html::parse_document(html);

    ListingPage {
        record_ids: extract_record_ids(&document, matcher),
        max_page: extract_max_page(&document),
    }
}

/// Extracts identifiers of the detail links in the listing table
fn extract_record_ids(document: &Html, matcher: &DetailLinkMatcher) -> BTreeSet<u64> {
    let mut ids = BTreeSet::new();

    if let Ok(a_selector) = Selector::parse("table.content a[href]") {
        for element in document.select(&a_selector) {
            if in_pagination(&element) {
                continue;
            }

            if let Some(id) = element.value().attr("href").and_then(|href| matcher.record_id(href)) {
                ids.insert(id);
            }
        }
    }

    ids
}

/// Reads the largest `page=N` among the pagination links
fn extract_max_page(document: &Html) -> Option<u32> {
    let selector = Selector::parse("div.pagination a[href]").ok()?;

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| {
            PAGE_PARAM
                .captures(href)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<u32>().ok())
        })
        .max()
}

/// Returns true if the element sits inside a `div.pagination`
fn in_pagination(element: &ElementRef) -> bool {
    element.ancestors().any(|node| {
        node.value()
            .as_element()
            .map(|el| el.name() == "div" && el.classes().any(|class| class == "pagination"))
            .unwrap_or(false)
    })
}
