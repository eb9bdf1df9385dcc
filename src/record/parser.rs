//! Detail page parser
//!
//! Extracts a [`Workout`] from the HTML of one record's detail page. The
//! page layout this relies on:
//!
//! - The first `<h3>` is the record heading; the first `<p>` sibling after it
//!   holds the date as `Month DD, YYYY (Morning|Afternoon|Night)`
//! - `<p>` elements starting with `Exercise Type:`, `Weather:` or `Comments:`
//! - An optional `table.content` with one row per segment: distance,
//!   duration, (unused), interval type, shoes
//! - An optional `input#workout_title` carrying the user's title

use crate::record::meta::split_meta;
use crate::record::types::{Category, MetaBlock, Segment, Workout, EXPORTED_FROM};
use crate::record::units::{parse_distance_miles, parse_duration_seconds};
use chrono::{Month, NaiveDate, Offset, TimeZone};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use thiserror::Error;

static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<month>[A-Za-z]+)\s+(?P<day>\d{1,2}),\s*(?P<year>\d{4})\s*\((?P<tod>Morning|Afternoon|Night)\)$",
    )
    .expect("date regex is valid")
});

/// Longest raw excerpt carried in an error
const EXCERPT_LEN: usize = 200;

/// Failure to extract a record from its detail page
///
/// Both variants carry the record identifier and the offending raw text.
#[derive(Debug, Error)]
pub enum RecordParseError {
    #[error("Record {id}: missing {field} (near {raw:?})")]
    MissingRequiredField {
        id: u64,
        field: &'static str,
        raw: String,
    },

    #[error("Record {id}: unexpected format for {field}: {raw:?} ({reason})")]
    UnexpectedFormat {
        id: u64,
        field: &'static str,
        raw: String,
        reason: String,
    },
}

impl RecordParseError {
    pub fn id(&self) -> u64 {
        match self {
            Self::MissingRequiredField { id, .. } | Self::UnexpectedFormat { id, .. } => *id,
        }
    }

    pub fn raw(&self) -> &str {
        match self {
            Self::MissingRequiredField { raw, .. } | Self::UnexpectedFormat { raw, .. } => raw,
        }
    }
}

/// Text fields read from labelled paragraphs
#[derive(Debug, Default)]
struct LabelledFields {
    exercise_type: Option<String>,
    weather: Option<String>,
    comments: Option<String>,
}

/// Parses the detail page of record `id`
///
/// The date is required; every other field is optional. Times of day map to
/// 08:00, 14:00 and 20:00 local time in `tz`.
pub fn parse_workout(html: &str, id: u64, tz: Tz) -> Result<Workout, RecordParseError> {
    let document = Html::parse_document(html);

    let heading = select_first(&document, "h3").ok_or_else(|| {
        RecordParseError::MissingRequiredField {
            id,
            field: "heading",
            raw: excerpt(html),
        }
    })?;

    let date = parse_date(&heading, id, tz)?;
    tracing::debug!("Record {}: parsed date {}", id, date.to_rfc3339());

    let fields = extract_labelled_fields(&document);
    let (comments, meta) = match fields.comments.as_deref() {
        Some(text) => {
            let (visible, meta) = split_meta(text);
            (non_empty(visible), meta)
        }
        None => (None, None),
    };

    let heading_text = non_empty(collapse_whitespace(&heading.text().collect::<String>()));
    let title = extract_title_input(&document)
        .or_else(|| meta.as_ref().and_then(|m| m.title.clone()))
        .or(heading_text);

    let weather = fields
        .weather
        .or_else(|| meta.as_ref().and_then(|m| m.weather.clone()));

    let category = fields
        .exercise_type
        .as_deref()
        .map(Category::from_tag)
        .unwrap_or(Category::Other);

    let segments = extract_segments(&document, id, meta.as_ref());

    let mut workout = Workout {
        id,
        date,
        category,
        exercise_type: fields.exercise_type,
        title,
        weather,
        comments,
        description: extract_description(&document),
        meta,
        segments,
        total_distance_miles: 0.0,
        total_duration_seconds: 0,
        exported_from: EXPORTED_FROM.to_string(),
    };
    workout.update_totals();

    Ok(workout)
}

/// Reads the date paragraph following the heading
fn parse_date(
    heading: &ElementRef,
    id: u64,
    tz: Tz,
) -> Result<chrono::DateTime<chrono::FixedOffset>, RecordParseError> {
    let paragraph = heading
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "p")
        .ok_or_else(|| RecordParseError::MissingRequiredField {
            id,
            field: "date",
            raw: excerpt(&heading.html()),
        })?;

    let raw = paragraph.text().collect::<String>();
    let normalized = collapse_whitespace(&raw);
    if normalized.is_empty() {
        return Err(RecordParseError::MissingRequiredField {
            id,
            field: "date",
            raw: excerpt(&paragraph.html()),
        });
    }

    let unexpected = |reason: String| RecordParseError::UnexpectedFormat {
        id,
        field: "date",
        raw: normalized.clone(),
        reason,
    };

    let caps = DATE_PATTERN
        .captures(&normalized)
        .ok_or_else(|| unexpected("expected 'Month DD, YYYY (Morning|Afternoon|Night)'".to_string()))?;

    // Full month names only; chrono also accepts "Mar" or "Sept"
    let month = caps["month"]
        .parse::<Month>()
        .ok()
        .filter(|month| month.name().eq_ignore_ascii_case(&caps["month"]))
        .ok_or_else(|| unexpected(format!("unknown month '{}'", &caps["month"])))?;
    let day: u32 = caps["day"]
        .parse()
        .map_err(|_| unexpected(format!("invalid day '{}'", &caps["day"])))?;
    let year: i32 = caps["year"]
        .parse()
        .map_err(|_| unexpected(format!("invalid year '{}'", &caps["year"])))?;

    let hour = match &caps["tod"] {
        "Morning" => 8,
        "Afternoon" => 14,
        _ => 20,
    };

    let naive = NaiveDate::from_ymd_opt(year, month.number_from_month(), day)
        .and_then(|date| date.and_hms_opt(hour, 0, 0))
        .ok_or_else(|| unexpected("no such calendar date".to_string()))?;

    let local = tz
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| unexpected(format!("local time does not exist in {}", tz.name())))?;

    Ok(local.with_timezone(&local.offset().fix()))
}

/// Collects the `Exercise Type:`, `Weather:` and `Comments:` paragraphs
fn extract_labelled_fields(document: &Html) -> LabelledFields {
    let mut fields = LabelledFields::default();

    let Ok(selector) = Selector::parse("p") else {
        return fields;
    };

    for paragraph in document.select(&selector) {
        let text = text_with_breaks(&paragraph);
        let trimmed = text.trim();

        if let Some(rest) = trimmed.strip_prefix("Exercise Type:") {
            fields.exercise_type = non_empty(collapse_whitespace(rest));
        } else if let Some(rest) = trimmed.strip_prefix("Weather:") {
            fields.weather = non_empty(collapse_whitespace(rest));
        } else if let Some(rest) = trimmed.strip_prefix("Comments:") {
            fields.comments = non_empty(clean_lines(rest));
        }
    }

    fields
}

/// Reads the segment rows of the detail table
///
/// Rows where both distance and duration are zero are dropped. If nothing is
/// left, one zero segment stands in for the record.
fn extract_segments(document: &Html, id: u64, meta: Option<&MetaBlock>) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut all_shoes = BTreeSet::new();
    let fallback_interval = meta.and_then(|m| m.interval_type.clone());

    let (Ok(table_sel), Ok(row_sel), Ok(cell_sel)) = (
        Selector::parse("table.content"),
        Selector::parse("tr"),
        Selector::parse("td"),
    ) else {
        return vec![Segment::zero(1)];
    };

    if let Some(table) = document.select(&table_sel).next() {
        for row in table.select(&row_sel) {
            if in_tfoot(&row) {
                continue;
            }

            let cols: Vec<String> = row
                .select(&cell_sel)
                .map(|cell| collapse_whitespace(&cell.text().collect::<String>()))
                .collect();
            if cols.len() < 2 {
                continue;
            }

            let distance_miles = parse_distance_miles(&cols[0]).unwrap_or(0.0);
            let duration_seconds = parse_duration_seconds(&cols[1]).unwrap_or(0);
            let shoes = cols.get(4).cloned().and_then(non_empty);
            if let Some(shoes) = &shoes {
                all_shoes.insert(shoes.clone());
            }

            if distance_miles == 0.0 && duration_seconds == 0 {
                tracing::debug!("Record {}: skipping row with zero distance and duration", id);
                continue;
            }

            let interval_type = cols
                .get(3)
                .cloned()
                .and_then(non_empty)
                .or_else(|| fallback_interval.clone());

            segments.push(Segment {
                index: segments.len() as u32 + 1,
                distance_miles,
                duration_seconds,
                interval_type,
                shoes,
            });
        }
    } else {
        tracing::debug!("Record {}: no detail table", id);
    }

    if segments.is_empty() {
        tracing::info!(
            "Record {}: no segments found, recording a zero-distance segment",
            id
        );
        let mut zero = Segment::zero(1);
        zero.interval_type = fallback_interval;
        if !all_shoes.is_empty() {
            zero.shoes = Some(all_shoes.into_iter().collect::<Vec<_>>().join(", "));
        }
        segments.push(zero);
    }

    segments
}

fn extract_title_input(document: &Html) -> Option<String> {
    let selector = Selector::parse("input#workout_title").ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|input| input.value().attr("value"))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn extract_description(document: &Html) -> Option<String> {
    let selector = Selector::parse(r#"meta[name="description"]"#).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn select_first<'a>(document: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).next()
}

fn in_tfoot(row: &ElementRef) -> bool {
    row.parent()
        .and_then(|parent| parent.value().as_element().map(|el| el.name() == "tfoot"))
        .unwrap_or(false)
}

/// Element text with `<br>` turned into newlines
fn text_with_breaks(element: &ElementRef) -> String {
    let mut text = String::new();
    for node in element.descendants() {
        if let Some(fragment) = node.value().as_text() {
            text.push_str(fragment);
        } else if node.value().as_element().map(|el| el.name()) == Some("br") {
            text.push('\n');
        }
    }
    text
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapses whitespace within each line and drops blank lines
fn clean_lines(text: &str) -> String {
    text.lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn non_empty(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

fn excerpt(text: &str) -> String {
    let collapsed = collapse_whitespace(text);
    match collapsed.char_indices().nth(EXCERPT_LEN) {
        Some((cut, _)) => format!("{}...", &collapsed[..cut]),
        None => collapsed,
    }
}
