//! `META:` block extraction from free-text comments
//!
//! A comment may carry one line of the form
//! `META:weather=Sunny;title=Tempo;interval_type=Tempo;source=watch`.
//! The line runs from `META:` to the end of the line or text.

use crate::record::types::MetaBlock;

const MARKER: &str = "META:";

/// Splits `text` into its user-visible comments and its META block
///
/// The visible comments are the text with the META line removed and
/// surrounding whitespace trimmed.
///
/// ```
/// use runlog::record::split_meta;
///
/// let (comments, meta) = split_meta("Felt great\nMETA:weather=Rain;mood=good");
/// let meta = meta.unwrap();
/// assert_eq!(comments, "Felt great");
/// assert_eq!(meta.weather.as_deref(), Some("Rain"));
/// assert_eq!(meta.extra.get("mood").map(String::as_str), Some("good"));
/// ```
pub fn split_meta(text: &str) -> (String, Option<MetaBlock>) {
    let Some(start) = text.find(MARKER) else {
        return (text.trim().to_string(), None);
    };

    let end = text[start..]
        .find('\n')
        .map(|offset| start + offset)
        .unwrap_or(text.len());

    let raw = text[start..end].trim_end().to_string();
    let before = text[..start].trim_end();
    let after = text[end..].trim_start();

    let visible = match (before.is_empty(), after.is_empty()) {
        (true, _) => after.to_string(),
        (false, true) => before.to_string(),
        (false, false) => format!("{}\n{}", before, after),
    };

    let block = parse_block(&raw);
    (visible.trim().to_string(), Some(block))
}

/// Parses the pairs of one `META:` line
fn parse_block(raw: &str) -> MetaBlock {
    let mut block = MetaBlock {
        raw: raw.to_string(),
        ..MetaBlock::default()
    };

    let body = raw.strip_prefix(MARKER).unwrap_or(raw);
    for pair in body.split(';') {
        let Some((key, value)) = pair.split_once('=') else {
            if !pair.trim().is_empty() {
                tracing::debug!("Ignoring META entry without '=': {:?}", pair);
            }
            continue;
        };

        let key = key.trim().to_ascii_lowercase().replace('-', "_");
        let value = value.trim();
        if key.is_empty() || value.is_empty() {
            continue;
        }

        let value = value.to_string();
        match key.as_str() {
            "weather" => block.weather = Some(value),
            "title" => block.title = Some(value),
            "interval_type" => block.interval_type = Some(value),
            "source" => block.source = Some(value),
            _ => {
                block.extra.insert(key, value);
            }
        }
    }

    block
}
