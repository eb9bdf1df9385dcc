//! Distance and duration text parsing

use once_cell::sync::Lazy;
use regex::Regex;

const METERS_PER_MILE: f64 = 1609.34;
const KILOMETERS_PER_MILE: f64 = 1.60934;

static DISTANCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+(?:\.\d*)?|\.\d+)\s*([A-Za-z]*)").expect("distance regex is valid")
});

/// Parses a distance such as `5.2 miles`, `10 km` or `800 meters` into miles
///
/// A bare number is taken as miles, as is any unit not recognized as
/// kilometers or meters. Returns `None` for text that does not start with a
/// number.
pub fn parse_distance_miles(text: &str) -> Option<f64> {
    let cleaned = text.replace(',', "");
    let caps = DISTANCE.captures(&cleaned)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps
        .get(2)
        .map(|m| m.as_str().to_ascii_lowercase())
        .unwrap_or_default();

    let miles = match unit.as_str() {
        "km" | "kms" | "k" => value / KILOMETERS_PER_MILE,
        u if u.starts_with("kilomet") => value / KILOMETERS_PER_MILE,
        "m" => value / METERS_PER_MILE,
        u if u.starts_with("meter") || u.starts_with("metre") => value / METERS_PER_MILE,
        _ => value,
    };

    Some(miles)
}

/// Parses `H:MM:SS` or `MM:SS` into whole seconds
///
/// Fractional seconds are truncated. Values too large to fit in `u64`
/// seconds are rejected.
pub fn parse_duration_seconds(text: &str) -> Option<u64> {
    let parts: Vec<&str> = text.trim().split(':').collect();

    let whole = |part: &str| part.trim().parse::<u64>().ok();
    let seconds = |part: &str| {
        let part = part.trim();
        part.split('.').next().and_then(|s| s.parse::<u64>().ok())
    };

    let (h, m, s) = match parts.as_slice() {
        [h, m, s] => (whole(h)?, whole(m)?, seconds(s)?),
        [m, s] => (0, whole(m)?, seconds(s)?),
        _ => return None,
    };

    h.checked_mul(3600)?
        .checked_add(m.checked_mul(60)?)?
        .checked_add(s)
}
