//! Record data model

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Provenance tag stamped on every exported record
pub const EXPORTED_FROM: &str = "running-log";

/// Normalized exercise category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Run,
    Bike,
    Walk,
    Hike,
    Swim,
    Treadmill,
    Elliptical,
    Skiing,
    Other,
}

impl Category {
    /// Normalizes a free-form exercise tag
    ///
    /// Unrecognized tags map to [`Category::Other`].
    ///
    /// ```
    /// use runlog::Category;
    ///
    /// assert_eq!(Category::from_tag("Running"), Category::Run);
    /// assert_eq!(Category::from_tag("treadmill run"), Category::Treadmill);
    /// assert_eq!(Category::from_tag("Yoga"), Category::Other);
    /// ```
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.trim().to_ascii_lowercase();

        // More specific tags first: "treadmill run" is a treadmill session
        if tag.contains("treadmill") {
            Self::Treadmill
        } else if tag.contains("elliptical") {
            Self::Elliptical
        } else if tag.contains("ski") {
            Self::Skiing
        } else if tag.contains("swim") {
            Self::Swim
        } else if tag.contains("hike") || tag.contains("hiking") {
            Self::Hike
        } else if tag.contains("walk") {
            Self::Walk
        } else if tag.contains("bik") || tag.contains("cycl") || tag.contains("ride") {
            Self::Bike
        } else if tag.contains("run") || tag.contains("jog") || tag.contains("race") {
            Self::Run
        } else {
            Self::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Run => "Run",
            Self::Bike => "Bike",
            Self::Walk => "Walk",
            Self::Hike => "Hike",
            Self::Swim => "Swim",
            Self::Treadmill => "Treadmill",
            Self::Elliptical => "Elliptical",
            Self::Skiing => "Skiing",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a record's detail table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// 1-based position among the kept rows
    pub index: u32,
    pub distance_miles: f64,
    pub duration_seconds: u64,
    pub interval_type: Option<String>,
    pub shoes: Option<String>,
}

impl Segment {
    /// A segment with no distance and no duration
    pub fn zero(index: u32) -> Self {
        Self {
            index,
            distance_miles: 0.0,
            duration_seconds: 0,
            interval_type: None,
            shoes: None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.distance_miles == 0.0 && self.duration_seconds == 0
    }

    /// Pace in seconds per mile, if both distance and duration are known
    pub fn pace_seconds_per_mile(&self) -> Option<f64> {
        if self.distance_miles > 0.0 && self.duration_seconds > 0 {
            Some(self.duration_seconds as f64 / self.distance_miles)
        } else {
            None
        }
    }
}

/// `META:key=value;...` block embedded in a record's comments
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaBlock {
    /// The block exactly as it appeared, `META:` prefix included
    pub raw: String,
    pub weather: Option<String>,
    pub title: Option<String>,
    pub interval_type: Option<String>,
    pub source: Option<String>,
    /// Keys with no dedicated field
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// One parsed record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    pub id: u64,
    /// Start instant, carrying the source time zone's offset
    pub date: DateTime<FixedOffset>,
    pub category: Category,
    /// Raw exercise tag as shown on the page
    pub exercise_type: Option<String>,
    pub title: Option<String>,
    pub weather: Option<String>,
    /// User-visible comments, META block removed
    pub comments: Option<String>,
    pub description: Option<String>,
    pub meta: Option<MetaBlock>,
    /// Never empty
    pub segments: Vec<Segment>,
    pub total_distance_miles: f64,
    pub total_duration_seconds: u64,
    pub exported_from: String,
}

impl Workout {
    /// Calendar date of the record in the source time zone
    pub fn local_date(&self) -> NaiveDate {
        self.date.date_naive()
    }

    /// Recomputes the totals from the segments
    ///
    /// The duration total saturates at `u64::MAX`.
    pub fn update_totals(&mut self) {
        self.total_distance_miles = self.segments.iter().map(|s| s.distance_miles).sum();
        self.total_duration_seconds = self
            .segments
            .iter()
            .fold(0u64, |total, s| total.saturating_add(s.duration_seconds));
    }
}
