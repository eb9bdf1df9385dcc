//! Record model and detail page parsing
//!
//! A [`Workout`] is the unit of export: one date, a category, at least one
//! [`Segment`], free-text fields and provenance. [`parse_workout`] builds it
//! from the HTML of a detail page.

mod meta;
mod parser;
mod types;
mod units;

pub use meta::split_meta;
pub use parser::{parse_workout, RecordParseError};
pub use types::{Category, MetaBlock, Segment, Workout, EXPORTED_FROM};
pub use units::{parse_distance_miles, parse_duration_seconds};
