//! State module for tracking export progress
//!
//! This module owns the durable record of which identifiers have been
//! discovered, which listing pages have been mined, and which records have
//! been exported. Interrupted runs resume from it.

mod store;

// Re-export main types
pub use store::{
    PersistentState, ResetScope, StateError, StateResult, StateStore, STATE_VERSION,
};
