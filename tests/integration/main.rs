//! Integration tests for Runlog
//!
//! These tests use wiremock to create mock HTTP servers and test the
//! fetch, discovery and export cycle end-to-end.

mod common;
mod export_tests;
