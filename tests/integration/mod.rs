//! Integration tests for the hook server
//!
//! These tests drive a real TCP listener the way a test runner does: one
//! connection, one JSON line per lifecycle event, one reply line back.

pub mod helpers;
pub mod lifecycle;
pub mod ordering;
