//! Property-based tests for the stateful pieces of a session.
//!
//! - Table descriptions carry one detail line per column
//! - Fence stripping is idempotent and leaves no fences behind
//! - History windows are suffixes bounded by the window size
//! - Usage totals are additive over recorded turns
//! - Context selection describes exactly the named, visible variables
