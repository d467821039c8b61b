//! Property-based tests for the similarity and aggregation primitives.
//!
//! These check the invariants detection relies on:
//!
//! - Jaccard similarity is symmetric, bounded and reflexive
//! - Identical responses always agree fully
//! - Aggregation follows a strict majority vote
