//! Common type aliases used throughout the evaluator.

/// Evaluation value in centi-discs. Positive favors the side to move.
pub type Value = i32;
