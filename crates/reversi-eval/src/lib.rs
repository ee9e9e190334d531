//! Static-evaluation core of an 8x8 Othello search engine.
//!
//! The crate turns a position into a centi-disc score for the side to
//! move: coefficient files are loaded and normalized once per
//! family/set pair ([`eval::Eval`]), base-3 pattern indices are extracted
//! from the `(empty, mover)` bitboard pair ([`eval::extract`]), and the
//! indexed coefficients are combined with mobility, potential-mobility,
//! and parity terms. Everything on the scoring path is integer,
//! allocation-free, and safe to share across search threads.

pub mod bitboard;
pub mod board;
pub mod constants;
pub mod disc;
pub mod eval;
pub mod square;
pub mod types;
