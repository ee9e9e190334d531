//! Pattern-based static evaluation.
//!
//! An [`Eval`] owns the coefficient sets of one evaluator family/set pair
//! and a dispatch table from empty count to the set covering that bucket
//! and parity. Scoring gathers one packed word per pattern instance into a
//! single accumulator: coefficients sum in the high 16 bits while the
//! potential-mobility bytes of the straight-line and triangle patterns sum
//! in the low 16, so one pass over ~46 table lookups yields both the
//! pattern score and the two potential-mobility counters. Mobility and
//! parity terms are added after unpacking.
//!
//! Construction is single-threaded (the legacy-file migration rewrites on
//! disk); a built store is immutable and freely shared across search
//! threads. `evaluate` allocates nothing and cannot fail.

pub mod coeffs;
pub mod extract;
pub mod registry;
pub(crate) mod tables;

use std::path::Path;

use arrayvec::ArrayVec;

use crate::board::Board;
use crate::constants::{MAX_EMPTIES, POT_MOB_ADD, POT_MOB_SHIFT};
use crate::types::Value;
use coeffs::{
    CoeffSet, OFS_C2X5, OFS_D5, OFS_D6, OFS_D7, OFS_D8, OFS_EDGE_XX, OFS_M1, OFS_M2, OFS_PARITY,
    OFS_PM1, OFS_PM2, OFS_R1, OFS_R2, OFS_R3, OFS_R4, OFS_TRIANGLE,
};
pub use coeffs::CoeffError;
pub use extract::Features;
use tables::Tables;

/// The only evaluator family with a pattern catalogue.
pub const FAMILY_PATTERN: char = 'J';

/// Capacity of the set list: ten files times two parity subsets.
const MAX_COEFF_SETS: usize = 20;

/// Rank-to-map schedule: rows 1-4 have their own maps, rows 5-8 reuse them
/// mirrored. Columns follow the same schedule.
const ROW_OFFSETS: [usize; 8] = [
    OFS_R1, OFS_R2, OFS_R3, OFS_R4, OFS_R4, OFS_R3, OFS_R2, OFS_R1,
];

/// A loaded coefficient store.
pub struct Eval {
    sets: ArrayVec<CoeffSet, MAX_COEFF_SETS>,
    by_empty: [u8; MAX_EMPTIES + 1],
    extract_fn: unsafe fn(u64, u64) -> Features,
}

impl Eval {
    /// Loads the store for a family/set pair from
    /// `<base_dir>/coefficients/`.
    ///
    /// Legacy float files encountered along the way are rewritten in place;
    /// do not race another process over the same directory.
    pub fn load(family: char, set: char, base_dir: &Path) -> Result<Eval, CoeffError> {
        if family != FAMILY_PATTERN {
            return Err(CoeffError::UnsupportedFamily { family });
        }

        let n_files = coeffs::file_count(set);
        let set_width = MAX_EMPTIES / n_files;
        let mut sets: ArrayVec<CoeffSet, MAX_COEFF_SETS> = ArrayVec::new();
        let mut by_empty = [0u8; MAX_EMPTIES + 1];

        for file_index in 0..n_files {
            let path = coeffs::coefficient_path(base_dir, family, set, file_index);
            let subsets = coeffs::load_file(&path, set, file_index)?;
            for (subset, coeff_set) in subsets.into_iter().enumerate() {
                let set_index = sets.len() as u8;
                sets.push(coeff_set);

                let high = 59 - set_width * file_index;
                let low = high + 1 - set_width;
                for n_empty in low..=high {
                    if n_empty & 1 != subset {
                        by_empty[n_empty] = set_index;
                    }
                }
            }
        }
        // The start position has 60 empties; serve it like the deepest
        // even-parity bucket.
        by_empty[MAX_EMPTIES] = by_empty[MAX_EMPTIES - 2];

        Ok(Eval {
            sets,
            by_empty,
            extract_fn: extract::select_extract_fn(),
        })
    }

    /// The coefficient set serving `empty_count`. Total: out-of-range
    /// counts are served like the start position.
    #[inline(always)]
    pub fn pcoeffs(&self, empty_count: usize) -> &[i32] {
        let index = self.by_empty[empty_count.min(MAX_EMPTIES)] as usize;
        self.sets[index].as_slice()
    }

    /// Scores the position for the side to move, in centi-discs.
    ///
    /// `empty` and `mover` are the disjoint occupancy masks, `empty_count`
    /// is `popcount(empty)`, and the move counts are each side's legal
    /// moves. The call is allocation-free and deterministic.
    pub fn evaluate(
        &self,
        empty: u64,
        mover: u64,
        empty_count: u32,
        n_moves_mover: u32,
        n_moves_opp: u32,
    ) -> Value {
        debug_assert_eq!(empty & mover, 0, "empty and mover masks overlap");

        let features = unsafe { (self.extract_fn)(empty, mover) };
        combine(
            self.pcoeffs(empty_count as usize),
            tables::tables(),
            &features,
            empty_count,
            n_moves_mover,
            n_moves_opp,
        )
    }

    /// Position adapter: derives the masks, the empty count, and both
    /// sides' move counts from a mover-relative [`Board`].
    pub fn evaluate_board(&self, board: &Board) -> Value {
        let empty = board.get_empty();
        let n_moves_mover = board.get_moves().count();
        let n_moves_opp = board.switch_players().get_moves().count();
        self.evaluate(
            empty.bits(),
            board.player.bits(),
            empty.count(),
            n_moves_mover,
            n_moves_opp,
        )
    }
}

/// Sums the two 2x5 corner blocks and the edge-plus-X pattern of one edge,
/// given the edge's outer and inner line configurations.
#[inline(always)]
fn edge_value(c: &[i32], t: &Tables, outer: u32, inner: u32) -> i32 {
    let blocks = t.row_to_2x5[0][outer as usize] + t.row_to_2x5[1][inner as usize];
    let xx = outer * 3 + t.row_to_xx[inner as usize];
    c[OFS_C2X5 + (blocks & 0xFFFF) as usize]
        .wrapping_add(c[OFS_C2X5 + (blocks >> 16) as usize])
        .wrapping_add(c[OFS_EDGE_XX + xx as usize])
}

/// The score combiner: packed pattern sum, potential-mobility unpack, then
/// the scalar mobility and parity terms.
fn combine(
    c: &[i32],
    t: &Tables,
    f: &Features,
    empty_count: u32,
    n_moves_mover: u32,
    n_moves_opp: u32,
) -> Value {
    let mut acc: i32 = 0;

    for (i, &offset) in ROW_OFFSETS.iter().enumerate() {
        acc = acc.wrapping_add(c[offset + f.rows[i] as usize]);
        acc = acc.wrapping_add(c[offset + f.cols[i] as usize]);
    }
    for &diag in &f.d8 {
        acc = acc.wrapping_add(c[OFS_D8 + diag as usize]);
    }
    for &diag in &f.d7 {
        acc = acc.wrapping_add(c[OFS_D7 + diag as usize]);
    }
    for &diag in &f.d6 {
        acc = acc.wrapping_add(c[OFS_D6 + diag as usize]);
    }
    for &diag in &f.d5 {
        acc = acc.wrapping_add(c[OFS_D5 + diag as usize]);
    }
    for &pair in &f.triangles {
        acc = acc.wrapping_add(c[OFS_TRIANGLE + (pair & 0xFFFF) as usize]);
        acc = acc.wrapping_add(c[OFS_TRIANGLE + (pair >> 16) as usize]);
    }
    acc = acc.wrapping_add(edge_value(c, t, f.rows[0], f.rows[1]));
    acc = acc.wrapping_add(edge_value(c, t, f.rows[7], f.rows[6]));
    acc = acc.wrapping_add(edge_value(c, t, f.cols[0], f.cols[1]));
    acc = acc.wrapping_add(edge_value(c, t, f.cols[7], f.cols[6]));

    // Low 16 bits carry the two accumulated potential-mobility bytes.
    let n_pm_opp = (((acc >> 8) & 0xFF) + POT_MOB_ADD) >> POT_MOB_SHIFT;
    let n_pm_mover = ((acc & 0xFF) + POT_MOB_ADD) >> POT_MOB_SHIFT;
    let mut score = acc >> 16;

    score += c[OFS_PM1 + n_pm_mover.min(63) as usize];
    score += c[OFS_PM2 + n_pm_opp.min(63) as usize];
    score += c[OFS_M1 + n_moves_mover.min(63) as usize];
    score += c[OFS_M2 + n_moves_opp.min(63) as usize];
    score += c[OFS_PARITY + (empty_count & 1) as usize];
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::coeffs::COEFF_WORDS;

    fn zero_coeffs() -> Vec<i32> {
        vec![0i32; COEFF_WORDS]
    }

    #[test]
    fn test_combine_all_zero() {
        let c = zero_coeffs();
        let f = extract::extract(!0u64, 0);
        assert_eq!(combine(&c, tables::tables(), &f, 60, 4, 4), 0);
    }

    #[test]
    fn test_combine_isolates_scalar_terms() {
        let mut c = zero_coeffs();
        c[OFS_M1 + 5] = 21;
        c[OFS_M2 + 3] = -8;
        c[OFS_PARITY + 1] = 7;
        let f = Features::default();
        let t = tables::tables();
        assert_eq!(combine(&c, t, &f, 11, 5, 3), 21 - 8 + 7);
        // Wrong counts miss the slots.
        assert_eq!(combine(&c, t, &f, 10, 4, 4), 0);
        // Move counts clamp into the table.
        c[OFS_M1 + 63] = 100;
        assert_eq!(combine(&c, t, &f, 10, 200, 4), 100);
    }

    #[test]
    fn test_combine_unpacks_potential_mobility() {
        // A packed R1 word is read for rows 1 and 8 and columns A and H:
        // four hits of coefficient 5 with PM bytes (8, 3).
        let mut c = zero_coeffs();
        c[OFS_R1] = (5 << 16) | (8 << 8) | 3;
        c[OFS_PM1 + 3] = 70; // (4*3 + 1) >> 2
        c[OFS_PM2 + 8] = 900; // (4*8 + 1) >> 2
        let f = Features::default();
        let score = combine(&c, tables::tables(), &f, 0, 0, 0);
        assert_eq!(score, 4 * 5 + 70 + 900);
    }

    #[test]
    fn test_combine_reads_every_edge() {
        // All-default features index configuration 0 everywhere: each of
        // the four edges contributes two 2x5 blocks and one edge-plus-X.
        let mut c = zero_coeffs();
        c[OFS_C2X5] = 1 << 16;
        c[OFS_EDGE_XX] = 10 << 16;
        let f = Features::default();
        assert_eq!(combine(&c, tables::tables(), &f, 0, 0, 0), 4 * (2 + 10));
    }

    #[test]
    fn test_combine_reads_triangle_pairs() {
        let mut c = zero_coeffs();
        c[OFS_TRIANGLE] = 3 << 16;
        let f = Features::default();
        // Two packed pairs, each low and high half hitting config 0.
        assert_eq!(combine(&c, tables::tables(), &f, 0, 0, 0), 4 * 3);
    }

    #[test]
    fn test_negative_coefficients_shift_arithmetically() {
        let mut c = zero_coeffs();
        c[OFS_D8] = -9 << 16;
        let f = Features::default();
        // Both main diagonals hit config 0.
        assert_eq!(combine(&c, tables::tables(), &f, 0, 0, 0), -18);
    }
}
