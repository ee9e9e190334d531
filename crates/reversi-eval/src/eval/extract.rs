//! Feature extraction: occupancy masks to base-3 pattern indices.
//!
//! The hot path gathers rows, columns, diagonals of lengths 5 through 8,
//! and the packed corner-triangle indices from the `(empty, mover)` pair.
//! Rows fall out of a shift and a table lookup; everything else needs a bit
//! gather. Two interchangeable gather strategies exist:
//!
//! - the portable magic multiplier: `((v & mask) * multiplier) >> shift`
//!   scrambles the masked bits so the wanted sequence surfaces in the high
//!   bits of the product;
//! - hardware parallel bit extract (BMI2 `pext`), selected at store
//!   construction when the CPU has it.
//!
//! Both produce identical [`Features`] records.

use cfg_if::cfg_if;

use crate::eval::tables::{self, BASE2_TO_BASE3};

/// Base-3 pattern indices for one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Features {
    /// Row indices, rank 1 first; digit 0 is the A file.
    pub rows: [u32; 8],
    /// Column indices, file A first; digit 0 is rank 1.
    pub cols: [u32; 8],
    /// Main diagonals: A1-H8, then H1-A8 in reverse digit order (A8 is
    /// digit 0).
    pub d8: [u32; 2],
    /// Length-7 diagonals: B1-H7, A2-G8, G1-A7, H2-B8.
    pub d7: [u32; 4],
    /// Length-6 diagonals: C1-H6, A3-F8, F1-A6, H3-C8.
    pub d6: [u32; 4],
    /// Length-5 diagonals: D1-H5, A4-E8, E1-A5, H4-D8.
    pub d5: [u32; 4],
    /// Corner-triangle index pairs, top then bottom; the left corner sits
    /// in the low 16 bits, the mirrored right corner in the high 16.
    pub triangles: [u32; 2],
}

/// Start bits and steps of the diagonal gathers, longest first. Step 9
/// diagonals run toward H8, step 7 toward A8.
const DIAG7: [(u32, u32); 4] = [(1, 9), (8, 9), (6, 7), (15, 7)];
const DIAG6: [(u32, u32); 4] = [(2, 9), (16, 9), (5, 7), (23, 7)];
const DIAG5: [(u32, u32); 4] = [(3, 9), (24, 9), (4, 7), (31, 7)];

/// Mask with `count` bits set starting at `start`, `step` apart.
pub(crate) const fn repeated_bit(start: u32, count: u32, step: u32) -> u64 {
    let mut value = 0u64;
    let mut i = 0;
    while i < count {
        value |= 1 << (start + i * step);
        i += 1;
    }
    value
}

/// Magic-multiply bit gather: bits `start, start + step, ...` of `v`, in
/// order, as the low `count` bits of the result.
///
/// Requires `count <= step`: the partial products of the masked value and
/// the step-minus-one comb then land at pairwise distinct positions, so no
/// carry disturbs the top `count` bits.
#[inline(always)]
fn gather(v: u64, start: u32, count: u32, step: u32) -> u64 {
    let masked = v & repeated_bit(start, count, step);
    let product = masked.wrapping_mul(repeated_bit(0, count, step - 1));
    (product << (63 - start - (count - 1) * step)) >> (64 - count)
}

/// The H1-A8 anti-diagonal has step 7 < count 8, which the generic gather
/// cannot do; the reverse gather works and leaves the bits in descending
/// board order (digit 0 = A8, digit 7 = H1).
#[inline(always)]
fn gather_anti_diagonal(v: u64) -> u64 {
    (v & repeated_bit(7, 8, 7)).wrapping_mul(repeated_bit(0, 8, 8)) >> 56
}

/// Combines two gathered bit strings into a base-3 pattern index.
#[inline(always)]
fn pattern(empty_bits: u64, mover_bits: u64) -> u32 {
    BASE2_TO_BASE3[empty_bits as usize] + 2 * BASE2_TO_BASE3[mover_bits as usize]
}

#[inline(always)]
fn compose_triangles(rows: &[u32; 8]) -> [u32; 2] {
    let t = tables::tables();
    [
        t.row_to_triangle[0][rows[0] as usize]
            + t.row_to_triangle[1][rows[1] as usize]
            + t.row_to_triangle[2][rows[2] as usize]
            + t.row_to_triangle[3][rows[3] as usize],
        t.row_to_triangle[0][rows[7] as usize]
            + t.row_to_triangle[1][rows[6] as usize]
            + t.row_to_triangle[2][rows[5] as usize]
            + t.row_to_triangle[3][rows[4] as usize],
    ]
}

/// Extracts all pattern indices with the portable magic-multiplier gathers.
pub fn extract(empty: u64, mover: u64) -> Features {
    debug_assert_eq!(empty & mover, 0, "empty and mover masks overlap");

    let mut f = Features::default();
    for rank in 0..8 {
        f.rows[rank] = pattern((empty >> (8 * rank)) & 0xFF, (mover >> (8 * rank)) & 0xFF);
    }
    for file in 0..8u32 {
        f.cols[file as usize] = pattern(gather(empty, file, 8, 8), gather(mover, file, 8, 8));
    }
    f.d8[0] = pattern(gather(empty, 0, 8, 9), gather(mover, 0, 8, 9));
    f.d8[1] = pattern(gather_anti_diagonal(empty), gather_anti_diagonal(mover));
    for (i, &(start, step)) in DIAG7.iter().enumerate() {
        f.d7[i] = pattern(gather(empty, start, 7, step), gather(mover, start, 7, step));
    }
    for (i, &(start, step)) in DIAG6.iter().enumerate() {
        f.d6[i] = pattern(gather(empty, start, 6, step), gather(mover, start, 6, step));
    }
    for (i, &(start, step)) in DIAG5.iter().enumerate() {
        f.d5[i] = pattern(gather(empty, start, 5, step), gather(mover, start, 5, step));
    }
    f.triangles = compose_triangles(&f.rows);
    f
}

/// Wrapper matching the signature of the runtime-dispatched paths.
pub(crate) unsafe fn extract_scalar_wrapper(empty: u64, mover: u64) -> Features {
    extract(empty, mover)
}

cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        /// BMI2 parallel-bit-extract path. Same contract as [`extract`].
        #[target_feature(enable = "bmi2")]
        pub(crate) unsafe fn extract_bmi2(empty: u64, mover: u64) -> Features {
            use std::arch::x86_64::_pext_u64;

            debug_assert_eq!(empty & mover, 0, "empty and mover masks overlap");

            // pext returns ascending board order; the anti-diagonal must be
            // reversed to match the magic gather's digit order.
            #[inline(always)]
            fn reverse8(bits: u64) -> u64 {
                bits.reverse_bits() >> 56
            }

            unsafe {
                let mut f = Features::default();
                for rank in 0..8 {
                    f.rows[rank] =
                        pattern((empty >> (8 * rank)) & 0xFF, (mover >> (8 * rank)) & 0xFF);
                }
                for file in 0..8u32 {
                    let mask = repeated_bit(file, 8, 8);
                    f.cols[file as usize] =
                        pattern(_pext_u64(empty, mask), _pext_u64(mover, mask));
                }
                let main = repeated_bit(0, 8, 9);
                f.d8[0] = pattern(_pext_u64(empty, main), _pext_u64(mover, main));
                let anti = repeated_bit(7, 8, 7);
                f.d8[1] = pattern(
                    reverse8(_pext_u64(empty, anti)),
                    reverse8(_pext_u64(mover, anti)),
                );
                for (i, &(start, step)) in DIAG7.iter().enumerate() {
                    let mask = repeated_bit(start, 7, step);
                    f.d7[i] = pattern(_pext_u64(empty, mask), _pext_u64(mover, mask));
                }
                for (i, &(start, step)) in DIAG6.iter().enumerate() {
                    let mask = repeated_bit(start, 6, step);
                    f.d6[i] = pattern(_pext_u64(empty, mask), _pext_u64(mover, mask));
                }
                for (i, &(start, step)) in DIAG5.iter().enumerate() {
                    let mask = repeated_bit(start, 5, step);
                    f.d5[i] = pattern(_pext_u64(empty, mask), _pext_u64(mover, mask));
                }
                f.triangles = compose_triangles(&f.rows);
                f
            }
        }
    }
}

/// Picks the gather implementation for this CPU, once per store.
pub(crate) fn select_extract_fn() -> unsafe fn(u64, u64) -> Features {
    #[cfg(target_arch = "x86_64")]
    if is_x86_feature_detected!("bmi2") {
        return extract_bmi2;
    }
    extract_scalar_wrapper
}
