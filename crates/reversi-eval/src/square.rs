//! Board squares in algebraic notation.

/// A square on the Othello board, from A1 to H8.
///
/// Files (columns) run A-H, ranks (rows) run 1-8, and the discriminant is
/// the file-major bit index used by every bitboard in the crate:
///
/// ```text
///   A  B  C  D  E  F  G  H
/// 1 00 01 02 03 04 05 06 07
/// 2 08 09 10 11 12 13 14 15
/// 3 16 17 18 19 20 21 22 23
/// 4 24 25 26 27 28 29 30 31
/// 5 32 33 34 35 36 37 38 39
/// 6 40 41 42 43 44 45 46 47
/// 7 48 49 50 51 52 53 54 55
/// 8 56 57 58 59 60 61 62 63
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
#[rustfmt::skip]
pub enum Square {
    A1, B1, C1, D1, E1, F1, G1, H1,
    A2, B2, C2, D2, E2, F2, G2, H2,
    A3, B3, C3, D3, E3, F3, G3, H3,
    A4, B4, C4, D4, E4, F4, G4, H4,
    A5, B5, C5, D5, E5, F5, G5, H5,
    A6, B6, C6, D6, E6, F6, G6, H6,
    A7, B7, C7, D7, E7, F7, G7, H7,
    A8, B8, C8, D8, E8, F8, G8, H8,
}

impl Square {
    /// Returns a `u64` with only this square's bit set.
    #[inline]
    pub const fn bitboard(self) -> u64 {
        1 << self as u8
    }

    /// Returns the square's bit index as a `usize`.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// File (column) of the square, 0 = A.
    #[inline]
    pub const fn file(self) -> usize {
        self as usize & 7
    }

    /// Rank (row) of the square, 0 = rank 1.
    #[inline]
    pub const fn rank(self) -> usize {
        self as usize >> 3
    }

    /// Converts a bit index into a `Square` without bounds checking.
    #[inline]
    pub fn from_index_unchecked(index: usize) -> Square {
        debug_assert!(index < 64, "square index out of range: {index}");
        unsafe { std::mem::transmute(index as u8) }
    }

    /// Converts a bit index into a `Square`.
    #[inline]
    pub fn from_index(index: usize) -> Option<Square> {
        if index < 64 {
            Some(Square::from_index_unchecked(index))
        } else {
            None
        }
    }
}
