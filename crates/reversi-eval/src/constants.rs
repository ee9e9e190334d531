//! Global constants

/// Number of squares on the Othello board.
pub const BOARD_SQUARES: usize = 64;

/// Size of a CPU cache line in bytes.
pub const CACHE_LINE_SIZE: usize = 64;

/// Value of one disc in the evaluator's fixed-point unit (centi-discs).
pub const STONE_VALUE: i32 = 100;

/// Number of empty squares on the starting position.
pub const MAX_EMPTIES: usize = 60;

/// Saturation bound for the coefficient half of a packed pattern word.
pub const COEFF_CLAMP: i32 = 0x3FFF;

/// Offset added to an accumulated potential-mobility byte before scaling.
pub const POT_MOB_ADD: i32 = 1;

/// Scale shift applied to an accumulated potential-mobility byte.
pub const POT_MOB_SHIFT: u32 = 2;
