//! Serpentine coordinate mapping between the LED strip and the logical matrix.
//!
//! The hat is one long strip folded into columns. Even columns run top to
//! bottom, odd columns run bottom to top:
//!
//! ```text
//!   col:   0    1    2    3
//! row 0:   0   15   16   31  ...
//! row 1:   1   14   17   30
//!  ...
//! row 7:   7    8   23   24
//! ```
//!
//! ## Rust concepts
//! - `const` items for fixed configuration
//! - `debug_assert!` for caller contracts that are free in release builds

/// Number of logical rows on the hat.
pub const ROWS: usize = 8;

/// Number of logical columns on the hat.
pub const COLS: usize = 64;

/// Total number of LEDs on the strip.
pub const LED_COUNT: usize = ROWS * COLS;

/// Linear strip index for a logical `(row, col)`.
///
/// Only defined for `row < ROWS` and `col < COLS`.
pub fn to_index(row: usize, col: usize) -> usize {
    debug_assert!(row < ROWS && col < COLS, "({row}, {col}) is off the matrix");

    let offset = if col % 2 == 0 { row } else { ROWS - 1 - row };
    col * ROWS + offset
}

/// Logical `(row, col)` for a linear strip index. Inverse of [`to_index`].
pub fn to_coordinate(idx: usize) -> (usize, usize) {
    debug_assert!(idx < LED_COUNT, "strip index {idx} is past the end");

    let col = idx / ROWS;
    let row = idx % ROWS;
    if col % 2 == 1 {
        (ROWS - 1 - row, col)
    } else {
        (row, col)
    }
}
