//! The pixel buffer behind the hat.
//!
//! [`Matrix`] stores colors in strip (wiring) order so a flush can hand the
//! buffer to the LED driver as-is, and exposes logical `(row, col)` access on
//! top of it through [`crate::geometry`].
//!
//! ## Rust concepts
//! - `Rc<RefCell<T>>` for single-threaded shared mutation ([`SharedMatrix`])
//! - `Cow` to avoid copying the frame when no brightness scaling is needed

use crate::Color;
use crate::display::Display;
use crate::geometry::{self, LED_COUNT};
use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;

/// The matrix as shared by the script bridge and the command handlers.
///
/// Rust concept: Rc<RefCell<T>>
/// Everything runs on one thread, so there's no lock: `RefCell` checks
/// borrows at runtime and `Rc` is `!Send`, which keeps this from being
/// moved to another thread by accident.
pub type SharedMatrix = Rc<RefCell<Matrix>>;

/// Fixed-size color buffer for the whole hat.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Matrix {
    leds: [Color; LED_COUNT],
}

impl Matrix {
    pub fn new() -> Self {
        Self {
            leds: [Color::OFF; LED_COUNT],
        }
    }

    /// Wrap a fresh matrix for sharing.
    pub fn shared() -> SharedMatrix {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Color at `(row, col)`. Coordinates must be on the matrix.
    pub fn get(&self, row: usize, col: usize) -> Color {
        self.leds[geometry::to_index(row, col)]
    }

    /// Set the color at `(row, col)`. Coordinates must be on the matrix.
    pub fn set(&mut self, row: usize, col: usize, color: Color) {
        self.leds[geometry::to_index(row, col)] = color;
    }

    /// Turn every LED off.
    pub fn clear(&mut self) {
        self.fill(Color::OFF);
    }

    pub fn fill(&mut self, color: Color) {
        self.leds = [color; LED_COUNT];
    }

    /// The buffer in strip order, as the LED driver expects it.
    pub fn strip(&self) -> &[Color] {
        &self.leds
    }

    /// Present the current frame on `display`, scaled by `brightness` (0-100).
    pub fn flush(
        &self,
        display: &mut dyn Display,
        brightness: u8,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let frame: Cow<'_, [Color]> = if brightness >= 100 {
            Cow::Borrowed(self.strip())
        } else {
            Cow::Owned(
                self.strip()
                    .iter()
                    .map(|c| c.apply_brightness(brightness))
                    .collect(),
            )
        };
        display.present(&frame)
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::testing::RecordingDisplay;
    use crate::geometry::{COLS, ROWS};
    use pretty_assertions::assert_eq;

    #[test]
    fn new_matrix_is_dark() {
        let matrix = Matrix::new();
        assert!(matrix.strip().iter().all(|&c| c == Color::OFF));
    }

    #[test]
    fn set_then_get_round_trips_everywhere() {
        let mut matrix = Matrix::new();
        for row in 0..ROWS {
            for col in 0..COLS {
                let c = Color::new(row as u8, col as u8, (row * col) as u8);
                matrix.set(row, col, c);
                assert_eq!(matrix.get(row, col), c);
            }
        }
    }

    #[test]
    fn set_writes_strip_in_wiring_order() {
        let mut matrix = Matrix::new();
        let red = Color::new(255, 0, 0);
        matrix.set(0, 1, red);
        assert_eq!(matrix.strip()[15], red);
        assert_eq!(matrix.strip()[8], Color::OFF);
    }

    #[test]
    fn clear_turns_everything_off() {
        let mut matrix = Matrix::new();
        matrix.fill(Color::new(1, 2, 3));
        matrix.clear();
        assert_eq!(matrix, Matrix::new());
    }

    #[test]
    fn flush_applies_brightness() {
        let mut matrix = Matrix::new();
        matrix.set(0, 0, Color::new(200, 100, 50));
        let mut display = RecordingDisplay::default();

        matrix.flush(&mut display, 50).unwrap();
        matrix.flush(&mut display, 100).unwrap();

        let frames = display.frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0][0], Color::new(100, 50, 25));
        assert_eq!(frames[1][0], Color::new(200, 100, 50));
    }
}
