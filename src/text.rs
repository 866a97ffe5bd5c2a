//! Glyph and text rendering with wrap-around.
//!
//! The hat is a loop of fabric, so text running off the right edge may
//! continue at column 0. A caller bounds how far the wrapped part may reach
//! with `max_wrap`, which keeps a wrapped tail from overwriting the start of
//! the line it belongs to:
//!
//! ```text
//!                                       v column count exceeded
//! +-------------------------------------+
//! |                                     |*
//! +-------------------------------------+
//!
//!  v wrap-around, allowed while column <= max_wrap
//! +-------------------------------------+
//! |*                                    |
//! +-------------------------------------+
//! ```
//!
//! Off cells of a glyph are written as black, so drawing text also erases
//! what was under the glyph's box.

use crate::Color;
use crate::font::{Font, Glyph};
use crate::geometry::{COLS, ROWS};
use crate::matrix::Matrix;
use std::fmt;

// ── Color providers ──────────────────────────────────────────────────

/// Picks the color of each lit pixel.
pub trait ColorProvider {
    fn color_at(&self, row: usize, col: usize) -> Color;
}

/// A plain color paints every pixel the same.
impl ColorProvider for Color {
    fn color_at(&self, _row: usize, _col: usize) -> Color {
        *self
    }
}

/// Hue sweeps once around the color wheel across the width of the hat.
/// Output brightness is applied later, at flush.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rainbow;

impl ColorProvider for Rainbow {
    fn color_at(&self, _row: usize, col: usize) -> Color {
        let hue = (col * 360 / COLS) as u16;
        Color::from_hue(hue)
    }
}

/// The text color selected by `/color`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Paint {
    Solid(Color),
    Rainbow,
}

impl ColorProvider for Paint {
    fn color_at(&self, row: usize, col: usize) -> Color {
        match self {
            Self::Solid(c) => c.color_at(row, col),
            Self::Rainbow => Rainbow.color_at(row, col),
        }
    }
}

/// Same spelling `/color` and the config accept: hex digits or `rainbow`.
impl fmt::Display for Paint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Solid(c) => f.write_str(&c.to_hex()),
            Self::Rainbow => f.write_str("rainbow"),
        }
    }
}

// ── Rendering ────────────────────────────────────────────────────────

/// Draw one glyph with its top-left cell at `(row, col)`.
///
/// The glyph is walked column by column. A cell whose column passed the
/// right edge (`col + x > COLS`) and wrapped beyond `max_wrap` ends the whole
/// glyph. Cells left of column 0 and rows off the matrix are skipped.
pub fn draw_glyph(
    matrix: &mut Matrix,
    glyph: &Glyph,
    row: i32,
    col: i32,
    paint: &dyn ColorProvider,
    max_wrap: i32,
) {
    let cols = COLS as i32;

    for x in 0..glyph.width() {
        let unwrapped = col.saturating_add(x as i32);
        let wrapped = unwrapped % cols;

        if unwrapped > cols && wrapped > max_wrap {
            return;
        }
        if wrapped < 0 {
            continue;
        }

        for y in 0..glyph.height() {
            let r = row.saturating_add(y as i32);
            if !(0..ROWS as i32).contains(&r) {
                continue;
            }
            let (r, c) = (r as usize, wrapped as usize);

            let color = if glyph.is_on(x, y) {
                paint.color_at(r, c)
            } else {
                Color::OFF
            };
            matrix.set(r, c, color);
        }
    }
}

/// Draw `text` left to right starting at column `offset_x`, row `offset_y`.
///
/// Characters the font doesn't know are skipped. With `allow_wrap` the text
/// may wrap up to the column just before where it started; without it, no
/// wrapped cells past column 0 are drawn.
pub fn draw_text(
    matrix: &mut Matrix,
    font: &dyn Font,
    text: &str,
    paint: &dyn ColorProvider,
    offset_x: i32,
    offset_y: i32,
    allow_wrap: bool,
) {
    let max_wrap = if allow_wrap { offset_x.saturating_sub(1) } else { 0 };

    let mut x = offset_x;
    for glyph in text.chars().filter_map(|ch| font.glyph(ch)) {
        draw_glyph(matrix, &glyph, offset_y, x, paint, max_wrap);
        x = x.saturating_add(glyph.width() as i32);
    }
}

/// Total width in columns of `text`, skipping characters the font lacks.
pub fn text_width(font: &dyn Font, text: &str) -> i32 {
    text.chars()
        .filter_map(|ch| font.glyph(ch))
        .map(|g| g.width() as i32)
        .sum()
}
