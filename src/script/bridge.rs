//! The typed adapter between Lua scripts and the matrix.
//!
//! [`PixelBridge`] is plain Rust with script-facing conventions (1-based
//! rows and columns, loosely typed channel values) checked at its edge.
//! [`register`] builds the Lua globals on top of it: the `Matrix` table,
//! one [`RowProxy`] userdata per row, `print` and `millis`.

use super::SuspendPoint;
use crate::Color;
use crate::capability::{Clock, Logger};
use crate::font::Font;
use crate::geometry::{COLS, ROWS};
use crate::matrix::SharedMatrix;
use crate::text;
use mlua::{Function, Lua, MetaMethod, Table, UserData, UserDataMethods, Value, Variadic};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// The single line handed from the transport to a waiting `readLine()`.
pub type LineSlot = Rc<RefCell<Option<String>>>;

/// A script coordinate outside the matrix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BridgeError {
    Row(i64),
    Column(i64),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Row(row) => write!(f, "row {row} is outside 1..={ROWS}"),
            Self::Column(col) => write!(f, "column {col} is outside 1..={COLS}"),
        }
    }
}

impl std::error::Error for BridgeError {}

/// Matrix operations as scripts see them.
pub struct PixelBridge {
    matrix: SharedMatrix,
    font: Rc<dyn Font>,
    line_slot: LineSlot,
}

impl PixelBridge {
    pub fn new(matrix: SharedMatrix, font: Rc<dyn Font>, line_slot: LineSlot) -> Self {
        Self {
            matrix,
            font,
            line_slot,
        }
    }

    fn locate(row: i64, col: i64) -> Result<(usize, usize), BridgeError> {
        if !(1..=ROWS as i64).contains(&row) {
            return Err(BridgeError::Row(row));
        }
        if !(1..=COLS as i64).contains(&col) {
            return Err(BridgeError::Column(col));
        }
        Ok(((row - 1) as usize, (col - 1) as usize))
    }

    /// `[r, g, b]` at 1-based `(row, col)`.
    pub fn pixel(&self, row: i64, col: i64) -> Result<[u8; 3], BridgeError> {
        let (r, c) = Self::locate(row, col)?;
        let color = self.matrix.borrow().get(r, c);
        Ok([color.r, color.g, color.b])
    }

    /// Set 1-based `(row, col)`; channels are clamped to `0..=255`.
    pub fn set_pixel(&self, row: i64, col: i64, rgb: [i64; 3]) -> Result<(), BridgeError> {
        let (r, c) = Self::locate(row, col)?;
        self.matrix.borrow_mut().set(r, c, to_color(rgb));
        Ok(())
    }

    pub fn clear(&self) {
        self.matrix.borrow_mut().clear();
    }

    /// Draw text with the top-left of the first glyph at column `x`, row `y`
    /// (0-based, same as the command path).
    pub fn draw_text(&self, text: &str, rgb: [i64; 3], x: i64, y: i64, allow_wrap: bool) {
        let color = to_color(rgb);
        let mut matrix = self.matrix.borrow_mut();
        text::draw_text(
            &mut matrix,
            self.font.as_ref(),
            text,
            &color,
            to_offset(x),
            to_offset(y),
            allow_wrap,
        );
    }

    /// Take the pending input line, if one has arrived.
    pub fn take_line(&self) -> Option<String> {
        self.line_slot.borrow_mut().take()
    }
}

fn to_color([r, g, b]: [i64; 3]) -> Color {
    let channel = |v: i64| v.clamp(0, 255) as u8;
    Color::new(channel(r), channel(g), channel(b))
}

/// Script offsets are clamped well inside `i32` so glyph arithmetic stays exact.
fn to_offset(v: i64) -> i32 {
    v.clamp(-(i16::MAX as i64), i16::MAX as i64) as i32
}

fn rgb_from_table(table: &Table) -> mlua::Result<[i64; 3]> {
    Ok([table.get(1)?, table.get(2)?, table.get(3)?])
}

// ── Lua bindings ─────────────────────────────────────────────────────

/// `Matrix[row]`: indexing by column reads `{r, g, b}`, assigning writes it.
///
/// Rust concept: USERDATA
/// Lua can hold Rust values as opaque userdata. The metamethods registered
/// below are the only way a script can touch the row, and each one goes
/// straight through to the bridge.
pub struct RowProxy {
    row: i64,
    bridge: Rc<PixelBridge>,
}

impl UserData for RowProxy {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Index, |lua, this, col: i64| {
            let rgb = this.bridge.pixel(this.row, col).map_err(mlua::Error::external)?;
            lua.create_sequence_from(rgb)
        });

        methods.add_meta_method(
            MetaMethod::NewIndex,
            |_, this, (col, value): (i64, Table)| {
                let rgb = rgb_from_table(&value)?;
                this.bridge
                    .set_pixel(this.row, col, rgb)
                    .map_err(mlua::Error::external)
            },
        );

        methods.add_meta_method(MetaMethod::Len, |_, _, ()| Ok(COLS as i64));
    }
}

/// Lua defined on top of the Rust bindings. The yielding functions live
/// here because a yield has to happen in Lua code, not inside a Rust
/// callback. `coroutine` is removed afterwards so these two stay the only
/// suspension points.
const PRELUDE: &str = r#"
local yield = coroutine.yield
local takeLine = Matrix._takeLine
Matrix._takeLine = nil

function Matrix.show()
    yield(SHOW_CODE)
end

function Matrix.readLine()
    while true do
        local line = takeLine()
        if line ~= nil then
            return line
        end
        yield(READ_LINE_CODE)
    end
end

coroutine = nil
"#;

/// Install the binding surface into `lua`'s globals.
pub fn register(
    lua: &Lua,
    bridge: Rc<PixelBridge>,
    clock: Rc<dyn Clock>,
    logger: Rc<dyn Logger>,
) -> mlua::Result<()> {
    let globals = lua.globals();
    let matrix = lua.create_table()?;

    for row in 1..=ROWS as i64 {
        let proxy = lua.create_userdata(RowProxy {
            row,
            bridge: Rc::clone(&bridge),
        })?;
        matrix.raw_set(row, proxy)?;
    }

    let b = Rc::clone(&bridge);
    matrix.set(
        "clear",
        lua.create_function(move |_, ()| {
            b.clear();
            Ok(())
        })?,
    )?;

    let b = Rc::clone(&bridge);
    matrix.set(
        "drawText",
        lua.create_function(
            move |_, (text, color, x, y, wrap): (String, Table, Option<i64>, Option<i64>, Option<bool>)| {
                let rgb = rgb_from_table(&color)?;
                b.draw_text(&text, rgb, x.unwrap_or(0), y.unwrap_or(0), wrap.unwrap_or(true));
                Ok(())
            },
        )?,
    )?;

    let b = Rc::clone(&bridge);
    matrix.set("_takeLine", lua.create_function(move |_, ()| Ok(b.take_line()))?)?;

    globals.set("Matrix", matrix)?;

    globals.set(
        "millis",
        lua.create_function(move |_, ()| Ok(clock.millis() as i64))?,
    )?;

    globals.set(
        "print",
        lua.create_function(move |lua, args: Variadic<Value>| {
            let tostring: Function = lua.globals().get("tostring")?;
            let parts = args
                .iter()
                .map(|v| tostring.call::<String>(v.clone()))
                .collect::<mlua::Result<Vec<_>>>()?;
            logger.log(&parts.join(" "));
            Ok(())
        })?,
    )?;

    globals.set("SHOW_CODE", SuspendPoint::Flush.code())?;
    globals.set("READ_LINE_CODE", SuspendPoint::ReadLine.code())?;
    lua.load(PRELUDE).set_name("prelude").exec()?;
    globals.raw_remove("SHOW_CODE")?;
    globals.raw_remove("READ_LINE_CODE")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::Font5x7;
    use crate::matrix::Matrix;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn bridge() -> (PixelBridge, SharedMatrix, LineSlot) {
        let matrix = Matrix::shared();
        let slot = LineSlot::default();
        let bridge = PixelBridge::new(Rc::clone(&matrix), Rc::new(Font5x7), Rc::clone(&slot));
        (bridge, matrix, slot)
    }

    #[test]
    fn coordinates_are_one_based() {
        let (bridge, matrix, _) = bridge();
        bridge.set_pixel(1, 1, [10, 20, 30]).unwrap();
        bridge.set_pixel(8, 64, [1, 2, 3]).unwrap();

        assert_eq!(matrix.borrow().get(0, 0), Color::new(10, 20, 30));
        assert_eq!(matrix.borrow().get(7, 63), Color::new(1, 2, 3));
        assert_eq!(bridge.pixel(8, 64), Ok([1, 2, 3]));
    }

    #[rstest]
    #[case(0, 1, BridgeError::Row(0))]
    #[case(9, 1, BridgeError::Row(9))]
    #[case(1, 0, BridgeError::Column(0))]
    #[case(1, 65, BridgeError::Column(65))]
    #[case(-3, 1, BridgeError::Row(-3))]
    fn out_of_range_is_rejected(#[case] row: i64, #[case] col: i64, #[case] err: BridgeError) {
        let (bridge, matrix, _) = bridge();
        assert_eq!(bridge.pixel(row, col), Err(err.clone()));
        assert_eq!(bridge.set_pixel(row, col, [1, 1, 1]), Err(err));
        assert_eq!(*matrix.borrow(), Matrix::new());
    }

    #[test]
    fn channels_are_clamped() {
        let (bridge, _, _) = bridge();
        bridge.set_pixel(2, 2, [-5, 300, 128]).unwrap();
        assert_eq!(bridge.pixel(2, 2), Ok([0, 255, 128]));
    }

    #[test]
    fn clear_turns_everything_off() {
        let (bridge, matrix, _) = bridge();
        matrix.borrow_mut().fill(Color::new(5, 5, 5));
        bridge.clear();
        assert_eq!(*matrix.borrow(), Matrix::new());
    }

    #[test]
    fn draw_text_uses_zero_based_offsets() {
        let (bridge, matrix, _) = bridge();
        bridge.draw_text("I", [0, 0, 255], 0, 0, false);
        // 'I' middle column is 0x7F: rows 0..=6 at column 2
        assert_eq!(matrix.borrow().get(0, 2), Color::new(0, 0, 255));
        assert_eq!(matrix.borrow().get(0, 0), Color::OFF);
    }

    #[test]
    fn take_line_drains_the_slot() {
        let (bridge, _, slot) = bridge();
        assert_eq!(bridge.take_line(), None);
        *slot.borrow_mut() = Some("hello".to_string());
        assert_eq!(bridge.take_line(), Some("hello".to_string()));
        assert_eq!(bridge.take_line(), None);
    }

    #[test]
    fn error_messages_name_the_range() {
        assert_eq!(BridgeError::Column(65).to_string(), "column 65 is outside 1..=64");
        assert_eq!(BridgeError::Row(0).to_string(), "row 0 is outside 1..=8");
    }
}
