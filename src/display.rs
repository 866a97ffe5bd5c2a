//! Frame sinks: where a flushed matrix ends up.
//!
//! A [`Display`] receives the buffer in strip order, exactly what a WS2812
//! driver would clock out. Backends that draw a picture instead (the terminal
//! preview, an HUB75 panel) map each strip index back to `(row, col)`.
//!
//! ## Rust concepts
//! - Trait objects (`Box<dyn Display>`) for runtime-selected backends
//! - `#[cfg(feature = "hardware")]` to compile hardware code only when asked
//! - Generic writers (`W: Write`) so output can be captured in tests

use crate::Color;
use crate::geometry::{self, COLS, ROWS};
use crossterm::cursor::{MoveToColumn, MoveUp};
use crossterm::queue;
use crossterm::style::{self, Print, ResetColor, SetBackgroundColor, SetForegroundColor};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

/// Something that can show a frame.
pub trait Display {
    /// Show `strip` (length [`geometry::LED_COUNT`], wiring order).
    fn present(&mut self, strip: &[Color]) -> Result<(), Box<dyn std::error::Error>>;
}

/// Which backend the binary should open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DisplayKind {
    /// Truecolor preview on the controlling terminal
    #[default]
    Terminal,
    /// Discard frames
    None,
    /// HUB75 panel through rpi-led-matrix (needs the `hardware` feature)
    Panel,
}

/// Open the backend selected by `kind`.
pub fn open(kind: DisplayKind) -> Result<Box<dyn Display>, Box<dyn std::error::Error>> {
    match kind {
        DisplayKind::Terminal => Ok(Box::new(TerminalDisplay::new(preview_writer()))),
        DisplayKind::None => Ok(Box::new(NullDisplay)),
        #[cfg(feature = "hardware")]
        DisplayKind::Panel => Ok(Box::new(panel::PanelDisplay::new()?)),
        #[cfg(not(feature = "hardware"))]
        DisplayKind::Panel => Err("panel display requires the 'hardware' feature".into()),
    }
}

/// The controlling terminal, kept apart from stderr so that with logs
/// redirected (`2>hat.log`) nothing breaks the in-place redraw.
#[cfg(unix)]
fn preview_writer() -> Box<dyn Write> {
    match std::fs::OpenOptions::new().write(true).open("/dev/tty") {
        Ok(tty) => Box::new(io::BufWriter::new(tty)),
        Err(e) => {
            tracing::warn!("No /dev/tty ({}), drawing preview on stderr", e);
            Box::new(io::stderr())
        }
    }
}

#[cfg(not(unix))]
fn preview_writer() -> Box<dyn Write> {
    Box::new(io::stderr())
}

// ── Null ─────────────────────────────────────────────────────────────

/// Drops every frame.
#[derive(Debug, Default)]
pub struct NullDisplay;

impl Display for NullDisplay {
    fn present(&mut self, _strip: &[Color]) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }
}

// ── Terminal ─────────────────────────────────────────────────────────

/// Draws the hat with upper-half-block characters, two LED rows per line.
///
/// After the first frame the cursor is moved back up so later frames
/// overwrite the previous one in place.
pub struct TerminalDisplay<W: Write> {
    out: W,
    drawn: bool,
}

impl<W: Write> TerminalDisplay<W> {
    pub fn new(out: W) -> Self {
        Self { out, drawn: false }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

fn term_color(c: Color) -> style::Color {
    style::Color::Rgb {
        r: c.r,
        g: c.g,
        b: c.b,
    }
}

impl<W: Write> Display for TerminalDisplay<W> {
    fn present(&mut self, strip: &[Color]) -> Result<(), Box<dyn std::error::Error>> {
        let mut grid = [[Color::OFF; COLS]; ROWS];
        for (idx, &c) in strip.iter().enumerate() {
            let (row, col) = geometry::to_coordinate(idx);
            grid[row][col] = c;
        }

        let lines = ROWS.div_ceil(2);
        if self.drawn {
            queue!(self.out, MoveUp(lines as u16), MoveToColumn(0))?;
        }

        for pair in grid.chunks(2) {
            for col in 0..COLS {
                let top = pair[0][col];
                let bottom = pair.get(1).map_or(Color::OFF, |r| r[col]);
                queue!(
                    self.out,
                    SetForegroundColor(term_color(top)),
                    SetBackgroundColor(term_color(bottom)),
                    Print('▀')
                )?;
            }
            queue!(self.out, ResetColor, Print('\n'))?;
        }

        self.out.flush()?;
        self.drawn = true;
        Ok(())
    }
}

// ── HUB75 panel ──────────────────────────────────────────────────────

#[cfg(feature = "hardware")]
pub mod panel {
    //! Mirror the hat onto an RGB panel driven by `rpi-led-matrix`.

    use super::Display;
    use crate::Color;
    use crate::geometry::{self, ROWS};
    use rpi_led_matrix::{LedCanvas, LedMatrix, LedMatrixOptions, LedRuntimeOptions};

    const PANEL_ROWS: u32 = 16;
    const PANEL_COLS: u32 = 64;

    /// Create a matrix configured for an Adafruit Bonnet driving a 64×16 panel.
    ///
    /// # Rust concept: Result and the ? operator
    /// Matrix initialization can fail (e.g., if not running as root, or if
    /// GPIO is unavailable). The caller uses `?` to propagate errors upward.
    pub fn create_matrix() -> Result<LedMatrix, Box<dyn std::error::Error>> {
        let mut options = LedMatrixOptions::new();
        options.set_rows(PANEL_ROWS);
        options.set_cols(PANEL_COLS);
        options.set_hardware_mapping("adafruit-hat");
        options.set_pwm_bits(8)?;
        options.set_pwm_lsb_nanoseconds(130);

        let mut rt_options = LedRuntimeOptions::new();
        rt_options.set_gpio_slowdown(2); // Pi Zero 2 W requires slowdown=2

        let matrix = LedMatrix::new(Some(options), Some(rt_options))?;
        Ok(matrix)
    }

    pub struct PanelDisplay {
        matrix: LedMatrix,
        canvas: Option<LedCanvas>,
    }

    impl PanelDisplay {
        pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
            let matrix = create_matrix()?;
            let canvas = Some(matrix.offscreen_canvas());
            Ok(Self { matrix, canvas })
        }
    }

    impl Display for PanelDisplay {
        fn present(&mut self, strip: &[Color]) -> Result<(), Box<dyn std::error::Error>> {
            let Some(mut canvas) = self.canvas.take() else {
                return Err("panel canvas lost".into());
            };
            let top = ((PANEL_ROWS as usize - ROWS) / 2) as i32;

            canvas.clear();
            for (idx, &c) in strip.iter().enumerate() {
                let (row, col) = geometry::to_coordinate(idx);
                canvas.set(col as i32, top + row as i32, &c.into());
            }
            self.canvas = Some(self.matrix.swap(canvas));
            Ok(())
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Display;
    use crate::Color;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Keeps a copy of every presented frame. Clones share the same record.
    #[derive(Clone, Debug, Default)]
    pub struct RecordingDisplay {
        frames: Rc<RefCell<Vec<Vec<Color>>>>,
    }

    impl RecordingDisplay {
        pub fn frames(&self) -> Vec<Vec<Color>> {
            self.frames.borrow().clone()
        }

        pub fn frame_count(&self) -> usize {
            self.frames.borrow().len()
        }
    }

    impl Display for RecordingDisplay {
        fn present(&mut self, strip: &[Color]) -> Result<(), Box<dyn std::error::Error>> {
            self.frames.borrow_mut().push(strip.to_vec());
            Ok(())
        }
    }
}
