//! Driver for a wearable 8×64 LED matrix hat.
//!
//! The hat is a single serpentine-wired LED strip. This crate provides:
//! - The coordinate mapping and pixel buffer ([`geometry`], [`matrix`])
//! - Glyph and text rendering with wrap-around ([`font`], [`text`])
//! - A tick-driven text scroller ([`scroll`])
//! - A cooperative Lua runtime that scripts the matrix ([`script`])
//! - The line-oriented command front end tying it together ([`hat`])
//!
//! Everything runs on one thread. The main loop feeds transport input to
//! [`hat::Hat::handle_line`] and calls [`hat::Hat::tick`] on a fixed interval.

pub mod capability;
pub mod command;
pub mod config;
pub mod display;
pub mod font;
pub mod geometry;
pub mod hat;
pub mod matrix;
pub mod script;
pub mod scroll;
pub mod snapshot;
pub mod store;
pub mod text;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

// ── Color ──────────────────────────────────────────────────────────

/// One LED: three 8-bit channels, no alpha.
///
/// # Rust concept: derive macros
/// `Clone, Copy` make this cheaply copyable (it's just three bytes).
/// `Default` gives us black, which is also "off" for an LED.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    /// All channels off.
    pub const OFF: Color = Color { r: 0, g: 0, b: 0 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a 6-hex-digit color such as `"02AB3F"` (a leading `#` is allowed).
    ///
    /// Two digits per channel, in red, green, blue order.
    pub fn from_hex(text: &str) -> Result<Self, ColorParseError> {
        let digits = text.trim().trim_start_matches('#');
        if digits.len() != 6 {
            return Err(ColorParseError::Length(digits.len()));
        }
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ColorParseError::NotHex(digits.to_string()));
        }

        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16);
        match (channel(0), channel(2), channel(4)) {
            (Ok(r), Ok(g), Ok(b)) => Ok(Self::new(r, g, b)),
            _ => Err(ColorParseError::NotHex(digits.to_string())),
        }
    }

    /// Format as six lowercase hex digits, the inverse of [`Color::from_hex`].
    pub fn to_hex(self) -> String {
        format!("{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Create a color from a hue value (0-360), with full saturation and brightness.
    ///
    /// # Rust concept: match expressions
    /// Rust's `match` is exhaustive — the compiler ensures we handle all cases.
    pub fn from_hue(hue: u16) -> Self {
        let hue = hue % 360;
        let sector = hue / 60;
        let fraction = ((hue % 60) as f32) / 60.0;
        let rising = (fraction * 255.0) as u8;
        let falling = ((1.0 - fraction) * 255.0) as u8;

        match sector {
            0 => Self::new(255, rising, 0),  // Red → Yellow
            1 => Self::new(falling, 255, 0), // Yellow → Green
            2 => Self::new(0, 255, rising),  // Green → Cyan
            3 => Self::new(0, falling, 255), // Cyan → Blue
            4 => Self::new(rising, 0, 255),  // Blue → Magenta
            5 => Self::new(255, 0, falling), // Magenta → Red
            _ => Self::new(255, 0, 0),       // Unreachable, but Rust requires exhaustiveness
        }
    }

    /// Apply brightness scaling (0-100) to this color.
    pub fn apply_brightness(self, brightness: u8) -> Self {
        if brightness >= 100 {
            return self;
        }
        Self {
            r: ((self.r as u16 * brightness as u16) / 100) as u8,
            g: ((self.g as u16 * brightness as u16) / 100) as u8,
            b: ((self.b as u16 * brightness as u16) / 100) as u8,
        }
    }
}

/// Why a hex color string was rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColorParseError {
    /// Wrong number of hex digits.
    Length(usize),
    /// Contains something other than hex digits.
    NotHex(String),
}

impl fmt::Display for ColorParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Length(n) => write!(f, "expected 6 hex digits, got {n}"),
            Self::NotHex(text) => write!(f, "'{text}' is not a hex color"),
        }
    }
}

impl std::error::Error for ColorParseError {}

/// Convert our Color to the hardware crate's LedColor at the boundary.
#[cfg(feature = "hardware")]
impl From<Color> for rpi_led_matrix::LedColor {
    fn from(c: Color) -> Self {
        rpi_led_matrix::LedColor {
            red: c.r,
            green: c.g,
            blue: c.b,
        }
    }
}

// ── Shutdown ───────────────────────────────────────────────────────

/// Set up a Ctrl+C handler that sets `running` to false.
///
/// # Rust concept: Arc and AtomicBool
/// The signal handler runs on its own thread, so the flag it shares with
/// the main loop must be thread-safe even though everything else is not.
pub fn setup_signal_handler() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl-C handler");

    running
}

/// Check if the main loop should keep running.
pub fn is_running(running: &AtomicBool) -> bool {
    running.load(Ordering::SeqCst)
}

// ── Tests ──────────────────────────────────────────────────────────
