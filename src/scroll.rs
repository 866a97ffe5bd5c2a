//! Scrolling text in from the right edge and out past the left.
//!
//! [`ScrollAnimation`] is the frame-by-frame state machine; each `step`
//! renders one frame. [`ScrollAnimator`] paces an animation against the
//! scheduler clock so the main loop is never blocked. [`scroll_blocking`]
//! runs a whole animation in one call for use outside the scheduler.
//!
//! ## Rust concepts
//! - Enums as explicit state machines
//! - `Option<T>` for "maybe running" state

use crate::display::Display;
use crate::font::Font;
use crate::geometry::COLS;
use crate::matrix::Matrix;
use crate::text::{self, ColorProvider};
use std::thread;
use std::time::Duration;

/// Row the scrolling text is drawn on.
const SCROLL_ROW: i32 = 1;

/// Result of one [`ScrollAnimation::step`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScrollStep {
    /// A frame was rendered into the matrix and should be presented.
    Frame,
    /// The text has left the matrix; nothing was rendered.
    Done,
}

/// One pass of `text` across the matrix.
///
/// Starts with the text just past the right edge (offset `COLS`) and ends
/// once offset `-width` has been drawn: `COLS + width + 1` frames in total.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScrollAnimation {
    text: String,
    offset: i32,
    end: i32,
}

impl ScrollAnimation {
    pub fn new(font: &dyn Font, text: impl Into<String>) -> Self {
        let text = text.into();
        let width = text::text_width(font, &text);
        Self {
            text,
            offset: COLS as i32,
            end: -width,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_done(&self) -> bool {
        self.offset < self.end
    }

    /// Clear the matrix and draw the next frame.
    pub fn step(
        &mut self,
        matrix: &mut Matrix,
        font: &dyn Font,
        paint: &dyn ColorProvider,
    ) -> ScrollStep {
        if self.is_done() {
            return ScrollStep::Done;
        }

        matrix.clear();
        text::draw_text(matrix, font, &self.text, paint, self.offset, SCROLL_ROW, false);
        self.offset -= 1;
        ScrollStep::Frame
    }
}

/// What [`ScrollAnimator::tick`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScrollTick {
    /// No animation is running.
    Idle,
    /// An animation is running but its next frame isn't due yet.
    Waiting,
    /// A frame was rendered and should be presented.
    Frame,
    /// The animation just ended; the matrix was not touched.
    Finished,
}

/// Runs at most one [`ScrollAnimation`], one frame per elapsed step delay.
#[derive(Debug)]
pub struct ScrollAnimator {
    current: Option<ScrollAnimation>,
    step_delay_ms: u64,
    next_frame_at: u64,
}

impl ScrollAnimator {
    pub fn new(step_delay_ms: u64) -> Self {
        Self {
            current: None,
            step_delay_ms,
            next_frame_at: 0,
        }
    }

    /// Start scrolling `animation`, replacing whatever was running. The
    /// first frame is due on the next tick.
    pub fn start(&mut self, animation: ScrollAnimation, now_ms: u64) {
        if let Some(old) = self.current.replace(animation) {
            tracing::debug!("Replacing scroll of {:?}", old.text());
        }
        self.next_frame_at = now_ms;
    }

    pub fn stop(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<&ScrollAnimation> {
        self.current.as_ref()
    }

    pub fn step_delay_ms(&self) -> u64 {
        self.step_delay_ms
    }

    pub fn set_step_delay_ms(&mut self, ms: u64) {
        self.step_delay_ms = ms;
    }

    /// Render the next frame if one is due at `now_ms`.
    pub fn tick(
        &mut self,
        now_ms: u64,
        matrix: &mut Matrix,
        font: &dyn Font,
        paint: &dyn ColorProvider,
    ) -> ScrollTick {
        let Some(animation) = self.current.as_mut() else {
            return ScrollTick::Idle;
        };
        if now_ms < self.next_frame_at {
            return ScrollTick::Waiting;
        }

        match animation.step(matrix, font, paint) {
            ScrollStep::Frame => {
                self.next_frame_at = now_ms.saturating_add(self.step_delay_ms);
                ScrollTick::Frame
            }
            ScrollStep::Done => {
                self.current = None;
                ScrollTick::Finished
            }
        }
    }
}

/// Scroll `text` across the matrix once, presenting every frame and
/// sleeping `delay` between them. Blocks the calling thread throughout.
///
/// Returns the number of frames presented.
pub fn scroll_blocking(
    matrix: &mut Matrix,
    display: &mut dyn Display,
    font: &dyn Font,
    text: &str,
    paint: &dyn ColorProvider,
    delay: Duration,
    brightness: u8,
) -> Result<usize, Box<dyn std::error::Error>> {
    let mut animation = ScrollAnimation::new(font, text);
    let mut frames = 0;

    while animation.step(matrix, font, paint) == ScrollStep::Frame {
        matrix.flush(display, brightness)?;
        frames += 1;
        thread::sleep(delay);
    }
    Ok(frames)
}
