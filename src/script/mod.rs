//! Cooperative Lua runtime.
//!
//! One Lua state lives for the whole process. A submitted script becomes the
//! single execution unit, a Lua thread resumed once per scheduler tick by
//! [`ScriptRuntime::advance`]. Scripts give control back at exactly two
//! places:
//!
//! - `Matrix.show()` — the frame is ready to present ([`SuspendPoint::Flush`])
//! - `Matrix.readLine()` — waiting for a line of input ([`SuspendPoint::ReadLine`])
//!
//! ```text
//!            submit                 advance: yield
//!   Idle ───────────▶ Running ─────────────────────▶ Suspended
//!    ▲                  │  ▲                            │
//!    │  finish / error  │  └──────── advance ───────────┘
//!    └──────────────────┘
//! ```
//!
//! Submitting while a unit is active drops the old unit on the spot; it is
//! never resumed again.
//!
//! ## Script API
//! ```lua
//! Matrix[row][col] = {r, g, b}    -- rows 1..8, columns 1..64
//! local rgb = Matrix[row][col]
//! Matrix.clear()
//! Matrix.drawText("hi", {0, 8, 0}, x, y, allowWrap)
//! Matrix.show()                   -- present and wait for the next tick
//! local line = Matrix.readLine()
//! print(...)
//! millis()
//! ```

pub mod bridge;

pub use bridge::{BridgeError, LineSlot, PixelBridge};

use crate::capability::{Clock, Logger};
use crate::font::Font;
use crate::matrix::SharedMatrix;
use mlua::{Lua, Thread, ThreadStatus, Value};
use serde::Serialize;
use std::rc::Rc;

/// Where a suspended script is parked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspendPoint {
    /// `Matrix.show()`: present the matrix, resume on the next tick.
    Flush,
    /// `Matrix.readLine()`: resume once a line is delivered.
    ReadLine,
}

impl SuspendPoint {
    /// The value the Lua side yields for this point.
    fn code(self) -> i64 {
        match self {
            Self::Flush => 1,
            Self::ReadLine => 2,
        }
    }

    fn from_yielded(value: &Value) -> Self {
        match value {
            Value::Integer(2) => Self::ReadLine,
            _ => Self::Flush,
        }
    }
}

/// Observable runtime state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptState {
    Idle,
    /// Submitted and not yet parked at a suspension point.
    Running,
    Suspended(SuspendPoint),
}

/// Outcome of one [`ScriptRuntime::advance`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Advance {
    /// Nothing to run.
    Idle,
    /// The unit yielded at this point and is waiting for the next advance.
    Suspended(SuspendPoint),
    /// The unit ran to completion.
    Finished,
    /// The unit failed to load or raised an error; it has been reported.
    Failed,
}

enum Unit {
    Idle,
    /// Source waiting for its first advance, where it gets compiled.
    Loaded { name: String, source: String },
    Active { thread: Thread, waiting_on: SuspendPoint },
}

/// Owner of the Lua state and the current execution unit.
pub struct ScriptRuntime {
    lua: Lua,
    unit: Unit,
    logger: Rc<dyn Logger>,
    line_slot: LineSlot,
}

impl ScriptRuntime {
    /// Create the Lua state and install the script API.
    pub fn new(
        matrix: SharedMatrix,
        font: Rc<dyn Font>,
        clock: Rc<dyn Clock>,
        logger: Rc<dyn Logger>,
    ) -> mlua::Result<Self> {
        let lua = Lua::new();
        let line_slot = LineSlot::default();
        let bridge = Rc::new(PixelBridge::new(matrix, font, Rc::clone(&line_slot)));
        bridge::register(&lua, bridge, clock, Rc::clone(&logger))?;

        tracing::debug!("Lua runtime ready");
        Ok(Self {
            lua,
            unit: Unit::Idle,
            logger,
            line_slot,
        })
    }

    pub fn state(&self) -> ScriptState {
        match &self.unit {
            Unit::Idle => ScriptState::Idle,
            Unit::Loaded { .. } => ScriptState::Running,
            Unit::Active { waiting_on, .. } => ScriptState::Suspended(*waiting_on),
        }
    }

    /// Replace the current unit with `source`. Compilation waits for the
    /// next [`advance`](Self::advance). A line nobody read is dropped; the
    /// new script only sees input that arrives after it.
    pub fn submit(&mut self, name: &str, source: impl Into<String>) {
        if !matches!(self.unit, Unit::Idle) {
            tracing::debug!("Discarding unfinished script for {:?}", name);
        }
        if let Some(old) = self.line_slot.borrow_mut().take() {
            tracing::debug!("Unread input line dropped: {:?}", old);
        }
        self.unit = Unit::Loaded {
            name: name.to_string(),
            source: source.into(),
        };
    }

    /// Drop the current unit without running it further.
    pub fn stop(&mut self) {
        self.unit = Unit::Idle;
    }

    /// Hand a line of input to the script. Replaces a line nobody read yet.
    pub fn deliver_line(&self, line: impl Into<String>) {
        if let Some(old) = self.line_slot.borrow_mut().replace(line.into()) {
            tracing::debug!("Unread input line dropped: {:?}", old);
        }
    }

    /// Run the current unit until it yields, finishes or fails.
    pub fn advance(&mut self) -> Advance {
        let thread = match std::mem::replace(&mut self.unit, Unit::Idle) {
            Unit::Idle => return Advance::Idle,
            Unit::Loaded { name, source } => match self.load(&name, &source) {
                Ok(thread) => {
                    tracing::debug!("Started script {:?}", name);
                    thread
                }
                Err(e) => return self.fail(e),
            },
            Unit::Active { thread, .. } => thread,
        };

        match thread.resume::<Value>(()) {
            Ok(yielded) if thread.status() == ThreadStatus::Resumable => {
                let point = SuspendPoint::from_yielded(&yielded);
                self.unit = Unit::Active {
                    thread,
                    waiting_on: point,
                };
                Advance::Suspended(point)
            }
            Ok(_) => {
                tracing::debug!("Script finished");
                Advance::Finished
            }
            Err(e) => self.fail(e),
        }
    }

    fn load(&self, name: &str, source: &str) -> mlua::Result<Thread> {
        let chunk = self.lua.load(source).set_name(name).into_function()?;
        self.lua.create_thread(chunk)
    }

    fn fail(&mut self, err: mlua::Error) -> Advance {
        tracing::warn!("Script error: {}", err);
        self.logger.log(&format!("Error: {err}"));
        self.unit = Unit::Idle;
        Advance::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Color;
    use crate::capability::testing::{ManualClock, RecordingLogger};
    use crate::font::Font5x7;
    use crate::matrix::Matrix;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    struct Fixture {
        runtime: ScriptRuntime,
        matrix: SharedMatrix,
        logger: Rc<RecordingLogger>,
        clock: Rc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let matrix = Matrix::shared();
        let logger = Rc::new(RecordingLogger::default());
        let clock = Rc::new(ManualClock::default());
        let runtime = ScriptRuntime::new(
            Rc::clone(&matrix),
            Rc::new(Font5x7),
            clock.clone(),
            logger.clone(),
        )
        .unwrap();
        Fixture {
            runtime,
            matrix,
            logger,
            clock,
        }
    }

    #[test]
    fn advance_when_idle_does_nothing() {
        let mut f = fixture();
        assert_eq!(f.runtime.state(), ScriptState::Idle);
        assert_eq!(f.runtime.advance(), Advance::Idle);
    }

    #[test]
    fn print_goes_to_logger() {
        let mut f = fixture();
        f.runtime.submit("hello", "print('hi', 1, true, nil)");
        assert_eq!(f.runtime.state(), ScriptState::Running);

        assert_eq!(f.runtime.advance(), Advance::Finished);
        assert_eq!(f.logger.lines(), vec!["hi 1 true nil"]);
        assert_eq!(f.runtime.state(), ScriptState::Idle);
    }

    #[test]
    fn show_suspends_until_next_advance() {
        let mut f = fixture();
        f.runtime.submit(
            "two-frames",
            "Matrix[1][1] = {255, 0, 0}\nMatrix.show()\nMatrix[1][2] = {0, 255, 0}",
        );

        assert_eq!(f.runtime.advance(), Advance::Suspended(SuspendPoint::Flush));
        assert_eq!(f.runtime.state(), ScriptState::Suspended(SuspendPoint::Flush));
        assert_eq!(f.matrix.borrow().get(0, 0), Color::new(255, 0, 0));
        assert_eq!(f.matrix.borrow().get(0, 1), Color::OFF);

        assert_eq!(f.runtime.advance(), Advance::Finished);
        assert_eq!(f.matrix.borrow().get(0, 1), Color::new(0, 255, 0));
    }

    #[test]
    fn rows_read_back_as_triples() {
        let mut f = fixture();
        f.matrix.borrow_mut().set(2, 4, Color::new(7, 8, 9));
        f.runtime.submit("read", "local p = Matrix[3][5]\nprint(p[1], p[2], p[3], #Matrix[3])");

        assert_eq!(f.runtime.advance(), Advance::Finished);
        assert_eq!(f.logger.lines(), vec!["7 8 9 64"]);
    }

    #[test]
    fn loop_with_show_runs_one_iteration_per_advance() {
        let mut f = fixture();
        f.runtime.submit(
            "counter",
            "for i = 1, 3 do\n  Matrix[1][i] = {i, 0, 0}\n  Matrix.show()\nend",
        );

        for i in 1..=3u8 {
            assert_eq!(f.runtime.advance(), Advance::Suspended(SuspendPoint::Flush));
            assert_eq!(f.matrix.borrow().get(0, (i - 1) as usize), Color::new(i, 0, 0));
        }
        assert_eq!(f.runtime.advance(), Advance::Finished);
    }

    #[test]
    fn new_submission_discards_suspended_unit() {
        let mut f = fixture();
        f.runtime.submit(
            "a",
            "local n = 0\nwhile true do\n  n = n + 1\n  print('A', n)\n  Matrix.show()\nend",
        );
        assert_eq!(f.runtime.advance(), Advance::Suspended(SuspendPoint::Flush));

        f.runtime.submit("b", "print('B')");
        assert_eq!(f.runtime.state(), ScriptState::Running);
        assert_eq!(f.runtime.advance(), Advance::Finished);
        assert_eq!(f.runtime.advance(), Advance::Idle);

        assert_eq!(f.logger.lines(), vec!["A 1", "B"]);
    }

    #[test]
    fn runtime_error_is_reported_and_contained() {
        let mut f = fixture();
        f.runtime.submit("bad", "error('boom')");

        assert_eq!(f.runtime.advance(), Advance::Failed);
        assert_eq!(f.runtime.state(), ScriptState::Idle);
        assert_eq!(f.logger.lines().len(), 1);
        assert!(f.logger.lines()[0].starts_with("Error: "));
        assert!(f.logger.contains("boom"));

        assert_eq!(f.runtime.advance(), Advance::Idle);
        f.runtime.submit("good", "print('ok')");
        assert_eq!(f.runtime.advance(), Advance::Finished);
        assert!(f.logger.contains("ok"));
    }

    #[test]
    fn error_after_suspension_is_contained() {
        let mut f = fixture();
        f.runtime.submit("late", "Matrix.show()\nlocal t = nil\nprint(t.x)");

        assert_eq!(f.runtime.advance(), Advance::Suspended(SuspendPoint::Flush));
        assert_eq!(f.runtime.advance(), Advance::Failed);
        assert_eq!(f.runtime.state(), ScriptState::Idle);
    }

    #[test]
    fn syntax_error_surfaces_on_first_advance() {
        let mut f = fixture();
        f.runtime.submit("broken", "this is not lua");
        assert_eq!(f.runtime.state(), ScriptState::Running);
        assert!(f.logger.lines().is_empty());

        assert_eq!(f.runtime.advance(), Advance::Failed);
        assert!(f.logger.contains("broken"));
    }

    #[test]
    fn out_of_range_column_fails_the_script() {
        let mut f = fixture();
        f.runtime.submit("edge", "Matrix[1][65] = {1, 2, 3}");

        assert_eq!(f.runtime.advance(), Advance::Failed);
        assert!(f.logger.contains("column 65"));
        assert_eq!(*f.matrix.borrow(), Matrix::new());
    }

    #[test]
    fn read_line_waits_for_delivery() {
        let mut f = fixture();
        f.runtime.submit("echo", "local l = Matrix.readLine()\nprint('got ' .. l)");

        assert_eq!(f.runtime.advance(), Advance::Suspended(SuspendPoint::ReadLine));
        assert_eq!(f.runtime.advance(), Advance::Suspended(SuspendPoint::ReadLine));

        f.runtime.deliver_line("hello");
        assert_eq!(f.runtime.advance(), Advance::Finished);
        assert_eq!(f.logger.lines(), vec!["got hello"]);
    }

    #[test]
    fn line_delivered_early_is_read_without_waiting() {
        let mut f = fixture();
        f.runtime.submit("echo", "print(Matrix.readLine())");
        f.runtime.deliver_line("first");
        f.runtime.deliver_line("second");

        assert_eq!(f.runtime.advance(), Advance::Finished);
        assert_eq!(f.logger.lines(), vec!["second"]);
    }

    #[test]
    fn lines_from_before_submit_are_dropped() {
        let mut f = fixture();
        f.runtime.deliver_line("stale");
        f.runtime.submit("echo", "print(Matrix.readLine())");

        assert_eq!(f.runtime.advance(), Advance::Suspended(SuspendPoint::ReadLine));
        f.runtime.deliver_line("fresh");
        assert_eq!(f.runtime.advance(), Advance::Finished);
        assert_eq!(f.logger.lines(), vec!["fresh"]);
    }

    #[test]
    fn millis_reads_the_clock() {
        let mut f = fixture();
        f.clock.set(1234);
        f.runtime.submit("time", "print(millis())");

        assert_eq!(f.runtime.advance(), Advance::Finished);
        assert_eq!(f.logger.lines(), vec!["1234"]);
    }

    #[test]
    fn draw_text_and_clear_reach_the_matrix() {
        let mut f = fixture();
        f.runtime.submit("text", "Matrix.drawText('A', {0, 0, 255}, 0, 0, false)\nMatrix.show()\nMatrix.clear()");

        assert_eq!(f.runtime.advance(), Advance::Suspended(SuspendPoint::Flush));
        assert_eq!(f.matrix.borrow().get(1, 0), Color::new(0, 0, 255));
        assert_eq!(f.matrix.borrow().get(0, 0), Color::OFF);

        assert_eq!(f.runtime.advance(), Advance::Finished);
        assert_eq!(*f.matrix.borrow(), Matrix::new());
    }

    #[rstest]
    #[case("'A', {1, 1, 1}, math.mininteger, 0, true")]
    #[case("'AB', {1, 1, 1}, math.maxinteger, 0, true")]
    #[case("'A', {1, 1, 1}, 0, math.maxinteger, false")]
    #[case("'A', {1, 1, 1}, 2147483647, -2147483648, true")]
    fn draw_text_accepts_any_offset(#[case] args: &str) {
        let mut f = fixture();
        f.runtime.submit("far", format!("Matrix.drawText({args})\nprint('done')"));

        assert_eq!(f.runtime.advance(), Advance::Finished);
        assert_eq!(f.logger.lines(), vec!["done"]);
        assert_eq!(f.runtime.state(), ScriptState::Idle);
    }

    #[test]
    fn scripts_cannot_yield_on_their_own() {
        let mut f = fixture();
        f.runtime.submit("sneaky", "coroutine.yield()");

        assert_eq!(f.runtime.advance(), Advance::Failed);
    }

    #[test]
    fn stop_discards_the_unit() {
        let mut f = fixture();
        f.runtime.submit("loop", "while true do Matrix.show() end");
        f.runtime.advance();
        f.runtime.stop();
        assert_eq!(f.runtime.state(), ScriptState::Idle);
        assert_eq!(f.runtime.advance(), Advance::Idle);
    }

    #[test]
    fn globals_persist_between_units() {
        let mut f = fixture();
        f.runtime.submit("set", "counter = 41");
        f.runtime.advance();
        f.runtime.submit("get", "print(counter + 1)");
        f.runtime.advance();
        assert_eq!(f.logger.lines(), vec!["42"]);
    }
}
