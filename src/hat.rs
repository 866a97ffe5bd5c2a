//! The hat as a whole: command dispatch and the per-tick schedule.
//!
//! [`Hat`] owns every piece (matrix, display, scroller, script runtime,
//! script store) and is driven from outside by two calls:
//!
//! - [`Hat::handle_line`] for each line that arrives on the transport
//! - [`Hat::tick`] on a fixed interval
//!
//! A tick steps the scroller, then advances the script once. Either one may
//! produce a frame, which is presented right away.
//!
//! ## Rust concepts
//! - `enum` with data variants ([`Command`]) and exhaustive `match`
//! - Trait objects for injected capabilities (`Rc<dyn Logger>`, `Box<dyn Display>`)
//! - `serde::Serialize` for the JSON status reply

use crate::capability::{Clock, Logger};
use crate::command::{ColorChoice, Command, CommandError};
use crate::config::HatConfig;
use crate::display::Display;
use crate::font::{Font, Font5x7};
use crate::matrix::{Matrix, SharedMatrix};
use crate::script::{Advance, ScriptRuntime, ScriptState, SuspendPoint};
use crate::scroll::{ScrollAnimation, ScrollAnimator, ScrollTick};
use crate::snapshot;
use crate::store::ScriptStore;
use crate::text::Paint;
use serde::Serialize;
use std::path::Path;
use std::rc::Rc;

/// Pixels per LED in `/snapshot` images.
const SNAPSHOT_SCALE: u32 = 8;

/// Script name used for `/lua` source.
const INLINE_SCRIPT: &str = "inline";

// ── Status ───────────────────────────────────────────────────────────

/// What `/status` reports.
#[derive(Clone, Debug, Serialize)]
pub struct HatStatus {
    pub script: ScriptState,
    /// Text currently scrolling, if any
    pub scrolling: Option<String>,
    /// Six hex digits or `rainbow`
    pub color: String,
    pub scroll_delay_ms: u64,
    pub brightness: u8,
    /// Frames presented since startup
    pub frames: u64,
    /// Name of the script being uploaded, if any
    pub upload: Option<String>,
    pub version: String,
}

/// A `/upload` in progress.
struct Upload {
    name: String,
    lines: Vec<String>,
}

// ── Hat ──────────────────────────────────────────────────────────────

pub struct Hat {
    matrix: SharedMatrix,
    display: Box<dyn Display>,
    font: Rc<dyn Font>,
    runtime: ScriptRuntime,
    scroller: ScrollAnimator,
    store: ScriptStore,
    logger: Rc<dyn Logger>,
    clock: Rc<dyn Clock>,
    paint: Paint,
    brightness: u8,
    upload: Option<Upload>,
    frames: u64,
}

impl Hat {
    pub fn new(
        config: &HatConfig,
        display: Box<dyn Display>,
        logger: Rc<dyn Logger>,
        clock: Rc<dyn Clock>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        config.validate()?;

        let matrix = Matrix::shared();
        let font: Rc<dyn Font> = Rc::new(Font5x7);
        let runtime = ScriptRuntime::new(
            Rc::clone(&matrix),
            Rc::clone(&font),
            Rc::clone(&clock),
            Rc::clone(&logger),
        )?;

        Ok(Self {
            matrix,
            display,
            font,
            runtime,
            scroller: ScrollAnimator::new(config.scroll_delay_ms),
            store: ScriptStore::new(&config.scripts_dir),
            logger,
            clock,
            paint: config.paint()?,
            brightness: config.brightness,
            upload: None,
            frames: 0,
        })
    }

    /// Handle one transport line.
    ///
    /// Commands are dispatched first. Anything left over goes to the upload
    /// in progress, or else to the script as its next `readLine()`.
    pub fn handle_line(&mut self, line: &str) {
        if self.dispatch(line) {
            return;
        }

        match self.upload.as_mut() {
            Some(upload) => upload.lines.push(line.to_string()),
            None => self.runtime.deliver_line(line),
        }
    }

    /// Run `line` as a command. Returns `false` if no handler took it.
    pub fn dispatch(&mut self, line: &str) -> bool {
        match Command::parse(line) {
            None => false,
            Some(Err(CommandError::Unknown(name))) => {
                tracing::debug!("No handler for /{}", name);
                false
            }
            Some(Err(e)) => {
                tracing::warn!("Rejected command {:?}: {}", line, e);
                self.reply(&format!("Error: {e}"));
                true
            }
            Some(Ok(command)) => {
                tracing::debug!("Command: {:?}", command);
                self.execute(command);
                true
            }
        }
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::Text(text) => {
                let animation = ScrollAnimation::new(self.font.as_ref(), text);
                self.scroller.start(animation, self.clock.millis());
            }

            Command::Color(choice) => {
                self.paint = match choice {
                    ColorChoice::Solid(c) => Paint::Solid(c),
                    ColorChoice::Rainbow => Paint::Rainbow,
                };
            }

            Command::Speed(ms) => self.scroller.set_step_delay_ms(ms),

            Command::Brightness(value) => {
                self.brightness = value;
                self.present();
            }

            Command::Clear => {
                self.scroller.stop();
                self.matrix.borrow_mut().clear();
                self.present();
            }

            Command::Stop => {
                self.scroller.stop();
                self.runtime.stop();
            }

            Command::Lua(source) => self.runtime.submit(INLINE_SCRIPT, source),

            Command::Run(name) => self.run_stored(&name),

            Command::Upload(name) => {
                if let Some(old) = self.upload.take() {
                    tracing::warn!("Abandoning upload of {}", old.name);
                }
                self.reply(&format!("Uploading {name}, finish with /end"));
                self.upload = Some(Upload {
                    name,
                    lines: Vec::new(),
                });
            }

            Command::End => self.finish_upload(),

            Command::Scripts => {
                let entries = self.store.list();
                if entries.is_empty() {
                    self.reply("No scripts");
                }
                for entry in entries {
                    self.reply(&format!("{} ({} bytes)", entry.name, entry.size));
                }
            }

            Command::Status => match serde_json::to_string(&self.status()) {
                Ok(json) => self.reply(&json),
                Err(e) => tracing::error!("Failed to encode status: {}", e),
            },

            Command::Snapshot(path) => self.snapshot(&path),
        }
    }

    /// Load a stored script and make it the running unit.
    pub fn run_stored(&mut self, name: &str) {
        match self.store.read(name) {
            Ok(source) => {
                tracing::info!("Running script {}", name);
                self.runtime.submit(name, source);
            }
            Err(e) => {
                tracing::warn!("Cannot run {}: {}", name, e);
                self.reply(&format!("Error: {e}"));
            }
        }
    }

    fn finish_upload(&mut self) {
        let Some(Upload { name, lines }) = self.upload.take() else {
            self.reply("Error: no upload in progress");
            return;
        };

        let mut source = lines.join("\n");
        source.push('\n');
        match self.store.write(&name, &source) {
            Ok(()) => {
                tracing::info!("Stored script {} ({} lines)", name, lines.len());
                self.reply(&format!("Saved {name} ({} lines)", lines.len()));
            }
            Err(e) => {
                tracing::warn!("Failed to store {}: {}", name, e);
                self.reply(&format!("Error: {e}"));
            }
        }
    }

    fn snapshot(&mut self, path: &Path) {
        let result = snapshot::save_png(&self.matrix.borrow(), path, SNAPSHOT_SCALE);
        match result {
            Ok(()) => self.reply(&format!("Saved {}", path.display())),
            Err(e) => {
                tracing::warn!("Snapshot to {} failed: {}", path.display(), e);
                self.reply(&format!("Error: {e}"));
            }
        }
    }

    /// One scheduler tick: step the scroller, then advance the script.
    pub fn tick(&mut self) {
        let now = self.clock.millis();
        let scrolled = {
            let mut matrix = self.matrix.borrow_mut();
            self.scroller
                .tick(now, &mut matrix, self.font.as_ref(), &self.paint)
        };
        match scrolled {
            ScrollTick::Frame => self.present(),
            ScrollTick::Finished => tracing::debug!("Scroll finished"),
            ScrollTick::Idle | ScrollTick::Waiting => {}
        }

        if self.runtime.advance() == Advance::Suspended(SuspendPoint::Flush) {
            self.present();
        }
    }

    /// Whether anything is left to do: a scroll or a script.
    pub fn is_busy(&self) -> bool {
        self.scroller.current().is_some() || self.runtime.state() != ScriptState::Idle
    }

    fn present(&mut self) {
        let result = self
            .matrix
            .borrow()
            .flush(self.display.as_mut(), self.brightness);
        match result {
            Ok(()) => self.frames += 1,
            Err(e) => tracing::warn!("Display failed: {}", e),
        }
    }

    fn reply(&self, message: &str) {
        self.logger.log(message);
    }

    pub fn status(&self) -> HatStatus {
        HatStatus {
            script: self.runtime.state(),
            scrolling: self.scroller.current().map(|a| a.text().to_string()),
            color: self.paint.to_string(),
            scroll_delay_ms: self.scroller.step_delay_ms(),
            brightness: self.brightness,
            frames: self.frames,
            upload: self.upload.as_ref().map(|u| u.name.clone()),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
