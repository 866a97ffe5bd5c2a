//! LED hat driver
//!
//! Reads commands and script input line by line on stdin, writes replies and
//! script output to stdout, and shows frames on the selected display. Logs go
//! to stderr; the terminal preview draws on the tty, so redirect stderr
//! (`2>hat.log`) to keep the preview steady.
//!
//! ## Architecture
//! - **Input thread** (std::thread): blocking reads on stdin, forwards bytes
//!   through a channel
//! - **Main thread** (tokio current-thread runtime): owns the hat, multiplexes
//!   input with a fixed tick; each tick steps the scroller and advances the
//!   Lua script once
//!
//! ## Rust concepts
//! - `#[tokio::main(flavor = "current_thread")]` async entry point
//! - `tokio::select!` over a channel and a timer
//! - `std::thread::spawn` for blocking input outside the runtime
//! - clap derive subcommands
//!
//! ## Usage
//! ```sh
//! led-hat run --config hat.json
//! led-hat scroll "Hello, hat!" --color ff0000
//! ```

use clap::{Parser, Subcommand};
use led_hat::capability::{StdoutLogger, SystemClock};
use led_hat::command::LineBuffer;
use led_hat::config::HatConfig;
use led_hat::display::{self, DisplayKind};
use led_hat::font::Font5x7;
use led_hat::hat::Hat;
use led_hat::matrix::Matrix;
use led_hat::scroll::scroll_blocking;
use std::io::Read;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tracing_subscriber::EnvFilter;

/// Driver for an 8×64 LED matrix hat
#[derive(Parser)]
#[command(name = "led-hat")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Run the command loop on stdin
    Run {
        /// JSON config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Where frames go (overrides the config)
        #[arg(long, value_enum)]
        display: Option<DisplayKind>,

        /// Directory of stored scripts (overrides the config)
        #[arg(long)]
        scripts_dir: Option<PathBuf>,

        /// Stored script to run at startup (overrides the config)
        #[arg(long)]
        boot_script: Option<String>,
    },

    /// Scroll one line of text across the hat and exit
    Scroll {
        text: String,

        /// Text color as six hex digits, or `rainbow`
        #[arg(long, default_value = "000500")]
        color: String,

        /// Milliseconds between frames
        #[arg(long, default_value = "40")]
        delay_ms: u64,

        /// Output brightness (0-100)
        #[arg(long, default_value = "100")]
        brightness: u8,

        #[arg(long, value_enum, default_value = "terminal")]
        display: DisplayKind,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Mode::Run {
            config,
            display,
            scripts_dir,
            boot_script,
        } => load_config(config, display, scripts_dir, boot_script).and_then(run),
        Mode::Scroll {
            text,
            color,
            delay_ms,
            brightness,
            display,
        } => scroll_once(&text, color, delay_ms, brightness, display),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn load_config(
    path: Option<PathBuf>,
    display: Option<DisplayKind>,
    scripts_dir: Option<PathBuf>,
    boot_script: Option<String>,
) -> Result<HatConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => HatConfig::load(&path)?,
        None => HatConfig::default(),
    };
    if let Some(display) = display {
        config.display = display;
    }
    if let Some(dir) = scripts_dir {
        config.scripts_dir = dir;
    }
    if boot_script.is_some() {
        config.boot_script = boot_script;
    }
    Ok(config)
}

fn scroll_once(
    text: &str,
    color: String,
    delay_ms: u64,
    brightness: u8,
    kind: DisplayKind,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = HatConfig {
        color,
        brightness: brightness.min(100),
        ..HatConfig::default()
    };
    let paint = config.paint()?;
    let mut display = display::open(kind)?;
    let mut matrix = Matrix::new();

    let frames = scroll_blocking(
        &mut matrix,
        display.as_mut(),
        &Font5x7,
        text,
        &paint,
        Duration::from_millis(delay_ms),
        config.brightness,
    )?;
    tracing::info!("Scrolled {:?} in {} frames", text, frames);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn run(config: HatConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("LED hat v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Display: {:?}", config.display);
    tracing::info!("Scripts dir: {}", config.scripts_dir.display());

    let running = led_hat::setup_signal_handler();
    let display = display::open(config.display)?;
    let mut hat = Hat::new(
        &config,
        display,
        Rc::new(StdoutLogger),
        Rc::new(SystemClock::new()),
    )?;

    if let Some(name) = &config.boot_script {
        hat.run_stored(name);
    }

    let mut input = spawn_input_thread();
    let mut lines = LineBuffer::new();
    let mut input_open = true;

    let mut ticker = time::interval(Duration::from_millis(config.tick_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!("Ready, reading commands from stdin");

    while led_hat::is_running(&running) {
        tokio::select! {
            chunk = input.recv(), if input_open => match chunk {
                Some(bytes) => {
                    for line in lines.push(&bytes) {
                        hat.handle_line(&line);
                    }
                }
                None => {
                    tracing::info!("Input closed");
                    input_open = false;
                    if let Some(rest) = lines.finish() {
                        hat.handle_line(&rest);
                    }
                }
            },
            _ = ticker.tick() => {
                hat.tick();
                if !input_open && !hat.is_busy() {
                    break;
                }
            }
        }
    }

    tracing::info!("Shutting down");
    Ok(())
}

/// Read stdin on a plain thread and forward each chunk.
///
/// Rust concept: BLOCKING I/O OFF THE RUNTIME
/// A blocking read can't be cancelled, so it lives on its own thread instead
/// of the runtime's blocking pool; the runtime can then shut down without
/// waiting for one more line. The channel closes when stdin does.
fn spawn_input_thread() -> mpsc::UnboundedReceiver<Vec<u8>> {
    let (tx, rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || {
        let mut stdin = std::io::stdin();
        let mut buf = [0u8; 1024];
        loop {
            match stdin.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!("Failed to read input: {}", e);
                    break;
                }
            }
        }
    });

    rx
}
