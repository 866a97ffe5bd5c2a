//! The line-oriented command front end.
//!
//! Transport bytes are split into lines by [`LineBuffer`]. A line starting
//! with `/` is a command, `/<name>[ <argument>]`; anything else is plain
//! input for whoever is listening (an upload or a waiting script).
//!
//! ## Rust concepts
//! - `enum` with data variants for the parsed command set
//! - Borrowed `&str` slices out of the input line ([`CommandLine`])
//! - `Option<Result<T, E>>` to separate "not a command" from "bad command"

use crate::Color;
use std::fmt;
use std::path::PathBuf;

// ── Line splitting ───────────────────────────────────────────────────

/// Accumulates transport bytes and hands out complete lines.
///
/// `\r` is dropped wherever it appears and `\n` ends a line. Invalid UTF-8
/// is replaced rather than rejected.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed `bytes` in and return every line they completed.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in bytes {
            match byte {
                b'\n' => {
                    lines.push(String::from_utf8_lossy(&self.pending).into_owned());
                    self.pending.clear();
                }
                b'\r' => {}
                _ => self.pending.push(byte),
            }
        }
        lines
    }

    /// Whatever is left after the last newline, consuming it.
    ///
    /// Used when the transport closes mid-line.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(rest)
    }
}

// ── Grammar ──────────────────────────────────────────────────────────

/// A line split into command name and argument, both borrowed from it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandLine<'a> {
    pub name: &'a str,
    /// Everything after the first space, untouched. Empty if there was none.
    pub arg: &'a str,
}

/// Split `/<name>[ <argument>]`. Returns `None` for lines without the
/// leading `/`.
pub fn split(line: &str) -> Option<CommandLine<'_>> {
    let rest = line.strip_prefix('/')?;
    let (name, arg) = rest.split_once(' ').unwrap_or((rest, ""));
    Some(CommandLine { name, arg })
}

/// The text color a `/color` command asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorChoice {
    Solid(Color),
    Rainbow,
}

/// Every command the hat understands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Scroll text across the hat
    Text(String),
    /// Set the text color
    Color(ColorChoice),
    /// Set the scroll step delay in milliseconds
    Speed(u64),
    /// Set output brightness (0-100)
    Brightness(u8),
    /// Stop scrolling and blank the hat
    Clear,
    /// Stop scrolling and the running script
    Stop,
    /// Run inline Lua source
    Lua(String),
    /// Run a stored script
    Run(String),
    /// Collect following lines as a script with this name
    Upload(String),
    /// Finish the upload in progress
    End,
    /// List stored scripts
    Scripts,
    /// Report status as JSON
    Status,
    /// Save the current frame as a PNG
    Snapshot(PathBuf),
}

/// Why a command line could not be turned into a [`Command`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandError {
    /// No handler for this name.
    Unknown(String),
    /// The command needs an argument and got none.
    MissingArgument(&'static str),
    /// The argument didn't parse.
    BadArgument { command: &'static str, reason: String },
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(name) => write!(f, "unknown command '/{name}'"),
            Self::MissingArgument(command) => write!(f, "/{command} needs an argument"),
            Self::BadArgument { command, reason } => write!(f, "/{command}: {reason}"),
        }
    }
}

impl std::error::Error for CommandError {}

impl Command {
    /// Parse a whole input line.
    ///
    /// `None` means the line isn't a command at all; `Some(Err(..))` means it
    /// was meant as one but is unknown or malformed.
    pub fn parse(line: &str) -> Option<Result<Command, CommandError>> {
        split(line).map(Self::from_parts)
    }

    fn from_parts(CommandLine { name, arg }: CommandLine<'_>) -> Result<Command, CommandError> {
        let command = match name {
            "text" => Command::Text(arg.to_string()),
            "color" => Command::Color(parse_color(required("color", arg)?)?),
            "speed" => Command::Speed(parse_number("speed", arg)?),
            "brightness" => {
                let value: u64 = parse_number("brightness", arg)?;
                Command::Brightness(value.min(100) as u8)
            }
            "clear" => Command::Clear,
            "stop" => Command::Stop,
            "lua" => Command::Lua(required("lua", arg)?.to_string()),
            "run" => Command::Run(required("run", arg)?.trim().to_string()),
            "upload" => Command::Upload(required("upload", arg)?.trim().to_string()),
            "end" => Command::End,
            "scripts" => Command::Scripts,
            "status" => Command::Status,
            "snapshot" => Command::Snapshot(PathBuf::from(required("snapshot", arg)?.trim())),
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

fn required<'a>(command: &'static str, arg: &'a str) -> Result<&'a str, CommandError> {
    if arg.trim().is_empty() {
        Err(CommandError::MissingArgument(command))
    } else {
        Ok(arg)
    }
}

fn parse_number(command: &'static str, arg: &str) -> Result<u64, CommandError> {
    required(command, arg)?
        .trim()
        .parse()
        .map_err(|e: std::num::ParseIntError| CommandError::BadArgument {
            command,
            reason: e.to_string(),
        })
}

fn parse_color(arg: &str) -> Result<ColorChoice, CommandError> {
    if arg.trim().eq_ignore_ascii_case("rainbow") {
        return Ok(ColorChoice::Rainbow);
    }
    Color::from_hex(arg)
        .map(ColorChoice::Solid)
        .map_err(|e| CommandError::BadArgument {
            command: "color",
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn lines_split_on_newline_and_drop_cr() {
        let mut buf = LineBuffer::new();
        assert_eq!(buf.push(b"/text hi\r\nsecond"), vec!["/text hi"]);
        assert_eq!(buf.push(b" half\n\n"), vec!["second half", ""]);
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn finish_returns_trailing_partial_line() {
        let mut buf = LineBuffer::new();
        assert!(buf.push(b"no newline").is_empty());
        assert_eq!(buf.finish(), Some("no newline".to_string()));
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let mut buf = LineBuffer::new();
        assert_eq!(buf.push(b"a\xffb\n"), vec!["a\u{fffd}b"]);
    }

    #[rstest]
    #[case("/text hello world", "text", "hello world")]
    #[case("/clear", "clear", "")]
    #[case("/text ", "text", "")]
    #[case("/", "", "")]
    #[case("/lua  x = 1", "lua", " x = 1")]
    fn split_takes_name_up_to_first_space(
        #[case] line: &str,
        #[case] name: &str,
        #[case] arg: &str,
    ) {
        assert_eq!(split(line), Some(CommandLine { name, arg }));
    }

    #[rstest]
    #[case("hello")]
    #[case("")]
    #[case(" /text x")]
    fn split_ignores_plain_lines(#[case] line: &str) {
        assert_eq!(split(line), None);
    }

    #[rstest]
    #[case("/text Hi there", Command::Text("Hi there".into()))]
    #[case("/color 02AB3F", Command::Color(ColorChoice::Solid(Color::new(0x02, 0xab, 0x3f))))]
    #[case("/color Rainbow", Command::Color(ColorChoice::Rainbow))]
    #[case("/speed 25", Command::Speed(25))]
    #[case("/brightness 40", Command::Brightness(40))]
    #[case("/brightness 250", Command::Brightness(100))]
    #[case("/clear", Command::Clear)]
    #[case("/stop", Command::Stop)]
    #[case("/lua print(1)", Command::Lua("print(1)".into()))]
    #[case("/run blink ", Command::Run("blink".into()))]
    #[case("/upload blink", Command::Upload("blink".into()))]
    #[case("/end", Command::End)]
    #[case("/scripts", Command::Scripts)]
    #[case("/status", Command::Status)]
    #[case("/snapshot out.png", Command::Snapshot(PathBuf::from("out.png")))]
    fn parses_every_command(#[case] line: &str, #[case] expected: Command) {
        assert_eq!(Command::parse(line), Some(Ok(expected)));
    }

    #[rstest]
    #[case("/dance", CommandError::Unknown("dance".into()))]
    #[case("/speed", CommandError::MissingArgument("speed"))]
    #[case("/run   ", CommandError::MissingArgument("run"))]
    #[case("/color fff", CommandError::BadArgument {
        command: "color",
        reason: "expected 6 hex digits, got 3".into(),
    })]
    fn reports_bad_commands(#[case] line: &str, #[case] expected: CommandError) {
        assert_eq!(Command::parse(line), Some(Err(expected)));
    }

    #[test]
    fn non_numeric_speed_is_rejected() {
        let err = Command::parse("/speed fast").unwrap().unwrap_err();
        assert!(matches!(err, CommandError::BadArgument { command: "speed", .. }));
        assert!(err.to_string().starts_with("/speed: "));
    }

    #[test]
    fn plain_line_is_not_a_command() {
        assert_eq!(Command::parse("just text"), None);
    }
}
