//! Runtime configuration, loaded from an optional JSON file.
//!
//! Every field has a default, so `{}` (or no file at all) is a valid
//! configuration. Command-line flags are applied on top by the binary.
//!
//! ```json
//! {
//!   "color": "000500",
//!   "scroll_delay_ms": 40,
//!   "tick_ms": 5,
//!   "brightness": 100,
//!   "scripts_dir": "scripts",
//!   "display": "terminal",
//!   "boot_script": "rainbow"
//! }
//! ```

use crate::Color;
use crate::display::DisplayKind;
use crate::text::Paint;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HatConfig {
    /// Initial text color, six hex digits or `rainbow`
    pub color: String,
    /// Milliseconds between scroll frames
    pub scroll_delay_ms: u64,
    /// Scheduler tick in milliseconds
    pub tick_ms: u64,
    /// Output brightness, 0-100
    pub brightness: u8,
    /// Directory holding `<name>.lua` scripts
    pub scripts_dir: PathBuf,
    pub display: DisplayKind,
    /// Stored script to run at startup
    pub boot_script: Option<String>,
}

impl Default for HatConfig {
    fn default() -> Self {
        Self {
            color: "000500".to_string(),
            scroll_delay_ms: 40,
            tick_ms: 5,
            brightness: 100,
            scripts_dir: PathBuf::from("scripts"),
            display: DisplayKind::default(),
            boot_script: None,
        }
    }
}

impl HatConfig {
    /// Read and parse a JSON config file.
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config {}: {}", path.display(), e))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| format!("Invalid config {}: {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde can't.
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.paint()?;
        if self.brightness > 100 {
            return Err(format!("brightness must be 0-100, got {}", self.brightness).into());
        }
        if self.tick_ms == 0 {
            return Err("tick_ms must be at least 1".into());
        }
        Ok(())
    }

    /// The configured text color as a paint.
    pub fn paint(&self) -> Result<Paint, Box<dyn std::error::Error>> {
        if self.color.trim().eq_ignore_ascii_case("rainbow") {
            return Ok(Paint::Rainbow);
        }
        Ok(Paint::Solid(Color::from_hex(&self.color)?))
    }
}
