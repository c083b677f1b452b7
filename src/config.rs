//! Appliance configuration.
//!
//! Loaded once at startup from a TOML file; every field has a default so a
//! missing or partial file still yields a working controller. A malformed
//! file is logged and replaced by defaults rather than aborting boot.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Default location on the appliance image.
pub const DEFAULT_PATH: &str = "/etc/platesmith.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Seconds without any pressed button before the screensaver starts.
    pub idle_timeout_secs: u64,
    /// Milliseconds the confirm button must be held for destructive
    /// actions.
    pub confirm_hold_ms: u64,
    /// Initial delay before a held directional button starts repeating.
    pub repeat_start_delay_ms: u64,
    /// Delay between synthesized repeats once repetition has started.
    pub repeat_delay_ms: u64,
    /// Offer camera scanning as a seed input method.
    pub enable_seed_scan: bool,
    /// Log frame timing and enable the screenshot button.
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            idle_timeout_secs: 180,
            confirm_hold_ms: 1000,
            repeat_start_delay_ms: 400,
            repeat_delay_ms: 100,
            enable_seed_scan: true,
            debug: false,
        }
    }
}

impl Config {
    /// Read configuration from `path`, falling back to defaults when the
    /// file is absent or malformed.
    pub fn load(path: &Path) -> Config {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Config::default();
            }
            Err(err) => {
                tracing::warn!("config: failed to read {}: {err}", path.display());
                return Config::default();
            }
        };
        match toml::from_str(&raw) {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::warn!("config: failed to parse {}: {err}", path.display());
                Config::default()
            }
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn confirm_hold(&self) -> Duration {
        Duration::from_millis(self.confirm_hold_ms)
    }

    pub fn repeat_start_delay(&self) -> Duration {
        Duration::from_millis(self.repeat_start_delay_ms)
    }

    pub fn repeat_delay(&self) -> Duration {
        Duration::from_millis(self.repeat_delay_ms)
    }
}
