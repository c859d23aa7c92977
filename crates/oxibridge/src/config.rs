//! Process-wide bridge settings.
//!
//! ```rust
//! use oxibridge::config::Config;
//!
//! let config = Config::default();
//! assert!(config.strict_signatures);
//! config.install();
//! ```
//!
//! | variable | effect |
//! |----------|--------|
//! | `OXIBRIDGE_LOG` | log level (`error`, `warn`, `info`, `debug`, `trace`) |
//! | `NO_COLOR` | non-empty disables colored log output |
//! | `OXIBRIDGE_STRICT_SIGNATURES` | `0`/`false`/`off` disables signature checks |

use crate::runtime::message::set_strict_signatures;
use oxibridge_log::{Level, warn};

/// Environment variable toggling signature verification.
pub const STRICT_SIGNATURES_ENV: &str = "OXIBRIDGE_STRICT_SIGNATURES";

/// Bridge settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Minimum level written by the logger.
    pub log_level: Level,
    /// Whether log output is colored.
    pub color: bool,
    /// Whether call-site signatures are checked against registered method
    /// encodings (headless backend only).
    pub strict_signatures: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: Level::Warn,
            color: true,
            strict_signatures: true,
        }
    }
}

impl Config {
    /// Defaults overridden by the environment.
    ///
    /// Unparsable values are reported at warn level and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Config::default();

        if let Some(value) = lookup(oxibridge_log::LEVEL_ENV) {
            match value.parse() {
                Ok(level) => config.log_level = level,
                Err(err) => warn!("{err}, keeping {}", config.log_level),
            }
        }

        if lookup(oxibridge_log::NO_COLOR_ENV).is_some_and(|v| !v.is_empty()) {
            config.color = false;
        }

        if let Some(value) = lookup(STRICT_SIGNATURES_ENV) {
            match parse_flag(&value) {
                Some(flag) => config.strict_signatures = flag,
                None => warn!("ignoring {STRICT_SIGNATURES_ENV}={value:?}"),
            }
        }

        config
    }

    /// Applies the settings to the logger and the dispatcher.
    pub fn install(self) {
        oxibridge_log::set_level(self.log_level);
        oxibridge_log::set_color(self.color);
        set_strict_signatures(self.strict_signatures);
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}
