//! Leveled logging for the `oxibridge` workspace.
//!
//! Messages go to stderr so that programs driving a foreign runtime keep
//! stdout for their own output. Each record carries the module path of the
//! call site as its target.
//!
//! The level and colouring are process-wide and can be read from the
//! environment with [`init_from_env`]:
//!
//! - `OXIBRIDGE_LOG` selects the minimum level (`error`, `warn`, `info`,
//!   `debug`, `trace`)
//! - `NO_COLOR`, when set to any non-empty value, disables ANSI colours
//!
//! # Example
//!
//! ```
//! use oxibridge_log::{debug, error, info, warn, Level};
//!
//! oxibridge_log::set_level(Level::Debug);
//!
//! let class = "AppDelegate";
//! info!("registered class {}", class);
//! debug!("method table: {:?}", ["applicationShouldTerminateAfterLastWindowClosed:"]);
//! warn!("autorelease with no pool in place");
//! error!("selector not recognised");
//! ```

use std::fmt::{self, Arguments};
use std::io::Write;
use std::str::FromStr;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Environment variable holding the minimum log level.
pub const LEVEL_ENV: &str = "OXIBRIDGE_LOG";

/// Environment variable that disables colours when set and non-empty.
pub const NO_COLOR_ENV: &str = "NO_COLOR";

/// Severity of a log record, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// Contract violations and fatal paths
    Error = 0,
    /// Suspicious but survivable situations
    Warn = 1,
    /// Lifecycle events (class published, run loop entered)
    Info = 2,
    /// Registration details
    Debug = 3,
    /// Per-dispatch and per-pool events
    Trace = 4,
}

impl Level {
    /// Returns the ANSI color code for this log level.
    const fn color_code(self) -> &'static str {
        match self {
            Level::Error => "\x1b[31m",
            Level::Warn => "\x1b[33m",
            Level::Info => "\x1b[32m",
            Level::Debug => "\x1b[36m",
            Level::Trace => "\x1b[35m",
        }
    }

    /// Returns the upper-case name of this level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        }
    }

    const fn from_u8(raw: u8) -> Level {
        match raw {
            0 => Level::Error,
            1 => Level::Warn,
            2 => Level::Info,
            3 => Level::Debug,
            _ => Level::Trace,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a [`Level`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLevelError(String);

impl fmt::Display for ParseLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid log level: {:?}", self.0)
    }
}

impl std::error::Error for ParseLevelError {}

impl FromStr for Level {
    type Err = ParseLevelError;

    /// Parses a level name, ignoring case and surrounding whitespace.
    ///
    /// ```
    /// use oxibridge_log::Level;
    ///
    /// assert_eq!("error".parse::<Level>(), Ok(Level::Error));
    /// assert_eq!(" INFO ".parse::<Level>(), Ok(Level::Info));
    /// assert!("loud".parse::<Level>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ERROR" => Ok(Level::Error),
            "WARN" | "WARNING" => Ok(Level::Warn),
            "INFO" => Ok(Level::Info),
            "DEBUG" => Ok(Level::Debug),
            "TRACE" => Ok(Level::Trace),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

/// Process-wide logger state.
///
/// Obtained through [`get_logger`]; the level and colour switch are atomics
/// so any thread may change them.
pub struct Logger {
    level: AtomicU8,
    color: AtomicBool,
}

impl Logger {
    const fn new(level: Level) -> Self {
        Logger {
            level: AtomicU8::new(level as u8),
            color: AtomicBool::new(true),
        }
    }

    /// Sets the minimum level; records below it are dropped.
    pub fn set_level(&self, level: Level) {
        self.level.store(level as u8, Ordering::SeqCst);
    }

    /// Returns the current minimum level.
    pub fn level(&self) -> Level {
        Level::from_u8(self.level.load(Ordering::Relaxed))
    }

    /// Turns ANSI colouring on or off.
    pub fn set_color(&self, enabled: bool) {
        self.color.store(enabled, Ordering::SeqCst);
    }

    /// Reports whether ANSI colouring is on.
    pub fn color(&self) -> bool {
        self.color.load(Ordering::Relaxed)
    }

    /// Checks if a record at `level` would be written.
    pub fn enabled(&self, level: Level) -> bool {
        level as u8 <= self.level.load(Ordering::Relaxed)
    }
}

static LOGGER: OnceLock<Logger> = OnceLock::new();

/// Returns the global logger, creating it at `Level::Warn` on first use.
pub fn get_logger() -> &'static Logger {
    LOGGER.get_or_init(|| Logger::new(Level::Warn))
}

/// Sets the minimum level of the global logger.
pub fn set_level(level: Level) {
    get_logger().set_level(level);
}

/// Sets the minimum level from a level name.
///
/// # Errors
///
/// Returns [`ParseLevelError`] if `s` is not a level name; the current level
/// is left untouched.
pub fn set_level_from_str(s: &str) -> Result<(), ParseLevelError> {
    set_level(s.parse()?);
    Ok(())
}

/// Turns colouring of the global logger on or off.
pub fn set_color(enabled: bool) {
    get_logger().set_color(enabled);
}

/// Applies `OXIBRIDGE_LOG` and `NO_COLOR` to the global logger.
///
/// An unparsable `OXIBRIDGE_LOG` is reported once at warn level and
/// otherwise ignored.
pub fn init_from_env() {
    if let Ok(value) = std::env::var(LEVEL_ENV) {
        if let Err(err) = set_level_from_str(&value) {
            warn!("{err}, keeping {}", get_logger().level());
        }
    }

    if std::env::var_os(NO_COLOR_ENV).is_some_and(|v| !v.is_empty()) {
        set_color(false);
    }
}

/// Writes one record. Called by the macros after the level check.
#[doc(hidden)]
pub fn __log_with_target(level: Level, target: &str, args: Arguments) {
    const RESET: &str = "\x1b[0m";

    let logger = get_logger();
    if !logger.enabled(level) {
        return;
    }

    let mut stderr = std::io::stderr().lock();
    // A closed stderr must not take the program down with it.
    let _ = if logger.color() {
        writeln!(stderr, "{}[{level}]{RESET} {target}: {args}", level.color_code())
    } else {
        writeln!(stderr, "[{level}] {target}: {args}")
    };
}

/// Logs at an explicit level.
///
/// ```
/// use oxibridge_log::{log, Level};
///
/// log!(level: Level::Info, "dispatching {} messages", 3);
/// ```
#[macro_export]
macro_rules! log {
    (level: $level:expr, $($arg:tt)*) => {
        {
            if $crate::get_logger().enabled($level) {
                $crate::__log_with_target(
                    $level,
                    module_path!(),
                    format_args!($($arg)*)
                );
            }
        }
    };
}

/// Logs at the Error level.
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Error, $($arg)*)
    };
}

/// Logs at the Warn level.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Warn, $($arg)*)
    };
}

/// Logs at the Info level.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Info, $($arg)*)
    };
}

/// Logs at the Debug level.
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Debug, $($arg)*)
    };
}

/// Logs at the Trace level.
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Trace, $($arg)*)
    };
}
