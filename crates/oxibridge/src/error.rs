//! Error types for the bridge.
//!
//! Recoverable failures are returned as [`Error`] values and checked by the
//! caller right after the call that produced them. Failures the bridge cannot
//! recover from (allocation exhaustion while interning, a message the
//! receiver does not understand, an unbalanced pool) go through [`fatal`],
//! which logs and aborts the process.

use std::fmt;

/// Errors reported by the bridge.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A selector or class name is empty or contains a NUL byte.
    #[error("name {name:?} is empty or contains NUL")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// The runtime could not allocate metadata.
    #[error("runtime metadata allocation failed")]
    OutOfMemory,

    /// A class with this name is already registered or being declared.
    #[error("class {name} already exists")]
    ClassAlreadyExists {
        /// The colliding class name.
        name: String,
    },

    /// No class is registered under this name.
    #[error("class {name} is not registered")]
    ClassNotFound {
        /// The missing class name.
        name: String,
    },

    /// The class has been published; its method table is sealed.
    #[error("class {name} is already published")]
    ClassPublished {
        /// The published class.
        name: String,
    },

    /// The draft already carries a method for this selector.
    #[error("-[{class} {selector}] is already attached")]
    MethodAlreadyAttached {
        /// Class being declared.
        class: String,
        /// Duplicate selector.
        selector: String,
    },

    /// A method implementation's arity does not match its selector.
    #[error("selector {selector} takes {expected} arguments, implementation takes {got}")]
    ArgumentCountMismatch {
        /// Selector being attached.
        selector: String,
        /// Arguments implied by the selector's colons.
        expected: usize,
        /// Arguments taken by the implementation.
        got: usize,
    },

    /// A type encoding string is malformed.
    #[error("invalid type encoding {encoding:?}")]
    InvalidEncoding {
        /// The rejected encoding.
        encoding: String,
    },

    /// The receiver does not implement the selector.
    #[error("{class} does not recognize selector {selector}")]
    SelectorNotFound {
        /// Class of the receiver.
        class: String,
        /// Unrecognized selector.
        selector: String,
    },

    /// The declared call signature differs from the method's real one.
    #[error("signature mismatch for {selector}: method is {found}, call site declared {expected}")]
    SignatureMismatch {
        /// Selector being sent.
        selector: String,
        /// Encoding derived from the call site's Rust types.
        expected: String,
        /// Encoding the method was registered with.
        found: String,
    },
}

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Logs `args` at error level and aborts the process.
///
/// Used for conditions the bridge contract defines as unrecoverable. Abort
/// rather than panic: these paths may sit below `extern "C"` frames that
/// cannot unwind.
#[cold]
pub fn fatal(args: fmt::Arguments<'_>) -> ! {
    oxibridge_log::error!("fatal: {args}");

    #[cfg(feature = "fatal_backtrace")]
    oxibridge_log::error!("{:?}", backtrace::Backtrace::new());

    std::process::abort()
}

/// Formats its arguments and calls [`fatal`](crate::error::fatal).
#[macro_export]
#[doc(hidden)]
macro_rules! fatal {
    ($($arg:tt)*) => {
        $crate::error::fatal(format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::InvalidName { name: String::new() }.to_string(),
            "name \"\" is empty or contains NUL"
        );
        assert_eq!(
            Error::ClassAlreadyExists { name: "Delegate1".into() }.to_string(),
            "class Delegate1 already exists"
        );
        assert_eq!(
            Error::SelectorNotFound {
                class: "NSObject".into(),
                selector: "fly".into()
            }
            .to_string(),
            "NSObject does not recognize selector fly"
        );
        assert_eq!(
            Error::SignatureMismatch {
                selector: "setTitle:".into(),
                expected: "v@:q".into(),
                found: "v@:@".into(),
            }
            .to_string(),
            "signature mismatch for setTitle:: method is v@:@, call site declared v@:q"
        );
    }

    #[test]
    fn test_error_equality() {
        assert_eq!(Error::OutOfMemory, Error::OutOfMemory);
        assert_ne!(
            Error::ClassNotFound { name: "A".into() },
            Error::ClassNotFound { name: "B".into() }
        );
    }

    #[test]
    fn test_error_is_std_error() {
        fn assert_std<E: std::error::Error + Send + Sync + 'static>() {}
        assert_std::<Error>();
    }
}
