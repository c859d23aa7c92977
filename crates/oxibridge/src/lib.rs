//! `oxibridge`: a typed bridge to a dynamic object runtime.
//!
//! Programs talk to the runtime by sending messages: a selector plus
//! arguments, delivered to a receiver whose method is only found at run
//! time. `oxibridge` makes that conversation typed on the Rust side:
//!
//! - **Selectors** are interned once and cached per call site ([`sel!`]).
//! - **Dispatch** derives each call's C signature from Rust types and calls
//!   through exactly that signature ([`msg_send!`]). Messages to nil yield
//!   zero.
//! - **Class declaration** builds subclasses at run time with Rust
//!   functions as methods ([`ClassDecl`]).
//! - **Autorelease pools** are scoped guards ([`AutoreleasePool`]).
//! - **Geometry** (`Point`, `Size`, `Rect`) crosses the boundary by value.
//!
//! # Backends
//!
//! With the `native` feature on an Apple target, messages go to the system
//! Objective-C runtime (`libobjc`). Everywhere else an in-process headless
//! runtime stands in, providing the same Cocoa classes the bridge is usually
//! pointed at, minus the screen. The headless runtime also checks every call
//! site's signature against the method's registered encoding.
//!
//! # Example
//!
//! ```rust
//! use oxibridge::{msg_send, Bool, Class, Id};
//! use std::ffi::CStr;
//!
//! oxibridge::config::Config::from_env().install();
//!
//! let string = Class::get("NSString").unwrap();
//! let item_class = Class::get("NSMenuItem").unwrap();
//! unsafe {
//!     let title: Id = msg_send![string, stringWithUTF8String: c"Quit".as_ptr()];
//!     let key: Id = msg_send![string, stringWithUTF8String: c"q".as_ptr()];
//!     let item: Id = msg_send![item_class, alloc];
//!     let item: Id = msg_send![item,
//!         initWithTitle: title,
//!         action: oxibridge::sel!(terminate:),
//!         keyEquivalent: key,
//!     ];
//!     let back: Id = msg_send![item, title];
//!     let equal: Bool = msg_send![back, isEqualToString: title];
//!     assert!(equal.as_bool());
//! }
//! ```

pub mod config;
pub mod error;
pub mod runtime;

pub(crate) mod backend;

/// Introspection of the headless runtime, for tests and diagnostics.
#[cfg(not(all(feature = "native", target_vendor = "apple")))]
pub mod headless {
    pub use crate::backend::headless::{live_objects, pool_depth};
}

pub use error::{Error, Result};
pub use runtime::{
    AutoreleasePool, Bool, Class, ClassDecl, Encode, Encoding, Id, Imp,
    MethodImplementation, Point, Rect, Sel, Size, Super, autoreleasepool,
};
