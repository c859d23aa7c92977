//! Selector tokens.
//!
//! A [`Sel`] is the runtime's interned token for a method name. Interning is
//! idempotent and process-wide: the same name always yields the same token,
//! tokens compare by pointer, and they are never freed.
//!
//! Call sites with a fixed name should use [`sel!`](crate::sel), which caches
//! the token in a per-call-site static after the first lookup.
//!
//! # Example
//!
//! ```rust
//! use oxibridge::{sel, Sel};
//!
//! let a = Sel::register("setTitle:").unwrap();
//! let b = sel!(setTitle:);
//! assert_eq!(a, b);
//! assert_eq!(b.name(), "setTitle:");
//! ```

use crate::backend;
use crate::error::{Error, Result};
use std::ffi::c_void;
use std::fmt;
use std::ptr::{self, NonNull};
use std::str::FromStr;
use std::sync::atomic::{AtomicPtr, Ordering};

/// Interned selector token.
///
/// `#[repr(transparent)]` over a non-null pointer, so it has the layout of the
/// runtime's `SEL`.
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Sel(NonNull<c_void>);

impl Sel {
    /// Interns `name` and returns its token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`] if `name` contains a NUL byte, which
    /// the runtime cannot represent.
    pub fn register(name: &str) -> Result<Sel> {
        if name.as_bytes().contains(&0) {
            return Err(Error::InvalidName {
                name: name.to_string(),
            });
        }
        backend::register_selector(name)
    }

    /// Wraps a raw selector pointer.
    ///
    /// # Safety
    ///
    /// `ptr` must be a token produced by the active backend's registry.
    #[inline]
    #[must_use]
    pub const unsafe fn from_raw(ptr: NonNull<c_void>) -> Self {
        Sel(ptr)
    }

    /// Returns the raw selector pointer.
    #[inline]
    #[must_use]
    pub const fn as_ptr(self) -> *const c_void {
        self.0.as_ptr()
    }

    /// Returns the selector name.
    #[must_use]
    pub fn name(self) -> &'static str {
        backend::selector_name(self)
    }

    /// Number of arguments implied by the name (one per colon).
    #[must_use]
    pub fn arg_count(self) -> usize {
        self.name().bytes().filter(|&b| b == b':').count()
    }
}

impl FromStr for Sel {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        Sel::register(name)
    }
}

impl fmt::Debug for Sel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Sel").field(&self.name()).finish()
    }
}

impl fmt::Display for Sel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// SAFETY: selector tokens point at immutable, never-freed registry entries.
unsafe impl Send for Sel {}
unsafe impl Sync for Sel {}

/// Lazily interned selector backing one [`sel!`](crate::sel) call site.
#[doc(hidden)]
pub struct CachedSel {
    ptr: AtomicPtr<c_void>,
}

impl CachedSel {
    #[must_use]
    pub const fn new() -> Self {
        CachedSel {
            ptr: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Returns the cached token, interning `name` on first use.
    ///
    /// Racing threads may both intern; the registry hands them the same
    /// token, so either store wins.
    #[inline]
    pub fn get(&self, name: &'static str) -> Sel {
        if let Some(ptr) = NonNull::new(self.ptr.load(Ordering::Acquire)) {
            return Sel(ptr);
        }
        self.fetch(name)
    }

    #[cold]
    fn fetch(&self, name: &'static str) -> Sel {
        match Sel::register(name) {
            Ok(sel) => {
                self.ptr.store(sel.0.as_ptr(), Ordering::Release);
                sel
            }
            Err(err) => crate::fatal!("cannot intern selector {name}: {err}"),
        }
    }
}

impl Default for CachedSel {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the [`Sel`] for a literal selector name, cached per call site.
///
/// ```rust
/// use oxibridge::sel;
///
/// let run = sel!(run);
/// let init = sel!(initWithTitle:action:keyEquivalent:);
/// assert_eq!(run.name(), "run");
/// assert_eq!(init.arg_count(), 3);
/// ```
#[macro_export]
macro_rules! sel {
    ($name:ident) => {
        $crate::__cached_sel!(stringify!($name))
    };
    ($($name:ident :)+) => {
        $crate::__cached_sel!(concat!($(stringify!($name), ':'),+))
    };
}

#[macro_export]
#[doc(hidden)]
macro_rules! __cached_sel {
    ($name:expr) => {{
        static CACHED: $crate::runtime::selector::CachedSel =
            $crate::runtime::selector::CachedSel::new();
        CACHED.get($name)
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_selector_interning() {
        let sel1 = Sel::register("init").unwrap();
        let sel2 = Sel::register("init").unwrap();

        assert_eq!(sel1, sel2);
        assert!(ptr::eq(sel1.as_ptr(), sel2.as_ptr()));
    }

    #[test]
    fn test_selector_different_names() {
        let sel1 = Sel::register("foo").unwrap();
        let sel2 = Sel::register("bar").unwrap();

        assert_ne!(sel1, sel2);
        assert_eq!(sel1.name(), "foo");
        assert_eq!(sel2.name(), "bar");
    }

    #[test]
    fn test_selector_from_str() {
        let sel: Sel = "windowDidResize:".parse().unwrap();
        assert_eq!(sel, Sel::register("windowDidResize:").unwrap());
    }

    #[test]
    fn test_selector_rejects_nul() {
        assert_eq!(
            Sel::register("bad\0name"),
            Err(Error::InvalidName {
                name: "bad\0name".into()
            })
        );
    }

    #[test]
    fn test_sel_macro_matches_register() {
        assert_eq!(sel!(center), Sel::register("center").unwrap());
        assert_eq!(
            sel!(initWithContentRect:styleMask:backing:defer:),
            Sel::register("initWithContentRect:styleMask:backing:defer:")
                .unwrap()
        );
    }

    #[test]
    fn test_sel_macro_caches_per_site() {
        let tokens: Vec<Sel> = (0..3).map(|_| sel!(contentView)).collect();
        assert!(tokens.iter().all(|&s| s == tokens[0]));
    }

    #[test]
    fn test_arg_count() {
        assert_eq!(sel!(run).arg_count(), 0);
        assert_eq!(sel!(setTitle:).arg_count(), 1);
        assert_eq!(sel!(initWithTitle:action:keyEquivalent:).arg_count(), 3);
    }

    #[test]
    fn test_display_and_debug() {
        let sel = sel!(makeKeyAndOrderFront:);
        assert_eq!(sel.to_string(), "makeKeyAndOrderFront:");
        assert_eq!(format!("{sel:?}"), "Sel(\"makeKeyAndOrderFront:\")");
    }

    #[test]
    fn test_selector_thread_safety() {
        let handles: Vec<_> = (0..8)
            .map(|_| thread::spawn(|| Sel::register("concurrentSelector:").unwrap()))
            .collect();

        let selectors: Vec<_> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        for sel in &selectors[1..] {
            assert_eq!(selectors[0], *sel);
        }
    }
}
