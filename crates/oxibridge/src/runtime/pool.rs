//! Autorelease scopes.
//!
//! Objects returned by convenience constructors (`+stringWithUTF8String:`
//! and friends) are autoreleased: owned by the innermost open pool and
//! released when that pool is popped. An [`AutoreleasePool`] guard opens a
//! pool on creation and pops it on drop, so the pool is balanced on every
//! exit path, including early returns and panics.
//!
//! Pools are per-thread and strictly nested. The guard is neither `Send` nor
//! `Sync`.
//!
//! ```rust
//! use oxibridge::{autoreleasepool, msg_send, Class, Id};
//!
//! let len = autoreleasepool(|_| unsafe {
//!     let class = Class::get("NSString").unwrap();
//!     let s: Id = msg_send![class, stringWithUTF8String: c"scratch".as_ptr()];
//!     let len: usize = msg_send![s, length];
//!     len
//! });
//! assert_eq!(len, 7);
//! ```

use crate::backend;
use oxibridge_log::trace;
use std::ffi::c_void;

/// An open autorelease pool, popped on drop.
#[derive(Debug)]
#[must_use = "the pool is popped as soon as the guard is dropped"]
pub struct AutoreleasePool {
    token: *mut c_void,
}

impl AutoreleasePool {
    /// Pushes a new pool on the current thread.
    pub fn enter() -> Self {
        let token = backend::pool_push();
        trace!("autorelease pool push {token:p}");
        AutoreleasePool { token }
    }

    /// Pops the pool now.
    pub fn exit(self) {
        drop(self);
    }
}

impl Drop for AutoreleasePool {
    fn drop(&mut self) {
        trace!("autorelease pool pop {:p}", self.token);
        // SAFETY: the token came from `pool_push` on this thread (the guard
        // is !Send) and is popped exactly once.
        unsafe { backend::pool_pop(self.token) };
    }
}

/// Runs `f` inside a fresh autorelease pool.
pub fn autoreleasepool<T, F>(f: F) -> T
where
    F: FnOnce(&AutoreleasePool) -> T,
{
    let pool = AutoreleasePool::enter();
    f(&pool)
}
