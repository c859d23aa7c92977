//! Headless autorelease pools.
//!
//! Each thread keeps a stack of pools. A pool's token is its 1-based depth,
//! so popping a token also pops every pool pushed after it, and a token
//! that is not on the stack is a fatal imbalance.

use super::object;
use crate::runtime::Id;
use oxibridge_log::{trace, warn};
use std::cell::RefCell;
use std::ffi::c_void;

thread_local! {
    static POOLS: RefCell<Vec<Vec<Id>>> = const { RefCell::new(Vec::new()) };
}

pub(crate) fn push() -> *mut c_void {
    let depth = POOLS.with_borrow_mut(|pools| {
        pools.push(Vec::new());
        pools.len()
    });
    std::ptr::without_provenance_mut(depth)
}

/// Pops the pool `token` and everything above it.
///
/// # Safety
///
/// Must be called on the thread that pushed `token`.
pub(crate) unsafe fn pop(token: *mut c_void) {
    let depth = token.addr();
    let drained = POOLS.with_borrow_mut(|pools| {
        if depth == 0 || depth > pools.len() {
            crate::fatal!(
                "autorelease pool {depth} popped out of order (depth {})",
                pools.len()
            );
        }
        if depth < pools.len() {
            warn!("popping {} inner autorelease pools", pools.len() - depth);
        }
        pools.split_off(depth - 1)
    });

    // Release outside the borrow: `release` may run `dealloc`, which may
    // push and pop pools of its own.
    for pool in drained.into_iter().rev() {
        trace!("draining {} autoreleased objects", pool.len());
        pool.into_iter().rev().for_each(object::release);
    }
}

/// Hands `id` to the innermost pool.
pub(crate) fn autorelease(id: Id) {
    let leaked = POOLS.with_borrow_mut(|pools| match pools.last_mut() {
        Some(pool) => {
            pool.push(id);
            false
        }
        None => true,
    });
    if leaked {
        warn!("{id:?} autoreleased with no pool in place, leaking");
    }
}

/// Number of open pools on this thread.
pub(crate) fn depth() -> usize {
    POOLS.with_borrow(Vec::len)
}

/// Objects waiting in the innermost pool.
#[cfg(test)]
fn pending() -> usize {
    POOLS.with_borrow(|pools| pools.last().map_or(0, Vec::len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Class;

    #[test]
    fn test_tokens_are_depths() {
        let base = depth();
        let outer = push();
        let inner = push();
        assert_eq!(outer.addr(), base + 1);
        assert_eq!(inner.addr(), base + 2);
        unsafe {
            pop(inner);
            pop(outer);
        }
        assert_eq!(depth(), base);
    }

    #[test]
    fn test_outer_pop_drains_inner() {
        let base = depth();
        let outer = push();
        let _inner = push();
        unsafe { pop(outer) };
        assert_eq!(depth(), base);
    }

    #[test]
    fn test_autorelease_released_on_pop() {
        let class = Class::get("NSObject").unwrap();
        let keep = object::allocate(class);
        object::increment(keep);

        let token = push();
        autorelease(keep);
        assert_eq!(pending(), 1);
        unsafe { pop(token) };

        assert_eq!(object::retain_count(keep), 1);
        object::decrement(keep);
        unsafe { object::destroy(keep) };
    }

    #[test]
    fn test_autorelease_without_pool_leaks() {
        std::thread::spawn(|| {
            let class = Class::get("NSObject").unwrap();
            let id = object::allocate(class);
            autorelease(id);
            assert_eq!(depth(), 0);
            assert_eq!(object::retain_count(id), 1);
        })
        .join()
        .unwrap();
    }
}
