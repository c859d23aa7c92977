//! Bump arena for runtime metadata.
//!
//! Selector names, class records and class names live for the rest of the
//! process, so they are bump-allocated out of large chunks and never freed.
//! Pointers handed out are stable: chunks are never moved or released.
//!
//! Allocation is lock-free while the current chunk has room; growing takes a
//! mutex so only one thread installs the next chunk.

use crate::error::{Error, Result};
use std::alloc::{self, Layout};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};

/// Alignment of every chunk.
const CHUNK_ALIGN: usize = 16;

/// First chunk size (one page).
const MIN_CHUNK_SIZE: usize = 4096;

/// Chunks stop doubling at this size.
const MAX_CHUNK_SIZE: usize = 1024 * 1024;

/// A fixed-size memory block with an atomic bump pointer.
struct Chunk {
    ptr: AtomicPtr<u8>,
    end: usize,
    capacity: usize,
}

impl Chunk {
    fn new(size: usize) -> Result<Chunk> {
        let layout =
            Layout::from_size_align(size, CHUNK_ALIGN).map_err(|_| Error::OutOfMemory)?;
        // SAFETY: `size` is at least MIN_CHUNK_SIZE, so the layout is non-zero.
        let start = unsafe { alloc::alloc(layout) };
        let start = NonNull::new(start).ok_or(Error::OutOfMemory)?;

        Ok(Chunk {
            ptr: AtomicPtr::new(start.as_ptr()),
            end: start.as_ptr().addr() + size,
            capacity: size,
        })
    }

    /// Claims `size` bytes at `align`, or `None` if the chunk is full.
    fn try_alloc(&self, size: usize, align: usize) -> Option<NonNull<u8>> {
        loop {
            let current = self.ptr.load(Ordering::Acquire);
            let aligned = round_up(current.addr(), align);
            let next = aligned.checked_add(size)?;
            if next > self.end {
                return None;
            }

            if self
                .ptr
                .compare_exchange_weak(
                    current,
                    current.with_addr(next),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                return NonNull::new(current.with_addr(aligned));
            }
        }
    }

    #[cfg(test)]
    fn remaining(&self) -> usize {
        self.end.saturating_sub(self.ptr.load(Ordering::Acquire).addr())
    }
}

#[inline]
fn round_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    value.wrapping_add(align - 1) & !(align - 1)
}

/// Process-lifetime bump allocator.
pub(crate) struct Arena {
    current: AtomicPtr<Chunk>,
    grow_lock: Mutex<()>,
}

impl Arena {
    fn new() -> Result<Arena> {
        let chunk = Box::leak(Box::new(Chunk::new(MIN_CHUNK_SIZE)?));
        Ok(Arena {
            current: AtomicPtr::new(chunk),
            grow_lock: Mutex::new(()),
        })
    }

    /// Moves `value` into the arena.
    pub(crate) fn alloc<T>(&self, value: T) -> Result<NonNull<T>> {
        let layout = Layout::new::<T>();
        let ptr = self.alloc_layout(layout)?.cast::<T>();
        // SAFETY: freshly claimed, aligned for T and large enough.
        unsafe { ptr.as_ptr().write(value) };
        Ok(ptr)
    }

    /// Copies `s` into the arena with a trailing NUL.
    ///
    /// The returned slice excludes the NUL; the byte after it is readable
    /// through the pointer, so it doubles as a C string.
    pub(crate) fn alloc_str(&self, s: &str) -> Result<&'static str> {
        let layout = Layout::array::<u8>(s.len() + 1).map_err(|_| Error::OutOfMemory)?;
        let ptr = self.alloc_layout(layout)?.as_ptr();
        // SAFETY: `ptr` has room for `s.len() + 1` bytes and the arena never
        // frees or moves it. The copied bytes are valid UTF-8.
        unsafe {
            ptr::copy_nonoverlapping(s.as_ptr(), ptr, s.len());
            ptr.add(s.len()).write(0);
            let bytes = std::slice::from_raw_parts(ptr, s.len());
            Ok(std::str::from_utf8_unchecked(bytes))
        }
    }

    fn alloc_layout(&self, layout: Layout) -> Result<NonNull<u8>> {
        // Zero-sized values still get a distinct address.
        let size = layout.size().max(1);
        loop {
            // SAFETY: chunks are leaked and live for the process.
            let chunk = unsafe { &*self.current.load(Ordering::Acquire) };
            if let Some(ptr) = chunk.try_alloc(size, layout.align()) {
                return Ok(ptr);
            }
            self.grow(chunk, size + layout.align())?;
        }
    }

    #[cold]
    fn grow(&self, full: &Chunk, min_size: usize) -> Result<()> {
        let _guard = self.grow_lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Another thread may have grown the arena while we waited.
        if !ptr::eq(self.current.load(Ordering::Acquire), full) {
            return Ok(());
        }

        let size = (full.capacity * 2)
            .min(MAX_CHUNK_SIZE)
            .max(min_size.next_power_of_two());
        let chunk = Box::leak(Box::new(Chunk::new(size)?));
        self.current.store(chunk, Ordering::Release);
        Ok(())
    }

    /// Bytes left in the current chunk.
    #[cfg(test)]
    fn remaining(&self) -> usize {
        // SAFETY: see `alloc_layout`.
        unsafe { &*self.current.load(Ordering::Acquire) }.remaining()
    }
}

/// The shared metadata arena.
pub(crate) fn arena() -> &'static Arena {
    static ARENA: OnceLock<Arena> = OnceLock::new();
    ARENA.get_or_init(|| match Arena::new() {
        Ok(arena) => arena,
        Err(err) => crate::fatal!("cannot create metadata arena: {err}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_alloc_value() {
        let arena = Arena::new().unwrap();
        let a = arena.alloc(42u32).unwrap();
        let b = arena.alloc(7u64).unwrap();
        unsafe {
            assert_eq!(*a.as_ptr(), 42);
            assert_eq!(*b.as_ptr(), 7);
        }
        assert_eq!(b.as_ptr().addr() % std::mem::align_of::<u64>(), 0);
    }

    #[test]
    fn test_alloc_str_is_nul_terminated() {
        let arena = Arena::new().unwrap();
        let s = arena.alloc_str("setTitle:").unwrap();
        assert_eq!(s, "setTitle:");
        let c = unsafe { std::ffi::CStr::from_ptr(s.as_ptr().cast()) };
        assert_eq!(c.to_str().unwrap(), "setTitle:");
    }

    #[test]
    fn test_grows_past_first_chunk() {
        let arena = Arena::new().unwrap();
        let first: Vec<_> = (0..2048u64).map(|i| arena.alloc(i).unwrap()).collect();
        for (i, ptr) in first.iter().enumerate() {
            assert_eq!(unsafe { *ptr.as_ptr() }, i as u64);
        }
        assert!(arena.remaining() > 0);
    }

    #[test]
    fn test_large_allocation() {
        let arena = Arena::new().unwrap();
        let big = "x".repeat(3 * MAX_CHUNK_SIZE / 2);
        assert_eq!(arena.alloc_str(&big).unwrap().len(), big.len());
    }

    #[test]
    fn test_concurrent_alloc() {
        let arena = arena();
        let handles: Vec<_> = (0..8)
            .map(|t| {
                thread::spawn(move || {
                    (0..500u64)
                        .map(|i| arena.alloc(t * 1000 + i).unwrap().as_ptr().addr())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut addrs: Vec<usize> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let total = addrs.len();
        addrs.sort_unstable();
        addrs.dedup();
        assert_eq!(addrs.len(), total);
    }
}
