//! Headless selector table.
//!
//! Names are interned into the metadata arena; the token handed out is the
//! address of the interned record, so equal names give pointer-equal tokens.
//!
//! The table is split into `NUM_SHARDS` shards selected by the low bits of
//! the name's `FxHash`, each a fixed array of bucket chains behind its own
//! `RwLock`. Lookups of known names take one read lock on one shard.

#![allow(clippy::cast_possible_truncation)]

use super::arena::arena;
use crate::error::Result;
use crate::runtime::Sel;
use fxhash::FxHasher;
use std::ffi::c_void;
use std::hash::{Hash, Hasher};
use std::ptr::{self, NonNull};
use std::sync::{OnceLock, PoisonError, RwLock};

/// Number of shards (power of two).
const NUM_SHARDS: usize = 16;

/// Bucket chains per shard (power of two).
const BUCKETS_PER_SHARD: usize = 256;

const SHARD_MASK: usize = NUM_SHARDS - 1;

/// Bucket bits start above the shard bits so the two indices are independent.
const BUCKET_SHIFT: u32 = NUM_SHARDS.trailing_zeros();
const BUCKET_MASK: usize = BUCKETS_PER_SHARD - 1;

/// An interned selector record. Never freed.
#[repr(C)]
struct InternedSelector {
    name: &'static str,
    hash: u64,
    next: *const InternedSelector,
}

struct SelectorShard {
    buckets: RwLock<Box<[*const InternedSelector]>>,
}

struct SelectorTable {
    shards: [SelectorShard; NUM_SHARDS],
}

// SAFETY: the chains point at arena records that are immutable once
// published and never freed; each shard's lock guards its heads.
unsafe impl Send for SelectorTable {}
unsafe impl Sync for SelectorTable {}

fn table() -> &'static SelectorTable {
    static TABLE: OnceLock<SelectorTable> = OnceLock::new();
    TABLE.get_or_init(|| SelectorTable {
        shards: std::array::from_fn(|_| SelectorShard {
            buckets: RwLock::new(vec![ptr::null(); BUCKETS_PER_SHARD].into_boxed_slice()),
        }),
    })
}

fn hash_name(name: &str) -> u64 {
    let mut hasher = FxHasher::default();
    name.hash(&mut hasher);
    hasher.finish()
}

/// Walks a bucket chain for `name`.
fn find(mut current: *const InternedSelector, name: &str, hash: u64) -> Option<Sel> {
    while !current.is_null() {
        // SAFETY: chain entries are live arena records.
        let interned = unsafe { &*current };
        if interned.hash == hash && interned.name == name {
            return Some(to_sel(current));
        }
        current = interned.next;
    }
    None
}

fn to_sel(record: *const InternedSelector) -> Sel {
    // SAFETY: `record` is a non-null arena record owned by this table.
    unsafe { Sel::from_raw(NonNull::new_unchecked(record.cast_mut().cast::<c_void>())) }
}

/// Interns `name`, returning the same token for the same name.
pub(crate) fn register_selector(name: &str) -> Result<Sel> {
    let hash = hash_name(name);
    let shard = &table().shards[(hash as usize) & SHARD_MASK];
    let bucket = ((hash >> BUCKET_SHIFT) as usize) & BUCKET_MASK;

    {
        let buckets = shard.buckets.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(sel) = find(buckets[bucket], name, hash) {
            return Ok(sel);
        }
    }

    let mut buckets = shard.buckets.write().unwrap_or_else(PoisonError::into_inner);
    // Another thread may have interned it between the two locks.
    if let Some(sel) = find(buckets[bucket], name, hash) {
        return Ok(sel);
    }

    let arena = arena();
    let record = arena.alloc(InternedSelector {
        name: arena.alloc_str(name)?,
        hash,
        next: buckets[bucket],
    })?;
    buckets[bucket] = record.as_ptr();
    Ok(to_sel(record.as_ptr()))
}

/// Returns the interned name behind a token.
pub(crate) fn selector_name(sel: Sel) -> &'static str {
    // SAFETY: headless tokens are `InternedSelector` addresses.
    unsafe { (*sel.as_ptr().cast::<InternedSelector>()).name }
}

/// Number of interned selectors, for diagnostics.
#[cfg(test)]
fn interned_count() -> usize {
    table()
        .shards
        .iter()
        .map(|shard| {
            let buckets = shard.buckets.read().unwrap_or_else(PoisonError::into_inner);
            buckets
                .iter()
                .map(|&head| {
                    let mut count = 0;
                    let mut current = head;
                    while !current.is_null() {
                        count += 1;
                        // SAFETY: chain entries are live arena records.
                        current = unsafe { (*current).next };
                    }
                    count
                })
                .sum::<usize>()
        })
        .sum()
}
