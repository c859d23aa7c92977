//! Headless instances.
//!
//! An instance is a heap record whose first word is its class, followed by a
//! retain count and a table of named instance variables. Instance variables
//! that hold objects either own a reference (released when the object is
//! destroyed) or are plain back-references such as delegates and targets.

use super::class::ClassInner;
use crate::runtime::{Bool, Class, Id, Rect, Sel};
use crate::sel;
use fxhash::FxHashMap;
use oxibridge_log::{trace, warn};
use std::ffi::{CString, c_void};
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Number of instances allocated and not yet destroyed.
static LIVE: AtomicUsize = AtomicUsize::new(0);

/// An instance variable.
#[derive(Clone, Debug)]
pub(crate) enum Value {
    /// Owned reference.
    Object(Id),
    /// Owned references, in order.
    Objects(Vec<Id>),
    /// Unretained back-reference.
    Unretained(Id),
    Rect(Rect),
    Bool(Bool),
    Int(isize),
    UInt(usize),
    Sel(Option<Sel>),
    Text(CString),
}

#[repr(C)]
struct RawObject {
    /// Must stay first.
    isa: *const ClassInner,
    refcount: AtomicUsize,
    ivars: Mutex<FxHashMap<&'static str, Value>>,
}

fn raw<'a>(id: Id) -> &'a RawObject {
    // SAFETY: callers only pass live headless instances, which are
    // `RawObject` allocations.
    unsafe { &*id.as_ptr().cast::<RawObject>() }
}

/// Allocates an instance of `class` with a retain count of one.
pub(crate) fn allocate(class: Class) -> Id {
    let object = Box::new(RawObject {
        isa: class.as_ptr().cast::<ClassInner>(),
        refcount: AtomicUsize::new(1),
        ivars: Mutex::new(FxHashMap::default()),
    });
    LIVE.fetch_add(1, Ordering::Relaxed);
    let id = Id::from_ptr(Box::into_raw(object).cast::<c_void>());
    trace!("alloc {} {id:?}", class.name());
    id
}

/// Frees an instance, releasing the references its ivars own.
///
/// # Safety
///
/// `id` must be a live instance with no remaining users.
pub(crate) unsafe fn destroy(id: Id) {
    // SAFETY: guaranteed by the caller; this is the Box from `allocate`.
    let object = unsafe { Box::from_raw(id.as_ptr().cast::<RawObject>()) };
    let ivars = mem::take(
        &mut *object
            .ivars
            .lock()
            .unwrap_or_else(PoisonError::into_inner),
    );
    drop(object);
    LIVE.fetch_sub(1, Ordering::Relaxed);
    trace!("freed {id:?}");

    for value in ivars.into_values() {
        match value {
            Value::Object(owned) => release(owned),
            Value::Objects(owned) => owned.into_iter().for_each(release),
            _ => {}
        }
    }
}

pub(crate) fn retain_count(id: Id) -> usize {
    raw(id).refcount.load(Ordering::Acquire)
}

pub(crate) fn increment(id: Id) {
    raw(id).refcount.fetch_add(1, Ordering::AcqRel);
}

/// Drops one reference. Returns `true` when it was the last one.
pub(crate) fn decrement(id: Id) -> bool {
    let previous = raw(id).refcount.fetch_sub(1, Ordering::AcqRel);
    if previous == 0 {
        crate::fatal!("over-release of {id:?}");
    }
    previous == 1
}

/// Sends `retain` unless nil.
pub(crate) fn retain(id: Id) -> Id {
    if !id.is_nil() {
        let _: Id = unsafe { crate::runtime::message::send(id, sel!(retain), ()) };
    }
    id
}

/// Sends `release` unless nil.
pub(crate) fn release(id: Id) {
    if !id.is_nil() {
        let _: () = unsafe { crate::runtime::message::send(id, sel!(release), ()) };
    }
}

pub(crate) fn get(id: Id, key: &'static str) -> Option<Value> {
    raw(id)
        .ivars
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(key)
        .cloned()
}

/// Stores a value, returning the previous one. No retain bookkeeping.
pub(crate) fn set(id: Id, key: &'static str, value: Value) -> Option<Value> {
    raw(id)
        .ivars
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(key, value)
}

/// Runs `f` on the ivar table under its lock. `f` must not send messages.
pub(crate) fn with_ivars<R>(id: Id, f: impl FnOnce(&mut FxHashMap<&'static str, Value>) -> R) -> R {
    f(&mut raw(id).ivars.lock().unwrap_or_else(PoisonError::into_inner))
}

/// Stores an owned object reference: retains the new value and releases
/// the old one. Storing nil clears the slot.
pub(crate) fn set_object(id: Id, key: &'static str, value: Id) {
    let old = if value.is_nil() {
        with_ivars(id, |ivars| ivars.remove(key))
    } else {
        set(id, key, Value::Object(retain(value)))
    };
    if let Some(Value::Object(old)) = old {
        release(old);
    }
}

/// Reads an object ivar, owned or not. Missing slots read as nil.
pub(crate) fn object(id: Id, key: &'static str) -> Id {
    match get(id, key) {
        Some(Value::Object(obj) | Value::Unretained(obj)) => obj,
        Some(other) => {
            warn!("ivar {key} of {id:?} holds {other:?}, not an object");
            Id::NIL
        }
        None => Id::NIL,
    }
}

pub(crate) fn rect(id: Id, key: &'static str) -> Rect {
    match get(id, key) {
        Some(Value::Rect(rect)) => rect,
        _ => Rect::ZERO,
    }
}

pub(crate) fn flag(id: Id, key: &'static str) -> Bool {
    match get(id, key) {
        Some(Value::Bool(flag)) => flag,
        _ => Bool::NO,
    }
}

pub(crate) fn int(id: Id, key: &'static str) -> isize {
    match get(id, key) {
        Some(Value::Int(v)) => v,
        _ => 0,
    }
}

pub(crate) fn uint(id: Id, key: &'static str) -> usize {
    match get(id, key) {
        Some(Value::UInt(v)) => v,
        _ => 0,
    }
}

/// Number of live instances.
pub(crate) fn live_count() -> usize {
    LIVE.load(Ordering::Relaxed)
}
