// Shared helpers for the integration tests.
//
// Every test binary runs its tests on parallel threads within one process,
// and class names are process-global, so declared classes get unique names.

#![allow(dead_code)]

use oxibridge::{Class, Id, msg_send};
use std::ffi::{CStr, CString, c_char};
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_CLASS: AtomicUsize = AtomicUsize::new(0);

/// A class name no other test in this process uses.
pub fn unique_name(prefix: &str) -> String {
    format!("{prefix}_{}", NEXT_CLASS.fetch_add(1, Ordering::SeqCst))
}

pub fn class(name: &str) -> Class {
    Class::get(name).unwrap_or_else(|| panic!("class {name} is not registered"))
}

pub fn object_class() -> Class {
    class("NSObject")
}

/// An autoreleased string. Call inside a pool.
pub fn string(text: &str) -> Id {
    let text = CString::new(text).expect("test strings have no NUL");
    unsafe { msg_send![class("NSString"), stringWithUTF8String: text.as_ptr()] }
}

/// Copies a string object's contents out.
pub fn text(string: Id) -> Option<String> {
    let ptr: *const c_char = unsafe { msg_send![string, UTF8String] };
    if ptr.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

pub fn retain_count(object: Id) -> usize {
    unsafe { msg_send![object, retainCount] }
}

pub fn release(object: Id) {
    let _: () = unsafe { msg_send![object, release] };
}
