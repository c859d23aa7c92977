//! The system Objective-C runtime (`libobjc`).
//!
//! Thin wrappers over the runtime's C API. Message sends go through
//! `objc_msgSend` (or `objc_msgSend_stret` for large struct returns on
//! x86_64), reinterpreted by the dispatcher with the call site's signature.
//! The runtime cannot check that signature; the only pre-flight check here
//! is that the receiver's class responds to the selector.

use crate::error::{Error, Result};
use crate::runtime::encoding::Encoding;
use crate::runtime::message::Signature;
use crate::runtime::{Bool, Class, Id, Imp, Sel, Super};
use oxibridge_log::{error, trace};
use std::ffi::{CStr, CString, c_char, c_void};
use std::ptr::NonNull;

#[link(name = "objc", kind = "dylib")]
unsafe extern "C" {
    fn sel_registerName(name: *const c_char) -> *mut c_void;
    fn sel_getName(sel: Sel) -> *const c_char;

    fn objc_getClass(name: *const c_char) -> *mut c_void;
    fn object_getClass(object: *mut c_void) -> *mut c_void;
    fn class_getName(class: Class) -> *const c_char;
    fn class_getSuperclass(class: Class) -> *mut c_void;
    fn class_isMetaClass(class: Class) -> Bool;
    fn class_respondsToSelector(class: Class, sel: Sel) -> Bool;
    fn class_getInstanceMethod(class: Class, sel: Sel) -> *mut c_void;
    fn method_getTypeEncoding(method: *mut c_void) -> *const c_char;

    fn objc_allocateClassPair(
        superclass: Class,
        name: *const c_char,
        extra_bytes: usize,
    ) -> *mut c_void;
    fn objc_registerClassPair(class: Class);
    fn objc_disposeClassPair(class: Class);
    fn class_addMethod(class: Class, name: Sel, imp: Imp, types: *const c_char) -> Bool;

    fn objc_autoreleasePoolPush() -> *mut c_void;
    fn objc_autoreleasePoolPop(context: *mut c_void);

    fn objc_msgSend();
    fn objc_msgSendSuper();
    #[cfg(target_arch = "x86_64")]
    fn objc_msgSend_stret();
    #[cfg(target_arch = "x86_64")]
    fn objc_msgSendSuper_stret();
}

// NSString and friends live in Foundation.
#[link(name = "Foundation", kind = "framework")]
unsafe extern "C" {}

/// Largest struct returned in registers on x86_64.
#[cfg(target_arch = "x86_64")]
const MAX_REGISTER_RETURN: usize = 16;

/// Whether a return type needs the `_stret` entry points.
#[cfg_attr(not(target_arch = "x86_64"), allow(dead_code, unused_variables))]
fn returns_via_memory(ret: &Encoding) -> bool {
    #[cfg(target_arch = "x86_64")]
    {
        ret.is_struct() && ret.size() > MAX_REGISTER_RETURN
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        false
    }
}

fn c_name(name: &str) -> Result<CString> {
    CString::new(name).map_err(|_| Error::InvalidName {
        name: name.to_string(),
    })
}

/// Borrows a runtime-owned C string. Runtime names live for the process.
unsafe fn static_str(ptr: *const c_char) -> &'static str {
    if ptr.is_null() {
        return "";
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().unwrap_or("")
}

fn to_class(ptr: *mut c_void) -> Option<Class> {
    // SAFETY: non-null pointers handed out by the runtime's class API.
    NonNull::new(ptr).map(|ptr| unsafe { Class::from_raw(ptr) })
}

pub(crate) fn register_selector(name: &str) -> Result<Sel> {
    let name = c_name(name)?;
    let ptr = unsafe { sel_registerName(name.as_ptr()) };
    NonNull::new(ptr)
        // SAFETY: sel_registerName returns a registered selector.
        .map(|ptr| unsafe { Sel::from_raw(ptr) })
        .ok_or(Error::OutOfMemory)
}

pub(crate) fn selector_name(sel: Sel) -> &'static str {
    unsafe { static_str(sel_getName(sel)) }
}

pub(crate) fn get_class(name: &str) -> Option<Class> {
    let name = c_name(name).ok()?;
    to_class(unsafe { objc_getClass(name.as_ptr()) })
}

pub(crate) fn class_name(class: Class) -> &'static str {
    unsafe { static_str(class_getName(class)) }
}

pub(crate) fn class_superclass(class: Class) -> Option<Class> {
    to_class(unsafe { class_getSuperclass(class) })
}

pub(crate) fn metaclass(class: Class) -> Class {
    if unsafe { class_isMetaClass(class) }.as_bool() {
        return class;
    }
    match to_class(unsafe { object_getClass(class.as_ptr()) }) {
        Some(meta) => meta,
        None => crate::fatal!("class {} has no metaclass", class_name(class)),
    }
}

/// # Safety
///
/// `object` must be a live object or class.
pub(crate) unsafe fn object_class(object: Id) -> Option<Class> {
    to_class(unsafe { object_getClass(object.as_ptr()) })
}

pub(crate) fn class_responds_to(class: Class, sel: Sel) -> bool {
    unsafe { class_respondsToSelector(class, sel) }.as_bool()
}

pub(crate) fn method_type_encoding(class: Class, sel: Sel) -> Option<String> {
    let method = unsafe { class_getInstanceMethod(class, sel) };
    if method.is_null() {
        return None;
    }
    let types = unsafe { method_getTypeEncoding(method) };
    if types.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(types) }.to_string_lossy().into_owned())
}

pub(crate) fn allocate_class(superclass: Class, name: &str) -> Result<Class> {
    if get_class(superclass.name()) != Some(superclass) {
        return Err(Error::ClassNotFound {
            name: superclass.name().to_string(),
        });
    }
    let c = c_name(name)?;
    to_class(unsafe { objc_allocateClassPair(superclass, c.as_ptr(), 0) }).ok_or_else(|| {
        Error::ClassAlreadyExists {
            name: name.to_string(),
        }
    })
}

pub(crate) fn add_method(class: Class, sel: Sel, imp: Imp, types: &str) -> Result<()> {
    let encoding = CString::new(types).map_err(|_| Error::InvalidEncoding {
        encoding: types.to_string(),
    })?;
    // The runtime copies the encoding string.
    if !unsafe { class_addMethod(class, sel, imp, encoding.as_ptr()) }.as_bool() {
        return Err(Error::MethodAlreadyAttached {
            class: class_name(class).to_string(),
            selector: sel.name().to_string(),
        });
    }
    Ok(())
}

pub(crate) fn register_class(class: Class) {
    unsafe { objc_registerClassPair(class) }
}

pub(crate) fn dispose_class(class: Class) {
    unsafe { objc_disposeClassPair(class) }
}

fn check_responds(class: Class, sel: Sel) -> Result<()> {
    if class_responds_to(class, sel) {
        return Ok(());
    }
    let kind = if unsafe { class_isMetaClass(class) }.as_bool() { '+' } else { '-' };
    error!("{kind}[{} {sel}]: unrecognized selector", class_name(class));
    Err(Error::SelectorNotFound {
        class: class_name(class).to_string(),
        selector: sel.name().to_string(),
    })
}

/// # Safety
///
/// `receiver` must be a live, non-nil object or class.
pub(crate) unsafe fn resolve_send(receiver: Id, sel: Sel, signature: &Signature) -> Result<Imp> {
    let Some(class) = (unsafe { object_class(receiver) }) else {
        crate::fatal!("message {sel} sent to {receiver:?}, which has no class");
    };
    check_responds(class, sel)?;
    trace!("[{} {sel}] as {signature}", class_name(class));

    #[cfg(target_arch = "x86_64")]
    if returns_via_memory(&signature.ret) {
        return Ok(objc_msgSend_stret);
    }
    Ok(objc_msgSend)
}

/// Returns the super entry point and its first argument: a pointer to
/// `sup`, which must outlive the call.
///
/// # Safety
///
/// As for [`resolve_send`].
pub(crate) unsafe fn resolve_send_super(
    sup: &Super,
    sel: Sel,
    signature: &Signature,
) -> Result<(Imp, Id)> {
    check_responds(sup.superclass, sel)?;
    trace!("[super({}) {sel}] as {signature}", class_name(sup.superclass));

    let first = Id::from_ptr(std::ptr::from_ref(sup).cast_mut().cast::<c_void>());

    #[cfg(target_arch = "x86_64")]
    if returns_via_memory(&signature.ret) {
        return Ok((objc_msgSendSuper_stret, first));
    }
    Ok((objc_msgSendSuper, first))
}

pub(crate) fn pool_push() -> *mut c_void {
    unsafe { objc_autoreleasePoolPush() }
}

/// # Safety
///
/// `token` must come from [`pool_push`] on this thread and be popped once.
pub(crate) unsafe fn pool_pop(token: *mut c_void) {
    unsafe { objc_autoreleasePoolPop(token) }
}
