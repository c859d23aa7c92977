//! In-process stand-in for the object runtime.
//!
//! Used wherever the system runtime is unavailable (or the `native` feature
//! is off). It implements the same contract as the native backend:
//! interned selectors, class pairs with a draft and a published state,
//! reference-counted instances, per-thread autorelease pools and message
//! lookup along the superclass chain. It ships the built-in classes in
//! [`appkit`].
//!
//! Unlike the system runtime it knows every method's registered encoding at
//! dispatch time, so with strict signatures on it refuses calls whose
//! declared signature differs from the method's.

mod appkit;
mod arena;
mod class;
mod object;
mod pool;
mod selector;

use crate::error::{Error, Result};
use crate::runtime::encoding::normalize;
use crate::runtime::message::{Signature, strict_signatures};
use crate::runtime::{Class, Id, Imp, Sel, Super};
use oxibridge_log::{error, trace};
use std::ffi::c_void;

pub(crate) use selector::{register_selector, selector_name};

pub(crate) fn get_class(name: &str) -> Option<Class> {
    appkit::builtins();
    class::get(name)
}

pub(crate) fn class_name(class: Class) -> &'static str {
    class::name(class)
}

pub(crate) fn class_superclass(class: Class) -> Option<Class> {
    class::superclass(class)
}

pub(crate) fn metaclass(class: Class) -> Class {
    class::metaclass(class)
}

/// # Safety
///
/// `object` must be a live instance or class.
pub(crate) unsafe fn object_class(object: Id) -> Option<Class> {
    unsafe { class::isa_of(object.as_ptr()) }
}

pub(crate) fn class_responds_to(class: Class, sel: Sel) -> bool {
    class::lookup(class, sel).is_some()
}

pub(crate) fn method_type_encoding(class: Class, sel: Sel) -> Option<String> {
    class::lookup(class, sel).map(|method| method.types.to_string())
}

pub(crate) fn allocate_class(superclass: Class, name: &str) -> Result<Class> {
    appkit::builtins();
    class::allocate(Some(superclass), name)
}

pub(crate) fn add_method(class: Class, sel: Sel, imp: Imp, types: &str) -> Result<()> {
    class::add_method(class, sel, imp, types)
}

pub(crate) fn register_class(class: Class) {
    class::register(class);
}

pub(crate) fn dispose_class(class: Class) {
    class::dispose(class);
}

/// Finds the implementation of `sel` for instances of `class` and checks
/// it against the call site's signature.
fn resolve(class: Class, sel: Sel, signature: &Signature) -> Result<Imp> {
    // Drafts and disposed classes are not dispatch targets.
    if !class::is_published(class) {
        error!("[{} {sel}]: class is not published", class.name());
        return Err(Error::ClassNotFound {
            name: class.name().to_string(),
        });
    }

    let Some(method) = class::lookup(class, sel) else {
        let kind = if class::is_metaclass(class) { '+' } else { '-' };
        error!("{kind}[{} {sel}]: unrecognized selector", class.name());
        return Err(Error::SelectorNotFound {
            class: class.name().to_string(),
            selector: sel.name().to_string(),
        });
    };

    if strict_signatures() && !signature.matches(method.types)? {
        let found = normalize(method.types)?;
        error!(
            "[{} {sel}] declared as {signature}, implemented as {found}",
            class.name()
        );
        return Err(Error::SignatureMismatch {
            selector: sel.name().to_string(),
            expected: signature.to_string(),
            found,
        });
    }

    trace!("[{} {sel}] -> {:p}", class.name(), method.imp as *const ());
    Ok(method.imp)
}

/// # Safety
///
/// `receiver` must be a live, non-nil instance or class.
pub(crate) unsafe fn resolve_send(receiver: Id, sel: Sel, signature: &Signature) -> Result<Imp> {
    let Some(class) = (unsafe { object_class(receiver) }) else {
        crate::fatal!("message {sel} sent to {receiver:?}, which has no class");
    };
    resolve(class, sel, signature)
}

/// Returns the superclass implementation and the receiver to call it with.
///
/// # Safety
///
/// As for [`resolve_send`].
pub(crate) unsafe fn resolve_send_super(
    sup: &Super,
    sel: Sel,
    signature: &Signature,
) -> Result<(Imp, Id)> {
    let imp = resolve(sup.superclass, sel, signature)?;
    Ok((imp, sup.receiver))
}

pub(crate) fn pool_push() -> *mut c_void {
    pool::push()
}

/// # Safety
///
/// `token` must come from [`pool_push`] on this thread.
pub(crate) unsafe fn pool_pop(token: *mut c_void) {
    unsafe { pool::pop(token) }
}

/// Number of autorelease pools open on the calling thread.
#[must_use]
pub fn pool_depth() -> usize {
    pool::depth()
}

/// Number of headless instances currently alive, process-wide.
#[must_use]
pub fn live_objects() -> usize {
    object::live_count()
}
