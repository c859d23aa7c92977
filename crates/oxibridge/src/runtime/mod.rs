//! Handles and mechanisms for talking to the object runtime.
//!
//! - [`selector`]: interned selector tokens and the [`sel!`](crate::sel) macro
//! - [`encoding`]: the [`Encode`] trait and type encoding strings
//! - [`geometry`]: by-value `Point`, `Size` and `Rect`
//! - [`message`]: the typed dispatcher behind [`msg_send!`](crate::msg_send)
//! - [`declare`]: run-time class declaration (draft, then publish)
//! - [`pool`]: autorelease scopes
//!
//! The handle types here are pointer-sized and `#[repr(transparent)]` so they
//! cross the C ABI exactly as the runtime's own `id`, `Class` and `SEL` do.

pub mod declare;
pub mod encoding;
pub mod geometry;
pub mod message;
pub mod pool;
pub mod selector;

pub use declare::{ClassDecl, MethodImplementation};
pub use encoding::{Bool, Encode, Encoding};
pub use geometry::{Point, Rect, Size};
pub use message::{MessageArguments, MessageReceiver, Signature};
pub use pool::{AutoreleasePool, autoreleasepool};
pub use selector::Sel;

use crate::backend;
use crate::error::{Error, Result};
use std::ffi::c_void;
use std::fmt;
use std::ptr::{self, NonNull};

/// Untyped method implementation pointer.
///
/// Every implementation really has the type
/// `unsafe extern "C" fn(receiver, Sel, args...) -> ret`; the dispatcher is
/// the only place that turns an `Imp` back into that type.
pub type Imp = unsafe extern "C" fn();

/// Handle to an instance living in the runtime. May be nil.
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Id(*mut c_void);

impl Id {
    /// The nil handle.
    pub const NIL: Id = Id(ptr::null_mut());

    /// Wraps a raw object pointer.
    #[inline]
    #[must_use]
    pub const fn from_ptr(ptr: *mut c_void) -> Self {
        Id(ptr)
    }

    /// Returns the raw object pointer.
    #[inline]
    #[must_use]
    pub const fn as_ptr(self) -> *mut c_void {
        self.0
    }

    /// Reports whether this is the nil handle.
    #[inline]
    #[must_use]
    pub fn is_nil(self) -> bool {
        self.0.is_null()
    }

    /// Returns the class of the object, or `None` for nil.
    #[must_use]
    pub fn class(self) -> Option<Class> {
        if self.is_nil() {
            None
        } else {
            // SAFETY: non-nil handles come from the runtime and point at an
            // object whose first word is its class pointer.
            unsafe { backend::object_class(self) }
        }
    }
}

impl Default for Id {
    fn default() -> Self {
        Id::NIL
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nil() {
            f.write_str("nil")
        } else {
            write!(f, "Id({:p})", self.0)
        }
    }
}

/// Handle to a registered (or draft) class. Never null.
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Class(NonNull<c_void>);

impl Class {
    /// Wraps a raw class pointer.
    ///
    /// # Safety
    ///
    /// `ptr` must point at a class known to the active backend.
    #[inline]
    #[must_use]
    pub const unsafe fn from_raw(ptr: NonNull<c_void>) -> Self {
        Class(ptr)
    }

    /// Returns the raw class pointer.
    #[inline]
    #[must_use]
    pub const fn as_ptr(self) -> *mut c_void {
        self.0.as_ptr()
    }

    /// Looks up a published class by name.
    #[must_use]
    pub fn get(name: &str) -> Option<Class> {
        backend::get_class(name)
    }

    /// Looks up a published class by name, failing with
    /// [`Error::ClassNotFound`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClassNotFound`] if nothing is registered as `name`.
    pub fn require(name: &str) -> Result<Class> {
        Class::get(name).ok_or_else(|| Error::ClassNotFound {
            name: name.to_string(),
        })
    }

    /// Returns the class name.
    #[must_use]
    pub fn name(self) -> &'static str {
        backend::class_name(self)
    }

    /// Returns the superclass, or `None` for a root class.
    #[must_use]
    pub fn superclass(self) -> Option<Class> {
        backend::class_superclass(self)
    }

    /// Returns the metaclass, which holds the class-level methods.
    #[must_use]
    pub fn metaclass(self) -> Class {
        backend::metaclass(self)
    }

    /// Reports whether instances of this class respond to `sel`.
    #[must_use]
    pub fn responds_to(self, sel: Sel) -> bool {
        backend::class_responds_to(self, sel)
    }

    /// Returns the registered type encoding of the instance method `sel`.
    #[must_use]
    pub fn method_encoding(self, sel: Sel) -> Option<String> {
        backend::method_type_encoding(self, sel)
    }

    /// Reports whether `self` is `other` or inherits from it.
    #[must_use]
    pub fn is_subclass_of(self, other: Class) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if class == other {
                return true;
            }
            current = class.superclass();
        }
        false
    }

    /// Returns the class object as a message receiver handle.
    #[inline]
    #[must_use]
    pub const fn as_id(self) -> Id {
        Id(self.0.as_ptr())
    }
}

// SAFETY: class metadata is process-global and internally synchronized by
// the runtime.
unsafe impl Send for Class {}
unsafe impl Sync for Class {}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Class").field(&self.name()).finish()
    }
}

/// Receiver and starting class for a message to super.
///
/// Layout matches the runtime's `struct objc_super`.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct Super {
    /// Object receiving the message.
    pub receiver: Id,
    /// Class where method lookup starts.
    pub superclass: Class,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    #[test]
    fn test_handles_are_pointer_sized() {
        assert_eq!(size_of::<Id>(), size_of::<*mut c_void>());
        assert_eq!(size_of::<Class>(), size_of::<*mut c_void>());
        assert_eq!(size_of::<Option<Class>>(), size_of::<*mut c_void>());
        assert_eq!(size_of::<Sel>(), size_of::<*mut c_void>());
        assert_eq!(size_of::<Super>(), 2 * size_of::<*mut c_void>());
        assert_eq!(align_of::<Super>(), align_of::<*mut c_void>());
    }

    #[test]
    fn test_nil_handle() {
        assert!(Id::NIL.is_nil());
        assert!(Id::default().is_nil());
        assert_eq!(Id::NIL.class(), None);
        assert_eq!(format!("{:?}", Id::NIL), "nil");
    }

    #[test]
    fn test_class_lookup() {
        let object = Class::get("NSObject").unwrap();
        assert_eq!(object.name(), "NSObject");
        assert!(object.superclass().is_none());
        assert!(Class::get("NoSuchClassAnywhere").is_none());
        assert_eq!(
            Class::require("NoSuchClassAnywhere"),
            Err(Error::ClassNotFound {
                name: "NoSuchClassAnywhere".into()
            })
        );
    }

    #[test]
    fn test_is_subclass_of() {
        let object = Class::get("NSObject").unwrap();
        let string = Class::get("NSString").unwrap();
        assert!(string.is_subclass_of(object));
        assert!(string.is_subclass_of(string));
        assert!(!object.is_subclass_of(string));
    }
}
