//! Runtime backends.
//!
//! Both backends expose the same set of free functions; exactly one is
//! compiled in:
//!
//! - `native`: the system Objective-C runtime, on Apple targets with the
//!   `native` feature
//! - `headless`: the in-process runtime everywhere else

#[cfg(all(feature = "native", target_vendor = "apple"))]
mod native;
#[cfg(all(feature = "native", target_vendor = "apple"))]
pub(crate) use native::*;

#[cfg(not(all(feature = "native", target_vendor = "apple")))]
pub(crate) mod headless;
#[cfg(not(all(feature = "native", target_vendor = "apple")))]
pub(crate) use headless::{
    add_method, allocate_class, class_name, class_responds_to, class_superclass, dispose_class,
    get_class, metaclass, method_type_encoding, object_class, pool_pop, pool_push,
    register_class, register_selector, resolve_send, resolve_send_super, selector_name,
};
