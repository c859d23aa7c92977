//! Headless class records.
//!
//! Every class is a pair: the class record, whose method table holds
//! instance methods, and its metaclass, whose table holds class methods.
//! Both start with an `isa` word so a class can be messaged like any object:
//!
//! ```text
//!  instance ──isa──▶ Class ──isa──▶ Meta ──isa──▶ root Meta
//!                      │              │
//!                 superclass     superclass
//!                      ▼              ▼
//!                 SuperClass ──▶ SuperMeta ─ ... ─▶ root Meta ──▶ root Class
//! ```
//!
//! The root metaclass inherits from the root class, so class objects answer
//! root instance methods too.
//!
//! Records are allocated in the metadata arena and never freed. A record is
//! a draft until [`register`] publishes it; lookups by name only see
//! published classes, and published method tables are sealed.

use super::arena::arena;
use crate::error::{Error, Result};
use crate::runtime::{Class, Imp, Sel};
use fxhash::FxHashMap;
use oxibridge_log::{debug, trace};
use std::ffi::c_void;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{OnceLock, PoisonError, RwLock};

const DRAFT: u8 = 0;
const PUBLISHED: u8 = 1;
const DISPOSED: u8 = 2;

/// A method table entry.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Method {
    pub(crate) imp: Imp,
    pub(crate) types: &'static str,
}

/// Class or metaclass record.
#[repr(C)]
pub(crate) struct ClassInner {
    /// Must stay first: objects and classes share the header word.
    isa: *const ClassInner,
    superclass: *const ClassInner,
    name: &'static str,
    is_meta: bool,
    state: AtomicU8,
    methods: RwLock<FxHashMap<Sel, Method>>,
    /// Resolved lookups, including inherited methods. Filled only once
    /// published, when the table can no longer change.
    cache: RwLock<FxHashMap<Sel, Method>>,
}

impl ClassInner {
    fn new(name: &'static str, is_meta: bool) -> Self {
        ClassInner {
            isa: ptr::null(),
            superclass: ptr::null(),
            name,
            is_meta,
            state: AtomicU8::new(DRAFT),
            methods: RwLock::new(FxHashMap::default()),
            cache: RwLock::new(FxHashMap::default()),
        }
    }

    fn is_published(&self) -> bool {
        self.state.load(Ordering::Acquire) == PUBLISHED
    }
}

#[derive(Clone, Copy)]
struct ClassPtr(NonNull<ClassInner>);

// SAFETY: records are arena-allocated, never freed, and their mutable parts
// are behind locks or atomics.
unsafe impl Send for ClassPtr {}
unsafe impl Sync for ClassPtr {}

/// All non-disposed classes by name, drafts included.
fn table() -> &'static RwLock<FxHashMap<&'static str, ClassPtr>> {
    static TABLE: OnceLock<RwLock<FxHashMap<&'static str, ClassPtr>>> = OnceLock::new();
    TABLE.get_or_init(|| RwLock::new(FxHashMap::default()))
}

pub(crate) fn inner(class: Class) -> &'static ClassInner {
    // SAFETY: headless class handles are `ClassInner` addresses in the arena.
    unsafe { &*class.as_ptr().cast::<ClassInner>() }
}

fn handle(record: *const ClassInner) -> Option<Class> {
    NonNull::new(record.cast_mut().cast::<c_void>())
        // SAFETY: `record` is a live arena `ClassInner`.
        .map(|ptr| unsafe { Class::from_raw(ptr) })
}

/// Allocates a class pair as a draft.
///
/// `superclass` of `None` creates a root class.
///
/// # Errors
///
/// [`Error::ClassAlreadyExists`] if the name is taken by a class in any
/// state, [`Error::ClassNotFound`] if `superclass` is unpublished.
pub(crate) fn allocate(superclass: Option<Class>, name: &str) -> Result<Class> {
    if let Some(superclass) = superclass {
        if !inner(superclass).is_published() {
            return Err(Error::ClassNotFound {
                name: superclass.name().to_string(),
            });
        }
    }

    let mut classes = table().write().unwrap_or_else(PoisonError::into_inner);
    if classes.contains_key(name) {
        return Err(Error::ClassAlreadyExists {
            name: name.to_string(),
        });
    }

    let arena = arena();
    let name = arena.alloc_str(name)?;
    let class = arena.alloc(ClassInner::new(name, false))?.as_ptr();
    let meta = arena.alloc(ClassInner::new(name, true))?.as_ptr();

    // SAFETY: both records were just allocated and are not yet shared.
    unsafe {
        (*class).isa = meta;
        match superclass {
            Some(superclass) => {
                let super_inner = inner(superclass);
                (*class).superclass = super_inner;
                (*meta).superclass = super_inner.isa;
                // Every metaclass's isa is the root metaclass.
                (*meta).isa = (*super_inner.isa).isa;
            }
            None => {
                (*meta).superclass = class;
                (*meta).isa = meta;
            }
        }
    }

    classes.insert(name, ClassPtr(NonNull::new(class).ok_or(Error::OutOfMemory)?));
    debug!("allocated class pair {name}");
    handle(class).ok_or(Error::OutOfMemory)
}

/// Publishes a class pair.
pub(crate) fn register(class: Class) {
    let class = inner(class);
    class.state.store(PUBLISHED, Ordering::Release);
    // SAFETY: a class's isa is its live metaclass.
    unsafe { &*class.isa }.state.store(PUBLISHED, Ordering::Release);
}

/// Forgets a draft class pair. Published classes are left alone.
pub(crate) fn dispose(class: Class) {
    let record = inner(class);
    if record.is_published() {
        return;
    }

    table()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(record.name);
    // SAFETY: a class's isa is its live metaclass.
    for r in [record, unsafe { &*record.isa }] {
        r.state.store(DISPOSED, Ordering::Release);
        r.methods.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
    debug!("disposed class pair {}", record.name);
}

/// Looks up a published class.
pub(crate) fn get(name: &str) -> Option<Class> {
    let classes = table().read().unwrap_or_else(PoisonError::into_inner);
    let record = classes.get(name)?;
    // SAFETY: table entries are live arena records.
    if unsafe { record.0.as_ref() }.is_published() {
        handle(record.0.as_ptr())
    } else {
        None
    }
}

pub(crate) fn name(class: Class) -> &'static str {
    inner(class).name
}

pub(crate) fn superclass(class: Class) -> Option<Class> {
    handle(inner(class).superclass)
}

pub(crate) fn metaclass(class: Class) -> Class {
    let record = inner(class);
    if record.is_meta {
        return class;
    }
    // A class record always has its metaclass.
    match handle(record.isa) {
        Some(meta) => meta,
        None => crate::fatal!("class {} has no metaclass", record.name),
    }
}

pub(crate) fn is_metaclass(class: Class) -> bool {
    inner(class).is_meta
}

/// Adds a method to a draft.
///
/// # Errors
///
/// [`Error::ClassPublished`] if the class is not a draft,
/// [`Error::MethodAlreadyAttached`] if it already has an entry for `sel`,
/// [`Error::OutOfMemory`] if the encoding cannot be stored.
pub(crate) fn add_method(class: Class, sel: Sel, imp: Imp, types: &str) -> Result<()> {
    let record = inner(class);
    if record.state.load(Ordering::Acquire) != DRAFT {
        return Err(Error::ClassPublished {
            name: record.name.to_string(),
        });
    }

    let mut methods = record.methods.write().unwrap_or_else(PoisonError::into_inner);
    if methods.contains_key(&sel) {
        return Err(Error::MethodAlreadyAttached {
            class: record.name.to_string(),
            selector: sel.name().to_string(),
        });
    }
    let types = arena().alloc_str(types)?;
    methods.insert(sel, Method { imp, types });
    Ok(())
}

/// Reports whether the class (or metaclass) has been published and not
/// disposed.
pub(crate) fn is_published(class: Class) -> bool {
    inner(class).is_published()
}

/// Finds the method for `sel`, walking the superclass chain.
pub(crate) fn lookup(class: Class, sel: Sel) -> Option<Method> {
    let record = inner(class);
    let cacheable = record.is_published();

    if cacheable {
        let cache = record.cache.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(method) = cache.get(&sel) {
            return Some(*method);
        }
    }

    let mut current: *const ClassInner = record;
    while !current.is_null() {
        // SAFETY: superclass chains consist of live arena records.
        let level = unsafe { &*current };
        let found = level
            .methods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&sel)
            .copied();

        if let Some(method) = found {
            if cacheable {
                trace!("cached -[{} {sel}] from {}", record.name, level.name);
                record
                    .cache
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(sel, method);
            }
            return Some(method);
        }
        current = level.superclass;
    }
    None
}

/// Reads the isa word of an object or class.
///
/// # Safety
///
/// `object` must point at a live headless object or class record.
pub(crate) unsafe fn isa_of(object: *mut c_void) -> Option<Class> {
    // SAFETY: objects and class records both begin with the isa word.
    handle(unsafe { *object.cast::<*const ClassInner>() })
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe extern "C" fn noop() {}

    fn sel(name: &str) -> Sel {
        Sel::register(name).unwrap()
    }

    #[test]
    fn test_root_class_pair() {
        let root = allocate(None, "HeadlessRoot").unwrap();
        let meta = metaclass(root);

        assert!(!is_metaclass(root));
        assert!(is_metaclass(meta));
        assert_eq!(superclass(root), None);
        assert_eq!(superclass(meta), Some(root));
        assert_eq!(metaclass(meta), meta);
        assert_eq!(unsafe { isa_of(meta.as_ptr()) }, Some(meta));
        assert_eq!(unsafe { isa_of(root.as_ptr()) }, Some(meta));
    }

    #[test]
    fn test_subclass_pair_links() {
        let root = allocate(None, "HeadlessLinkRoot").unwrap();
        register(root);
        let child = allocate(Some(root), "HeadlessLinkChild").unwrap();

        assert_eq!(superclass(child), Some(root));
        assert_eq!(superclass(metaclass(child)), Some(metaclass(root)));
        // Every metaclass points at the root metaclass.
        assert_eq!(
            unsafe { isa_of(metaclass(child).as_ptr()) },
            Some(metaclass(root))
        );
    }

    #[test]
    fn test_draft_visibility() {
        let root = allocate(None, "HeadlessVisible").unwrap();
        assert_eq!(get("HeadlessVisible"), None);
        register(root);
        assert_eq!(get("HeadlessVisible"), Some(root));
        assert_eq!(name(root), "HeadlessVisible");
    }

    #[test]
    fn test_unpublished_superclass_rejected() {
        let draft = allocate(None, "HeadlessDraftParent").unwrap();
        assert_eq!(
            allocate(Some(draft), "HeadlessDraftChild").unwrap_err(),
            Error::ClassNotFound {
                name: "HeadlessDraftParent".into()
            }
        );
    }

    #[test]
    fn test_methods_and_inheritance() {
        let root = allocate(None, "HeadlessMethodsRoot").unwrap();
        assert!(add_method(root, sel("ping"), noop, "v@:").is_ok());
        assert_eq!(
            add_method(root, sel("ping"), noop, "v@:"),
            Err(Error::MethodAlreadyAttached {
                class: "HeadlessMethodsRoot".into(),
                selector: "ping".into(),
            })
        );
        assert!(!is_published(root));
        register(root);
        assert!(is_published(root));
        assert!(is_published(metaclass(root)));
        assert_eq!(
            add_method(root, sel("pong"), noop, "v@:"),
            Err(Error::ClassPublished {
                name: "HeadlessMethodsRoot".into()
            })
        );

        let child = allocate(Some(root), "HeadlessMethodsChild").unwrap();
        register(child);

        let found = lookup(child, sel("ping")).unwrap();
        assert_eq!(found.types, "v@:");
        assert!(lookup(child, sel("pong")).is_none());
        // Second lookup is served from the cache.
        assert!(lookup(child, sel("ping")).is_some());
    }

    #[test]
    fn test_dispose_frees_name() {
        let draft = allocate(None, "HeadlessDisposed").unwrap();
        dispose(draft);
        assert!(allocate(None, "HeadlessDisposed").is_ok());
    }

    #[test]
    fn test_duplicate_name() {
        allocate(None, "HeadlessDuplicate").unwrap();
        assert_eq!(
            allocate(None, "HeadlessDuplicate").unwrap_err(),
            Error::ClassAlreadyExists {
                name: "HeadlessDuplicate".into()
            }
        );
    }
}
