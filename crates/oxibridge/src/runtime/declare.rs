//! Run-time class declaration.
//!
//! A class is declared in two phases:
//!
//! 1. **Draft.** [`ClassDecl::new`] reserves the name and allocates the class
//!    pair (class plus metaclass). Methods can be attached; the class is not
//!    yet visible to [`Class::get`] and cannot be instantiated. Messages to
//!    the draft handle fail with [`Error::ClassNotFound`] on the headless
//!    runtime; the system runtime does not check, so callers must not send
//!    them.
//! 2. **Published.** [`ClassDecl::publish`] (or [`ClassDecl::register`])
//!    makes the class visible. From then on its method table is sealed:
//!    attaching returns [`Error::ClassPublished`].
//!
//! A draft dropped without publishing is disposed and its name released.
//!
//! # Example
//!
//! ```rust
//! use oxibridge::{msg_send, sel, Bool, Class, ClassDecl, Id, Sel};
//!
//! extern "C" fn should_terminate(_this: Id, _cmd: Sel, _app: Id) -> Bool {
//!     Bool::YES
//! }
//!
//! let mut decl = ClassDecl::new("DocTerminatingDelegate", Class::get("NSObject").unwrap()).unwrap();
//! decl.add_method(
//!     sel!(applicationShouldTerminateAfterLastWindowClosed:),
//!     should_terminate as extern "C" fn(Id, Sel, Id) -> Bool,
//! )
//! .unwrap();
//! let class = decl.register().unwrap();
//!
//! unsafe {
//!     let delegate: Id = msg_send![class, new];
//!     let answer: Bool = msg_send![delegate, applicationShouldTerminateAfterLastWindowClosed: Id::NIL];
//!     assert_eq!(answer, Bool::YES);
//! }
//! ```

use crate::backend;
use crate::error::{Error, Result};
use crate::runtime::encoding::{Encode, Encoding, parse_signature};
use crate::runtime::message::{MessageArguments, MessageReceiver};
use crate::runtime::{Class, Imp, Sel};
use fxhash::FxHashSet;
use oxibridge_log::{debug, error, info};
use std::fmt::Write as _;
use std::mem;
use std::sync::{Mutex, OnceLock, PoisonError};

/// Names of classes currently in draft, across all backends.
fn drafts() -> &'static Mutex<FxHashSet<String>> {
    static DRAFTS: OnceLock<Mutex<FxHashSet<String>>> = OnceLock::new();
    DRAFTS.get_or_init(|| Mutex::new(FxHashSet::default()))
}

fn reserve_name(name: &str) -> Result<()> {
    let mut drafts = drafts().lock().unwrap_or_else(PoisonError::into_inner);
    if drafts.contains(name) || Class::get(name).is_some() {
        return Err(Error::ClassAlreadyExists {
            name: name.to_string(),
        });
    }
    drafts.insert(name.to_string());
    Ok(())
}

fn release_name(name: &str) {
    drafts()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(name);
}

/// Rust functions that can serve as method implementations.
///
/// Implemented for `extern "C" fn(Receiver, Sel, A...) -> R` (and the
/// `unsafe` variants) with up to six arguments, where `Receiver` is [`Id`]
/// for instance methods or [`Class`] for class methods. The method's type
/// encoding is derived from these types.
///
/// [`Id`]: crate::Id
///
/// # Safety
///
/// `imp` must return the function pointer itself, and the associated types
/// must describe its real signature.
pub unsafe trait MethodImplementation: Copy {
    /// Receiver type (`self`).
    type Receiver: MessageReceiver + Encode;
    /// Return type.
    type Ret: Encode;
    /// Explicit arguments after `_cmd`.
    type Args: MessageArguments;

    /// The untyped implementation pointer.
    fn imp(self) -> Imp;

    /// Number of explicit arguments.
    #[must_use]
    fn arg_count() -> usize {
        <Self::Args as MessageArguments>::ENCODINGS.len()
    }

    /// The method's type encoding, e.g. `c@:@`.
    #[must_use]
    fn type_encoding() -> String {
        let mut types = format!(
            "{}{}{}",
            <Self::Ret as Encode>::ENCODING,
            <Self::Receiver as Encode>::ENCODING,
            Encoding::Sel
        );
        for arg in <Self::Args as MessageArguments>::ENCODINGS {
            let _ = write!(types, "{arg}");
        }
        types
    }
}

macro_rules! method_impl {
    ($($t:ident),*) => {
        unsafe impl<T, R $(, $t)*> MethodImplementation for extern "C" fn(T, Sel $(, $t)*) -> R
        where
            T: MessageReceiver + Encode,
            R: Encode,
            $($t: Encode,)*
        {
            type Receiver = T;
            type Ret = R;
            type Args = ($($t,)*);

            fn imp(self) -> Imp {
                // SAFETY: fn pointers share one representation.
                unsafe { mem::transmute::<Self, Imp>(self) }
            }
        }

        unsafe impl<T, R $(, $t)*> MethodImplementation for unsafe extern "C" fn(T, Sel $(, $t)*) -> R
        where
            T: MessageReceiver + Encode,
            R: Encode,
            $($t: Encode,)*
        {
            type Receiver = T;
            type Ret = R;
            type Args = ($($t,)*);

            fn imp(self) -> Imp {
                // SAFETY: fn pointers share one representation.
                unsafe { mem::transmute::<Self, Imp>(self) }
            }
        }
    };
}

method_impl!();
method_impl!(A);
method_impl!(A, B);
method_impl!(A, B, C);
method_impl!(A, B, C, D);
method_impl!(A, B, C, D, E);
method_impl!(A, B, C, D, E, F);

/// A class under construction.
#[derive(Debug)]
pub struct ClassDecl {
    class: Class,
    superclass: Class,
    name: String,
    published: bool,
}

impl ClassDecl {
    /// Starts declaring a class named `name` inheriting from `superclass`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidName`] if `name` is empty or contains NUL
    /// - [`Error::ClassAlreadyExists`] if the name is published or another
    ///   draft holds it
    /// - [`Error::ClassNotFound`] if `superclass` is itself unpublished
    pub fn new(name: &str, superclass: Class) -> Result<ClassDecl> {
        if name.is_empty() || name.as_bytes().contains(&0) {
            return Err(Error::InvalidName {
                name: name.to_string(),
            });
        }

        reserve_name(name)?;
        let class = match backend::allocate_class(superclass, name) {
            Ok(class) => class,
            Err(err) => {
                release_name(name);
                return Err(err);
            }
        };

        debug!("declaring class {name} : {}", superclass.name());
        Ok(ClassDecl {
            class,
            superclass,
            name: name.to_string(),
            published: false,
        })
    }

    /// Name of the class being declared.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The class handle (a draft until published).
    ///
    /// Until [`publish`](Self::publish) the handle is only good for
    /// introspection and as a method target of this declaration. It must not
    /// be messaged or used as a superclass.
    #[must_use]
    pub fn class(&self) -> Class {
        self.class
    }

    /// The superclass given at declaration.
    #[must_use]
    pub fn superclass(&self) -> Class {
        self.superclass
    }

    /// Reports whether [`publish`](Self::publish) has succeeded.
    #[must_use]
    pub fn is_published(&self) -> bool {
        self.published
    }

    /// Attaches an instance method.
    ///
    /// # Errors
    ///
    /// - [`Error::ClassPublished`] after publishing
    /// - [`Error::ArgumentCountMismatch`] if `f`'s arity differs from the
    ///   selector's
    /// - [`Error::MethodAlreadyAttached`] for a second method on `sel`
    /// - [`Error::OutOfMemory`] if the runtime cannot store the method
    pub fn add_method<F: MethodImplementation>(&mut self, sel: Sel, f: F) -> Result<()> {
        self.ensure_draft(sel)?;
        check_arity(sel, F::arg_count())?;
        let types = F::type_encoding();
        Self::attach(self.class, sel, f.imp(), &types)
    }

    /// Attaches a class method (to the metaclass).
    ///
    /// # Errors
    ///
    /// As for [`add_method`](Self::add_method).
    pub fn add_class_method<F: MethodImplementation>(&mut self, sel: Sel, f: F) -> Result<()> {
        self.ensure_draft(sel)?;
        check_arity(sel, F::arg_count())?;
        let types = F::type_encoding();
        Self::attach(self.class.metaclass(), sel, f.imp(), &types)
    }

    /// Attaches an instance method with an explicit type encoding.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidEncoding`] if `types` is not a method encoding, plus
    /// everything [`add_method`](Self::add_method) reports.
    ///
    /// # Safety
    ///
    /// `imp` must really have the signature `types` describes.
    pub unsafe fn add_method_with_encoding(&mut self, sel: Sel, imp: Imp, types: &str) -> Result<()> {
        self.ensure_draft(sel)?;
        let (_, args) = parse_signature(types)?;
        check_arity(sel, args.len() - 2)?;
        Self::attach(self.class, sel, imp, types)
    }

    /// Publishes the class, sealing its method table.
    ///
    /// # Errors
    ///
    /// [`Error::ClassPublished`] if already published.
    pub fn publish(&mut self) -> Result<Class> {
        if self.published {
            error!("class {} is already published", self.name);
            return Err(Error::ClassPublished {
                name: self.name.clone(),
            });
        }

        backend::register_class(self.class);
        self.published = true;
        release_name(&self.name);
        info!("published class {}", self.name);
        Ok(self.class)
    }

    /// Publishes the class and consumes the declaration.
    ///
    /// # Errors
    ///
    /// As for [`publish`](Self::publish).
    pub fn register(mut self) -> Result<Class> {
        self.publish()
    }

    fn ensure_draft(&self, sel: Sel) -> Result<()> {
        if self.published {
            error!("cannot attach {sel} to {}: class is published", self.name);
            return Err(Error::ClassPublished {
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    fn attach(target: Class, sel: Sel, imp: Imp, types: &str) -> Result<()> {
        backend::add_method(target, sel, imp, types)?;
        debug!("attached {sel} ({types}) to {}", target.name());
        Ok(())
    }
}

fn check_arity(sel: Sel, got: usize) -> Result<()> {
    let expected = sel.arg_count();
    if expected != got {
        return Err(Error::ArgumentCountMismatch {
            selector: sel.name().to_string(),
            expected,
            got,
        });
    }
    Ok(())
}

impl Drop for ClassDecl {
    fn drop(&mut self) {
        if !self.published {
            debug!("disposing unpublished class {}", self.name);
            backend::dispose_class(self.class);
            release_name(&self.name);
        }
    }
}
