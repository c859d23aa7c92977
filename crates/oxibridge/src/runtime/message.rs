//! Typed message dispatch.
//!
//! The runtime's message primitive is untyped: it takes a receiver, a
//! selector and whatever arguments the method happens to expect, and jumps
//! to an implementation chosen at run time. A statically typed caller must
//! call it through a function pointer whose type matches the real method
//! exactly: return type, argument types in order, and by-value structs.
//!
//! That reinterpretation happens in exactly one place,
//! [`MessageArguments::invoke`]. Each call site picks its signature through
//! Rust types (the argument tuple `A` and the return type `R`), so two call
//! sites with different signatures can never share a cast by accident.
//!
//! # Dispatch
//!
//! 1. A nil receiver short-circuits to `R::ZERO` with no side effect.
//! 2. The backend resolves the entry point for `(receiver, sel)`; the
//!    headless backend also checks the declared [`Signature`] against the
//!    method's registered encoding while strict mode is on.
//! 3. The entry point is called as `extern "C" fn(Id, Sel, A...) -> R`.
//!
//! # Example
//!
//! ```rust
//! use oxibridge::{msg_send, Class, Id, Rect};
//!
//! let class = Class::get("NSWindow").unwrap();
//! unsafe {
//!     // +(id)alloc                                       @@:
//!     let window: Id = msg_send![class, alloc];
//!     // -(id)initWithContentRect:(NSRect)r styleMask:(NSUInteger)m
//!     //      backing:(NSUInteger)b defer:(BOOL)d          @@:{CGRect=...}QQc
//!     let window: Id = msg_send![window,
//!         initWithContentRect: Rect::new(0.0, 0.0, 800.0, 450.0),
//!         styleMask: 15usize,
//!         backing: 2usize,
//!         defer: oxibridge::Bool::NO,
//!     ];
//!     // -(NSRect)frame                                   {CGRect=...}@:
//!     let frame: Rect = msg_send![window, frame];
//!     assert_eq!(frame.size.width, 800.0);
//! }
//! ```

use crate::backend;
use crate::error::Result;
use crate::runtime::encoding::{EncodeReturn, Encoding, canonical_type, parse_signature};
use crate::runtime::{Class, Encode, Id, Imp, Sel, Super};
use oxibridge_log::trace;
use std::ffi::c_long;
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};

/// Whether backends that can verify signatures should do so.
static STRICT_SIGNATURES: AtomicBool = AtomicBool::new(true);

/// Turns signature verification on or off for backends that support it.
pub fn set_strict_signatures(enabled: bool) {
    STRICT_SIGNATURES.store(enabled, Ordering::SeqCst);
}

/// Reports whether signature verification is on.
#[must_use]
pub fn strict_signatures() -> bool {
    STRICT_SIGNATURES.load(Ordering::Relaxed)
}

/// Values that can receive a message.
pub trait MessageReceiver: Copy {
    /// The receiver as an object handle.
    fn as_id(self) -> Id;
}

impl MessageReceiver for Id {
    #[inline]
    fn as_id(self) -> Id {
        self
    }
}

impl MessageReceiver for Class {
    #[inline]
    fn as_id(self) -> Id {
        Class::as_id(self)
    }
}

/// A call signature: the return type and the explicit argument types.
///
/// `self` and `_cmd` are implied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature {
    /// Return type.
    pub ret: Encoding,
    /// Argument types after `self` and `_cmd`.
    pub args: &'static [Encoding],
}

impl Signature {
    /// The signature of a call site sending `A` and expecting `R`.
    #[must_use]
    pub const fn of<A: MessageArguments, R: EncodeReturn>() -> Self {
        Signature {
            ret: R::ENCODING,
            args: A::ENCODINGS,
        }
    }

    /// Compares against a method's registered type encoding.
    ///
    /// Qualifiers, offsets and the receiver slot's `@`/`#` distinction are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEncoding`](crate::Error::InvalidEncoding) if
    /// `types` is not a method encoding.
    pub fn matches(&self, types: &str) -> Result<bool> {
        let (ret, args) = parse_signature(types)?;
        let explicit = &args[2..];

        Ok(abi_type(ret) == abi_type(&self.ret.to_string())
            && explicit.len() == self.args.len()
            && explicit
                .iter()
                .zip(self.args)
                .all(|(found, declared)| abi_type(found) == abi_type(&declared.to_string())))
    }
}

/// A type code as the calling convention sees it: where `long` is 64 bits
/// wide, `l`/`L` are passed exactly like `q`/`Q`.
fn abi_type(ty: &str) -> &str {
    let ty = canonical_type(ty);
    if mem::size_of::<c_long>() != mem::size_of::<i64>() {
        return ty;
    }
    match ty {
        "l" => "q",
        "L" => "Q",
        _ => ty,
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@:", self.ret)?;
        for arg in self.args {
            write!(f, "{arg}")?;
        }
        Ok(())
    }
}

/// Argument tuples a message can carry.
///
/// Implemented for tuples of up to six [`Encode`] types.
///
/// # Safety
///
/// `ENCODINGS` must list the tuple's element encodings in order, and
/// `invoke` must pass the elements as separate C arguments after the
/// receiver and selector.
pub unsafe trait MessageArguments: Sized {
    /// Encodings of the arguments, in order.
    const ENCODINGS: &'static [Encoding];

    /// Calls `imp` as `extern "C" fn(Id, Sel, args...) -> R`.
    ///
    /// # Safety
    ///
    /// `imp` must really have that type (or be a trampoline that forwards to
    /// an implementation that does).
    unsafe fn invoke<R: EncodeReturn>(imp: Imp, receiver: Id, sel: Sel, args: Self) -> R;
}

macro_rules! message_args_impl {
    ($($a:ident : $t:ident),*) => {
        unsafe impl<$($t: Encode),*> MessageArguments for ($($t,)*) {
            const ENCODINGS: &'static [Encoding] = &[$($t::ENCODING),*];

            #[inline]
            #[allow(clippy::unused_unit)]
            unsafe fn invoke<R: EncodeReturn>(imp: Imp, receiver: Id, sel: Sel, ($($a,)*): Self) -> R {
                // SAFETY: the caller guarantees `imp` has exactly this type.
                let imp: unsafe extern "C" fn(Id, Sel $(, $t)*) -> R =
                    unsafe { mem::transmute::<Imp, _>(imp) };
                unsafe { imp(receiver, sel $(, $a)*) }
            }
        }
    };
}

message_args_impl!();
message_args_impl!(a: A);
message_args_impl!(a: A, b: B);
message_args_impl!(a: A, b: B, c: C);
message_args_impl!(a: A, b: B, c: C, d: D);
message_args_impl!(a: A, b: B, c: C, d: D, e: E);
message_args_impl!(a: A, b: B, c: C, d: D, e: E, f: F);

/// Sends `sel` to `receiver` with `args`, returning `R`.
///
/// A nil receiver yields `R::ZERO` without touching the runtime. A selector
/// the receiver does not implement, or (headless, strict mode) a declared
/// signature that differs from the method's, aborts the process.
///
/// # Safety
///
/// `A` and `R` must match the native signature of the method `sel` resolves
/// to on `receiver`; the native runtime cannot check this. Non-nil receivers
/// must be live objects.
#[inline]
pub unsafe fn send<T, A, R>(receiver: T, sel: Sel, args: A) -> R
where
    T: MessageReceiver,
    A: MessageArguments,
    R: EncodeReturn,
{
    match unsafe { try_send(receiver, sel, args) } {
        Ok(value) => value,
        Err(err) => crate::fatal!("message send failed: {err}"),
    }
}

/// Like [`send`], but reports unresolved selectors and detected signature
/// mismatches as errors instead of aborting.
///
/// # Errors
///
/// Returns [`Error::SelectorNotFound`](crate::Error::SelectorNotFound) or
/// [`Error::SignatureMismatch`](crate::Error::SignatureMismatch) from the
/// backend. Nothing is invoked in either case.
///
/// # Safety
///
/// As for [`send`].
pub unsafe fn try_send<T, A, R>(receiver: T, sel: Sel, args: A) -> Result<R>
where
    T: MessageReceiver,
    A: MessageArguments,
    R: EncodeReturn,
{
    let receiver = receiver.as_id();
    if receiver.is_nil() {
        trace!("[nil {sel}] -> zero");
        return Ok(R::ZERO);
    }

    let signature = Signature::of::<A, R>();
    let imp = unsafe { backend::resolve_send(receiver, sel, &signature) }?;
    Ok(unsafe { A::invoke(imp, receiver, sel, args) })
}

/// Sends `sel` to `receiver`, starting method lookup at `superclass`.
///
/// # Safety
///
/// As for [`send`]; additionally `superclass` must be an ancestor of the
/// receiver's class.
#[inline]
pub unsafe fn send_super<A, R>(receiver: Id, superclass: Class, sel: Sel, args: A) -> R
where
    A: MessageArguments,
    R: EncodeReturn,
{
    match unsafe { try_send_super(receiver, superclass, sel, args) } {
        Ok(value) => value,
        Err(err) => crate::fatal!("message send to super failed: {err}"),
    }
}

/// Like [`send_super`], reporting resolution failures as errors.
///
/// # Errors
///
/// As for [`try_send`].
///
/// # Safety
///
/// As for [`send_super`].
pub unsafe fn try_send_super<A, R>(receiver: Id, superclass: Class, sel: Sel, args: A) -> Result<R>
where
    A: MessageArguments,
    R: EncodeReturn,
{
    if receiver.is_nil() {
        trace!("[super nil {sel}] -> zero");
        return Ok(R::ZERO);
    }

    // Lives on this frame for the duration of the call; the native entry
    // point receives a pointer to it in place of the receiver.
    let sup = Super {
        receiver,
        superclass,
    };
    let signature = Signature::of::<A, R>();
    let (imp, first) = unsafe { backend::resolve_send_super(&sup, sel, &signature) }?;
    Ok(unsafe { A::invoke(imp, first, sel, args) })
}

/// Sends a message with a selector spelled out at the call site.
///
/// ```rust
/// use oxibridge::{msg_send, Class, Id};
/// use std::ffi::CStr;
///
/// let string_class = Class::get("NSString").unwrap();
/// unsafe {
///     // +(id)stringWithUTF8String:(const char *)s        @@:*
///     let s: Id = msg_send![string_class, stringWithUTF8String: c"Quit".as_ptr()];
///     // -(NSUInteger)length                               Q@:
///     let len: usize = msg_send![s, length];
///     assert_eq!(len, 4);
/// }
/// ```
///
/// `msg_send![super(obj, class), sel...]` sends to the superclass
/// implementation.
#[macro_export]
macro_rules! msg_send {
    [super($receiver:expr, $superclass:expr), $name:ident] => {
        $crate::runtime::message::send_super($receiver, $superclass, $crate::sel!($name), ())
    };
    [super($receiver:expr, $superclass:expr), $($name:ident : $arg:expr),+ $(,)?] => {
        $crate::runtime::message::send_super(
            $receiver,
            $superclass,
            $crate::sel!($($name :)+),
            ($($arg,)+),
        )
    };
    [$receiver:expr, $name:ident] => {
        $crate::runtime::message::send($receiver, $crate::sel!($name), ())
    };
    [$receiver:expr, $($name:ident : $arg:expr),+ $(,)?] => {
        $crate::runtime::message::send($receiver, $crate::sel!($($name :)+), ($($arg,)+))
    };
}
