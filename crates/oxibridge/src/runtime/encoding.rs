//! Type encodings.
//!
//! The runtime describes every method with a type encoding string: the return
//! type, then `self`, `_cmd` and each argument, one code per type:
//!
//! | code | type | code | type |
//! |------|------|------|------|
//! | `v` | void | `@` | object |
//! | `c` | char / BOOL (x86_64) | `#` | class |
//! | `B` | bool / BOOL (arm64) | `:` | selector |
//! | `s` `i` `l` `q` | signed ints | `*` | C string |
//! | `S` `I` `L` `Q` | unsigned ints | `^t` | pointer to `t` |
//! | `f` `d` | float, double | `{Name=...}` | struct |
//!
//! The encodings the runtime hands back may also carry qualifiers (`r` for
//! const, `n`/`o`/`N` for in/out), stack offsets after each type
//! (`c24@0:8@16`), and class names on objects (`@"NSString"`). [`normalize`]
//! strips those so two encodings can be compared.
//!
//! The [`Encode`] trait ties Rust types to their codes. A call site's
//! argument and return types therefore produce the exact encoding the call
//! assumes, with no hand-written strings involved.

use crate::error::{Error, Result};
use crate::runtime::{Class, Id, Sel};
use std::ffi::{c_char, c_long, c_void};
use std::fmt;
use std::mem;

/// A type encoding, as a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// `v`
    Void,
    /// `B`
    Bool,
    /// `c`
    Char,
    /// `s`
    Short,
    /// `i`
    Int,
    /// `l`
    Long,
    /// `q`
    LongLong,
    /// `C`
    UChar,
    /// `S`
    UShort,
    /// `I`
    UInt,
    /// `L`
    ULong,
    /// `Q`
    ULongLong,
    /// `f`
    Float,
    /// `d`
    Double,
    /// `*`
    CStr,
    /// `@`
    Object,
    /// `#`
    Class,
    /// `:`
    Sel,
    /// `?`
    Unknown,
    /// `^` followed by the pointee
    Pointer(&'static Encoding),
    /// `{name=fields}`
    Struct(&'static str, &'static [Encoding]),
}

impl Encoding {
    /// Size in bytes of a value of this type.
    #[must_use]
    pub const fn size(&self) -> usize {
        match self {
            Encoding::Void => 0,
            Encoding::Bool | Encoding::Char | Encoding::UChar => 1,
            Encoding::Short | Encoding::UShort => 2,
            Encoding::Int | Encoding::UInt | Encoding::Float => 4,
            Encoding::Long | Encoding::ULong => mem::size_of::<c_long>(),
            Encoding::LongLong | Encoding::ULongLong | Encoding::Double => 8,
            Encoding::CStr
            | Encoding::Object
            | Encoding::Class
            | Encoding::Sel
            | Encoding::Unknown
            | Encoding::Pointer(_) => mem::size_of::<*const c_void>(),
            Encoding::Struct(_, fields) => {
                let mut offset = 0;
                let mut i = 0;
                while i < fields.len() {
                    offset = round_up(offset, fields[i].align());
                    offset += fields[i].size();
                    i += 1;
                }
                round_up(offset, self.align())
            }
        }
    }

    /// Alignment in bytes of a value of this type.
    #[must_use]
    pub const fn align(&self) -> usize {
        match self {
            Encoding::Void => 1,
            Encoding::Struct(_, fields) => {
                let mut align = 1;
                let mut i = 0;
                while i < fields.len() {
                    if fields[i].align() > align {
                        align = fields[i].align();
                    }
                    i += 1;
                }
                align
            }
            other => {
                // Scalars and pointers are naturally aligned on every
                // supported target.
                other.size()
            }
        }
    }

    /// Reports whether this is a by-value struct.
    #[must_use]
    pub const fn is_struct(&self) -> bool {
        matches!(self, Encoding::Struct(..))
    }
}

const fn round_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Encoding::Void => "v",
            Encoding::Bool => "B",
            Encoding::Char => "c",
            Encoding::Short => "s",
            Encoding::Int => "i",
            Encoding::Long => "l",
            Encoding::LongLong => "q",
            Encoding::UChar => "C",
            Encoding::UShort => "S",
            Encoding::UInt => "I",
            Encoding::ULong => "L",
            Encoding::ULongLong => "Q",
            Encoding::Float => "f",
            Encoding::Double => "d",
            Encoding::CStr => "*",
            Encoding::Object => "@",
            Encoding::Class => "#",
            Encoding::Sel => ":",
            Encoding::Unknown => "?",
            Encoding::Pointer(pointee) => return write!(f, "^{pointee}"),
            Encoding::Struct(name, fields) => {
                write!(f, "{{{name}=")?;
                for field in *fields {
                    write!(f, "{field}")?;
                }
                return f.write_str("}");
            }
        };
        f.write_str(code)
    }
}

/// Types with a fixed C ABI representation and a known type encoding.
///
/// # Safety
///
/// `ENCODING` must describe the type's real layout; the dispatcher passes
/// values of `Self` straight through `extern "C"` calls on that promise.
pub unsafe trait Encode: Copy + 'static {
    /// The type's encoding.
    const ENCODING: Encoding;
}

/// Encodable types that can be returned from a message send.
///
/// # Safety
///
/// `ZERO` must be the all-zero value of the type, which is what a message
/// sent to nil yields.
pub unsafe trait EncodeReturn: Encode {
    /// Value produced by a message to nil.
    const ZERO: Self;
}

macro_rules! encode_impls {
    ($($t:ty => $enc:expr, $zero:expr;)*) => {
        $(
            unsafe impl Encode for $t {
                const ENCODING: Encoding = $enc;
            }

            unsafe impl EncodeReturn for $t {
                const ZERO: Self = $zero;
            }
        )*
    };
}

#[cfg(target_pointer_width = "64")]
const WORD: Encoding = Encoding::LongLong;
#[cfg(not(target_pointer_width = "64"))]
const WORD: Encoding = Encoding::Int;

#[cfg(target_pointer_width = "64")]
const UWORD: Encoding = Encoding::ULongLong;
#[cfg(not(target_pointer_width = "64"))]
const UWORD: Encoding = Encoding::UInt;

encode_impls! {
    () => Encoding::Void, ();
    bool => Encoding::Bool, false;
    i8 => Encoding::Char, 0;
    i16 => Encoding::Short, 0;
    i32 => Encoding::Int, 0;
    i64 => Encoding::LongLong, 0;
    isize => WORD, 0;
    u8 => Encoding::UChar, 0;
    u16 => Encoding::UShort, 0;
    u32 => Encoding::UInt, 0;
    u64 => Encoding::ULongLong, 0;
    usize => UWORD, 0;
    f32 => Encoding::Float, 0.0;
    f64 => Encoding::Double, 0.0;
    Id => Encoding::Object, Id::NIL;
    Option<Class> => Encoding::Class, None;
    Option<Sel> => Encoding::Sel, None;
    *const c_char => Encoding::CStr, std::ptr::null();
    *mut c_char => Encoding::CStr, std::ptr::null_mut();
    *const c_void => Encoding::Pointer(&Encoding::Void), std::ptr::null();
    *mut c_void => Encoding::Pointer(&Encoding::Void), std::ptr::null_mut();
}

unsafe impl Encode for Class {
    const ENCODING: Encoding = Encoding::Class;
}

unsafe impl Encode for Sel {
    const ENCODING: Encoding = Encoding::Sel;
}

#[cfg(all(target_vendor = "apple", target_arch = "aarch64"))]
type BoolRepr = bool;
#[cfg(not(all(target_vendor = "apple", target_arch = "aarch64")))]
type BoolRepr = i8;

/// The runtime's `BOOL`.
///
/// A signed char (`c`) on most targets, a C `bool` (`B`) on Apple arm64.
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Bool(BoolRepr);

impl Bool {
    /// `YES`
    pub const YES: Bool = Bool::new(true);
    /// `NO`
    pub const NO: Bool = Bool::new(false);

    /// Converts from a Rust `bool`.
    #[must_use]
    #[allow(clippy::unnecessary_cast)]
    pub const fn new(value: bool) -> Self {
        Bool(value as BoolRepr)
    }

    /// Converts to a Rust `bool`; any non-zero value is true.
    #[must_use]
    #[cfg(all(target_vendor = "apple", target_arch = "aarch64"))]
    pub const fn as_bool(self) -> bool {
        self.0
    }

    /// Converts to a Rust `bool`; any non-zero value is true.
    #[must_use]
    #[cfg(not(all(target_vendor = "apple", target_arch = "aarch64")))]
    pub const fn as_bool(self) -> bool {
        self.0 != 0
    }
}

impl From<bool> for Bool {
    fn from(value: bool) -> Self {
        Bool::new(value)
    }
}

impl From<Bool> for bool {
    fn from(value: Bool) -> Self {
        value.as_bool()
    }
}

impl fmt::Debug for Bool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.as_bool() { "YES" } else { "NO" })
    }
}

unsafe impl Encode for Bool {
    #[cfg(all(target_vendor = "apple", target_arch = "aarch64"))]
    const ENCODING: Encoding = Encoding::Bool;
    #[cfg(not(all(target_vendor = "apple", target_arch = "aarch64")))]
    const ENCODING: Encoding = Encoding::Char;
}

unsafe impl EncodeReturn for Bool {
    const ZERO: Self = Bool::NO;
}

const QUALIFIERS: &[u8] = b"rnNoORV";

/// Splits an encoding string into one slice per type.
///
/// Qualifiers and stack offsets are dropped; object class names are kept.
///
/// ```
/// use oxibridge::runtime::encoding::split_types;
///
/// let parts = split_types("c24@0:8@16").unwrap();
/// assert_eq!(parts, vec!["c", "@", ":", "@"]);
/// ```
///
/// # Errors
///
/// Returns [`Error::InvalidEncoding`] on an unknown code or an unterminated
/// struct, union, array or quoted name.
pub fn split_types(encoding: &str) -> Result<Vec<&str>> {
    let bytes = encoding.as_bytes();
    let mut types = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        while i < bytes.len() && QUALIFIERS.contains(&bytes[i]) {
            i += 1;
        }
        if i == bytes.len() {
            return Err(invalid(encoding));
        }

        let end = type_end(bytes, i).ok_or_else(|| invalid(encoding))?;
        types.push(&encoding[i..end]);
        i = end;

        while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'-') {
            i += 1;
        }
    }

    Ok(types)
}

/// Returns the index one past the type starting at `start`.
fn type_end(bytes: &[u8], start: usize) -> Option<usize> {
    let code = *bytes.get(start)?;
    match code {
        b'c' | b'i' | b's' | b'l' | b'q' | b'C' | b'I' | b'S' | b'L' | b'Q'
        | b'f' | b'd' | b'D' | b'B' | b'v' | b'*' | b'#' | b':' | b'?' => {
            Some(start + 1)
        }
        b'@' => match bytes.get(start + 1) {
            Some(b'?') => Some(start + 2),
            Some(b'"') => {
                let close = bytes[start + 2..].iter().position(|&b| b == b'"')?;
                Some(start + 2 + close + 1)
            }
            _ => Some(start + 1),
        },
        b'^' => type_end(bytes, start + 1),
        b'b' => {
            let digits = bytes[start + 1..]
                .iter()
                .take_while(|b| b.is_ascii_digit())
                .count();
            (digits > 0).then_some(start + 1 + digits)
        }
        b'[' => {
            let mut i = start + 1;
            while bytes.get(i).is_some_and(u8::is_ascii_digit) {
                i += 1;
            }
            let i = type_end(bytes, i)?;
            (bytes.get(i) == Some(&b']')).then_some(i + 1)
        }
        b'{' | b'(' => {
            let (open, close) = if code == b'{' { (b'{', b'}') } else { (b'(', b')') };
            let mut depth = 0usize;
            let mut quoted = false;
            for (offset, &b) in bytes[start..].iter().enumerate() {
                match b {
                    b'"' => quoted = !quoted,
                    _ if quoted => {}
                    _ if b == open => depth += 1,
                    _ if b == close => {
                        depth -= 1;
                        if depth == 0 {
                            return Some(start + offset + 1);
                        }
                    }
                    _ => {}
                }
            }
            None
        }
        _ => None,
    }
}

/// Canonical form of a single type: object class names become `@`.
#[must_use]
pub fn canonical_type(ty: &str) -> &str {
    if ty.starts_with("@\"") { "@" } else { ty }
}

/// Rewrites an encoding without qualifiers, offsets or object class names.
///
/// ```
/// use oxibridge::runtime::encoding::normalize;
///
/// assert_eq!(normalize("c24@0:8@16").unwrap(), "c@:@");
/// assert_eq!(normalize("r*16@0:8").unwrap(), "*@:");
/// assert_eq!(normalize("v@:@\"NSString\"").unwrap(), "v@:@");
/// ```
///
/// # Errors
///
/// Returns [`Error::InvalidEncoding`] if the string does not parse.
pub fn normalize(encoding: &str) -> Result<String> {
    Ok(split_types(encoding)?.into_iter().map(canonical_type).collect())
}

/// Validates a method encoding: a return type, then `self` and `_cmd`.
///
/// ```
/// use oxibridge::runtime::encoding::validate_method_encoding;
///
/// assert!(validate_method_encoding("v@:").is_ok());
/// assert!(validate_method_encoding("c@:@").is_ok());
/// assert!(validate_method_encoding("@#:").is_ok());
/// assert!(validate_method_encoding("@").is_err());
/// assert!(validate_method_encoding("vx:").is_err());
/// ```
///
/// # Errors
///
/// Returns [`Error::InvalidEncoding`] if the string does not parse or lacks
/// the `self` (`@` or `#`) and `_cmd` (`:`) slots.
pub fn validate_method_encoding(encoding: &str) -> Result<()> {
    parse_signature(encoding).map(|_| ())
}

/// Splits a method encoding into its return type and argument types.
///
/// The argument list includes `self` and `_cmd`.
///
/// ```
/// use oxibridge::runtime::encoding::parse_signature;
///
/// let (ret, args) = parse_signature("@@:{CGRect={CGPoint=dd}{CGSize=dd}}QQc").unwrap();
/// assert_eq!(ret, "@");
/// assert_eq!(args, vec!["@", ":", "{CGRect={CGPoint=dd}{CGSize=dd}}", "Q", "Q", "c"]);
/// ```
///
/// # Errors
///
/// Returns [`Error::InvalidEncoding`] as [`validate_method_encoding`] does.
pub fn parse_signature(encoding: &str) -> Result<(&str, Vec<&str>)> {
    let mut types = split_types(encoding)?;
    if types.len() < 3 {
        return Err(invalid(encoding));
    }

    let ret = types.remove(0);
    let receiver = canonical_type(types[0]);
    if (receiver != "@" && receiver != "#") || types[1] != ":" {
        return Err(invalid(encoding));
    }

    Ok((ret, types))
}

fn invalid(encoding: &str) -> Error {
    Error::InvalidEncoding {
        encoding: encoding.to_string(),
    }
}
