//! By-value geometry passed across the dispatcher.
//!
//! Field order and widths match the runtime's `CGPoint`, `CGSize` and
//! `CGRect` (`NSPoint`, `NSSize`, `NSRect` on 64-bit): two `f64` per point
//! or size, a rect being an origin followed by a size. They travel inline in
//! registers or on the stack exactly as a C struct would, never behind a
//! pointer.

use crate::runtime::encoding::{Encode, EncodeReturn, Encoding};

/// `CGPoint`
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

/// `CGSize`
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Size { width, height }
    }
}

/// `CGRect`
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    /// The empty rect at the origin.
    pub const ZERO: Rect = Rect::new(0.0, 0.0, 0.0, 0.0);

    /// Builds a rect from its four components (`NSMakeRect`).
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Rect {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    #[must_use]
    pub const fn from_parts(origin: Point, size: Size) -> Self {
        Rect { origin, size }
    }

    /// Reports whether every component is finite and the size non-negative.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        [self.origin.x, self.origin.y, self.size.width, self.size.height]
            .iter()
            .all(|v| v.is_finite())
            && self.size.width >= 0.0
            && self.size.height >= 0.0
    }
}

const POINT_FIELDS: &[Encoding] = &[Encoding::Double, Encoding::Double];
const POINT: Encoding = Encoding::Struct("CGPoint", POINT_FIELDS);
const SIZE: Encoding = Encoding::Struct("CGSize", POINT_FIELDS);
const RECT_FIELDS: &[Encoding] = &[POINT, SIZE];

unsafe impl Encode for Point {
    const ENCODING: Encoding = POINT;
}

unsafe impl EncodeReturn for Point {
    const ZERO: Self = Point::new(0.0, 0.0);
}

unsafe impl Encode for Size {
    const ENCODING: Encoding = SIZE;
}

unsafe impl EncodeReturn for Size {
    const ZERO: Self = Size::new(0.0, 0.0);
}

unsafe impl Encode for Rect {
    const ENCODING: Encoding = Encoding::Struct("CGRect", RECT_FIELDS);
}

unsafe impl EncodeReturn for Rect {
    const ZERO: Self = Rect::ZERO;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, offset_of, size_of};

    #[test]
    fn test_layout() {
        assert_eq!(size_of::<Point>(), 16);
        assert_eq!(size_of::<Size>(), 16);
        assert_eq!(size_of::<Rect>(), 32);
        assert_eq!(align_of::<Rect>(), 8);
        assert_eq!(offset_of!(Rect, origin), 0);
        assert_eq!(offset_of!(Rect, size), 16);
        assert_eq!(offset_of!(Size, height), 8);
    }

    #[test]
    fn test_make_rect() {
        let rect = Rect::new(0.0, 0.0, 800.0, 450.0);
        assert_eq!(rect.origin, Point::new(0.0, 0.0));
        assert_eq!(rect.size, Size::new(800.0, 450.0));
        assert_eq!(
            rect,
            Rect::from_parts(Point::default(), Size::new(800.0, 450.0))
        );
    }

    #[test]
    fn test_well_formed() {
        assert!(Rect::new(0.0, 0.0, 800.0, 450.0).is_well_formed());
        assert!(Rect::ZERO.is_well_formed());
        assert!(!Rect::new(0.0, 0.0, -1.0, 10.0).is_well_formed());
        assert!(!Rect::new(f64::NAN, 0.0, 1.0, 1.0).is_well_formed());
    }

    #[test]
    fn test_encodings() {
        assert_eq!(Point::ENCODING.to_string(), "{CGPoint=dd}");
        assert_eq!(Size::ENCODING.to_string(), "{CGSize=dd}");
        assert_eq!(
            Rect::ENCODING.to_string(),
            "{CGRect={CGPoint=dd}{CGSize=dd}}"
        );
        assert_eq!(Rect::ENCODING.size(), 32);
    }
}
