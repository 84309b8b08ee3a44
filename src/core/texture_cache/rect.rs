// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Integer rectangles in VRAM space
//!
//! All rectangles are half-open: `left`/`top` are inclusive, `right`/`bottom`
//! are exclusive. A rectangle with `right <= left` or `bottom <= top` is empty.

use serde::{Deserialize, Serialize};

use super::vram::{VRAM_HEIGHT, VRAM_WIDTH};

/// Axis-aligned integer rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge (inclusive)
    pub left: i32,
    /// Top edge (inclusive)
    pub top: i32,
    /// Right edge (exclusive)
    pub right: i32,
    /// Bottom edge (exclusive)
    pub bottom: i32,
}

impl Rect {
    /// The empty rectangle
    pub const EMPTY: Rect = Rect {
        left: 0,
        top: 0,
        right: 0,
        bottom: 0,
    };

    /// The whole of VRAM
    pub const VRAM: Rect = Rect {
        left: 0,
        top: 0,
        right: VRAM_WIDTH as i32,
        bottom: VRAM_HEIGHT as i32,
    };

    /// Create a rectangle from its four edges
    #[inline]
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Create a rectangle from an origin and a size
    ///
    /// # Examples
    ///
    /// ```
    /// use psrx_texcache::core::texture_cache::Rect;
    ///
    /// let rect = Rect::from_xywh(64, 0, 64, 256);
    /// assert_eq!(rect, Rect::new(64, 0, 128, 256));
    /// assert_eq!(rect.width(), 64);
    /// ```
    #[inline]
    pub const fn from_xywh(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    #[inline]
    pub const fn width(&self) -> i32 {
        self.right - self.left
    }

    #[inline]
    pub const fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Check whether the rectangle covers no pixels
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    /// Check whether two rectangles share at least one pixel
    #[inline]
    pub const fn intersects(&self, other: &Rect) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
            && !self.is_empty()
            && !other.is_empty()
    }

    /// Check whether `other` lies entirely inside this rectangle
    ///
    /// An empty `other` is contained by anything.
    #[inline]
    pub const fn contains(&self, other: &Rect) -> bool {
        other.is_empty()
            || (other.left >= self.left
                && other.top >= self.top
                && other.right <= self.right
                && other.bottom <= self.bottom)
    }

    /// Overlapping part of two rectangles (possibly empty)
    #[inline]
    pub fn intersection(&self, other: &Rect) -> Rect {
        Rect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        )
    }

    /// Bounding rectangle of both rectangles
    ///
    /// Empty rectangles do not contribute, so `EMPTY` is the identity.
    #[inline]
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Rect::new(
            self.left.min(other.left),
            self.top.min(other.top),
            self.right.max(other.right),
            self.bottom.max(other.bottom),
        )
    }

    /// Clamp the rectangle to the VRAM bounds
    #[inline]
    pub fn clamp_to_vram(&self) -> Rect {
        self.intersection(&Rect::VRAM)
    }

    /// Compute the tracking bounds of a VRAM transfer
    ///
    /// Transfers wrap around the edges of VRAM. When a transfer crosses the
    /// right (or bottom) edge, the bounds cover the entire width (or height)
    /// so that both halves of the wrapped transfer are tracked.
    ///
    /// # Examples
    ///
    /// ```
    /// use psrx_texcache::core::texture_cache::Rect;
    ///
    /// assert_eq!(Rect::vram_transfer_bounds(10, 20, 4, 4), Rect::new(10, 20, 14, 24));
    ///
    /// // Crosses the right edge: full width is tracked
    /// assert_eq!(Rect::vram_transfer_bounds(1020, 0, 8, 2), Rect::new(0, 0, 1024, 2));
    /// ```
    pub fn vram_transfer_bounds(x: u32, y: u32, width: u32, height: u32) -> Rect {
        let left = x % VRAM_WIDTH;
        let top = y % VRAM_HEIGHT;
        let mut rect = Rect::new(
            left as i32,
            top as i32,
            (left + width) as i32,
            (top + height) as i32,
        );
        if rect.right > VRAM_WIDTH as i32 {
            rect.left = 0;
            rect.right = VRAM_WIDTH as i32;
        }
        if rect.bottom > VRAM_HEIGHT as i32 {
            rect.top = 0;
            rect.bottom = VRAM_HEIGHT as i32;
        }
        rect
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({},{})-({},{})",
            self.left, self.top, self.right, self.bottom
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rect_empty() {
        assert!(Rect::EMPTY.is_empty());
        assert!(Rect::new(5, 5, 5, 10).is_empty());
        assert!(Rect::new(5, 5, 10, 4).is_empty());
        assert!(!Rect::new(0, 0, 1, 1).is_empty());
    }

    #[test]
    fn test_rect_intersects_edges_are_exclusive() {
        let a = Rect::new(0, 0, 64, 256);
        let b = Rect::new(64, 0, 128, 256);
        assert!(!a.intersects(&b));
        assert!(a.intersects(&Rect::new(63, 255, 64, 256)));
    }

    #[test]
    fn test_rect_empty_never_intersects() {
        let a = Rect::new(0, 0, 64, 256);
        assert!(!a.intersects(&Rect::new(10, 10, 10, 20)));
    }

    #[test]
    fn test_rect_union_identity() {
        let a = Rect::new(3, 4, 10, 12);
        assert_eq!(a.union(&Rect::EMPTY), a);
        assert_eq!(Rect::EMPTY.union(&a), a);
        assert_eq!(
            a.union(&Rect::new(20, 0, 21, 1)),
            Rect::new(3, 0, 21, 12)
        );
    }

    #[test]
    fn test_rect_contains() {
        let a = Rect::new(0, 0, 64, 64);
        assert!(a.contains(&Rect::new(0, 0, 64, 64)));
        assert!(a.contains(&Rect::new(10, 10, 20, 20)));
        assert!(!a.contains(&Rect::new(10, 10, 65, 20)));
        assert!(a.contains(&Rect::EMPTY));
    }

    #[test]
    fn test_transfer_bounds_wraps_vertically() {
        assert_eq!(
            Rect::vram_transfer_bounds(100, 510, 4, 4),
            Rect::new(100, 0, 104, 512)
        );
    }

    #[test]
    fn test_transfer_bounds_wraps_origin() {
        assert_eq!(
            Rect::vram_transfer_bounds(1024 + 8, 512 + 8, 2, 2),
            Rect::new(8, 8, 10, 10)
        );
    }

    fn arb_rect() -> impl Strategy<Value = Rect> {
        (0i32..1024, 0i32..512, 0i32..300, 0i32..300)
            .prop_map(|(x, y, w, h)| Rect::from_xywh(x, y, w, h))
    }

    proptest! {
        #[test]
        fn prop_intersection_is_contained_by_both(a in arb_rect(), b in arb_rect()) {
            let i = a.intersection(&b);
            prop_assert_eq!(a.intersects(&b), !i.is_empty());
            if !i.is_empty() {
                prop_assert!(a.contains(&i));
                prop_assert!(b.contains(&i));
            }
        }

        #[test]
        fn prop_union_contains_both(a in arb_rect(), b in arb_rect()) {
            let u = a.union(&b);
            prop_assert!(u.contains(&a));
            prop_assert!(u.contains(&b));
        }
    }
}
