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

//! Source keys: which texture page, in which colour mode, with which palette

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::rect::Rect;
use super::vram::{texture_page_rect, NUM_VRAM_PAGES, TEXTURE_PAGE_SIZE, VRAM_WIDTH};

/// Texture colour depth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum TextureMode {
    /// 4-bit indexed colour (16-entry palette)
    Palette4Bit = 0,
    /// 8-bit indexed colour (256-entry palette)
    Palette8Bit = 1,
    /// 15-bit direct colour (no palette)
    Direct16Bit = 2,
}

impl TextureMode {
    /// Whether texels are palette indices
    #[inline]
    pub const fn has_palette(self) -> bool {
        !matches!(self, TextureMode::Direct16Bit)
    }

    /// Number of palette entries addressable in this mode
    #[inline]
    pub const fn palette_entries(self) -> u32 {
        match self {
            TextureMode::Palette4Bit => 16,
            TextureMode::Palette8Bit => 256,
            TextureMode::Direct16Bit => 0,
        }
    }

    /// Texels stored per 16-bit VRAM pixel
    #[inline]
    pub const fn texels_per_pixel(self) -> u32 {
        match self {
            TextureMode::Palette4Bit => 4,
            TextureMode::Palette8Bit => 2,
            TextureMode::Direct16Bit => 1,
        }
    }

    /// VRAM width in pixels needed to store `texels` texels
    #[inline]
    pub const fn vram_width(self, texels: u32) -> u32 {
        texels.div_ceil(self.texels_per_pixel())
    }
}

impl From<u8> for TextureMode {
    /// Convert a texpage colour depth field (0=4bit, 1=8bit, 2/3=15bit)
    fn from(value: u8) -> Self {
        match value & 3 {
            0 => TextureMode::Palette4Bit,
            1 => TextureMode::Palette8Bit,
            _ => TextureMode::Direct16Bit,
        }
    }
}

/// Palette (CLUT) register
///
/// Bits 0-5 hold the X position in 16-pixel steps, bits 6-14 the Y position.
///
/// # Examples
///
/// ```
/// use psrx_texcache::core::texture_cache::PaletteReg;
///
/// let reg = PaletteReg::from_position(320, 480);
/// assert_eq!(reg.x_base(), 320);
/// assert_eq!(reg.y_base(), 480);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PaletteReg(pub u16);

impl PaletteReg {
    /// Build a register from a VRAM position (X is truncated to 16-pixel steps)
    pub const fn from_position(x: u32, y: u32) -> Self {
        Self((((x / 16) & 0x3F) | ((y & 0x1FF) << 6)) as u16)
    }

    /// Palette X position in VRAM pixels
    #[inline]
    pub const fn x_base(self) -> u32 {
        ((self.0 & 0x3F) as u32) * 16
    }

    /// Palette Y position in VRAM pixels
    #[inline]
    pub const fn y_base(self) -> u32 {
        ((self.0 >> 6) & 0x1FF) as u32
    }

    /// VRAM rectangle holding the palette for `mode`, clamped to the VRAM edge
    pub fn rect(self, mode: TextureMode) -> Rect {
        if !mode.has_palette() {
            return Rect::EMPTY;
        }
        let left = self.x_base() as i32;
        let top = self.y_base() as i32;
        Rect::new(
            left,
            top,
            (left + mode.palette_entries() as i32).min(VRAM_WIDTH as i32),
            top + 1,
        )
    }
}

bitflags! {
    /// Per-source record of how draws used the texture
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PaletteRecordFlags: u32 {
        /// At least one draw sampling this source used semi-transparency
        const HAS_SEMI_TRANSPARENT_DRAWS = 1 << 0;
    }
}

/// Identifies one decodable texture: page + colour mode + palette
///
/// Direct 16-bit keys carry no palette; the palette field is normalized to
/// zero so that keys differing only in an unused palette compare equal.
///
/// # Examples
///
/// ```
/// use psrx_texcache::core::texture_cache::{PaletteReg, SourceKey, TextureMode};
///
/// let a = SourceKey::new(3, PaletteReg(0x1234), TextureMode::Direct16Bit);
/// let b = SourceKey::new(3, PaletteReg(0x0042), TextureMode::Direct16Bit);
/// assert_eq!(a, b);
/// assert!(!a.has_palette());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceKey {
    /// Texture page index (0-31)
    pub page: u8,
    /// Colour mode
    pub mode: TextureMode,
    /// Palette register (zero in direct mode)
    pub palette: PaletteReg,
}

const _: () = assert!(std::mem::size_of::<SourceKey>() == 4);

impl SourceKey {
    /// Create a key, normalizing the palette for direct colour modes
    pub const fn new(page: u8, palette: PaletteReg, mode: TextureMode) -> Self {
        debug_assert!((page as usize) < NUM_VRAM_PAGES);
        Self {
            page,
            mode,
            palette: if mode.has_palette() {
                palette
            } else {
                PaletteReg(0)
            },
        }
    }

    #[inline]
    pub const fn has_palette(&self) -> bool {
        self.mode.has_palette()
    }

    /// VRAM rectangle of the texture data
    pub fn texture_rect(&self) -> Rect {
        texture_page_rect(self.page as u32, self.mode)
    }

    /// VRAM rectangle of the palette data (empty in direct mode)
    pub fn palette_rect(&self) -> Rect {
        self.palette.rect(self.mode)
    }

    /// Convert a texel-space rectangle on this page into VRAM coordinates
    ///
    /// Horizontal texel coordinates are divided by the texels-per-pixel
    /// ratio of the mode (rounding outwards), offset by the page origin and
    /// clamped to the texture rectangle.
    pub fn uv_rect_to_vram(&self, uv_rect: &Rect) -> Rect {
        let tex = self.texture_rect();
        let ratio = self.mode.texels_per_pixel() as i32;
        let texel = |c: i32| c.clamp(0, TEXTURE_PAGE_SIZE as i32);
        let left = texel(uv_rect.left) / ratio;
        let right = (texel(uv_rect.right) + ratio - 1) / ratio;
        Rect::new(
            tex.left + left,
            tex.top + texel(uv_rect.top),
            tex.left + right,
            tex.top + texel(uv_rect.bottom),
        )
        .intersection(&tex)
    }
}

impl std::fmt::Display for SourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.has_palette() {
            write!(
                f,
                "page {} {:?} palette ({},{})",
                self.page,
                self.mode,
                self.palette.x_base(),
                self.palette.y_base()
            )
        } else {
            write!(f, "page {} {:?}", self.page, self.mode)
        }
    }
}
