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

//! Texture page decoding
//!
//! Expands a texture page from VRAM into 32-bit RGBA texels.
//!
//! # Texel Layout
//!
//! - 4-bit: four texels per VRAM pixel, lowest nibble is the leftmost texel
//! - 8-bit: two texels per VRAM pixel, low byte is the leftmost texel
//! - 16-bit: one texel per VRAM pixel
//!
//! Indexed texels are looked up in the palette row at the CLUT position.
//! Texels and palette entries past the right edge of VRAM do not wrap; they
//! decode as transparent black.
//!
//! # Output Format
//!
//! Each texel is packed as `0xAABBGGRR` (RGBA8 in memory order on little
//! endian). The 5-bit channels are expanded by shifting left by 3. The
//! alpha channel encodes the PSX transparency rules:
//! - `0x0000` is fully transparent (alpha 0)
//! - texels with bit 15 set are semi-transparent candidates (alpha 0x80)
//! - everything else is opaque (alpha 0xFF)

use super::key::{PaletteReg, TextureMode};
use super::vram::{page_start_x, page_start_y, Vram, MASK_BIT};

/// Convert one VRAM pixel to packed RGBA8
///
/// # Examples
///
/// ```
/// use psrx_texcache::core::texture_cache::decode::vram_pixel_to_rgba8;
///
/// assert_eq!(vram_pixel_to_rgba8(0x0000), 0x0000_0000); // Transparent
/// assert_eq!(vram_pixel_to_rgba8(0x001F), 0xFF00_00F8); // Opaque red
/// assert_eq!(vram_pixel_to_rgba8(0xFC00), 0x80F8_0000); // Semi-transparent blue
/// ```
#[inline]
pub fn vram_pixel_to_rgba8(pixel: u16) -> u32 {
    let r = ((pixel & 0x1F) << 3) as u32;
    let g = (((pixel >> 5) & 0x1F) << 3) as u32;
    let b = (((pixel >> 10) & 0x1F) << 3) as u32;
    let a = if pixel == 0 {
        0x00
    } else if pixel & MASK_BIT != 0 {
        0x80
    } else {
        0xFF
    };
    r | (g << 8) | (b << 16) | (a << 24)
}

/// Raw texel value (palette index or direct colour) at texel `(u, v)` of a page
///
/// Returns `None` for texels whose VRAM pixel lies past the right edge.
#[inline]
fn fetch_texel(
    vram: &Vram,
    mode: TextureMode,
    base_x: u32,
    base_y: u32,
    u: u32,
    v: u32,
) -> Option<u16> {
    match mode {
        TextureMode::Palette4Bit => {
            let pixel = vram.pixel_in_row(base_x + u / 4, base_y + v)?;
            Some((pixel >> ((u % 4) * 4)) & 0xF)
        }
        TextureMode::Palette8Bit => {
            let pixel = vram.pixel_in_row(base_x + u / 2, base_y + v)?;
            Some((pixel >> ((u % 2) * 8)) & 0xFF)
        }
        TextureMode::Direct16Bit => vram.pixel_in_row(base_x + u, base_y + v),
    }
}

/// Decode a texture page into RGBA8 texels
///
/// # Arguments
///
/// * `mode` - Colour depth of the page
/// * `vram` - VRAM to read texels and palette from
/// * `page` - Texture page index (0-31)
/// * `palette` - Palette register (ignored in direct mode)
/// * `dest` - Output texels, `dest_stride` texels per row
/// * `dest_stride` - Row pitch of `dest` in texels
/// * `width`, `height` - Number of texels to decode
///
/// # Panics
///
/// Panics if `dest` is too small for `height` rows of `dest_stride` texels.
#[allow(clippy::too_many_arguments)]
pub fn decode_texture(
    mode: TextureMode,
    vram: &Vram,
    page: u32,
    palette: PaletteReg,
    dest: &mut [u32],
    dest_stride: usize,
    width: u32,
    height: u32,
) {
    assert!(
        dest.len() >= dest_stride * (height as usize).saturating_sub(1) + width as usize,
        "decode destination too small"
    );

    let base_x = page_start_x(page);
    let base_y = page_start_y(page);
    let clut_x = palette.x_base();
    let clut_y = palette.y_base();

    for v in 0..height {
        let row = &mut dest[(v as usize) * dest_stride..][..width as usize];
        for (u, out) in row.iter_mut().enumerate() {
            let color = fetch_texel(vram, mode, base_x, base_y, u as u32, v).and_then(|texel| {
                if mode.has_palette() {
                    vram.pixel_in_row(clut_x + texel as u32, clut_y)
                } else {
                    Some(texel)
                }
            });
            // Nothing past the right edge of VRAM is sampled
            *out = color.map_or(0, vram_pixel_to_rgba8);
        }
    }
}

/// Smallest and largest palette index used by a texture page
///
/// Returns `None` for direct colour pages.
pub fn palette_index_range(
    mode: TextureMode,
    vram: &Vram,
    page: u32,
    width: u32,
    height: u32,
) -> Option<(u32, u32)> {
    if !mode.has_palette() {
        return None;
    }

    let base_x = page_start_x(page);
    let base_y = page_start_y(page);
    let last = mode.palette_entries() - 1;
    let mut min = last;
    let mut max = 0;

    for v in 0..height {
        for u in 0..width {
            let Some(index) = fetch_texel(vram, mode, base_x, base_y, u, v) else {
                break;
            };
            min = min.min(index as u32);
            max = max.max(index as u32);
        }
        if min == 0 && max == last {
            break;
        }
    }

    Some((min, max))
}
