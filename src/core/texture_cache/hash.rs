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

//! Content hashing of VRAM regions
//!
//! All hashes are 64-bit xxHash over the little-endian bytes of the 16-bit
//! pixels. Hashes only depend on content and on the order of pixels, never
//! on where in VRAM the content lives, so identical textures at different
//! pages produce identical hashes.

use std::hash::Hasher;

use twox_hash::XxHash64;

use super::key::{PaletteReg, TextureMode};
use super::rect::Rect;
use super::vram::Vram;

/// Hash value type used throughout the cache
pub type HashType = u64;

#[inline]
fn write_pixels(hasher: &mut XxHash64, pixels: &[u16]) {
    if cfg!(target_endian = "little") {
        hasher.write(bytemuck::cast_slice(pixels));
    } else {
        for &pixel in pixels {
            hasher.write(&pixel.to_le_bytes());
        }
    }
}

/// Hash the pixels of a VRAM rectangle, row by row
///
/// The rectangle is clamped to VRAM; an empty rectangle hashes to the hash
/// of no data.
pub fn hash_rect(vram: &Vram, rect: &Rect) -> HashType {
    let rect = rect.clamp_to_vram();
    let mut hasher = XxHash64::with_seed(0);
    if !rect.is_empty() {
        for y in rect.top..rect.bottom {
            write_pixels(
                &mut hasher,
                vram.row(rect.left as u32, y as u32, rect.width() as u32),
            );
        }
    }
    hasher.finish()
}

/// Hash the palette entries `min..=max` referenced by a texture
///
/// Entries outside the range are not read, so they may change without
/// affecting the hash. Entries past the right edge of VRAM are not part of
/// the palette and are skipped.
pub fn hash_partial_palette(
    vram: &Vram,
    palette: PaletteReg,
    mode: TextureMode,
    min: u32,
    max: u32,
) -> HashType {
    debug_assert!(mode.has_palette(), "hashing palette of a direct texture");
    debug_assert!(min <= max && max < mode.palette_entries());

    let x = palette.x_base();
    let y = palette.y_base();
    let entries: Vec<u16> = (min..=max)
        .filter_map(|i| vram.pixel_in_row(x + i, y))
        .collect();

    let mut hasher = XxHash64::with_seed(0);
    write_pixels(&mut hasher, &entries);
    hasher.finish()
}

/// Hash a raw VRAM write payload
///
/// Used to key VRAM write replacements and dumps.
pub fn hash_vram_write(pixels: &[u16]) -> HashType {
    let mut hasher = XxHash64::with_seed(0);
    write_pixels(&mut hasher, pixels);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fill(vram: &mut Vram, rect: Rect, value: u16) {
        for y in rect.top..rect.bottom {
            for x in rect.left..rect.right {
                vram.set_pixel(x as u32, y as u32, value);
            }
        }
    }

    #[test]
    fn test_hash_rect_is_position_independent() {
        let mut vram = Vram::new();
        fill(&mut vram, Rect::new(0, 0, 64, 256), 0x1234);
        fill(&mut vram, Rect::new(128, 256, 192, 512), 0x1234);
        assert_eq!(
            hash_rect(&vram, &Rect::new(0, 0, 64, 256)),
            hash_rect(&vram, &Rect::new(128, 256, 192, 512))
        );
    }

    #[test]
    fn test_hash_rect_detects_single_pixel_change() {
        let mut vram = Vram::new();
        let rect = Rect::new(64, 0, 128, 256);
        let before = hash_rect(&vram, &rect);
        vram.set_pixel(127, 255, 1);
        assert_ne!(before, hash_rect(&vram, &rect));
    }

    #[test]
    fn test_hash_rect_is_order_sensitive() {
        let mut vram = Vram::new();
        vram.set_pixel(0, 0, 1);
        vram.set_pixel(1, 0, 2);
        vram.set_pixel(2, 1, 2);
        vram.set_pixel(3, 1, 1);
        assert_ne!(
            hash_rect(&vram, &Rect::new(0, 0, 2, 1)),
            hash_rect(&vram, &Rect::new(2, 1, 4, 2))
        );
    }

    #[test]
    fn test_hash_rect_ignores_outside_pixels() {
        let mut vram = Vram::new();
        let rect = Rect::new(0, 0, 64, 256);
        let before = hash_rect(&vram, &rect);
        vram.set_pixel(64, 0, 0x7FFF);
        vram.set_pixel(0, 256, 0x7FFF);
        assert_eq!(before, hash_rect(&vram, &rect));
    }

    #[test]
    fn test_partial_palette_ignores_entries_past_edge() {
        let mut vram = Vram::new();
        let palette = PaletteReg::from_position(1008, 300);
        let before = hash_partial_palette(&vram, palette, TextureMode::Palette8Bit, 0, 255);

        // Wrapped position of entry 16
        vram.set_pixel(0, 300, 0x7FFF);
        assert_eq!(
            before,
            hash_partial_palette(&vram, palette, TextureMode::Palette8Bit, 0, 255)
        );

        vram.set_pixel(1023, 300, 0x7FFF);
        assert_ne!(
            before,
            hash_partial_palette(&vram, palette, TextureMode::Palette8Bit, 0, 255)
        );
    }

    #[test]
    fn test_hash_vram_write_matches_content() {
        assert_eq!(hash_vram_write(&[1, 2, 3]), hash_vram_write(&[1, 2, 3]));
        assert_ne!(hash_vram_write(&[1, 2, 3]), hash_vram_write(&[3, 2, 1]));
    }

    proptest! {
        #[test]
        fn prop_partial_palette_ignores_entries_outside_range(
            min in 0u32..256,
            span in 0u32..256,
            outside in 0u32..256,
            value in any::<u16>(),
        ) {
            let max = (min + span).min(255);
            prop_assume!(outside < min || outside > max);

            let mut vram = Vram::new();
            for i in 0..256 {
                vram.set_pixel(256 + i, 100, (i * 7) as u16);
            }
            let palette = PaletteReg::from_position(256, 100);
            let before = hash_partial_palette(&vram, palette, TextureMode::Palette8Bit, min, max);

            vram.set_pixel(256 + outside, 100, value);
            let after = hash_partial_palette(&vram, palette, TextureMode::Palette8Bit, min, max);
            prop_assert_eq!(before, after);
        }

        #[test]
        fn prop_partial_palette_sees_entries_inside_range(
            min in 0u32..16,
            span in 0u32..16,
            offset in 0u32..16,
        ) {
            let max = (min + span).min(15);
            let inside = min + offset % (max - min + 1);

            let mut vram = Vram::new();
            let palette = PaletteReg::from_position(0, 480);
            let before = hash_partial_palette(&vram, palette, TextureMode::Palette4Bit, min, max);

            vram.set_pixel(inside, 480, 0x7FFF);
            let after = hash_partial_palette(&vram, palette, TextureMode::Palette4Bit, min, max);
            prop_assert_ne!(before, after);
        }
    }
}
