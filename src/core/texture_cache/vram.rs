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

//! VRAM geometry and the shadow VRAM buffer
//!
//! The PlayStation GPU has 1MB of VRAM organized as 1024×512 16-bit pixels.
//! For texture tracking purposes VRAM is divided into 32 pages of 64×256
//! pixels (16 across, 2 down), which is also the granularity of a 4-bit
//! texture page.
//!
//! # Page Layout
//!
//! ```text
//!   x:  0    64   128  ...  960  1024
//!      +----+----+----+...+----+
//!      |  0 |  1 |  2 |   | 15 |   y: 0..256
//!      +----+----+----+...+----+
//!      | 16 | 17 | 18 |   | 31 |   y: 256..512
//!      +----+----+----+...+----+
//! ```
//!
//! # Mask Bit
//!
//! Bit 15 of every pixel is the mask bit. Transfers honour the GPU's mask
//! settings: with `check_mask` set, destination pixels that already have the
//! mask bit are left untouched; with `set_mask` set, the mask bit is forced
//! on every written pixel.

use std::path::Path;

use super::key::TextureMode;
use super::rect::Rect;
use crate::core::error::{Result, TextureCacheError};

/// VRAM width in pixels
pub const VRAM_WIDTH: u32 = 1024;

/// VRAM height in pixels
pub const VRAM_HEIGHT: u32 = 512;

/// Total VRAM size in pixels
pub const VRAM_SIZE: usize = (VRAM_WIDTH * VRAM_HEIGHT) as usize;

/// Page width in VRAM pixels
pub const VRAM_PAGE_WIDTH: u32 = 64;

/// Page height in VRAM pixels
pub const VRAM_PAGE_HEIGHT: u32 = 256;

/// Pages per VRAM row
pub const VRAM_PAGES_WIDE: u32 = VRAM_WIDTH / VRAM_PAGE_WIDTH;

/// Pages per VRAM column
pub const VRAM_PAGES_HIGH: u32 = VRAM_HEIGHT / VRAM_PAGE_HEIGHT;

/// Total number of tracked pages
pub const NUM_VRAM_PAGES: usize = (VRAM_PAGES_WIDE * VRAM_PAGES_HIGH) as usize;

/// Width and height of a decoded texture page in texels
pub const TEXTURE_PAGE_SIZE: u32 = 256;

/// Mask bit of a VRAM pixel
pub const MASK_BIT: u16 = 0x8000;

/// X coordinate of the page's top-left corner
#[inline]
pub const fn page_start_x(page: u32) -> u32 {
    (page % VRAM_PAGES_WIDE) * VRAM_PAGE_WIDTH
}

/// Y coordinate of the page's top-left corner
#[inline]
pub const fn page_start_y(page: u32) -> u32 {
    (page / VRAM_PAGES_WIDE) * VRAM_PAGE_HEIGHT
}

/// Page index containing the given pixel
#[inline]
pub const fn page_index(x: u32, y: u32) -> u32 {
    (y / VRAM_PAGE_HEIGHT) * VRAM_PAGES_WIDE + (x / VRAM_PAGE_WIDTH)
}

/// Rectangle covered by a page
#[inline]
pub const fn page_rect(page: u32) -> Rect {
    Rect::from_xywh(
        page_start_x(page) as i32,
        page_start_y(page) as i32,
        VRAM_PAGE_WIDTH as i32,
        VRAM_PAGE_HEIGHT as i32,
    )
}

/// VRAM rectangle of a texture page in the given mode
///
/// The page spans 1, 2 or 4 tracking pages horizontally depending on the
/// colour depth. The rectangle is clamped to the right edge of VRAM.
pub fn texture_page_rect(page: u32, mode: TextureMode) -> Rect {
    let left = page_start_x(page) as i32;
    let top = page_start_y(page) as i32;
    let width = mode.vram_width(TEXTURE_PAGE_SIZE) as i32;
    Rect::new(
        left,
        top,
        (left + width).min(VRAM_WIDTH as i32),
        top + VRAM_PAGE_HEIGHT as i32,
    )
}

/// Visit every page overlapped by `rect`
///
/// The rectangle is clamped to VRAM first; empty rectangles visit nothing.
pub fn for_each_page_in_rect(rect: &Rect, mut f: impl FnMut(u32)) {
    let rect = rect.clamp_to_vram();
    if rect.is_empty() {
        return;
    }
    let start_x = rect.left as u32 / VRAM_PAGE_WIDTH;
    let end_x = (rect.right as u32 - 1) / VRAM_PAGE_WIDTH;
    let start_y = rect.top as u32 / VRAM_PAGE_HEIGHT;
    let end_y = (rect.bottom as u32 - 1) / VRAM_PAGE_HEIGHT;
    for py in start_y..=end_y {
        for px in start_x..=end_x {
            f(py * VRAM_PAGES_WIDE + px);
        }
    }
}

/// Shadow copy of the emulated VRAM
///
/// Holds the CPU-visible VRAM contents from which textures are decoded and
/// hashed. Pixels are stored in row-major order.
///
/// # Examples
///
/// ```
/// use psrx_texcache::core::texture_cache::Vram;
///
/// let mut vram = Vram::new();
/// vram.set_pixel(100, 100, 0x7FFF);
/// assert_eq!(vram.pixel(100, 100), 0x7FFF);
///
/// // Coordinates wrap like the hardware
/// assert_eq!(vram.pixel(1124, 612), 0x7FFF);
/// ```
#[derive(Clone)]
pub struct Vram {
    pixels: Vec<u16>,
}

impl Vram {
    /// Create a VRAM buffer filled with black
    pub fn new() -> Self {
        Self {
            pixels: vec![0x0000; VRAM_SIZE],
        }
    }

    /// Create a VRAM buffer from existing pixel data
    ///
    /// Returns `None` unless `pixels` holds exactly 1024×512 entries.
    pub fn from_pixels(pixels: Vec<u16>) -> Option<Self> {
        (pixels.len() == VRAM_SIZE).then_some(Self { pixels })
    }

    /// Parse a raw VRAM dump of little-endian 16-bit pixels
    ///
    /// # Errors
    ///
    /// Returns [`TextureCacheError::InvalidVramDump`] unless `bytes` is
    /// exactly 1 MiB.
    pub fn from_le_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != VRAM_SIZE * 2 {
            return Err(TextureCacheError::InvalidVramDump {
                expected: VRAM_SIZE * 2,
                actual: bytes.len(),
            });
        }
        let pixels = bytes
            .chunks_exact(2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
            .collect();
        Ok(Self { pixels })
    }

    /// Load a raw VRAM dump from disk
    pub fn load_dump(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| TextureCacheError::io(path, e))?;
        Self::from_le_bytes(&bytes)
    }

    #[inline(always)]
    fn index(x: u32, y: u32) -> usize {
        let x = (x & (VRAM_WIDTH - 1)) as usize;
        let y = (y & (VRAM_HEIGHT - 1)) as usize;
        y * VRAM_WIDTH as usize + x
    }

    /// Read a pixel, wrapping coordinates into VRAM
    #[inline(always)]
    pub fn pixel(&self, x: u32, y: u32) -> u16 {
        self.pixels[Self::index(x, y)]
    }

    /// Read a pixel without wrapping horizontally
    ///
    /// Returns `None` past the right edge of VRAM. Texture and palette
    /// fetches use this so they never read data outside their clamped
    /// rectangles.
    #[inline(always)]
    pub fn pixel_in_row(&self, x: u32, y: u32) -> Option<u16> {
        (x < VRAM_WIDTH).then(|| self.pixel(x, y))
    }

    /// Write a pixel, wrapping coordinates into VRAM
    ///
    /// No mask handling is performed; see [`Vram::write_rect`].
    #[inline(always)]
    pub fn set_pixel(&mut self, x: u32, y: u32, value: u16) {
        self.pixels[Self::index(x, y)] = value;
    }

    /// One VRAM row, starting at `x`, clamped to the right edge
    #[inline]
    pub fn row(&self, x: u32, y: u32, width: u32) -> &[u16] {
        let start = Self::index(x, y);
        let x = x & (VRAM_WIDTH - 1);
        let len = width.min(VRAM_WIDTH - x) as usize;
        &self.pixels[start..start + len]
    }

    /// Whole VRAM contents
    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }

    /// Fill the whole of VRAM with one value
    pub fn fill(&mut self, value: u16) {
        self.pixels.fill(value);
    }

    #[inline(always)]
    fn store_masked(&mut self, x: u32, y: u32, value: u16, set_mask: bool, check_mask: bool) {
        let index = Self::index(x, y);
        if check_mask && (self.pixels[index] & MASK_BIT) != 0 {
            return;
        }
        self.pixels[index] = if set_mask { value | MASK_BIT } else { value };
    }

    /// Write a rectangle of pixels with mask semantics
    ///
    /// `data` is consumed row by row; a short buffer leaves the remaining
    /// pixels untouched. Coordinates wrap around the VRAM edges.
    ///
    /// # Arguments
    ///
    /// * `x`, `y` - Destination top-left corner
    /// * `width`, `height` - Size of the rectangle
    /// * `data` - Source pixels, `width` per row
    /// * `set_mask` - Force bit 15 on written pixels
    /// * `check_mask` - Skip destination pixels that have bit 15 set
    #[allow(clippy::too_many_arguments)]
    pub fn write_rect(
        &mut self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        data: &[u16],
        set_mask: bool,
        check_mask: bool,
    ) {
        for (row, chunk) in data
            .chunks(width.max(1) as usize)
            .take(height as usize)
            .enumerate()
        {
            for (col, &value) in chunk.iter().enumerate() {
                self.store_masked(
                    x + col as u32,
                    y + row as u32,
                    value,
                    set_mask,
                    check_mask,
                );
            }
        }
    }

    /// Copy a rectangle within VRAM with mask semantics
    ///
    /// The source is read completely into a temporary buffer first, so
    /// overlapping source and destination rectangles copy correctly.
    #[allow(clippy::too_many_arguments)]
    pub fn copy_rect(
        &mut self,
        src_x: u32,
        src_y: u32,
        dst_x: u32,
        dst_y: u32,
        width: u32,
        height: u32,
        set_mask: bool,
        check_mask: bool,
    ) {
        let mut temp_buffer = Vec::with_capacity((width as usize) * (height as usize));
        for y in 0..height {
            for x in 0..width {
                temp_buffer.push(self.pixel(src_x + x, src_y + y));
            }
        }
        self.write_rect(
            dst_x,
            dst_y,
            width,
            height,
            &temp_buffer,
            set_mask,
            check_mask,
        );
    }
}

impl Default for Vram {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Vram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vram")
            .field("width", &VRAM_WIDTH)
            .field("height", &VRAM_HEIGHT)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_geometry() {
        assert_eq!(NUM_VRAM_PAGES, 32);
        assert_eq!(page_start_x(3), 192);
        assert_eq!(page_start_y(3), 0);
        assert_eq!(page_start_x(17), 64);
        assert_eq!(page_start_y(17), 256);
        assert_eq!(page_index(200, 300), 19);
        assert_eq!(page_rect(31), Rect::new(960, 256, 1024, 512));
    }

    #[test]
    fn test_texture_page_rect_by_mode() {
        assert_eq!(
            texture_page_rect(3, TextureMode::Palette4Bit),
            Rect::new(192, 0, 256, 256)
        );
        assert_eq!(
            texture_page_rect(3, TextureMode::Palette8Bit),
            Rect::new(192, 0, 320, 256)
        );
        assert_eq!(
            texture_page_rect(3, TextureMode::Direct16Bit),
            Rect::new(192, 0, 448, 256)
        );
    }

    #[test]
    fn test_texture_page_rect_clamped_at_edge() {
        assert_eq!(
            texture_page_rect(14, TextureMode::Direct16Bit),
            Rect::new(896, 0, 1024, 256)
        );
    }

    #[test]
    fn test_for_each_page_in_rect() {
        let mut pages = Vec::new();
        for_each_page_in_rect(&Rect::new(60, 250, 130, 260), |pn| pages.push(pn));
        assert_eq!(pages, vec![0, 1, 2, 16, 17, 18]);

        pages.clear();
        for_each_page_in_rect(&Rect::EMPTY, |pn| pages.push(pn));
        assert!(pages.is_empty());
    }

    #[test]
    fn test_write_rect_basic() {
        let mut vram = Vram::new();
        vram.write_rect(10, 10, 2, 2, &[1, 2, 3, 4], false, false);
        assert_eq!(vram.pixel(10, 10), 1);
        assert_eq!(vram.pixel(11, 10), 2);
        assert_eq!(vram.pixel(10, 11), 3);
        assert_eq!(vram.pixel(11, 11), 4);
    }

    #[test]
    fn test_write_rect_set_mask() {
        let mut vram = Vram::new();
        vram.write_rect(0, 0, 1, 1, &[0x001F], true, false);
        assert_eq!(vram.pixel(0, 0), 0x801F);
    }

    #[test]
    fn test_write_rect_check_mask_preserves_masked_pixels() {
        let mut vram = Vram::new();
        vram.set_pixel(0, 0, 0x8001);
        vram.set_pixel(1, 0, 0x0001);
        vram.write_rect(0, 0, 2, 1, &[0x7FFF, 0x7FFF], false, true);
        assert_eq!(vram.pixel(0, 0), 0x8001); // Protected
        assert_eq!(vram.pixel(1, 0), 0x7FFF);
    }

    #[test]
    fn test_write_rect_wraps() {
        let mut vram = Vram::new();
        vram.write_rect(1023, 511, 2, 2, &[1, 2, 3, 4], false, false);
        assert_eq!(vram.pixel(1023, 511), 1);
        assert_eq!(vram.pixel(0, 511), 2);
        assert_eq!(vram.pixel(1023, 0), 3);
        assert_eq!(vram.pixel(0, 0), 4);
    }

    #[test]
    fn test_copy_rect_overlapping() {
        let mut vram = Vram::new();
        for x in 0..8 {
            vram.set_pixel(50 + x, 50, (x + 1) as u16 * 100);
        }
        vram.copy_rect(50, 50, 52, 50, 4, 1, false, false);
        assert_eq!(vram.pixel(52, 50), 100);
        assert_eq!(vram.pixel(53, 50), 200);
        assert_eq!(vram.pixel(54, 50), 300);
        assert_eq!(vram.pixel(55, 50), 400);
        assert_eq!(vram.pixel(50, 50), 100);
    }

    #[test]
    fn test_row_is_clamped() {
        let vram = Vram::new();
        assert_eq!(vram.row(1000, 0, 64).len(), 24);
        assert_eq!(vram.row(0, 0, 64).len(), 64);
    }

    #[test]
    fn test_from_pixels_size_check() {
        assert!(Vram::from_pixels(vec![0; 16]).is_none());
        assert!(Vram::from_pixels(vec![0; VRAM_SIZE]).is_some());
    }

    #[test]
    fn test_pixel_in_row_stops_at_right_edge() {
        let mut vram = Vram::new();
        vram.set_pixel(0, 3, 0x1234);
        vram.set_pixel(1023, 3, 0x4321);
        assert_eq!(vram.pixel_in_row(1023, 3), Some(0x4321));
        assert_eq!(vram.pixel_in_row(1024, 3), None);
        assert_eq!(vram.pixel(1024, 3), 0x1234);
    }

    #[test]
    fn test_from_le_bytes() {
        let mut bytes = vec![0u8; VRAM_SIZE * 2];
        bytes[2] = 0x34;
        bytes[3] = 0x12;
        let vram = Vram::from_le_bytes(&bytes).unwrap();
        assert_eq!(vram.pixel(1, 0), 0x1234);
        assert_eq!(vram.pixel(0, 0), 0);
    }

    #[test]
    fn test_from_le_bytes_wrong_size() {
        assert!(matches!(
            Vram::from_le_bytes(&[0; 100]),
            Err(TextureCacheError::InvalidVramDump { actual: 100, .. })
        ));
    }

    #[test]
    fn test_load_dump_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Vram::load_dump(dir.path().join("vram.bin")),
            Err(TextureCacheError::Io { .. })
        ));
    }
}
