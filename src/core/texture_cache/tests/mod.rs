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

//! Texture cache pipeline tests

use super::*;

mod invalidation;

/// Cache over blank VRAM with default settings
pub(super) fn new_cache() -> TextureCache<SoftwareBackend> {
    TextureCache::new(SoftwareBackend::new(), TextureCacheSettings::default())
}

pub(super) fn new_cache_with(settings: TextureCacheSettings) -> TextureCache<SoftwareBackend> {
    TextureCache::new(SoftwareBackend::new(), settings)
}

/// Fill a VRAM rectangle with one value through the write path
pub(super) fn fill_vram(
    cache: &mut TextureCache<SoftwareBackend>,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    value: u16,
) {
    let data = vec![value; (width * height) as usize];
    cache.write_vram(
        x,
        y,
        width,
        height,
        &data,
        false,
        false,
        Rect::vram_transfer_bounds(x, y, width, height),
    );
}

pub(super) fn key4(page: u8, clut_x: u32, clut_y: u32) -> SourceKey {
    SourceKey::new(
        page,
        PaletteReg::from_position(clut_x, clut_y),
        TextureMode::Palette4Bit,
    )
}

pub(super) fn key8(page: u8, clut_x: u32, clut_y: u32) -> SourceKey {
    SourceKey::new(
        page,
        PaletteReg::from_position(clut_x, clut_y),
        TextureMode::Palette8Bit,
    )
}

pub(super) fn key16(page: u8) -> SourceKey {
    SourceKey::new(page, PaletteReg(0), TextureMode::Direct16Bit)
}

/// Whole texture page in texel coordinates
pub(super) const FULL_UV: Rect = Rect::new(0, 0, 256, 256);

pub(super) const NO_FLAGS: PaletteRecordFlags = PaletteRecordFlags::empty();

/// Look up a source and return its handle
pub(super) fn lookup_id(
    cache: &mut TextureCache<SoftwareBackend>,
    key: SourceKey,
    uv: Rect,
) -> SourceId {
    cache.lookup_source(key, &uv, NO_FLAGS).unwrap();
    cache.source_id(key).unwrap()
}
