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

//! Renderer-side texture resources
//!
//! The cache never talks to a graphics API directly. It asks a
//! [`TextureBackend`] to allocate and upload decoded texels and hands the
//! resulting resource back when the last user goes away.

use image::RgbaImage;

use crate::core::error::{Result, TextureCacheError};

/// Allocation and release of renderer textures
pub trait TextureBackend {
    /// Renderer texture resource
    type Texture;

    /// Allocate a texture and upload `rgba` (packed `0xAABBGGRR`, row-major)
    ///
    /// # Errors
    ///
    /// Returns [`TextureCacheError::TextureAllocation`] when the renderer
    /// cannot provide the resource.
    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u32]) -> Result<Self::Texture>;

    /// Release a texture previously returned by [`TextureBackend::create_texture`]
    fn release_texture(&mut self, texture: Self::Texture);
}

/// CPU-side backend keeping textures as images
///
/// Used by tooling that wants the decoded pixels rather than GPU resources,
/// and as a reference backend in tests.
///
/// # Examples
///
/// ```
/// use psrx_texcache::core::texture_cache::{SoftwareBackend, TextureBackend};
///
/// let mut backend = SoftwareBackend::new();
/// let texture = backend.create_texture(2, 1, &[0xFF00_00F8, 0x0000_0000]).unwrap();
/// assert_eq!(texture.get_pixel(0, 0).0, [0xF8, 0, 0, 0xFF]);
/// assert_eq!(backend.live_textures(), 1);
///
/// backend.release_texture(texture);
/// assert_eq!(backend.live_textures(), 0);
/// ```
#[derive(Debug, Default)]
pub struct SoftwareBackend {
    created: usize,
    released: usize,
    /// Refuse allocations after this many textures (testing aid)
    allocation_limit: Option<usize>,
}

impl SoftwareBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that fails every allocation beyond `limit` live textures
    pub fn with_allocation_limit(limit: usize) -> Self {
        Self {
            allocation_limit: Some(limit),
            ..Self::default()
        }
    }

    /// Number of textures created so far
    pub fn created_textures(&self) -> usize {
        self.created
    }

    /// Number of textures currently alive
    pub fn live_textures(&self) -> usize {
        self.created - self.released
    }
}

impl TextureBackend for SoftwareBackend {
    type Texture = RgbaImage;

    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u32]) -> Result<RgbaImage> {
        if let Some(limit) = self.allocation_limit {
            if self.live_textures() >= limit {
                return Err(TextureCacheError::TextureAllocation {
                    width,
                    height,
                    reason: format!("software backend limit of {} textures reached", limit),
                });
            }
        }

        let bytes: Vec<u8> = rgba.iter().flat_map(|texel| texel.to_le_bytes()).collect();
        let image = RgbaImage::from_raw(width, height, bytes).ok_or_else(|| {
            TextureCacheError::TextureAllocation {
                width,
                height,
                reason: format!("{} texels do not fill {}x{}", rgba.len(), width, height),
            }
        })?;

        self.created += 1;
        Ok(image)
    }

    fn release_texture(&mut self, _texture: RgbaImage) {
        self.released += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_software_backend_rejects_short_data() {
        let mut backend = SoftwareBackend::new();
        let result = backend.create_texture(4, 4, &[0; 3]);
        assert!(matches!(
            result,
            Err(TextureCacheError::TextureAllocation { width: 4, height: 4, .. })
        ));
        assert_eq!(backend.live_textures(), 0);
    }

    #[test]
    fn test_software_backend_allocation_limit() {
        let mut backend = SoftwareBackend::with_allocation_limit(1);
        let first = backend.create_texture(1, 1, &[0]).unwrap();
        assert!(backend.create_texture(1, 1, &[0]).is_err());
        backend.release_texture(first);
        assert!(backend.create_texture(1, 1, &[0]).is_ok());
        assert_eq!(backend.created_textures(), 2);
    }
}
