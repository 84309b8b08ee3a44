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

//! wgpu texture backend
//!
//! Uploads decoded sources into RGBA8 textures. The cache packs texels as
//! `0xAABBGGRR`, which in little-endian memory is already R, G, B, A byte
//! order, so the texel slice is uploaded without conversion.

use crate::core::error::{Result, TextureCacheError};
use crate::core::texture_cache::TextureBackend;

use super::context::GpuContext;

/// Texture owned by a source or a hash cache entry
pub struct WgpuTexture {
    /// wgpu texture handle
    pub texture: wgpu::Texture,
    /// Texture view for binding to shaders
    pub view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl WgpuTexture {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl std::fmt::Debug for WgpuTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuTexture")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// [`TextureBackend`] creating wgpu textures
///
/// # Examples
///
/// ```no_run
/// use psrx_texcache::core::texture_cache::TextureBackend;
/// use psrx_texcache::frontend::renderer::{GpuContext, WgpuTextureBackend};
///
/// let mut backend = WgpuTextureBackend::new(GpuContext::new_headless().unwrap());
/// let texture = backend.create_texture(1, 1, &[0xFF00_00F8]).unwrap();
/// assert_eq!(backend.live_textures(), 1);
/// backend.release_texture(texture);
/// ```
pub struct WgpuTextureBackend {
    context: GpuContext,
    live: usize,
}

impl WgpuTextureBackend {
    pub fn new(context: GpuContext) -> Self {
        Self { context, live: 0 }
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    /// Number of textures created and not yet released
    pub fn live_textures(&self) -> usize {
        self.live
    }
}

impl TextureBackend for WgpuTextureBackend {
    type Texture = WgpuTexture;

    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u32]) -> Result<WgpuTexture> {
        check_upload(
            width,
            height,
            rgba.len(),
            self.context.max_texture_dimension(),
        )?;

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let texture = self.context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Texture Cache Source"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        // wgpu 27 API: write_texture(ImageCopyTexture, &[u8], TexelCopyBufferLayout, Extent3d)
        self.context.queue.write_texture(
            texture.as_image_copy(),
            texels_as_bytes(&rgba[..(width * height) as usize]),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.live += 1;
        log::trace!("Created {}x{} wgpu texture ({} live)", width, height, self.live);

        Ok(WgpuTexture {
            texture,
            view,
            width,
            height,
        })
    }

    fn release_texture(&mut self, texture: WgpuTexture) {
        texture.texture.destroy();
        self.live = self.live.saturating_sub(1);
    }
}

/// Validate an upload before any GPU resource is created
///
/// # Errors
///
/// Returns [`TextureCacheError::TextureAllocation`] for empty or oversized
/// textures and for texel data that does not fill the texture.
pub fn check_upload(width: u32, height: u32, texels: usize, max_dimension: u32) -> Result<()> {
    let reason = if width == 0 || height == 0 {
        Some("empty texture".to_string())
    } else if width > max_dimension || height > max_dimension {
        Some(format!("exceeds device limit of {}", max_dimension))
    } else if texels < (width as usize) * (height as usize) {
        Some(format!("{} texels do not fill {}x{}", texels, width, height))
    } else {
        None
    };

    match reason {
        Some(reason) => Err(TextureCacheError::TextureAllocation {
            width,
            height,
            reason,
        }),
        None => Ok(()),
    }
}

/// View packed texels as the byte stream uploaded to an RGBA8 texture
pub fn texels_as_bytes(texels: &[u32]) -> &[u8] {
    bytemuck::cast_slice(texels)
}
