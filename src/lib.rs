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

//! psrx-texcache: PlayStation (PSX) hardware renderer texture cache
//!
//! This crate caches textures decoded from the emulated PSX VRAM so that a
//! hardware renderer only decodes and uploads a texture page again when the
//! VRAM it came from actually changed.
//!
//! # Architecture
//!
//! - [`core`]: VRAM geometry, decoding, hashing, page tracking and the cache
//! - [`frontend`]: wgpu texture backend (feature `wgpu-backend`)
//!
//! # Example
//!
//! ```
//! use psrx_texcache::core::texture_cache::{
//!     PaletteRecordFlags, PaletteReg, Rect, SoftwareBackend, SourceKey, TextureCache, TextureMode,
//! };
//!
//! let mut cache = TextureCache::new(SoftwareBackend::new(), Default::default());
//! let key = SourceKey::new(0, PaletteReg(0), TextureMode::Direct16Bit);
//! let source = cache.lookup_source(key, &Rect::new(0, 0, 256, 256), PaletteRecordFlags::empty())?;
//! assert_eq!(source.pages(), &[0, 1, 2, 3]);
//! # Ok::<(), psrx_texcache::TextureCacheError>(())
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`core::error::Result<T>`] which is an alias for
//! `Result<T, TextureCacheError>`.

pub mod core;
#[cfg(feature = "wgpu-backend")]
pub mod frontend;

// Re-export commonly used types
pub use core::error::{Result, TextureCacheError};
pub use core::texture_cache::{TextureCache, TextureCacheSettings};
