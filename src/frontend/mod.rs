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

//! Frontend module
//!
//! GPU-facing pieces that sit on top of the core texture cache. Only built
//! with the `wgpu-backend` feature.
//!
//! # Example
//!
//! ```no_run
//! use psrx_texcache::frontend::renderer::{GpuContext, WgpuTextureBackend};
//! use psrx_texcache::{TextureCache, TextureCacheSettings};
//!
//! let context = GpuContext::new_headless().unwrap();
//! let backend = WgpuTextureBackend::new(context);
//! let cache = TextureCache::new(backend, TextureCacheSettings::default());
//! ```

pub mod renderer;

pub use renderer::{GpuContext, WgpuTextureBackend};
