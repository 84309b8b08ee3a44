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

//! Renderer subsystem
//!
//! wgpu implementation of the texture cache backend.
//!
//! - [`GpuContext`]: headless device and queue
//! - [`WgpuTextureBackend`]: uploads decoded sources as RGBA8 textures

pub mod context;
pub mod texture_backend;

pub use context::GpuContext;
pub use texture_backend::{check_upload, texels_as_bytes, WgpuTexture, WgpuTextureBackend};

#[cfg(test)]
mod tests;
