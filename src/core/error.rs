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

//! Error types for the texture cache

use std::path::PathBuf;

use thiserror::Error;

/// Texture cache error type
#[derive(Error, Debug)]
pub enum TextureCacheError {
    /// The renderer could not allocate a texture
    #[error("Failed to allocate {width}x{height} texture: {reason}")]
    TextureAllocation {
        width: u32,
        height: u32,
        reason: String,
    },

    /// File system error on a replacement, dump or config path
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Image decoding or encoding failed
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Save state could not be encoded or decoded
    #[error("State serialization error: {0}")]
    StateSerialization(String),

    /// Save state is structurally valid but not usable
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration could not be parsed or written
    #[error("Configuration error: {0}")]
    Config(String),

    /// VRAM dump has the wrong size
    #[error("Invalid VRAM dump size: expected {expected} bytes, got {actual} bytes")]
    InvalidVramDump { expected: usize, actual: usize },
}

impl TextureCacheError {
    /// Wrap an I/O error together with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for texture cache operations
pub type Result<T> = std::result::Result<T, TextureCacheError>;
