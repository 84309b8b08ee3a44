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

//! VRAM write replacements and dumps
//!
//! Replacement packs supply higher-resolution images for raw VRAM uploads.
//! A write is identified by the hash of its payload and its size, so the
//! same upload is recognized wherever it lands in VRAM.
//!
//! # File Layout
//!
//! ```text
//! {replacement_dir}/{game_id}/vram-write-{HASH:016X}-{W}x{H}.png
//! {dump_dir}/{game_id}/vram-write-{HASH:016X}-{W}x{H}.png
//! ```
//!
//! This is independent of source caching: replacements never affect which
//! sources are valid.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use image::RgbaImage;

use super::backend::TextureBackend;
use super::hash::{hash_vram_write, HashType};
use super::vram::MASK_BIT;
use super::TextureCache;
use crate::core::error::{Result, TextureCacheError};

const FILE_PREFIX: &str = "vram-write-";
const FILE_EXTENSION: &str = "png";

/// Identity of a VRAM write payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReplacementKey {
    pub hash: HashType,
    pub width: u32,
    pub height: u32,
}

impl ReplacementKey {
    /// Key of a write payload of `width`×`height` pixels
    pub fn for_write(width: u32, height: u32, pixels: &[u16]) -> Self {
        Self {
            hash: hash_vram_write(pixels),
            width,
            height,
        }
    }

    /// File name used for replacements and dumps of this write
    ///
    /// # Examples
    ///
    /// ```
    /// use psrx_texcache::core::texture_cache::replacement::ReplacementKey;
    ///
    /// let key = ReplacementKey { hash: 0xABCD, width: 256, height: 240 };
    /// assert_eq!(key.file_name(), "vram-write-000000000000ABCD-256x240.png");
    /// assert_eq!(ReplacementKey::parse_file_name(&key.file_name()), Some(key));
    /// ```
    pub fn file_name(&self) -> String {
        format!(
            "{}{:016X}-{}x{}.{}",
            FILE_PREFIX, self.hash, self.width, self.height, FILE_EXTENSION
        )
    }

    /// Parse a replacement file name, ignoring anything that does not match
    pub fn parse_file_name(name: &str) -> Option<Self> {
        let stem = name
            .strip_prefix(FILE_PREFIX)?
            .strip_suffix(FILE_EXTENSION)?
            .strip_suffix('.')?;
        let (hash, size) = stem.split_once('-')?;
        if hash.len() != 16 {
            return None;
        }
        let (width, height) = size.split_once('x')?;
        Some(Self {
            hash: HashType::from_str_radix(hash, 16).ok()?,
            width: width.parse().ok()?,
            height: height.parse().ok()?,
        })
    }
}

/// Indexed and loaded replacement images for the current game
#[derive(Debug, Default)]
pub(crate) struct ReplacementStore {
    game_id: String,
    index: HashMap<ReplacementKey, PathBuf>,
    /// Loaded images; `None` remembers a failed load
    loaded: HashMap<ReplacementKey, Option<RgbaImage>>,
    dumped: HashSet<ReplacementKey>,
}

impl ReplacementStore {
    pub(crate) fn clear(&mut self) {
        self.index.clear();
        self.loaded.clear();
        self.dumped.clear();
    }

    fn load(&mut self, key: ReplacementKey) -> Option<&RgbaImage> {
        if !self.loaded.contains_key(&key) {
            let path = self.index.get(&key)?;
            let image = match image::open(path) {
                Ok(image) => {
                    log::debug!("Loaded VRAM write replacement {}", path.display());
                    Some(image.into_rgba8())
                }
                Err(e) => {
                    log::warn!(
                        "Failed to load VRAM write replacement '{}': {}",
                        path.display(),
                        e
                    );
                    None
                }
            };
            self.loaded.insert(key, image);
        }
        self.loaded.get(&key)?.as_ref()
    }
}

/// Convert a write payload to an image for dumping
///
/// With `force_alpha` every pixel is opaque; otherwise the mask bit becomes
/// the alpha channel.
pub fn vram_write_to_image(width: u32, height: u32, pixels: &[u16], force_alpha: bool) -> Option<RgbaImage> {
    let count = (width as usize) * (height as usize);
    if pixels.len() < count {
        return None;
    }

    let mut bytes = Vec::with_capacity(count * 4);
    for &pixel in &pixels[..count] {
        let r = ((pixel & 0x1F) << 3) as u8;
        let g = (((pixel >> 5) & 0x1F) << 3) as u8;
        let b = (((pixel >> 10) & 0x1F) << 3) as u8;
        let a = if force_alpha || pixel & MASK_BIT != 0 {
            0xFF
        } else {
            0x00
        };
        bytes.extend_from_slice(&[r, g, b, a]);
    }
    RgbaImage::from_raw(width, height, bytes)
}

fn scan_replacement_dir(dir: &Path) -> Result<HashMap<ReplacementKey, PathBuf>> {
    let mut index = HashMap::new();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("No replacement directory at {}", dir.display());
            return Ok(index);
        }
        Err(e) => return Err(TextureCacheError::io(dir, e)),
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(key) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(ReplacementKey::parse_file_name)
        else {
            continue;
        };
        index.insert(key, path);
    }
    Ok(index)
}

impl<B: TextureBackend> TextureCache<B> {
    /// Identifier of the running game
    pub fn game_id(&self) -> &str {
        &self.replacements.game_id
    }

    /// Switch to another game and reload its replacements
    pub fn set_game_id(&mut self, game_id: impl Into<String>) -> Result<()> {
        let game_id = game_id.into();
        if self.replacements.game_id == game_id {
            return Ok(());
        }
        log::info!("Texture cache: game ID set to '{}'", game_id);
        self.replacements.game_id = game_id;
        self.reload_texture_replacements()
    }

    /// Rescan the replacement directory of the current game
    ///
    /// A missing directory is not an error. With `preload_replacements` all
    /// images are decoded now instead of on first use.
    ///
    /// # Errors
    ///
    /// Returns [`TextureCacheError::Io`] when the directory exists but
    /// cannot be read.
    pub fn reload_texture_replacements(&mut self) -> Result<()> {
        self.replacements.clear();
        if !self.settings.enable_vram_write_replacements || self.replacements.game_id.is_empty() {
            return Ok(());
        }

        let dir = self.settings.replacement_dir.join(&self.replacements.game_id);
        self.replacements.index = scan_replacement_dir(&dir)?;
        log::info!(
            "Found {} VRAM write replacements in {}",
            self.replacements.index.len(),
            dir.display()
        );

        if self.settings.preload_replacements {
            let keys: Vec<ReplacementKey> = self.replacements.index.keys().copied().collect();
            for key in keys {
                self.replacements.load(key);
            }
        }
        Ok(())
    }

    /// Number of indexed replacement images
    pub fn num_vram_replacements(&self) -> usize {
        self.replacements.index.len()
    }

    /// Replacement image for a VRAM write payload, if the pack has one
    pub fn get_vram_replacement(
        &mut self,
        width: u32,
        height: u32,
        pixels: &[u16],
    ) -> Option<&RgbaImage> {
        if !self.settings.enable_vram_write_replacements || self.replacements.index.is_empty() {
            return None;
        }
        let key = ReplacementKey::for_write(width, height, pixels);
        self.replacements.load(key)
    }

    /// Whether a write of this size should be dumped
    pub fn should_dump_vram_write(&self, width: u32, height: u32) -> bool {
        self.settings.dump_vram_writes
            && !self.replacements.game_id.is_empty()
            && width >= self.settings.dump_vram_write_width_threshold
            && height >= self.settings.dump_vram_write_height_threshold
    }

    /// Write a VRAM write payload to the dump directory
    ///
    /// Each payload is dumped once; files already on disk are kept.
    ///
    /// # Returns
    ///
    /// `true` if a new file was written.
    pub fn dump_vram_write(&mut self, width: u32, height: u32, pixels: &[u16]) -> Result<bool> {
        let key = ReplacementKey::for_write(width, height, pixels);
        if !self.replacements.dumped.insert(key) {
            return Ok(false);
        }

        let dir = self.settings.dump_dir.join(&self.replacements.game_id);
        let path = dir.join(key.file_name());
        if path.exists() {
            log::trace!("Dump {} already exists", path.display());
            return Ok(false);
        }

        let Some(image) = vram_write_to_image(
            width,
            height,
            pixels,
            self.settings.dump_vram_write_force_alpha,
        ) else {
            log::warn!(
                "VRAM write of {}x{} has only {} pixels, not dumping",
                width,
                height,
                pixels.len()
            );
            return Ok(false);
        };

        fs::create_dir_all(&dir).map_err(|e| TextureCacheError::io(&dir, e))?;
        image.save(&path)?;
        log::info!("Dumped VRAM write to {}", path.display());
        Ok(true)
    }
}
