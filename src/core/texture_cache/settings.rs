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

//! Texture cache configuration
//!
//! Settings are plain data loaded from and saved to TOML. Missing keys take
//! their default values, so a partial file is valid.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::backend::TextureBackend;
use super::TextureCache;
use crate::core::error::{Result, TextureCacheError};

/// Prefix of the environment variables that override settings
pub const ENV_PREFIX: &str = "PSRX_TEXCACHE_";

/// Texture cache configuration that can be saved/loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureCacheSettings {
    /// Share renderer textures between sources with identical content
    pub enable_hash_cache: bool,

    /// Frames a source may go unused before `compact` destroys it
    pub max_source_age: u32,

    /// Upper bound on live textures after `compact`
    pub max_hash_cache_entries: u32,

    /// Look up replacement images for VRAM writes
    pub enable_vram_write_replacements: bool,

    /// Decode all replacement images when they are indexed
    pub preload_replacements: bool,

    /// Dump large VRAM writes as PNG files
    pub dump_vram_writes: bool,

    /// Minimum width of a dumped write
    pub dump_vram_write_width_threshold: u32,

    /// Minimum height of a dumped write
    pub dump_vram_write_height_threshold: u32,

    /// Write dumps fully opaque instead of using the mask bit as alpha
    pub dump_vram_write_force_alpha: bool,

    /// Root directory of replacement packs (one subdirectory per game)
    pub replacement_dir: PathBuf,

    /// Root directory of dumps (one subdirectory per game)
    pub dump_dir: PathBuf,
}

impl Default for TextureCacheSettings {
    fn default() -> Self {
        Self {
            enable_hash_cache: true,
            max_source_age: 600,
            max_hash_cache_entries: 500,
            enable_vram_write_replacements: false,
            preload_replacements: false,
            dump_vram_writes: false,
            dump_vram_write_width_threshold: 128,
            dump_vram_write_height_threshold: 128,
            dump_vram_write_force_alpha: true,
            replacement_dir: PathBuf::from("textures"),
            dump_dir: PathBuf::from("dump"),
        }
    }
}

impl TextureCacheSettings {
    /// Load configuration from TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|e| TextureCacheError::io(path, e))?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from a TOML document
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| TextureCacheError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)
            .map_err(|e| TextureCacheError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents).map_err(|e| TextureCacheError::io(path, e))
    }

    /// Apply overrides from a variable lookup
    ///
    /// Each field can be overridden by `PSRX_TEXCACHE_<FIELD>` in upper
    /// case, e.g. `PSRX_TEXCACHE_ENABLE_HASH_CACHE=false`.
    ///
    /// # Errors
    ///
    /// Returns [`TextureCacheError::Config`] when a variable is set to a
    /// value that does not parse.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        override_parsed(&var, "ENABLE_HASH_CACHE", &mut self.enable_hash_cache)?;
        override_parsed(&var, "MAX_SOURCE_AGE", &mut self.max_source_age)?;
        override_parsed(&var, "MAX_HASH_CACHE_ENTRIES", &mut self.max_hash_cache_entries)?;
        override_parsed(
            &var,
            "ENABLE_VRAM_WRITE_REPLACEMENTS",
            &mut self.enable_vram_write_replacements,
        )?;
        override_parsed(&var, "PRELOAD_REPLACEMENTS", &mut self.preload_replacements)?;
        override_parsed(&var, "DUMP_VRAM_WRITES", &mut self.dump_vram_writes)?;
        override_parsed(
            &var,
            "DUMP_VRAM_WRITE_WIDTH_THRESHOLD",
            &mut self.dump_vram_write_width_threshold,
        )?;
        override_parsed(
            &var,
            "DUMP_VRAM_WRITE_HEIGHT_THRESHOLD",
            &mut self.dump_vram_write_height_threshold,
        )?;
        override_parsed(
            &var,
            "DUMP_VRAM_WRITE_FORCE_ALPHA",
            &mut self.dump_vram_write_force_alpha,
        )?;
        if let Some(dir) = var("REPLACEMENT_DIR") {
            self.replacement_dir = PathBuf::from(dir);
        }
        if let Some(dir) = var("DUMP_DIR") {
            self.dump_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Whether switching from `self` to `other` changes replacement lookup
    /// or dumping
    pub(crate) fn replacements_differ(&self, other: &Self) -> bool {
        self.enable_vram_write_replacements != other.enable_vram_write_replacements
            || self.preload_replacements != other.preload_replacements
            || self.dump_vram_writes != other.dump_vram_writes
            || self.replacement_dir != other.replacement_dir
            || self.dump_dir != other.dump_dir
    }
}

fn override_parsed<T, V>(var: &V, name: &str, field: &mut T) -> Result<()>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    V: Fn(&str) -> Option<String>,
{
    if let Some(value) = var(name) {
        *field = value.trim().parse().map_err(|e| {
            TextureCacheError::Config(format!("{}{}={:?}: {}", ENV_PREFIX, name, value, e))
        })?;
        log::info!("Texture cache setting {} overridden from environment", name);
    }
    Ok(())
}

impl<B: TextureBackend> TextureCache<B> {
    /// Current settings
    pub fn settings(&self) -> &TextureCacheSettings {
        &self.settings
    }

    /// Switch to new settings, rebuilding whatever depends on them
    ///
    /// Toggling the hash cache flushes every source, since textures change
    /// owner. Tighter limits are applied with a compaction pass. Changes to
    /// replacement or dump options reload the replacement index.
    ///
    /// # Errors
    ///
    /// Propagates failures to rescan the replacement directory.
    pub fn update_settings(&mut self, settings: TextureCacheSettings) -> Result<()> {
        let old = std::mem::replace(&mut self.settings, settings);
        if old == self.settings {
            return Ok(());
        }

        if old.enable_hash_cache != self.settings.enable_hash_cache {
            log::info!(
                "Texture cache: hash cache {}",
                if self.settings.enable_hash_cache {
                    "enabled"
                } else {
                    "disabled"
                }
            );
            self.invalidate();
        }

        if old.max_source_age != self.settings.max_source_age
            || old.max_hash_cache_entries != self.settings.max_hash_cache_entries
        {
            self.compact();
        }

        if old.replacements_differ(&self.settings) {
            self.reload_texture_replacements()?;
        }

        Ok(())
    }
}
