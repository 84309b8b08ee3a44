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

//! Hardware renderer texture cache
//!
//! This module memoizes textures decoded from the PlayStation VRAM for a
//! hardware renderer. Decoding a 256×256 texture page (and expanding its
//! palette) is expensive, so decoded pages are kept as [`Source`]s and
//! reused until the VRAM they were decoded from changes.
//!
//! # Components
//!
//! - [`pages`]: per-page source lists, draw and write tracking
//! - [`source`]: the cached decode and its list memberships
//! - [`hash_cache`]: sharing of one renderer texture between sources with
//!   identical content
//! - [`replacement`]: VRAM write replacement lookup and dumping
//!
//! # Lookup
//!
//! [`TextureCache::lookup_source`] first folds pending writes into the
//! sources. A cached source touched by a write is rehashed: if the texture
//! and the referenced palette entries still hash to the same values the
//! source is reused, otherwise it is destroyed and the page is decoded
//! again. New decodes are hashed and shared through the hash cache before
//! anything is uploaded.
//!
//! # Example
//!
//! ```
//! use psrx_texcache::core::texture_cache::{
//!     PaletteRecordFlags, PaletteReg, Rect, SoftwareBackend, SourceKey, TextureCache, TextureMode,
//! };
//!
//! let mut cache = TextureCache::new(SoftwareBackend::new(), Default::default());
//! cache.write_vram(0, 480, 2, 1, &[0x001F, 0x03E0], false, false, Rect::new(0, 480, 2, 481));
//!
//! let key = SourceKey::new(3, PaletteReg::from_position(0, 480), TextureMode::Palette4Bit);
//! let uv = Rect::new(0, 0, 64, 64);
//! let first = cache.lookup_source(key, &uv, PaletteRecordFlags::empty()).unwrap().texture_hash();
//! let again = cache.lookup_source(key, &uv, PaletteRecordFlags::empty()).unwrap().texture_hash();
//! assert_eq!(first, again);
//! assert_eq!(cache.stats().decodes, 1);
//! ```

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

pub mod backend;
pub mod decode;
pub mod hash;
pub mod hash_cache;
pub mod key;
pub mod list;
pub mod pages;
pub mod rect;
pub mod replacement;
pub mod settings;
pub mod source;
pub mod vram;

#[cfg(test)]
mod tests;

pub use backend::{SoftwareBackend, TextureBackend};
pub use hash::HashType;
pub use hash_cache::{HashCacheEntry, HashCacheId, HashCacheKey};
pub use key::{PaletteRecordFlags, PaletteReg, SourceKey, TextureMode};
pub use rect::Rect;
pub use settings::TextureCacheSettings;
pub use source::{Source, SourceId, MAX_PAGE_REFS_PER_SOURCE};
pub use vram::Vram;

use self::decode::{decode_texture, palette_index_range};
use self::hash::{hash_partial_palette, hash_rect};
use self::hash_cache::HashCache;
use self::list::NodeRef;
use self::pages::PageEntry;
use self::replacement::ReplacementStore;
use self::source::SourceTexture;
use self::vram::{NUM_VRAM_PAGES, TEXTURE_PAGE_SIZE};
use crate::core::error::{Result, TextureCacheError};
use crate::core::state::StateWrapper;

/// Version of the texture cache save state section
pub const STATE_VERSION: u32 = 2;

const DECODE_BUFFER_SIZE: usize = (TEXTURE_PAGE_SIZE * TEXTURE_PAGE_SIZE) as usize;

/// Counters describing cache behaviour since creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextureCacheStats {
    /// Calls to `lookup_source`
    pub lookups: u64,
    /// Lookups answered by an existing source
    pub hits: u64,
    /// Texture pages decoded from VRAM
    pub decodes: u64,
    /// Textures created on the backend
    pub uploads: u64,
    /// Decodes that reused a hash cache texture
    pub hash_cache_hits: u64,
    /// Suspect sources that rehashed to the same content
    pub revalidations: u64,
    /// Suspect sources whose content changed
    pub invalidations: u64,
}

/// Serialized form of the cache
///
/// Sources and textures are rebuilt on demand from the shadow VRAM. The
/// drawn regions are kept too, since their content is in the renderer's
/// VRAM and not in the shadow copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TextureCacheState {
    version: u32,
    vram: Vec<u16>,
    draw_rects: Vec<Vec<Rect>>,
}

/// Texture cache for a hardware renderer
///
/// Owns the shadow VRAM, the cached sources, the hash cache and the
/// renderer backend used to create textures.
pub struct TextureCache<B: TextureBackend> {
    /// Renderer texture allocator
    pub(crate) backend: B,

    /// Shadow copy of VRAM that textures are decoded from
    pub(crate) vram: Vram,

    pub(crate) settings: TextureCacheSettings,

    /// All live sources
    pub(crate) sources: SlotMap<SourceId, Source<B::Texture>>,

    /// Shared textures keyed by content
    pub(crate) hash_cache: HashCache<B::Texture>,

    /// Per-page tracking state, indexed by page number
    pub(crate) pages: Vec<PageEntry>,

    pub(crate) replacements: ReplacementStore,

    /// Frame counter advanced by `compact`
    pub(crate) frame: u64,

    pub(crate) stats: TextureCacheStats,

    /// Textures owned directly by sources (hash cache disabled)
    owned_textures: usize,

    /// Scratch space for one decoded page
    decode_buffer: Vec<u32>,
}

impl<B: TextureBackend> TextureCache<B> {
    /// Create an empty cache over blank VRAM
    pub fn new(backend: B, settings: TextureCacheSettings) -> Self {
        Self {
            backend,
            vram: Vram::new(),
            settings,
            sources: SlotMap::with_key(),
            hash_cache: HashCache::new(),
            pages: PageEntry::all(),
            replacements: ReplacementStore::default(),
            frame: 0,
            stats: TextureCacheStats::default(),
            owned_textures: 0,
            decode_buffer: vec![0; DECODE_BUFFER_SIZE],
        }
    }

    /// Reset tracking state and load replacements for the current settings
    ///
    /// # Errors
    ///
    /// Propagates failures to read the replacement directory.
    pub fn initialize(&mut self) -> Result<()> {
        self.invalidate();
        self.frame = 0;
        self.reload_texture_replacements()?;
        log::info!(
            "Texture cache initialized (hash cache {}, max {} entries)",
            if self.settings.enable_hash_cache {
                "on"
            } else {
                "off"
            },
            self.settings.max_hash_cache_entries
        );
        Ok(())
    }

    /// Release every texture and drop replacement state
    pub fn shutdown(&mut self) {
        self.invalidate();
        self.replacements.clear();
        log::info!("Texture cache shut down");
    }

    #[inline]
    pub fn vram(&self) -> &Vram {
        &self.vram
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[inline]
    pub fn stats(&self) -> TextureCacheStats {
        self.stats
    }

    /// Current frame number as counted by `compact`
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    #[inline]
    pub fn num_sources(&self) -> usize {
        self.sources.len()
    }

    pub fn source(&self, id: SourceId) -> Option<&Source<B::Texture>> {
        self.sources.get(id)
    }

    /// Handle of the live source for `key`, if any
    pub fn source_id(&self, key: SourceKey) -> Option<SourceId> {
        self.find_source(key)
    }

    /// Renderer texture a source samples from
    pub fn texture<'a>(&'a self, source: &'a Source<B::Texture>) -> Option<&'a B::Texture> {
        match &source.texture {
            SourceTexture::Owned(texture) => Some(texture),
            SourceTexture::Shared(id) => self.hash_cache.get(*id).map(|entry| &entry.texture),
        }
    }

    /// Sources linked into page `pn`, most recently used texture pages first
    pub fn page_source_ids(&self, pn: u32) -> Vec<SourceId> {
        self.pages[pn as usize].sources.owners(&self.sources)
    }

    fn find_source(&self, key: SourceKey) -> Option<SourceId> {
        self.pages[key.page as usize]
            .sources
            .iter(&self.sources)
            .map(|at| at.owner)
            .find(|&id| self.sources[id].key == key)
    }

    /// Number of textures currently allocated on the backend
    pub fn num_live_textures(&self) -> usize {
        self.hash_cache.len() + self.owned_textures
    }

    /// Find or decode the texture for `key`
    ///
    /// # Arguments
    ///
    /// * `key` - Page, colour mode and palette to sample
    /// * `uv_rect` - Texel region the draw samples, in page texel coordinates
    /// * `flags` - How the draw uses the texture
    ///
    /// # Returns
    ///
    /// The valid source for `key`, decoded from the current VRAM contents if
    /// no cached source matches them.
    ///
    /// # Errors
    ///
    /// Returns [`TextureCacheError::TextureAllocation`] when the backend
    /// cannot create a texture. Nothing is retried.
    pub fn lookup_source(
        &mut self,
        key: SourceKey,
        uv_rect: &Rect,
        flags: PaletteRecordFlags,
    ) -> Result<&Source<B::Texture>> {
        self.update_vram_tracking_state();
        self.stats.lookups += 1;

        let vram_uv_rect = key.uv_rect_to_vram(uv_rect);
        let id = match self.find_source(key) {
            Some(id) if self.revalidate_source(id, &vram_uv_rect) => {
                self.stats.hits += 1;
                id
            }
            Some(id) => {
                self.destroy_source(id);
                self.create_source(key, &vram_uv_rect)?
            }
            None => self.create_source(key, &vram_uv_rect)?,
        };

        let frame = self.frame;
        let hash_cache_id = {
            let src = &mut self.sources[id];
            src.palette_record_flags |= flags;
            src.last_used_frame = frame;
            src.from_hash_cache()
        };
        // The key's own page is always the first page reference
        self.pages[key.page as usize]
            .sources
            .move_to_front(&mut self.sources, NodeRef::new(id, 0));
        if let Some(entry) = hash_cache_id {
            self.touch_hash_cache_entry(entry);
        }

        Ok(&self.sources[id])
    }

    /// Check a cached source against VRAM, growing its sampled region
    ///
    /// Returns `false` when the content changed and the source must be
    /// replaced.
    fn revalidate_source(&mut self, id: SourceId, vram_uv_rect: &Rect) -> bool {
        let src = &mut self.sources[id];
        src.extend_active_rect(vram_uv_rect);
        if !src.suspect {
            return true;
        }

        let key = src.key;
        let texture_hash = hash_rect(&self.vram, &src.texture_rect);
        let valid = texture_hash == src.texture_hash
            && match src.palette_range {
                Some((min, max)) => {
                    hash_partial_palette(&self.vram, key.palette, key.mode, min, max)
                        == src.palette_hash
                }
                None => true,
            };

        if valid {
            src.mark_validated();
            self.stats.revalidations += 1;
            log::trace!("Texture cache: {} unchanged after write", key);
        } else {
            self.stats.invalidations += 1;
            log::debug!("Texture cache: {} changed, redecoding", key);
        }
        valid
    }

    /// Decode `key` from VRAM and insert the new source
    fn create_source(&mut self, key: SourceKey, vram_uv_rect: &Rect) -> Result<SourceId> {
        const SIZE: u32 = TEXTURE_PAGE_SIZE;

        let mut rgba = std::mem::take(&mut self.decode_buffer);
        rgba.resize(DECODE_BUFFER_SIZE, 0);
        decode_texture(
            key.mode,
            &self.vram,
            key.page as u32,
            key.palette,
            &mut rgba,
            SIZE as usize,
            SIZE,
            SIZE,
        );
        self.stats.decodes += 1;

        let texture_hash = hash_rect(&self.vram, &key.texture_rect());
        let palette_range = palette_index_range(key.mode, &self.vram, key.page as u32, SIZE, SIZE);
        let palette_hash = match palette_range {
            Some((min, max)) => hash_partial_palette(&self.vram, key.palette, key.mode, min, max),
            None => 0,
        };

        let texture = if self.settings.enable_hash_cache {
            let hash_key = HashCacheKey {
                texture_hash,
                palette_hash,
                mode: key.mode,
            };
            self.acquire_hash_cache_entry(hash_key, SIZE, SIZE, &rgba)
                .map(SourceTexture::Shared)
        } else {
            self.backend
                .create_texture(SIZE, SIZE, &rgba)
                .map(SourceTexture::Owned)
        };
        self.decode_buffer = rgba;
        let texture = texture.inspect_err(|e| {
            log::warn!("Texture cache: failed to create texture for {}: {}", key, e);
        })?;
        if matches!(texture, SourceTexture::Owned(_)) {
            self.stats.uploads += 1;
            self.owned_textures += 1;
        }

        let mut source = Source::new(
            key,
            texture,
            texture_hash,
            palette_hash,
            palette_range,
            self.frame,
        );
        source.extend_active_rect(vram_uv_rect);
        let hash_cache_id = source.from_hash_cache();

        let id = self.sources.insert(source);
        self.link_source_pages(id);
        if let Some(entry) = hash_cache_id {
            self.link_hash_cache_source(entry, id);
        }

        log::trace!(
            "Texture cache: decoded {} (hash {:016X}, {} sources)",
            key,
            texture_hash,
            self.sources.len()
        );
        Ok(id)
    }

    /// Remove a source from every list and release its texture reference
    ///
    /// Unknown handles are ignored.
    pub fn destroy_source(&mut self, id: SourceId) {
        if !self.sources.contains_key(id) {
            return;
        }

        self.unlink_source_pages(id);
        if let Some(entry) = self.sources[id].from_hash_cache() {
            self.unlink_hash_cache_source(entry, id);
        }

        if let Some(source) = self.sources.remove(id) {
            log::trace!("Texture cache: destroyed {}", source.key);
            if let SourceTexture::Owned(texture) = source.texture {
                self.backend.release_texture(texture);
                self.owned_textures -= 1;
            }
        }
    }

    /// Destroy every source and clear all page tracking
    pub fn invalidate(&mut self) {
        let ids: Vec<SourceId> = self.sources.keys().collect();
        if !ids.is_empty() {
            log::debug!("Texture cache: invalidating {} sources", ids.len());
        }
        for id in ids {
            self.destroy_source(id);
        }
        debug_assert_eq!(self.hash_cache.len(), 0, "hash cache entries outlived sources");

        for page in &mut self.pages {
            page.reset_tracking();
        }
    }

    /// Advance the frame and reclaim stale or excess sources
    ///
    /// Sources unused for more than `max_source_age` frames are destroyed.
    /// Then, while more textures are alive than `max_hash_cache_entries`,
    /// the least recently used sources are destroyed.
    pub fn compact(&mut self) {
        self.frame += 1;

        let frame = self.frame;
        let max_age = self.settings.max_source_age as u64;
        let stale: Vec<SourceId> = self
            .sources
            .iter()
            .filter(|(_, src)| frame - src.last_used_frame > max_age)
            .map(|(id, _)| id)
            .collect();
        if !stale.is_empty() {
            log::debug!("Texture cache: removing {} stale sources", stale.len());
        }
        for id in stale {
            self.destroy_source(id);
        }

        let max_entries = self.settings.max_hash_cache_entries as usize;
        if self.num_live_textures() <= max_entries {
            return;
        }

        let mut by_age: Vec<(u64, SourceId)> = self
            .sources
            .iter()
            .map(|(id, src)| (src.last_used_frame, id))
            .collect();
        by_age.sort_unstable_by_key(|&(last_used, _)| last_used);

        let mut evicted = 0;
        for (_, id) in by_age {
            if self.num_live_textures() <= max_entries {
                break;
            }
            self.destroy_source(id);
            evicted += 1;
        }
        log::debug!(
            "Texture cache: evicted {} sources, {} textures live",
            evicted,
            self.num_live_textures()
        );
    }

    /// Write pixels to VRAM and record the write
    ///
    /// # Arguments
    ///
    /// * `x`, `y` - Destination top-left corner (wraps at the VRAM edges)
    /// * `width`, `height` - Size of the write
    /// * `data` - Pixels, `width` per row
    /// * `set_mask` - Set bit 15 on every written pixel
    /// * `check_mask` - Leave pixels with bit 15 set untouched
    /// * `bounds` - VRAM region covered by the write, see
    ///   [`Rect::vram_transfer_bounds`]
    #[allow(clippy::too_many_arguments)]
    pub fn write_vram(
        &mut self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        data: &[u16],
        set_mask: bool,
        check_mask: bool,
        bounds: Rect,
    ) {
        log::debug!(
            "VRAM write: {}x{} at ({}, {}) mask set={} check={}",
            width,
            height,
            x,
            y,
            set_mask,
            check_mask
        );

        if self.should_dump_vram_write(width, height) {
            if let Err(e) = self.dump_vram_write(width, height, data) {
                log::warn!("Failed to dump VRAM write: {}", e);
            }
        }

        self.vram
            .write_rect(x, y, width, height, data, set_mask, check_mask);
        self.add_written_rectangle(bounds, false);
    }

    /// Copy a VRAM rectangle and record the write to the destination
    ///
    /// The source is read in full before anything is written, so
    /// overlapping rectangles copy correctly.
    #[allow(clippy::too_many_arguments)]
    pub fn copy_vram(
        &mut self,
        src_x: u32,
        src_y: u32,
        dst_x: u32,
        dst_y: u32,
        width: u32,
        height: u32,
        set_mask: bool,
        check_mask: bool,
        src_bounds: Rect,
        dst_bounds: Rect,
    ) {
        log::debug!(
            "VRAM copy: {}x{} from ({}, {}) [{}] to ({}, {}) [{}]",
            width,
            height,
            src_x,
            src_y,
            src_bounds,
            dst_x,
            dst_y,
            dst_bounds
        );

        self.vram.copy_rect(
            src_x, src_y, dst_x, dst_y, width, height, set_mask, check_mask,
        );
        self.add_written_rectangle(dst_bounds, false);
    }

    /// Save or restore the cache state
    ///
    /// Writing stores the shadow VRAM and the drawn regions of every page.
    /// Reading restores both and flushes all sources, which are rebuilt from
    /// the restored VRAM on the next lookups. With `skip` the section is
    /// consumed and the cache starts cold over its current VRAM.
    ///
    /// # Errors
    ///
    /// Returns [`TextureCacheError::InvalidState`] for a state of another
    /// version, VRAM size or page count, and
    /// [`TextureCacheError::StateSerialization`] for a malformed section.
    /// The cache is left untouched on error.
    pub fn do_state(&mut self, sw: &mut StateWrapper, skip: bool) -> Result<()> {
        if sw.is_writing() {
            let state = TextureCacheState {
                version: STATE_VERSION,
                vram: self.vram.pixels().to_vec(),
                draw_rects: self
                    .pages
                    .iter()
                    .map(|page| page.draw_rects.clone())
                    .collect(),
            };
            return sw.write_section(&state);
        }

        if skip {
            sw.skip_section()?;
            log::debug!("Texture cache: skipped save state, starting cold");
            self.invalidate();
            return Ok(());
        }

        let state: TextureCacheState = sw.read_section()?;
        if state.version != STATE_VERSION {
            return Err(TextureCacheError::InvalidState(format!(
                "texture cache state version {} (expected {})",
                state.version, STATE_VERSION
            )));
        }
        if state.draw_rects.len() != NUM_VRAM_PAGES {
            return Err(TextureCacheError::InvalidState(format!(
                "texture cache state has {} pages (expected {})",
                state.draw_rects.len(),
                NUM_VRAM_PAGES
            )));
        }

        let vram = Vram::from_pixels(state.vram).ok_or_else(|| {
            TextureCacheError::InvalidState("texture cache state has a truncated VRAM".to_string())
        })?;

        self.invalidate();
        self.vram = vram;
        for (page, rects) in self.pages.iter_mut().zip(state.draw_rects) {
            for rect in rects {
                page.add_draw_rect(rect);
            }
        }
        log::debug!("Texture cache: state loaded");
        Ok(())
    }
}

impl<B: TextureBackend> Drop for TextureCache<B> {
    fn drop(&mut self) {
        self.invalidate();
    }
}
