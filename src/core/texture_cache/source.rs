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

//! Cached decoded textures
//!
//! A [`Source`] is one decoded texture page. It remembers where its data came
//! from (texture and palette rectangles), what that data hashed to, which
//! part of it draws have actually sampled, and it carries the list nodes that
//! link it into the page lists and its hash cache entry's list.

use slotmap::SlotMap;

use super::hash::HashType;
use super::hash_cache::HashCacheId;
use super::key::{PaletteRecordFlags, SourceKey};
use super::list::{ListNode, NodeRef, NodeStore, TList};
use super::rect::Rect;

slotmap::new_key_type! {
    /// Arena handle of a [`Source`]
    pub struct SourceId;
}

/// Page list memberships a source can hold
///
/// 16-bit direct pages span 4 pages; 4-bit pages use 1 texture page and 1
/// palette page; 8-bit pages use 2 texture pages and up to 5 palette pages
/// (a 256-entry palette starting on a 16-pixel boundary that is not 64-pixel
/// aligned touches five 64-pixel pages).
pub const MAX_PAGE_REFS_PER_SOURCE: usize = 7;

/// Node slot used for the hash cache membership
pub const HASH_CACHE_SLOT: u8 = MAX_PAGE_REFS_PER_SOURCE as u8;

/// Identity of a list that sources are linked into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceList {
    /// Sources touching a VRAM page
    Page(u8),
    /// Sources sharing one hash cache entry
    HashCache(HashCacheId),
}

pub type SourceNode = ListNode<SourceId, SourceList>;
pub type SourceListHead = TList<SourceId, SourceList>;

/// Where a source's renderer texture lives
#[derive(Debug)]
pub enum SourceTexture<T> {
    /// The source owns the texture (hash cache disabled)
    Owned(T),
    /// The texture belongs to a hash cache entry shared with other sources
    Shared(HashCacheId),
}

/// A cached, decoded texture page
#[derive(Debug)]
pub struct Source<T> {
    pub(crate) key: SourceKey,
    pub(crate) texture: SourceTexture<T>,
    pub(crate) texture_rect: Rect,
    pub(crate) palette_rect: Rect,
    /// Part of `texture_rect` sampled by draws so far (VRAM coordinates)
    pub(crate) active_uv_rect: Rect,
    pub(crate) texture_hash: HashType,
    pub(crate) palette_hash: HashType,
    /// Palette indices referenced by the texture, inclusive
    pub(crate) palette_range: Option<(u32, u32)>,
    pub(crate) palette_record_flags: PaletteRecordFlags,

    pub(crate) num_page_refs: usize,
    pub(crate) page_numbers: [u8; MAX_PAGE_REFS_PER_SOURCE],
    pub(crate) page_refs: [SourceNode; MAX_PAGE_REFS_PER_SOURCE],
    pub(crate) hash_cache_ref: SourceNode,

    /// Active data may have changed; hashes must be checked before reuse
    pub(crate) suspect: bool,
    /// Writes into the inactive part of the texture since the last check
    pub(crate) dirty_rect: Rect,
    pub(crate) last_used_frame: u64,
}

impl<T> Source<T> {
    pub(crate) fn new(
        key: SourceKey,
        texture: SourceTexture<T>,
        texture_hash: HashType,
        palette_hash: HashType,
        palette_range: Option<(u32, u32)>,
        frame: u64,
    ) -> Self {
        Self {
            key,
            texture,
            texture_rect: key.texture_rect(),
            palette_rect: key.palette_rect(),
            active_uv_rect: Rect::EMPTY,
            texture_hash,
            palette_hash,
            palette_range,
            palette_record_flags: PaletteRecordFlags::empty(),
            num_page_refs: 0,
            page_numbers: [0; MAX_PAGE_REFS_PER_SOURCE],
            page_refs: Default::default(),
            hash_cache_ref: SourceNode::default(),
            suspect: false,
            dirty_rect: Rect::EMPTY,
            last_used_frame: frame,
        }
    }

    pub fn key(&self) -> SourceKey {
        self.key
    }

    pub fn texture_rect(&self) -> Rect {
        self.texture_rect
    }

    pub fn palette_rect(&self) -> Rect {
        self.palette_rect
    }

    pub fn active_uv_rect(&self) -> Rect {
        self.active_uv_rect
    }

    pub fn texture_hash(&self) -> HashType {
        self.texture_hash
    }

    pub fn palette_hash(&self) -> HashType {
        self.palette_hash
    }

    pub fn palette_range(&self) -> Option<(u32, u32)> {
        self.palette_range
    }

    pub fn palette_record_flags(&self) -> PaletteRecordFlags {
        self.palette_record_flags
    }

    pub fn last_used_frame(&self) -> u64 {
        self.last_used_frame
    }

    /// Pages this source is linked into
    pub fn pages(&self) -> &[u8] {
        &self.page_numbers[..self.num_page_refs]
    }

    /// Hash cache entry providing the texture, if shared
    pub fn from_hash_cache(&self) -> Option<HashCacheId> {
        match self.texture {
            SourceTexture::Shared(id) => Some(id),
            SourceTexture::Owned(_) => None,
        }
    }

    /// Whether this source owns its texture outright
    pub fn owns_texture(&self) -> bool {
        matches!(self.texture, SourceTexture::Owned(_))
    }

    /// Whether the source must be revalidated before its next use
    pub fn is_suspect(&self) -> bool {
        self.suspect
    }

    /// Record that the next free page slot references `page`
    ///
    /// Returns the node slot, or `None` when the page is already referenced.
    pub(crate) fn claim_page_slot(&mut self, page: u8) -> Option<u8> {
        if self.pages().contains(&page) {
            return None;
        }
        assert!(
            self.num_page_refs < MAX_PAGE_REFS_PER_SOURCE,
            "source {} exceeds {} page references",
            self.key,
            MAX_PAGE_REFS_PER_SOURCE
        );
        let slot = self.num_page_refs;
        self.page_numbers[slot] = page;
        self.num_page_refs += 1;
        Some(slot as u8)
    }

    /// Take note of a VRAM write overlapping this source
    ///
    /// Writes touching the sampled region or the palette make the source
    /// suspect immediately. Writes that only touch texels no draw has
    /// sampled yet are remembered and only matter if the active region grows
    /// into them.
    pub(crate) fn note_write(&mut self, rect: &Rect) {
        if self.active_uv_rect.intersects(rect) || self.palette_rect.intersects(rect) {
            self.suspect = true;
        } else if self.texture_rect.intersects(rect) {
            self.dirty_rect = self.dirty_rect.union(&rect.intersection(&self.texture_rect));
        }
    }

    /// Extend the sampled region, flagging the source if it grows into
    /// previously written texels
    pub(crate) fn extend_active_rect(&mut self, vram_rect: &Rect) {
        if self.dirty_rect.intersects(vram_rect) {
            self.suspect = true;
        }
        self.active_uv_rect = self.active_uv_rect.union(vram_rect);
    }

    /// Mark the source as matching VRAM again
    pub(crate) fn mark_validated(&mut self) {
        self.suspect = false;
        self.dirty_rect = Rect::EMPTY;
    }

    fn node_ref(&self, slot: u8) -> &SourceNode {
        if slot == HASH_CACHE_SLOT {
            &self.hash_cache_ref
        } else {
            &self.page_refs[slot as usize]
        }
    }

    fn node_ref_mut(&mut self, slot: u8) -> &mut SourceNode {
        if slot == HASH_CACHE_SLOT {
            &mut self.hash_cache_ref
        } else {
            &mut self.page_refs[slot as usize]
        }
    }
}

impl<T> NodeStore<SourceId, SourceList> for SlotMap<SourceId, Source<T>> {
    fn node(&self, at: NodeRef<SourceId>) -> &SourceNode {
        self[at.owner].node_ref(at.slot)
    }

    fn node_mut(&mut self, at: NodeRef<SourceId>) -> &mut SourceNode {
        self[at.owner].node_ref_mut(at.slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::texture_cache::key::{PaletteReg, TextureMode};

    fn source(mode: TextureMode) -> Source<()> {
        let key = SourceKey::new(3, PaletteReg::from_position(0, 480), mode);
        Source::new(key, SourceTexture::Owned(()), 1, 2, None, 0)
    }

    #[test]
    fn test_claim_page_slot_skips_duplicates() {
        let mut src = source(TextureMode::Palette4Bit);
        assert_eq!(src.claim_page_slot(3), Some(0));
        assert_eq!(src.claim_page_slot(3), None);
        assert_eq!(src.claim_page_slot(30), Some(1));
        assert_eq!(src.pages(), &[3, 30]);
    }

    #[test]
    #[should_panic(expected = "page references")]
    fn test_claim_page_slot_overflow_panics() {
        let mut src = source(TextureMode::Palette8Bit);
        for page in 0..=MAX_PAGE_REFS_PER_SOURCE as u8 {
            src.claim_page_slot(page);
        }
    }

    #[test]
    fn test_write_outside_active_region_is_deferred() {
        let mut src = source(TextureMode::Direct16Bit);
        // Page 3 texture rect is (192,0)-(448,256)
        src.extend_active_rect(&Rect::new(192, 0, 200, 8));

        src.note_write(&Rect::new(300, 100, 310, 110));
        assert!(!src.is_suspect());

        src.extend_active_rect(&Rect::new(192, 0, 200, 16));
        assert!(!src.is_suspect());

        src.extend_active_rect(&Rect::new(290, 90, 305, 105));
        assert!(src.is_suspect());
    }

    #[test]
    fn test_write_inside_active_region_is_suspect() {
        let mut src = source(TextureMode::Direct16Bit);
        src.extend_active_rect(&Rect::new(192, 0, 200, 8));
        src.note_write(&Rect::new(195, 4, 196, 5));
        assert!(src.is_suspect());

        src.mark_validated();
        assert!(!src.is_suspect());
    }

    #[test]
    fn test_palette_write_is_suspect() {
        let mut src = source(TextureMode::Palette4Bit);
        src.note_write(&Rect::new(15, 480, 16, 481));
        assert!(src.is_suspect());
    }

    #[test]
    fn test_hash_cache_membership() {
        let mut src = source(TextureMode::Palette4Bit);
        assert!(src.owns_texture());
        assert_eq!(src.from_hash_cache(), None);
        src.texture = SourceTexture::Shared(HashCacheId::default());
        assert!(!src.owns_texture());
        assert!(src.from_hash_cache().is_some());
    }
}
