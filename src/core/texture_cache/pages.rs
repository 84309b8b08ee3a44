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

//! Page invalidation tracker
//!
//! VRAM is split into 32 pages of 64×256 pixels. Each page keeps the list of
//! sources whose texture or palette data lies on it, the sub-rectangles
//! draws have rendered into, and the writes received since the last
//! tracking update.
//!
//! # Writes and Draws
//!
//! CPU and DMA writes go through the shadow VRAM, so their effect on a
//! source can be checked by rehashing. They are accumulated per page and
//! folded into the sources lazily by [`TextureCache::update_vram_tracking_state`],
//! which every lookup calls first.
//!
//! Draws are rendered by the GPU and never reach the shadow VRAM. Sources
//! overlapping a draw are destroyed immediately, and the drawn region is
//! remembered until a write covers it again.

use super::backend::TextureBackend;
use super::key::SourceKey;
use super::list::{NodeRef, NodeStore};
use super::rect::Rect;
use super::source::{SourceId, SourceList, SourceListHead};
use super::vram::{for_each_page_in_rect, page_rect, NUM_VRAM_PAGES};
use super::TextureCache;

/// Draw sub-rectangles remembered per page before they are merged
pub const MAX_DRAW_RECTS_PER_PAGE: usize = 4;

/// Tracking state of one VRAM page
#[derive(Debug, Clone)]
pub(crate) struct PageEntry {
    pub(crate) sources: SourceListHead,
    pub(crate) draw_rects: Vec<Rect>,
    pub(crate) pending_write_rect: Rect,
}

impl PageEntry {
    pub(crate) fn new(pn: u8) -> Self {
        Self {
            sources: SourceListHead::new(SourceList::Page(pn)),
            draw_rects: Vec::with_capacity(MAX_DRAW_RECTS_PER_PAGE),
            pending_write_rect: Rect::EMPTY,
        }
    }

    /// Build the tracking state for all of VRAM
    pub(crate) fn all() -> Vec<PageEntry> {
        (0..NUM_VRAM_PAGES as u8).map(PageEntry::new).collect()
    }

    #[inline]
    pub(crate) fn is_drawn(&self) -> bool {
        !self.draw_rects.is_empty()
    }

    pub(crate) fn is_drawn_in(&self, rect: &Rect) -> bool {
        self.draw_rects.iter().any(|drawn| drawn.intersects(rect))
    }

    /// Remember a drawn sub-rectangle
    ///
    /// Rectangles already covered are ignored and rectangles swallowed by
    /// the new one are dropped. When the page runs out of slots every
    /// rectangle is merged into their union.
    pub(crate) fn add_draw_rect(&mut self, rect: Rect) {
        if self.draw_rects.iter().any(|drawn| drawn.contains(&rect)) {
            return;
        }
        self.draw_rects.retain(|drawn| !rect.contains(drawn));

        if self.draw_rects.len() < MAX_DRAW_RECTS_PER_PAGE {
            self.draw_rects.push(rect);
        } else {
            let merged = self
                .draw_rects
                .iter()
                .fold(rect, |acc, drawn| acc.union(drawn));
            self.draw_rects.clear();
            self.draw_rects.push(merged);
        }
    }

    /// Forget draws fully overwritten by a VRAM write
    pub(crate) fn clear_covered_draw_rects(&mut self, write: &Rect) {
        self.draw_rects.retain(|drawn| !write.contains(drawn));
    }

    /// Clear draw and write tracking, keeping the source list
    pub(crate) fn reset_tracking(&mut self) {
        self.draw_rects.clear();
        self.pending_write_rect = Rect::EMPTY;
    }
}

impl<B: TextureBackend> TextureCache<B> {
    /// Record a non-rendering write (CPU or DMA transfer) to VRAM
    ///
    /// # Arguments
    ///
    /// * `rect` - Written region in VRAM coordinates
    /// * `update_vram_writes` - Fold the write into the sources immediately
    ///   instead of on the next lookup
    pub fn add_written_rectangle(&mut self, rect: Rect, update_vram_writes: bool) {
        let rect = rect.clamp_to_vram();
        if rect.is_empty() {
            return;
        }

        log::trace!("Texture cache: write {}", rect);

        let pages = &mut self.pages;
        for_each_page_in_rect(&rect, |pn| {
            let page = &mut pages[pn as usize];
            let page_write = rect.intersection(&page_rect(pn));
            page.pending_write_rect = page.pending_write_rect.union(&page_write);
            page.clear_covered_draw_rects(&page_write);
        });

        if update_vram_writes {
            self.update_vram_tracking_state();
        }
    }

    /// Record a rendered draw into VRAM
    ///
    /// The draw is clipped to `clip_rect`. Sources whose data overlaps the
    /// drawn region can no longer be validated by hashing and are destroyed.
    pub fn add_drawn_rectangle(&mut self, rect: Rect, clip_rect: Rect) {
        let rect = rect.intersection(&clip_rect).clamp_to_vram();
        if rect.is_empty() {
            return;
        }

        log::trace!("Texture cache: draw {}", rect);

        let mut touched = Vec::new();
        for_each_page_in_rect(&rect, |pn| touched.push(pn));

        for pn in touched {
            let page_draw = rect.intersection(&page_rect(pn));
            self.pages[pn as usize].add_draw_rect(page_draw);
            self.invalidate_page_sources_in(pn, &page_draw);
        }
    }

    /// Whether any draw touched page `pn`
    pub fn is_page_drawn(&self, pn: u32) -> bool {
        self.pages[pn as usize].is_drawn()
    }

    /// Whether any draw on page `pn` intersects `rect`
    pub fn is_page_drawn_in(&self, pn: u32, rect: &Rect) -> bool {
        self.pages[pn as usize].is_drawn_in(rect)
    }

    /// Whether any draw intersects `rect`, across all pages it spans
    pub fn is_rect_drawn(&self, rect: &Rect) -> bool {
        let mut drawn = false;
        for_each_page_in_rect(rect, |pn| {
            drawn = drawn || self.pages[pn as usize].is_drawn_in(rect);
        });
        drawn
    }

    /// Whether a texture read through `key` would sample drawn data
    ///
    /// `uv_rect` is in texel coordinates of the page and is narrowed to the
    /// VRAM region it samples. The palette, if any, is checked as a whole.
    pub fn are_source_pages_drawn(&self, key: SourceKey, uv_rect: &Rect) -> bool {
        let texture_rect = key.uv_rect_to_vram(uv_rect);
        if self.is_rect_drawn(&texture_rect) {
            return true;
        }
        key.has_palette() && self.is_rect_drawn(&key.palette_rect())
    }

    /// Fold accumulated writes into the sources on the written pages
    ///
    /// A source becomes suspect when the write touches its sampled region
    /// or palette; writes elsewhere in its texture are kept as a dirty
    /// region until the sampled region grows into them.
    pub fn update_vram_tracking_state(&mut self) {
        for pn in 0..NUM_VRAM_PAGES {
            let write = std::mem::replace(&mut self.pages[pn].pending_write_rect, Rect::EMPTY);
            if write.is_empty() {
                continue;
            }

            let mut cursor = self.pages[pn].sources.head();
            while let Some(at) = cursor {
                cursor = self.sources.node(at).next;
                self.sources[at.owner].note_write(&write);
            }
        }
    }

    /// Destroy every source linked into page `pn`
    pub fn invalidate_page_sources(&mut self, pn: u32) {
        let ids = self.pages[pn as usize].sources.owners(&self.sources);
        if !ids.is_empty() {
            log::debug!("Texture cache: invalidating {} sources on page {}", ids.len(), pn);
        }
        for id in ids {
            self.destroy_source(id);
        }
    }

    /// Destroy the sources on page `pn` whose texture or palette overlaps `rect`
    pub fn invalidate_page_sources_in(&mut self, pn: u32, rect: &Rect) {
        let ids: Vec<SourceId> = self.pages[pn as usize]
            .sources
            .iter(&self.sources)
            .map(|at| at.owner)
            .filter(|&id| {
                let src = &self.sources[id];
                src.texture_rect.intersects(rect) || src.palette_rect.intersects(rect)
            })
            .collect();
        for id in ids {
            self.destroy_source(id);
        }
    }

    /// Link a freshly created source into every page its data lies on
    ///
    /// Texture pages go to the front of their lists, palette pages to the
    /// back. A page holding both texture and palette data is linked once.
    pub(crate) fn link_source_pages(&mut self, id: SourceId) {
        let (texture_rect, palette_rect) = {
            let src = &self.sources[id];
            (src.texture_rect, src.palette_rect)
        };

        let mut texture_pages = Vec::with_capacity(4);
        for_each_page_in_rect(&texture_rect, |pn| texture_pages.push(pn as u8));
        for pn in texture_pages {
            if let Some(slot) = self.sources[id].claim_page_slot(pn) {
                self.pages[pn as usize]
                    .sources
                    .prepend(&mut self.sources, NodeRef::new(id, slot));
            }
        }

        let mut palette_pages = Vec::with_capacity(5);
        for_each_page_in_rect(&palette_rect, |pn| palette_pages.push(pn as u8));
        for pn in palette_pages {
            if let Some(slot) = self.sources[id].claim_page_slot(pn) {
                self.pages[pn as usize]
                    .sources
                    .append(&mut self.sources, NodeRef::new(id, slot));
            }
        }
    }

    /// Unlink a source from all of its page lists
    pub(crate) fn unlink_source_pages(&mut self, id: SourceId) {
        let (pages, count) = {
            let src = &self.sources[id];
            (src.page_numbers, src.num_page_refs)
        };
        for (slot, &pn) in pages[..count].iter().enumerate() {
            self.pages[pn as usize]
                .sources
                .remove(&mut self.sources, NodeRef::new(id, slot as u8));
        }
        self.sources[id].num_page_refs = 0;
    }
}
