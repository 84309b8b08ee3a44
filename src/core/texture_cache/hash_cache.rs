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

//! Hash cache (texture dedup layer)
//!
//! Different keys often decode to identical texels: the same sprite sheet
//! uploaded to two pages, or a page sampled through two palettes whose
//! referenced entries are equal. The hash cache maps the content hashes of
//! a decode to a single renderer texture shared by every source with that
//! content.
//!
//! An entry owns its texture and lists its sources. It is destroyed, and
//! its texture released, as soon as the list becomes empty.

use std::collections::HashMap;

use slotmap::SlotMap;

use super::backend::TextureBackend;
use super::hash::HashType;
use super::key::TextureMode;
use super::list::NodeRef;
use super::source::{SourceId, SourceList, SourceListHead, HASH_CACHE_SLOT};
use super::TextureCache;
use crate::core::error::Result;

slotmap::new_key_type! {
    /// Arena handle of a [`HashCacheEntry`]
    pub struct HashCacheId;
}

/// Content identity of a decoded texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashCacheKey {
    pub texture_hash: HashType,
    pub palette_hash: HashType,
    pub mode: TextureMode,
}

/// A renderer texture shared by sources with identical content
#[derive(Debug)]
pub struct HashCacheEntry<T> {
    pub(crate) key: HashCacheKey,
    pub(crate) texture: T,
    pub(crate) sources: SourceListHead,
    pub(crate) last_used_frame: u64,
}

impl<T> HashCacheEntry<T> {
    pub fn key(&self) -> HashCacheKey {
        self.key
    }

    pub fn texture(&self) -> &T {
        &self.texture
    }

    /// Number of sources sharing the texture
    pub fn num_sources(&self) -> usize {
        self.sources.len()
    }

    pub fn last_used_frame(&self) -> u64 {
        self.last_used_frame
    }
}

/// Entry arena plus content index
#[derive(Debug)]
pub(crate) struct HashCache<T> {
    entries: SlotMap<HashCacheId, HashCacheEntry<T>>,
    index: HashMap<HashCacheKey, HashCacheId>,
}

impl<T> HashCache<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: SlotMap::with_key(),
            index: HashMap::new(),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub(crate) fn find(&self, key: &HashCacheKey) -> Option<HashCacheId> {
        self.index.get(key).copied()
    }

    #[inline]
    pub(crate) fn get(&self, id: HashCacheId) -> Option<&HashCacheEntry<T>> {
        self.entries.get(id)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: HashCacheId) -> Option<&mut HashCacheEntry<T>> {
        self.entries.get_mut(id)
    }

    pub(crate) fn insert(&mut self, key: HashCacheKey, texture: T, frame: u64) -> HashCacheId {
        debug_assert!(!self.index.contains_key(&key), "duplicate hash cache key");
        let id = self.entries.insert_with_key(|id| HashCacheEntry {
            key,
            texture,
            sources: SourceListHead::new(SourceList::HashCache(id)),
            last_used_frame: frame,
        });
        self.index.insert(key, id);
        id
    }

    pub(crate) fn remove(&mut self, id: HashCacheId) -> Option<HashCacheEntry<T>> {
        let entry = self.entries.remove(id)?;
        self.index.remove(&entry.key);
        Some(entry)
    }
}

impl<B: TextureBackend> TextureCache<B> {
    /// Number of live hash cache entries
    pub fn num_hash_cache_entries(&self) -> usize {
        self.hash_cache.len()
    }

    /// Hash cache entry by handle
    pub fn hash_cache_entry(&self, id: HashCacheId) -> Option<&HashCacheEntry<B::Texture>> {
        self.hash_cache.get(id)
    }

    /// Find or create the shared texture for a decode
    ///
    /// On a hit the existing texture is reused and nothing is uploaded.
    ///
    /// # Errors
    ///
    /// Propagates the backend's allocation failure on a miss.
    pub(crate) fn acquire_hash_cache_entry(
        &mut self,
        key: HashCacheKey,
        width: u32,
        height: u32,
        rgba: &[u32],
    ) -> Result<HashCacheId> {
        if let Some(id) = self.hash_cache.find(&key) {
            self.stats.hash_cache_hits += 1;
            log::trace!(
                "Texture cache: hash cache hit {:016X}/{:016X}",
                key.texture_hash,
                key.palette_hash
            );
            return Ok(id);
        }

        let texture = self.backend.create_texture(width, height, rgba)?;
        self.stats.uploads += 1;
        let id = self.hash_cache.insert(key, texture, self.frame);
        log::trace!(
            "Texture cache: new hash cache entry {:016X}/{:016X} ({} live)",
            key.texture_hash,
            key.palette_hash,
            self.hash_cache.len()
        );
        Ok(id)
    }

    /// Add a source to the entry's member list
    pub(crate) fn link_hash_cache_source(&mut self, entry: HashCacheId, source: SourceId) {
        let frame = self.frame;
        if let Some(entry) = self.hash_cache.get_mut(entry) {
            entry.last_used_frame = frame;
            entry
                .sources
                .append(&mut self.sources, NodeRef::new(source, HASH_CACHE_SLOT));
        }
    }

    /// Remove a source from the entry's member list
    ///
    /// The entry is destroyed and its texture released once it has no
    /// members left.
    pub(crate) fn unlink_hash_cache_source(&mut self, entry_id: HashCacheId, source: SourceId) {
        let Some(entry) = self.hash_cache.get_mut(entry_id) else {
            return;
        };
        entry
            .sources
            .remove(&mut self.sources, NodeRef::new(source, HASH_CACHE_SLOT));
        if !entry.sources.is_empty() {
            return;
        }

        if let Some(entry) = self.hash_cache.remove(entry_id) {
            log::trace!(
                "Texture cache: releasing hash cache entry {:016X}/{:016X}",
                entry.key.texture_hash,
                entry.key.palette_hash
            );
            self.backend.release_texture(entry.texture);
        }
    }

    /// Stamp the entry backing a source as used this frame
    pub(crate) fn touch_hash_cache_entry(&mut self, id: HashCacheId) {
        let frame = self.frame;
        if let Some(entry) = self.hash_cache.get_mut(id) {
            entry.last_used_frame = frame;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(texture_hash: HashType) -> HashCacheKey {
        HashCacheKey {
            texture_hash,
            palette_hash: 0,
            mode: TextureMode::Direct16Bit,
        }
    }

    #[test]
    fn test_insert_find_remove() {
        let mut cache: HashCache<u32> = HashCache::new();
        let a = cache.insert(key(1), 10, 0);
        let b = cache.insert(key(2), 20, 0);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.find(&key(1)), Some(a));
        assert_eq!(cache.get(b).map(|e| *e.texture()), Some(20));

        let removed = cache.remove(a).unwrap();
        assert_eq!(removed.texture, 10);
        assert_eq!(cache.find(&key(1)), None);
        assert!(cache.remove(a).is_none());
    }

    #[test]
    fn test_entry_list_identity() {
        let mut cache: HashCache<()> = HashCache::new();
        let id = cache.insert(key(7), (), 3);
        let entry = cache.get(id).unwrap();
        assert_eq!(entry.sources.id(), SourceList::HashCache(id));
        assert_eq!(entry.num_sources(), 0);
        assert_eq!(entry.last_used_frame(), 3);
    }

    #[test]
    fn test_key_distinguishes_mode() {
        let mut cache: HashCache<()> = HashCache::new();
        let direct = key(5);
        let paletted = HashCacheKey {
            mode: TextureMode::Palette4Bit,
            ..direct
        };
        cache.insert(direct, (), 0);
        assert_eq!(cache.find(&paletted), None);
    }
}
