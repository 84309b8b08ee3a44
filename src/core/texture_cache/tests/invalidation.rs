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

//! Write and draw invalidation tests

use super::*;
use crate::core::texture_cache::vram::page_rect;

/// 64x64 texels in the top-left corner of the page
const CORNER_UV: Rect = Rect::new(0, 0, 64, 64);

fn setup_page3() -> (TextureCache<SoftwareBackend>, SourceKey) {
    let mut cache = new_cache();
    for i in 0..16 {
        fill_vram(&mut cache, i, 480, 1, 1, 0x0421 * i as u16);
    }
    fill_vram(&mut cache, 192, 0, 16, 64, 0x3210);
    (cache, key4(3, 0, 480))
}

#[test]
fn test_unrelated_page_write_keeps_source_then_page_write_redecodes() {
    let (mut cache, key) = setup_page3();

    let a = lookup_id(&mut cache, key, CORNER_UV);
    let hash_a = cache.source(a).unwrap().texture_hash();

    cache.add_written_rectangle(page_rect(7), false);
    assert_eq!(lookup_id(&mut cache, key, CORNER_UV), a);
    assert_eq!(cache.stats().decodes, 1);

    fill_vram(&mut cache, 196, 10, 2, 2, 0x7654);
    let b = lookup_id(&mut cache, key, CORNER_UV);

    assert_ne!(a, b);
    assert!(cache.source(a).is_none());
    assert_ne!(cache.source(b).unwrap().texture_hash(), hash_a);
    assert_eq!(cache.stats().decodes, 2);
    assert_eq!(cache.stats().invalidations, 1);
    assert_eq!(cache.page_source_ids(3), vec![b]);
    assert_eq!(cache.page_source_ids(16), vec![b]);
}

#[test]
fn test_identical_rewrite_keeps_source() {
    let (mut cache, key) = setup_page3();
    let a = lookup_id(&mut cache, key, CORNER_UV);

    fill_vram(&mut cache, 192, 0, 16, 64, 0x3210);
    fill_vram(&mut cache, 2, 480, 1, 1, 0x0842);
    assert_eq!(lookup_id(&mut cache, key, CORNER_UV), a);

    let stats = cache.stats();
    assert_eq!(stats.decodes, 1);
    assert_eq!(stats.revalidations, 1);
    assert!(!cache.source(a).unwrap().is_suspect());
}

#[test]
fn test_write_is_pending_until_tracking_update() {
    let (mut cache, key) = setup_page3();
    let a = lookup_id(&mut cache, key, CORNER_UV);

    fill_vram(&mut cache, 192, 0, 1, 1, 0x0000);
    assert!(!cache.source(a).unwrap().is_suspect());

    cache.update_vram_tracking_state();
    assert!(cache.source(a).unwrap().is_suspect());
}

#[test]
fn test_immediate_tracking_update() {
    let (mut cache, key) = setup_page3();
    let a = lookup_id(&mut cache, key, CORNER_UV);

    cache.add_written_rectangle(Rect::new(192, 0, 193, 1), true);
    assert!(cache.source(a).unwrap().is_suspect());
}

#[test]
fn test_write_outside_active_region_is_deferred() {
    let (mut cache, key) = setup_page3();
    let a = lookup_id(&mut cache, key, CORNER_UV);

    // Inside the texture rectangle, outside the sampled corner
    fill_vram(&mut cache, 240, 200, 1, 1, 0x1111);
    assert_eq!(lookup_id(&mut cache, key, CORNER_UV), a);
    assert_eq!(cache.stats().revalidations, 0);
    assert!(!cache.source(a).unwrap().is_suspect());

    // Sampling the written texels forces a rehash, which fails
    let b = lookup_id(&mut cache, key, FULL_UV);
    assert_ne!(a, b);
    assert_eq!(cache.stats().decodes, 2);
}

#[test]
fn test_palette_write_outside_referenced_range() {
    let mut cache = new_cache();
    // Page 3 texels all use index 0
    let key = key4(3, 0, 480);
    let a = lookup_id(&mut cache, key, FULL_UV);
    assert_eq!(cache.source(a).unwrap().palette_range(), Some((0, 0)));

    fill_vram(&mut cache, 5, 480, 1, 1, 0x7FFF);
    assert_eq!(lookup_id(&mut cache, key, FULL_UV), a);
    assert_eq!(cache.stats().revalidations, 1);

    fill_vram(&mut cache, 0, 480, 1, 1, 0x7FFF);
    assert_ne!(lookup_id(&mut cache, key, FULL_UV), a);
}

#[test]
fn test_draw_destroys_overlapping_sources() {
    let (mut cache, key) = setup_page3();
    let a = lookup_id(&mut cache, key, CORNER_UV);

    cache.add_drawn_rectangle(Rect::new(200, 10, 210, 20), Rect::VRAM);

    assert!(cache.source(a).is_none());
    assert_eq!(cache.num_sources(), 0);
    assert_eq!(cache.backend().live_textures(), 0);
    assert!(cache.page_source_ids(16).is_empty());
}

#[test]
fn test_draw_queries() {
    let mut cache = new_cache();
    let key = key4(3, 0, 480);
    cache.add_drawn_rectangle(Rect::new(200, 10, 210, 20), Rect::VRAM);

    assert!(cache.is_page_drawn(3));
    assert!(!cache.is_page_drawn(4));
    assert!(cache.is_page_drawn_in(3, &Rect::new(205, 15, 206, 16)));
    assert!(!cache.is_page_drawn_in(3, &Rect::new(192, 100, 256, 200)));
    assert!(cache.is_rect_drawn(&Rect::VRAM));
    assert!(!cache.is_rect_drawn(&Rect::new(0, 0, 192, 512)));

    assert!(cache.are_source_pages_drawn(key, &CORNER_UV));
    assert!(!cache.are_source_pages_drawn(key, &Rect::new(128, 128, 256, 256)));

    // Palette pages are checked as a whole
    cache.add_drawn_rectangle(Rect::new(8, 480, 9, 481), Rect::VRAM);
    assert!(cache.are_source_pages_drawn(key, &Rect::new(128, 128, 256, 256)));
}

#[test]
fn test_draw_is_clipped() {
    let mut cache = new_cache();
    cache.add_drawn_rectangle(Rect::new(0, 0, 100, 100), Rect::new(0, 0, 10, 10));

    assert!(cache.is_rect_drawn(&Rect::new(5, 5, 6, 6)));
    assert!(!cache.is_rect_drawn(&Rect::new(50, 50, 60, 60)));

    cache.add_drawn_rectangle(Rect::new(300, 0, 310, 10), Rect::new(0, 0, 10, 10));
    assert!(!cache.is_page_drawn(4));
}

#[test]
fn test_draw_elsewhere_on_palette_page_keeps_source() {
    let (mut cache, key) = setup_page3();
    let a = lookup_id(&mut cache, key, CORNER_UV);

    cache.add_drawn_rectangle(Rect::new(32, 300, 40, 310), Rect::VRAM);
    assert!(cache.is_page_drawn(16));
    assert_eq!(lookup_id(&mut cache, key, CORNER_UV), a);

    cache.add_drawn_rectangle(Rect::new(0, 470, 64, 490), Rect::VRAM);
    assert!(cache.source(a).is_none());
}

#[test]
fn test_covering_write_clears_draw() {
    let mut cache = new_cache();
    cache.add_drawn_rectangle(Rect::new(200, 10, 210, 20), Rect::VRAM);

    fill_vram(&mut cache, 200, 10, 5, 10, 0);
    assert!(cache.is_page_drawn(3));

    fill_vram(&mut cache, 196, 8, 20, 20, 0);
    assert!(!cache.is_page_drawn(3));
}

#[test]
fn test_invalidate_page_sources_in_rect() {
    let mut cache = new_cache();
    let first = lookup_id(&mut cache, key4(3, 0, 480), FULL_UV);
    let second = lookup_id(&mut cache, key4(4, 32, 480), FULL_UV);
    assert_eq!(cache.page_source_ids(16).len(), 2);

    cache.invalidate_page_sources_in(16, &Rect::new(0, 480, 16, 481));
    assert!(cache.source(first).is_none());
    assert!(cache.source(second).is_some());

    cache.invalidate_page_sources(16);
    assert_eq!(cache.num_sources(), 0);
    assert!(cache.page_source_ids(4).is_empty());
}

#[test]
fn test_edge_page_texels_come_only_from_tracked_rect() {
    let mut cache = new_cache();
    let a = lookup_id(&mut cache, key16(15), FULL_UV);

    // Left of VRAM, where a wrapping fetch of page 15 would land
    fill_vram(&mut cache, 0, 0, 64, 1, 0x7FFF);
    let b = lookup_id(&mut cache, key16(15), FULL_UV);
    assert_eq!(a, b);

    let texture = cache.texture(cache.source(b).unwrap()).unwrap();
    assert_eq!(texture.get_pixel(64, 0).0, [0, 0, 0, 0]);

    let mut fresh = new_cache();
    fill_vram(&mut fresh, 0, 0, 64, 1, 0x7FFF);
    let c = lookup_id(&mut fresh, key16(15), FULL_UV);
    let expected = fresh.texture(fresh.source(c).unwrap()).unwrap();
    assert_eq!(texture.as_raw(), expected.as_raw());
}

#[test]
fn test_write_at_right_edge_invalidates_edge_page() {
    let mut cache = new_cache();
    let a = lookup_id(&mut cache, key16(15), FULL_UV);

    fill_vram(&mut cache, 1023, 0, 1, 1, 0x7FFF);
    let b = lookup_id(&mut cache, key16(15), FULL_UV);

    assert_ne!(a, b);
    assert_eq!(cache.stats().invalidations, 1);
    let texture = cache.texture(cache.source(b).unwrap()).unwrap();
    assert_eq!(texture.get_pixel(63, 0).0, [0xF8, 0xF8, 0xF8, 0xFF]);
}
