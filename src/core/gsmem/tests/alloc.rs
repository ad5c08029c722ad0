// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

use super::super::*;
use super::psm32_manager;
use crate::core::config::SlotConfig;
use crate::core::gs::PAGE_WORDS;

#[test]
fn test_psm8_aliases_psm32_slot() {
    let mut manager = MemManager::new();
    manager.add_slot(0, 16, PixelFormat::Psm32).unwrap();
    let area = manager.add_area(256, 256, PixelFormat::Psm8, Alignment::Page);

    let allocation = manager.alloc(area).unwrap();
    assert_eq!(allocation.slot, 0);
    assert_eq!(allocation.word_addr, 0);
    assert_eq!(allocation.evicted, None);
    assert_eq!(manager.area(area).unwrap().storage_format(), Some(PixelFormat::Psm32));
    assert_eq!(manager.area(area).unwrap().format(), PixelFormat::Psm8);
}

#[test]
fn test_same_format_bonus() {
    let mut manager = MemManager::new();
    let wide = manager.add_slot(0, 8, PixelFormat::Psm32).unwrap();
    let narrow = manager.add_slot(8, 8, PixelFormat::Psm8).unwrap();
    let area = manager.add_area(256, 256, PixelFormat::Psm8, Alignment::Page);

    assert_eq!(manager.free_priority(wide, 8), Ok(20));
    assert_eq!(manager.free_priority(narrow, 8), Ok(20));

    // Native psm8 gets +1
    let allocation = manager.alloc(area).unwrap();
    assert_eq!(allocation.slot, narrow);
    assert_eq!(allocation.word_addr, 8 * PAGE_WORDS);
}

#[test]
fn test_psm4_prefers_high_alias() {
    let mut manager = MemManager::new();
    manager.add_slot(0, 4, PixelFormat::Psm32).unwrap();
    let high = manager.add_slot(4, 16, PixelFormat::Psm4hh).unwrap();
    let area = manager.add_area(256, 256, PixelFormat::Psm4, Alignment::Page);

    let allocation = manager.alloc(area).unwrap();
    assert_eq!(allocation.slot, high);
    assert_eq!(manager.area(area).unwrap().storage_format(), Some(PixelFormat::Psm4hh));
}

#[test]
fn test_psm4_falls_back_to_psm32() {
    let mut manager = psm32_manager(1, 4);
    let area = manager.add_area(256, 256, PixelFormat::Psm4, Alignment::Page);

    let allocation = manager.alloc(area).unwrap();
    assert_eq!(allocation.slot, 0);
    assert_eq!(manager.area(area).unwrap().storage_format(), Some(PixelFormat::Psm32));
}

#[test]
fn test_high_alias_needs_four_times_pages() {
    let mut manager = MemManager::new();
    manager.add_slot(0, 8, PixelFormat::Psm8h).unwrap();
    let area = manager.add_area(256, 256, PixelFormat::Psm8, Alignment::Page);

    assert_eq!(
        manager.alloc(area).unwrap_err(),
        GsMemError::Exhausted {
            format: PixelFormat::Psm8,
            pages: 8
        }
    );
}

#[test]
fn test_exhausted() {
    let mut manager = psm32_manager(1, 16);
    let area = manager.add_area(256, 256, PixelFormat::Psm32, Alignment::Page);

    assert_eq!(
        manager.alloc(area).unwrap_err(),
        GsMemError::Exhausted {
            format: PixelFormat::Psm32,
            pages: 32
        }
    );
    assert!(!manager.is_allocated(area).unwrap());
}

#[test]
fn test_unsupported_format() {
    let mut manager = psm32_manager(1, 32);
    let area = manager.add_area(64, 32, PixelFormat::Psmz24, Alignment::Page);

    assert_eq!(
        manager.alloc(area).unwrap_err(),
        GsMemError::UnsupportedFormat(PixelFormat::Psmz24)
    );
}

#[test]
fn test_lru_eviction() {
    let mut manager = psm32_manager(2, 32);
    let a = manager.add_area(256, 256, PixelFormat::Psm32, Alignment::Page);
    let b = manager.add_area(256, 256, PixelFormat::Psm32, Alignment::Page);
    let c = manager.add_area(256, 256, PixelFormat::Psm32, Alignment::Page);

    let first = manager.alloc(a).unwrap();
    let second = manager.alloc(b).unwrap();
    assert_ne!(first.slot, second.slot);

    let third = manager.alloc(c).unwrap();
    assert_eq!(third.slot, first.slot);
    assert_eq!(third.evicted, Some(a));
    assert!(!manager.is_allocated(a).unwrap());
    assert!(manager.is_allocated(b).unwrap());
    assert_eq!(manager.word_addr(c), Ok(first.word_addr));
}

#[test]
fn test_is_allocated_touches_slot() {
    let mut manager = psm32_manager(2, 32);
    let a = manager.add_area(256, 256, PixelFormat::Psm32, Alignment::Page);
    let b = manager.add_area(256, 256, PixelFormat::Psm32, Alignment::Page);
    let c = manager.add_area(256, 256, PixelFormat::Psm32, Alignment::Page);
    manager.alloc(a).unwrap();
    manager.alloc(b).unwrap();

    assert!(manager.is_allocated(a).unwrap());
    assert_eq!(manager.alloc(c).unwrap().evicted, Some(b));
}

#[test]
fn test_free_makes_slot_lru() {
    let mut manager = psm32_manager(2, 32);
    let a = manager.add_area(256, 256, PixelFormat::Psm32, Alignment::Page);
    let b = manager.add_area(256, 256, PixelFormat::Psm32, Alignment::Page);
    let c = manager.add_area(256, 256, PixelFormat::Psm32, Alignment::Page);
    manager.alloc(a).unwrap();
    let b_slot = manager.alloc(b).unwrap().slot;

    manager.free(b).unwrap();
    assert!(!manager.area(b).unwrap().is_resident());
    assert_eq!(manager.area(b).unwrap().storage_format(), None);

    let allocation = manager.alloc(c).unwrap();
    assert_eq!(allocation.slot, b_slot);
    assert_eq!(allocation.evicted, None);
    assert!(manager.is_allocated(a).unwrap());

    // Freeing twice is harmless
    manager.free(b).unwrap();
}

#[test]
fn test_free_priority() {
    let mut manager = psm32_manager(1, 32);
    manager.set_cur_frame(2);
    assert_eq!(manager.cur_frame(), 3);

    // age 3, fit 10 - 2, unbound 10
    assert_eq!(manager.free_priority(0, 30), Ok(21));
    // Fit clamps at zero for large slots
    assert_eq!(manager.free_priority(0, 4), Ok(13));
    assert_eq!(manager.free_priority(7, 4), Err(GsMemError::UnknownSlot(7)));
}

#[test]
fn test_unbound_slot_preferred() {
    let mut manager = MemManager::new();
    let wide = manager.add_slot(0, 8, PixelFormat::Psm32).unwrap();
    let narrow = manager.add_slot(8, 8, PixelFormat::Psm8).unwrap();
    let a = manager.add_area(256, 256, PixelFormat::Psm8, Alignment::Page);
    let b = manager.add_area(256, 256, PixelFormat::Psm8, Alignment::Page);

    assert_eq!(manager.alloc(a).unwrap().slot, narrow);
    let allocation = manager.alloc(b).unwrap();
    assert_eq!(allocation.slot, wide);
    assert_eq!(allocation.evicted, None);
}

#[test]
fn test_older_slot_preferred() {
    let mut manager = MemManager::new();
    let wide = manager.add_slot(0, 8, PixelFormat::Psm32).unwrap();
    let narrow = manager.add_slot(8, 8, PixelFormat::Psm8).unwrap();
    let a = manager.add_area(256, 256, PixelFormat::Psm8, Alignment::Page);
    let b = manager.add_area(256, 256, PixelFormat::Psm8, Alignment::Page);
    let c = manager.add_area(256, 256, PixelFormat::Psm8, Alignment::Page);

    manager.alloc(a).unwrap();
    manager.set_cur_frame(5);
    manager.alloc(b).unwrap();
    manager.set_cur_frame(6);

    // narrow: age 7 + fit 10 + bonus 1, wide: age 1 + fit 10
    let allocation = manager.alloc(c).unwrap();
    assert_eq!(allocation.slot, narrow);
    assert_eq!(allocation.evicted, Some(a));
    assert_eq!(manager.slot(wide).unwrap().bound_area(), Some(b));
}

#[test]
fn test_smallest_fitting_list() {
    let mut manager = MemManager::new();
    manager.add_slot(0, 8, PixelFormat::Psm32).unwrap();
    let big = manager.add_slot(8, 32, PixelFormat::Psm32).unwrap();
    manager.add_slot(40, 64, PixelFormat::Psm32).unwrap();
    let area = manager.add_area(256, 128, PixelFormat::Psm32, Alignment::Page);

    assert_eq!(manager.area(area).unwrap().page_len(), 16);
    assert_eq!(manager.alloc(area).unwrap().slot, big);
}

#[test]
fn test_realloc_resident_area() {
    let mut manager = psm32_manager(1, 32);
    let area = manager.add_area(256, 256, PixelFormat::Psm32, Alignment::Page);
    let first = manager.alloc(area).unwrap();
    let second = manager.alloc(area).unwrap();

    assert_eq!(second.slot, first.slot);
    assert_eq!(second.evicted, None);
    assert_eq!(manager.slot(second.slot).unwrap().bound_area(), Some(area));
}

#[test]
fn test_realloc_touched_area_keeps_neighbour() {
    let mut manager = psm32_manager(2, 32);
    let a = manager.add_area(256, 256, PixelFormat::Psm32, Alignment::Page);
    let b = manager.add_area(256, 256, PixelFormat::Psm32, Alignment::Page);
    let first = manager.alloc(a).unwrap();
    let b_slot = manager.alloc(b).unwrap().slot;
    assert!(manager.is_allocated(a).unwrap());

    let again = manager.alloc(a).unwrap();
    assert_eq!(again.evicted, None);
    assert_eq!(again.slot, first.slot);
    assert!(manager.is_allocated(b).unwrap());
    assert_eq!(manager.slot(b_slot).unwrap().bound_area(), Some(b));
}

#[test]
fn test_alloc_records_frame() {
    let mut manager = psm32_manager(1, 32);
    let area = manager.add_area(64, 32, PixelFormat::Psm32, Alignment::Page);
    manager.set_cur_frame(9);
    let slot = manager.alloc(area).unwrap().slot;

    assert_eq!(manager.slot(slot).unwrap().last_frame_used(), 10);
}

#[test]
fn test_from_config() {
    let config = GsMemConfig {
        slots: vec![
            SlotConfig {
                first_page: 0,
                page_len: 32,
                format: PixelFormat::Psm32,
            },
            SlotConfig {
                first_page: 32,
                page_len: 32,
                format: PixelFormat::Psm8,
            },
        ],
    };
    let manager = MemManager::from_config(&config).unwrap();

    assert_eq!(manager.slot(1).unwrap().format(), PixelFormat::Psm8);
    assert_eq!(manager.slot(1).unwrap().word_addr(), 32 * PAGE_WORDS);
    assert_eq!(manager.slot_lists().count(), 2);
}
