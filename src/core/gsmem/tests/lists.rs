// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

use super::super::*;

fn list_types(manager: &MemManager) -> Vec<(PixelFormat, u32)> {
    manager
        .slot_lists()
        .map(|list| (list.format().unwrap(), list.page_len()))
        .collect()
}

#[test]
fn test_lists_grouped_by_format_and_size() {
    let mut manager = MemManager::new();
    manager.add_slot(0, 4, PixelFormat::Psm32).unwrap();
    manager.add_slot(4, 16, PixelFormat::Psm32).unwrap();
    manager.add_slot(20, 32, PixelFormat::Psm8).unwrap();
    manager.add_slot(52, 8, PixelFormat::Psm32).unwrap();
    manager.add_slot(60, 8, PixelFormat::Psm8).unwrap();

    assert_eq!(
        list_types(&manager),
        vec![
            (PixelFormat::Psm32, 4),
            (PixelFormat::Psm32, 8),
            (PixelFormat::Psm32, 16),
            (PixelFormat::Psm8, 8),
            (PixelFormat::Psm8, 32),
        ]
    );
}

#[test]
fn test_larger_list_goes_after_its_group() {
    let mut manager = MemManager::new();
    manager.add_slot(0, 4, PixelFormat::Psm32).unwrap();
    manager.add_slot(4, 8, PixelFormat::Psm8).unwrap();
    manager.add_slot(12, 64, PixelFormat::Psm32).unwrap();

    assert_eq!(
        list_types(&manager),
        vec![
            (PixelFormat::Psm32, 4),
            (PixelFormat::Psm32, 64),
            (PixelFormat::Psm8, 8),
        ]
    );
}

#[test]
fn test_same_type_shares_list() {
    let mut manager = MemManager::new();
    let a = manager.add_slot(0, 16, PixelFormat::Psm16).unwrap();
    let b = manager.add_slot(16, 16, PixelFormat::Psm16).unwrap();

    let lists: Vec<_> = manager.slot_lists().collect();
    assert_eq!(lists.len(), 1);
    assert_eq!(lists[0].iter().collect::<Vec<_>>(), vec![a, b]);
    assert_eq!(lists[0].lru(), Some(b));
    assert!(lists[0].contains(a));
}

#[test]
fn test_slot_out_of_range() {
    let mut manager = MemManager::new();

    assert_eq!(
        manager.add_slot(500, 16, PixelFormat::Psm32).unwrap_err(),
        GsMemError::SlotOutOfRange {
            first: 500,
            end: 516,
            total: 512
        }
    );
    assert!(manager.add_slot(496, 16, PixelFormat::Psm32).is_ok());
}

#[test]
fn test_slot_geometry() {
    let mut manager = MemManager::new();
    let id = manager.add_slot(32, 16, PixelFormat::Psm24).unwrap();
    let slot = manager.slot(id).unwrap();

    assert_eq!(slot.first_page(), 32);
    assert_eq!(slot.page_len(), 16);
    assert_eq!(slot.last_page(), 47);
    assert_eq!(slot.word_addr(), 32 * 2048);
    assert_eq!(slot.format(), PixelFormat::Psm24);
    assert!(!slot.is_bound());
    assert!(!slot.is_locked());
}

#[test]
fn test_find_lru_slot() {
    let mut manager = MemManager::new();
    manager.add_slot(0, 8, PixelFormat::Psm32).unwrap();
    let big = manager.add_slot(8, 32, PixelFormat::Psm32).unwrap();

    assert_eq!(manager.find_lru_slot(PixelFormat::Psm32, 9), Some(big));
    assert_eq!(manager.find_lru_slot(PixelFormat::Psm32, 33), None);
    assert_eq!(manager.find_lru_slot(PixelFormat::Psm8, 1), None);
}

#[test]
fn test_find_lru_skips_empty_list() {
    let mut manager = MemManager::new();
    let small = manager.add_slot(0, 8, PixelFormat::Psm32).unwrap();
    let big = manager.add_slot(8, 32, PixelFormat::Psm32).unwrap();
    manager.lock_slot(small).unwrap();

    assert_eq!(manager.find_lru_slot(PixelFormat::Psm32, 1), Some(big));
}

#[test]
fn test_remove_all_slots() {
    let mut manager = MemManager::new();
    manager.add_slot(0, 32, PixelFormat::Psm32).unwrap();
    let locked = manager.add_slot(32, 32, PixelFormat::Psm32).unwrap();
    manager.lock_slot(locked).unwrap();
    let area = manager.add_area(256, 256, PixelFormat::Psm32, Alignment::Page);
    manager.alloc(area).unwrap();

    manager.remove_all_slots();

    assert!(!manager.area(area).unwrap().is_resident());
    assert_eq!(manager.slot(0).unwrap_err(), GsMemError::UnknownSlot(0));
    assert_eq!(manager.slot_lists().count(), 0);
    assert!(manager.locked_slots().is_empty());
    assert!(matches!(manager.alloc(area), Err(GsMemError::Exhausted { .. })));

    // New slots get fresh ids
    assert_eq!(manager.add_slot(0, 32, PixelFormat::Psm32), Ok(2));
}

#[test]
fn test_report_display() {
    let mut manager = MemManager::new();
    manager.add_slot(0, 32, PixelFormat::Psm32).unwrap();

    let expected = "GS Memory Allocation:\n\n\
                    Locked slots:\n\n\n\
                    Unlocked slots:\n\n\
                    [  0,  31]\t PixFormat: psm32\t LastFrameUsed: 0\tfree \n\n";
    assert_eq!(manager.allocation_report().to_string(), expected);
}

#[test]
fn test_report_marks_bound_and_locked() {
    let mut manager = MemManager::new();
    manager.add_slot(0, 32, PixelFormat::Psm32).unwrap();
    let locked = manager.add_slot(32, 16, PixelFormat::Psm8).unwrap();
    manager.lock_slot(locked).unwrap();
    let area = manager.add_area(64, 32, PixelFormat::Psm32, Alignment::Page);
    manager.set_cur_frame(1);
    manager.alloc(area).unwrap();

    let report = manager.allocation_report();
    assert_eq!(report.cur_frame, 2);
    assert_eq!(report.locked.len(), 1);
    assert_eq!(report.locked[0].first_page, 32);
    assert_eq!(report.lists[0].slots[0].bound_area, Some(area));
    assert_eq!(report.lists[0].slots[0].word_addr(), 0);

    let text = report.to_string();
    assert!(text.contains("[ 32,  47]\t PixFormat: psm8\t LastFrameUsed: 0\tfree "));
    assert!(text.contains("[  0,  31]\t PixFormat: psm32\t LastFrameUsed: 2\tbound"));
}

#[test]
fn test_report_json() {
    let mut manager = MemManager::new();
    manager.add_slot(0, 16, PixelFormat::Psm4hh).unwrap();

    let json = serde_json::to_value(manager.allocation_report()).unwrap();
    assert_eq!(json["cur_frame"], 0);
    assert_eq!(json["lists"][0]["format"], "psm4hh");
    assert_eq!(json["lists"][0]["page_len"], 16);
    assert_eq!(json["lists"][0]["slots"][0]["last_page"], 15);
    assert!(json["lists"][0]["slots"][0]["bound_area"].is_null());
}
