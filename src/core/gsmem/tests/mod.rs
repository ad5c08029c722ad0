// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

//! Unit tests for the GS memory manager

mod alloc;
mod lists;

use super::*;

/// Manager with `count` psm32 slots of `pages` pages laid out back to back
pub(super) fn psm32_manager(count: u32, pages: u32) -> MemManager {
    let mut manager = MemManager::new();
    for i in 0..count {
        manager.add_slot(i * pages, pages, PixelFormat::Psm32).unwrap();
    }
    manager
}
