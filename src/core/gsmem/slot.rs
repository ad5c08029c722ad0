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

//! Memory slots and slot lists

use std::collections::VecDeque;

use crate::core::gs::{page_to_word_addr, PixelFormat};

use super::AreaId;

/// Slot handle (index into the manager's slot table)
pub type SlotId = usize;

/// Slot list handle (index into the manager's list table)
pub(crate) type ListId = usize;

/// List a slot currently sits in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ListRef {
    Normal(ListId),
    Locked,
}

/// A fixed run of GS pages set aside for one storage format
#[derive(Debug, Clone)]
pub struct MemSlot {
    first_page: u32,
    page_len: u32,
    format: PixelFormat,
    last_frame_used: u32,
    bound_area: Option<AreaId>,
    pub(crate) list: ListRef,
}

impl MemSlot {
    pub(crate) fn new(first_page: u32, page_len: u32, format: PixelFormat, list: ListId) -> Self {
        Self {
            first_page,
            page_len,
            format,
            last_frame_used: 0,
            bound_area: None,
            list: ListRef::Normal(list),
        }
    }

    pub fn first_page(&self) -> u32 {
        self.first_page
    }

    pub fn page_len(&self) -> u32 {
        self.page_len
    }

    /// Last page covered by the slot (inclusive)
    pub fn last_page(&self) -> u32 {
        (self.first_page + self.page_len).saturating_sub(1)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// GS word address of the first page
    pub fn word_addr(&self) -> u32 {
        page_to_word_addr(self.first_page)
    }

    pub fn last_frame_used(&self) -> u32 {
        self.last_frame_used
    }

    pub fn bound_area(&self) -> Option<AreaId> {
        self.bound_area
    }

    pub fn is_bound(&self) -> bool {
        self.bound_area.is_some()
    }

    pub fn is_locked(&self) -> bool {
        self.list == ListRef::Locked
    }

    pub(crate) fn set_bound_area(&mut self, area: Option<AreaId>) {
        self.bound_area = area;
    }

    pub(crate) fn set_last_frame_used(&mut self, frame: u32) {
        self.last_frame_used = frame;
    }

    /// Eviction priority of this slot for an area of `area_pages`
    ///
    /// Older, closer-fitting and unbound slots score higher.
    pub fn free_priority(&self, area_pages: u32, cur_frame: u32) -> i64 {
        let age = cur_frame as i64 - self.last_frame_used as i64;
        let fit = (10 - (self.page_len as i64 - area_pages as i64)).clamp(0, 10);
        let unbound = if self.is_bound() { 0 } else { 10 };
        age + fit + unbound
    }
}

/// Slots of one (format, page length) type, most recently used first
#[derive(Debug, Clone)]
pub struct SlotList {
    format: Option<PixelFormat>,
    page_len: u32,
    slots: VecDeque<SlotId>,
}

impl SlotList {
    pub(crate) fn new(format: PixelFormat, page_len: u32) -> Self {
        Self {
            format: Some(format),
            page_len,
            slots: VecDeque::new(),
        }
    }

    /// The list of locked slots, which has no type
    pub(crate) fn locked() -> Self {
        Self {
            format: None,
            page_len: 0,
            slots: VecDeque::new(),
        }
    }

    /// Storage format of the slots (`None` for the locked list)
    pub fn format(&self) -> Option<PixelFormat> {
        self.format
    }

    pub fn page_len(&self) -> u32 {
        self.page_len
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slots from most to least recently used
    pub fn iter(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.slots.iter().copied()
    }

    pub fn contains(&self, slot: SlotId) -> bool {
        self.slots.contains(&slot)
    }

    /// Least recently used slot
    pub fn lru(&self) -> Option<SlotId> {
        self.slots.back().copied()
    }

    pub(crate) fn push_back(&mut self, slot: SlotId) {
        self.slots.push_back(slot);
    }

    /// Remove a slot, returning whether it was present
    pub(crate) fn remove(&mut self, slot: SlotId) -> bool {
        match self.slots.iter().position(|s| *s == slot) {
            Some(index) => {
                self.slots.remove(index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn make_mru(&mut self, slot: SlotId) -> bool {
        let found = self.remove(slot);
        if found {
            self.slots.push_front(slot);
        }
        found
    }

    pub(crate) fn make_lru(&mut self, slot: SlotId) -> bool {
        let found = self.remove(slot);
        if found {
            self.slots.push_back(slot);
        }
        found
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
    }
}

impl Default for SlotList {
    fn default() -> Self {
        SlotList::locked()
    }
}
