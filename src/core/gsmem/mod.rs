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

//! GS local memory manager
//!
//! GS memory is carved up front into [`MemSlot`]s: fixed page ranges, each
//! tagged with the storage format it holds. Client buffers ([`MemArea`]s)
//! are bound to slots on demand and silently evicted when a slot is reused.
//!
//! Narrow formats can alias wider slots:
//!
//! | Area format | Candidate slots (page factor)           |
//! |-------------|-----------------------------------------|
//! | psm4        | psm4 (1), psm4hh (4), psm4hl (4), psm32 (1) |
//! | psm8, psm8h | psm8 (1), psm8h (4), psm32 (1)           |
//! | psm16       | psm16 (1), psm32 (1)                     |
//! | psm24       | psm24 (1), psm32 (1)                     |
//! | psm32       | psm32 (1)                                |
//!
//! Each candidate is the least recently used slot of the first list with
//! enough pages. The candidate with the highest free priority wins; ties go
//! to the earlier row entry.
//!
//! # Example
//!
//! ```
//! use ps2rx::core::gs::PixelFormat;
//! use ps2rx::core::gsmem::{Alignment, MemManager};
//!
//! let mut manager = MemManager::new();
//! manager.add_slot(0, 16, PixelFormat::Psm32)?;
//!
//! let area = manager.add_area(256, 256, PixelFormat::Psm8, Alignment::Page);
//! let allocation = manager.alloc(area)?;
//! assert_eq!(allocation.word_addr, 0);
//! assert!(manager.is_allocated(area)?);
//! # Ok::<(), ps2rx::core::error::GsMemError>(())
//! ```

use std::fmt;

use serde::Serialize;

use crate::core::config::GsMemConfig;
use crate::core::error::{GsMemError, GsMemResult};
use crate::core::gs::{page_to_word_addr, PixelFormat, TOTAL_PAGES};

pub mod area;
pub mod slot;

pub use area::{page_count, xform_dimensions, Alignment, AreaId, MemArea};
pub use slot::{MemSlot, SlotId, SlotList};

use slot::{ListId, ListRef};

#[cfg(test)]
mod tests;

/// A compatible slot kind for an area format
#[derive(Debug, Clone, Copy)]
struct SlotKind {
    format: PixelFormat,
    /// Multiplier from area pages to slot pages
    page_factor: u32,
    /// Priority bonus favouring narrower slot kinds
    bonus: i64,
}

const fn kind(format: PixelFormat, page_factor: u32, bonus: i64) -> SlotKind {
    SlotKind {
        format,
        page_factor,
        bonus,
    }
}

const ALLOC4: [SlotKind; 4] = [
    kind(PixelFormat::Psm4, 1, 1),
    kind(PixelFormat::Psm4hh, 4, 2),
    kind(PixelFormat::Psm4hl, 4, 2),
    kind(PixelFormat::Psm32, 1, 0),
];

const ALLOC8: [SlotKind; 3] = [
    kind(PixelFormat::Psm8, 1, 1),
    kind(PixelFormat::Psm8h, 4, 2),
    kind(PixelFormat::Psm32, 1, 0),
];

const ALLOC16: [SlotKind; 2] = [kind(PixelFormat::Psm16, 1, 1), kind(PixelFormat::Psm32, 1, 0)];

const ALLOC24: [SlotKind; 2] = [kind(PixelFormat::Psm24, 1, 1), kind(PixelFormat::Psm32, 1, 0)];

const ALLOC32: [SlotKind; 1] = [kind(PixelFormat::Psm32, 1, 0)];

fn slot_kinds(format: PixelFormat) -> GsMemResult<&'static [SlotKind]> {
    match format {
        PixelFormat::Psm4 => Ok(&ALLOC4),
        PixelFormat::Psm8 | PixelFormat::Psm8h => Ok(&ALLOC8),
        PixelFormat::Psm16 => Ok(&ALLOC16),
        PixelFormat::Psm24 => Ok(&ALLOC24),
        PixelFormat::Psm32 => Ok(&ALLOC32),
        other => Err(GsMemError::UnsupportedFormat(other)),
    }
}

/// Result of a successful [`MemManager::alloc`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub slot: SlotId,
    pub word_addr: u32,
    /// Area that previously occupied the slot
    pub evicted: Option<AreaId>,
}

/// GS memory manager
///
/// Owns every slot, slot list and area; clients hold [`SlotId`]s and
/// [`AreaId`]s. Not thread-safe; one manager is driven from the frame loop.
#[derive(Debug, Default)]
pub struct MemManager {
    /// Slot table (`None` after `remove_all_slots`)
    slots: Vec<Option<MemSlot>>,

    /// Slot list table, indexed by `ListId`
    lists: Vec<SlotList>,

    /// Search order of `lists`: grouped by format, increasing page length
    order: Vec<ListId>,

    locked: SlotList,

    /// Area table (`None` after `remove_area`)
    areas: Vec<Option<MemArea>>,

    cur_frame: u32,
}

impl MemManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a manager with the configured slot layout
    pub fn from_config(config: &GsMemConfig) -> GsMemResult<Self> {
        let mut manager = Self::new();
        for slot in &config.slots {
            manager.add_slot(slot.first_page, slot.page_len, slot.format)?;
        }
        Ok(manager)
    }

    /// Add a slot of `page_len` pages starting at `first_page`
    ///
    /// # Errors
    ///
    /// [`GsMemError::SlotOutOfRange`] if the pages fall outside GS memory.
    pub fn add_slot(&mut self, first_page: u32, page_len: u32, format: PixelFormat) -> GsMemResult<SlotId> {
        let end = first_page.saturating_add(page_len);
        if end > TOTAL_PAGES {
            return Err(GsMemError::SlotOutOfRange {
                first: first_page,
                end,
                total: TOTAL_PAGES,
            });
        }

        let list = match self.find_list_of_type(format, page_len) {
            Some(list) => list,
            None => self.add_slot_list(format, page_len),
        };

        let id = self.slots.len();
        self.slots.push(Some(MemSlot::new(first_page, page_len, format, list)));
        self.lists[list].push_back(id);
        log::debug!(
            "Added slot {} [{}, {}) as {}",
            id,
            first_page,
            end,
            format
        );
        Ok(id)
    }

    fn find_list_of_type(&self, format: PixelFormat, page_len: u32) -> Option<ListId> {
        self.order
            .iter()
            .copied()
            .rev()
            .find(|id| self.lists[*id].format() == Some(format) && self.lists[*id].page_len() == page_len)
    }

    /// Insert a new list keeping formats grouped, smallest page length first
    fn add_slot_list(&mut self, format: PixelFormat, page_len: u32) -> ListId {
        let id = self.lists.len();
        self.lists.push(SlotList::new(format, page_len));

        let mut insert_at = self.order.len();
        let mut prev_format = None;
        for (index, list_id) in self.order.iter().enumerate() {
            let list = &self.lists[*list_id];
            let same_format = list.format() == Some(format);
            if (same_format && list.page_len() >= page_len) || (!same_format && prev_format == Some(format)) {
                insert_at = index;
                break;
            }
            prev_format = list.format();
        }
        self.order.insert(insert_at, id);
        id
    }

    pub fn slot(&self, id: SlotId) -> GsMemResult<&MemSlot> {
        self.slots
            .get(id)
            .and_then(Option::as_ref)
            .ok_or(GsMemError::UnknownSlot(id))
    }

    fn slot_mut(&mut self, id: SlotId) -> GsMemResult<&mut MemSlot> {
        self.slots
            .get_mut(id)
            .and_then(Option::as_mut)
            .ok_or(GsMemError::UnknownSlot(id))
    }

    fn list_mut(&mut self, list: ListRef) -> &mut SlotList {
        match list {
            ListRef::Normal(id) => &mut self.lists[id],
            ListRef::Locked => &mut self.locked,
        }
    }

    /// Unlocked slot lists in search order
    pub fn slot_lists(&self) -> impl Iterator<Item = &SlotList> + '_ {
        self.order.iter().map(|id| &self.lists[*id])
    }

    pub fn locked_slots(&self) -> &SlotList {
        &self.locked
    }

    /// Least recently used slot of the first list of `format` with at
    /// least `pages` pages
    pub fn find_lru_slot(&self, format: PixelFormat, pages: u32) -> Option<SlotId> {
        self.slot_lists()
            .filter(|list| list.format() == Some(format) && list.page_len() >= pages)
            .find_map(SlotList::lru)
    }

    /// Free priority of a slot for an area of `area_pages`
    pub fn free_priority(&self, slot: SlotId, area_pages: u32) -> GsMemResult<i64> {
        Ok(self.slot(slot)?.free_priority(area_pages, self.cur_frame))
    }

    pub fn cur_frame(&self) -> u32 {
        self.cur_frame
    }

    /// Start a new frame (stored as `frame + 1`)
    pub fn set_cur_frame(&mut self, frame: u32) {
        self.cur_frame = frame.saturating_add(1);
    }

    /// Register a client buffer
    pub fn add_area(&mut self, width: u32, height: u32, format: PixelFormat, alignment: Alignment) -> AreaId {
        let id = self.areas.len();
        self.areas.push(Some(MemArea::new(width, height, format, alignment)));
        id
    }

    /// Free and forget an area
    pub fn remove_area(&mut self, id: AreaId) -> GsMemResult<()> {
        self.free(id)?;
        self.areas[id] = None;
        Ok(())
    }

    pub fn area(&self, id: AreaId) -> GsMemResult<&MemArea> {
        self.areas
            .get(id)
            .and_then(Option::as_ref)
            .ok_or(GsMemError::UnknownArea(id))
    }

    fn area_mut(&mut self, id: AreaId) -> GsMemResult<&mut MemArea> {
        self.areas
            .get_mut(id)
            .and_then(Option::as_mut)
            .ok_or(GsMemError::UnknownArea(id))
    }

    /// Bind an area to the best available slot
    ///
    /// An area that is already resident is released first. Whatever area
    /// held the chosen slot is evicted and reported in
    /// [`Allocation::evicted`].
    ///
    /// # Errors
    ///
    /// [`GsMemError::UnsupportedFormat`] for formats without a strategy,
    /// [`GsMemError::Exhausted`] when no compatible slot exists.
    pub fn alloc(&mut self, id: AreaId) -> GsMemResult<Allocation> {
        let (format, pages) = {
            let area = self.area(id)?;
            (area.format(), area.page_len())
        };
        let kinds = slot_kinds(format)?;
        self.free(id)?;

        let mut best: Option<(SlotId, i64)> = None;
        for kind in kinds {
            let wanted = pages * kind.page_factor;
            let Some(slot) = self.find_lru_slot(kind.format, wanted) else {
                continue;
            };
            let priority = self.free_priority(slot, wanted)? + kind.bonus;
            if best.is_none_or(|(_, max)| priority > max) {
                best = Some((slot, priority));
            }
        }

        let Some((slot, priority)) = best else {
            log::error!("Failed to allocate a {} page GS mem slot for {}", pages, format);
            return Err(GsMemError::Exhausted { format, pages });
        };

        log::debug!("Area {} ({}, {} pages) -> slot {} (priority {})", id, format, pages, slot, priority);
        let evicted = self.bind(slot, id)?;
        Ok(Allocation {
            slot,
            word_addr: self.slot(slot)?.word_addr(),
            evicted,
        })
    }

    fn bind(&mut self, slot_id: SlotId, area_id: AreaId) -> GsMemResult<Option<AreaId>> {
        let evicted = self.slot(slot_id)?.bound_area();
        if let Some(old) = evicted {
            self.area_mut(old)?.unbind();
            log::debug!("Evicted area {} from slot {}", old, slot_id);
        }

        let (word_addr, format) = {
            let slot = self.slot_mut(slot_id)?;
            slot.set_bound_area(Some(area_id));
            (slot.word_addr(), slot.format())
        };
        self.area_mut(area_id)?.bind(slot_id, word_addr, format);
        self.record_access(slot_id)?;
        Ok(evicted)
    }

    /// Mark a slot used this frame and make it most recently used
    pub fn record_access(&mut self, slot_id: SlotId) -> GsMemResult<()> {
        let frame = self.cur_frame;
        let slot = self.slot_mut(slot_id)?;
        slot.set_last_frame_used(frame);
        let list = slot.list;
        if !self.list_mut(list).make_mru(slot_id) {
            return Err(GsMemError::SlotNotInList(slot_id));
        }
        Ok(())
    }

    fn unbind_slot(&mut self, slot_id: SlotId) -> GsMemResult<()> {
        let slot = self.slot_mut(slot_id)?;
        let Some(area) = slot.bound_area() else {
            return Ok(());
        };
        slot.set_bound_area(None);
        let list = slot.list;
        self.area_mut(area)?.unbind();
        if !self.list_mut(list).make_lru(slot_id) {
            return Err(GsMemError::SlotNotInList(slot_id));
        }
        log::debug!("Unbound area {} from slot {}", area, slot_id);
        Ok(())
    }

    /// Release an area's slot (no-op if not resident)
    ///
    /// The slot becomes the least recently used of its list.
    pub fn free(&mut self, id: AreaId) -> GsMemResult<()> {
        match self.area(id)?.slot() {
            Some(slot) => self.unbind_slot(slot),
            None => Ok(()),
        }
    }

    /// Whether the area is resident; a resident area is also touched
    pub fn is_allocated(&mut self, id: AreaId) -> GsMemResult<bool> {
        match self.area(id)?.slot() {
            Some(slot) => {
                self.record_access(slot)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// GS word address of an area
    ///
    /// # Errors
    ///
    /// [`GsMemError::NotAllocated`] if the area is neither resident nor
    /// has an overridden address.
    pub fn word_addr(&self, id: AreaId) -> GsMemResult<u32> {
        self.area(id)?
            .word_addr()
            .ok_or(GsMemError::NotAllocated(id))
    }

    /// Pin an area's reported word address (debugging and fixed buffers)
    pub fn set_word_addr(&mut self, id: AreaId, addr: u32) -> GsMemResult<()> {
        self.area_mut(id)?.addr_override = Some(addr);
        Ok(())
    }

    /// Drop an address set with [`set_word_addr`](Self::set_word_addr)
    pub fn clear_word_addr(&mut self, id: AreaId) -> GsMemResult<()> {
        self.area_mut(id)?.addr_override = None;
        Ok(())
    }

    /// Take a slot out of circulation
    ///
    /// # Errors
    ///
    /// [`GsMemError::AlreadyLocked`] if the slot is already locked.
    pub fn lock_slot(&mut self, slot_id: SlotId) -> GsMemResult<()> {
        let slot = self.slot_mut(slot_id)?;
        let ListRef::Normal(list) = slot.list else {
            return Err(GsMemError::AlreadyLocked(slot_id));
        };
        slot.list = ListRef::Locked;
        if !self.lists[list].remove(slot_id) {
            return Err(GsMemError::SlotNotInList(slot_id));
        }
        self.locked.push_back(slot_id);
        log::debug!("Locked slot {}", slot_id);
        Ok(())
    }

    /// Return a locked slot to its list (as least recently used)
    ///
    /// # Errors
    ///
    /// [`GsMemError::NotLocked`] if the slot is not locked.
    pub fn unlock_slot(&mut self, slot_id: SlotId) -> GsMemResult<()> {
        let (format, page_len) = {
            let slot = self.slot(slot_id)?;
            if !slot.is_locked() {
                return Err(GsMemError::NotLocked(slot_id));
            }
            (slot.format(), slot.page_len())
        };
        if !self.locked.remove(slot_id) {
            return Err(GsMemError::SlotNotInList(slot_id));
        }
        let list = match self.find_list_of_type(format, page_len) {
            Some(list) => list,
            None => self.add_slot_list(format, page_len),
        };
        self.lists[list].push_back(slot_id);
        self.slot_mut(slot_id)?.list = ListRef::Normal(list);
        log::debug!("Unlocked slot {}", slot_id);
        Ok(())
    }

    fn resident_slot(&self, id: AreaId) -> GsMemResult<SlotId> {
        self.area(id)?.slot().ok_or(GsMemError::NotAllocated(id))
    }

    /// Lock the slot holding an area
    pub fn lock_area(&mut self, id: AreaId) -> GsMemResult<()> {
        let slot = self.resident_slot(id)?;
        self.lock_slot(slot)
    }

    /// Unlock the slot holding an area
    pub fn unlock_area(&mut self, id: AreaId) -> GsMemResult<()> {
        let slot = self.resident_slot(id)?;
        self.unlock_slot(slot)
    }

    pub fn is_area_locked(&self, id: AreaId) -> GsMemResult<bool> {
        let slot = self.resident_slot(id)?;
        Ok(self.slot(slot)?.is_locked())
    }

    /// Discard every slot, unbinding all areas
    pub fn remove_all_slots(&mut self) {
        for area in self.areas.iter_mut().flatten() {
            area.unbind();
        }
        for slot in &mut self.slots {
            *slot = None;
        }
        self.lists.clear();
        self.order.clear();
        self.locked.clear();
        log::debug!("Removed all GS mem slots");
    }

    /// Snapshot of every slot, locked slots first
    pub fn allocation_report(&self) -> AllocationReport {
        let describe = |id: SlotId| {
            self.slot(id).ok().map(|slot| SlotReport {
                id,
                first_page: slot.first_page(),
                last_page: slot.last_page(),
                format: slot.format(),
                last_frame_used: slot.last_frame_used(),
                bound_area: slot.bound_area(),
            })
        };

        AllocationReport {
            cur_frame: self.cur_frame,
            locked: self.locked.iter().filter_map(describe).collect(),
            lists: self
                .slot_lists()
                .map(|list| SlotListReport {
                    format: list.format().unwrap_or(PixelFormat::Psm32),
                    page_len: list.page_len(),
                    slots: list.iter().filter_map(describe).collect(),
                })
                .collect(),
        }
    }
}

/// One slot in an [`AllocationReport`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotReport {
    pub id: SlotId,
    pub first_page: u32,
    pub last_page: u32,
    pub format: PixelFormat,
    pub last_frame_used: u32,
    pub bound_area: Option<AreaId>,
}

impl SlotReport {
    pub fn word_addr(&self) -> u32 {
        page_to_word_addr(self.first_page)
    }
}

impl fmt::Display for SlotReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:3}, {:3}]\t PixFormat: {}\t LastFrameUsed: {}\t{}",
            self.first_page,
            self.last_page,
            self.format,
            self.last_frame_used,
            if self.bound_area.is_some() { "bound" } else { "free " }
        )
    }
}

/// One unlocked slot list in an [`AllocationReport`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotListReport {
    pub format: PixelFormat,
    pub page_len: u32,
    pub slots: Vec<SlotReport>,
}

/// Printable / serializable view of the manager's slots
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationReport {
    pub cur_frame: u32,
    pub locked: Vec<SlotReport>,
    pub lists: Vec<SlotListReport>,
}

impl fmt::Display for AllocationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "GS Memory Allocation:")?;
        writeln!(f)?;
        writeln!(f, "Locked slots:")?;
        writeln!(f)?;
        for slot in &self.locked {
            writeln!(f, "{}", slot)?;
        }
        writeln!(f)?;
        writeln!(f, "Unlocked slots:")?;
        writeln!(f)?;
        for list in &self.lists {
            for slot in &list.slots {
                writeln!(f, "{}", slot)?;
            }
            if !list.slots.is_empty() {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
