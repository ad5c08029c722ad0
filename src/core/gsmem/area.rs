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

//! Memory areas
//!
//! An area is a client buffer (texture, framebuffer, ...) that needs GS
//! pages while it is in use. Its size in pages is fixed at creation from the
//! dimensions and pixel format.

use crate::core::gs::{div_up, PixelFormat, PAGE_HEIGHT_32, PAGE_WIDTH_32};

use super::SlotId;

/// Area handle (index into the manager's area table)
pub type AreaId = usize;

/// Requested placement granularity
///
/// Slots are always page aligned, so this is recorded but does not affect
/// placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    Block,
    #[default]
    Page,
}

/// Convert dimensions to those of a 32-bit buffer with the same footprint
pub fn xform_dimensions(format: PixelFormat, width: u32, height: u32) -> (u32, u32) {
    match format {
        PixelFormat::Psm4 => (div_up(width, 2), div_up(height, 4)),
        PixelFormat::Psm8 => (div_up(width, 2), div_up(height, 2)),
        PixelFormat::Psm16 | PixelFormat::Psm16s | PixelFormat::Psmz16 | PixelFormat::Psmz16s => {
            (width, div_up(height, 2))
        }
        // High formats alias 32-bit pixels
        _ => (width, height),
    }
}

/// Pages needed for a `width` x `height` buffer in `format`
pub fn page_count(format: PixelFormat, width: u32, height: u32) -> u32 {
    let (width32, height32) = xform_dimensions(format, width, height);
    div_up(width32, PAGE_WIDTH_32) * div_up(height32, PAGE_HEIGHT_32)
}

/// A client buffer that can be bound to a slot
#[derive(Debug, Clone)]
pub struct MemArea {
    width: u32,
    height: u32,
    format: PixelFormat,
    page_len: u32,
    alignment: Alignment,
    pub(crate) slot: Option<SlotId>,
    pub(crate) word_addr: u32,
    pub(crate) addr_override: Option<u32>,
    pub(crate) storage_format: Option<PixelFormat>,
}

impl MemArea {
    pub fn new(width: u32, height: u32, format: PixelFormat, alignment: Alignment) -> Self {
        Self {
            width,
            height,
            format,
            page_len: page_count(format, width, height),
            alignment,
            slot: None,
            word_addr: 0,
            addr_override: None,
            storage_format: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel format the area was created with
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Format of the slot the area is stored in, while bound
    pub fn storage_format(&self) -> Option<PixelFormat> {
        self.storage_format
    }

    pub fn page_len(&self) -> u32 {
        self.page_len
    }

    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    /// Slot holding the area, if resident
    pub fn slot(&self) -> Option<SlotId> {
        self.slot
    }

    /// GS word address, if resident or overridden
    ///
    /// An address set with `MemManager::set_word_addr` takes precedence.
    pub fn word_addr(&self) -> Option<u32> {
        self.addr_override
            .or_else(|| self.slot.map(|_| self.word_addr))
    }

    pub fn is_resident(&self) -> bool {
        self.slot.is_some()
    }

    pub(crate) fn bind(&mut self, slot: SlotId, word_addr: u32, storage_format: PixelFormat) {
        self.slot = Some(slot);
        self.word_addr = word_addr;
        self.storage_format = Some(storage_format);
    }

    pub(crate) fn unbind(&mut self) {
        self.slot = None;
        self.storage_format = None;
    }
}
