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

//! Custom assertions for packet and GS memory tests

use ps2rx::core::dma::{walk_chain, TagId};
use ps2rx::core::gsmem::MemManager;
use ps2rx::core::packet::DmaPacket;

/// Assert the tag sequence of a source chain as (id, qwc) pairs
#[allow(dead_code)]
pub fn assert_chain_tags(packet: &DmaPacket, tte: bool, expected: &[(TagId, u16)]) {
    let segments = walk_chain(packet.as_bytes(), tte).expect("chain should walk");
    let actual: Vec<_> = segments.iter().map(|s| (s.tag.id, s.tag.qwc)).collect();
    assert_eq!(actual, expected, "Chain tag mismatch");
}

/// Assert the word at a byte offset
#[allow(dead_code)]
pub fn assert_word(packet: &DmaPacket, offset: usize, expected: u32) {
    let actual = packet.read_u32(offset);
    assert_eq!(
        actual,
        Some(expected),
        "Word at 0x{:X} mismatch: expected 0x{:08X}, got {:?}",
        offset,
        expected,
        actual.map(|w| format!("0x{:08X}", w))
    );
}

/// Assert that bound slots and resident areas point at each other
#[allow(dead_code)]
pub fn assert_bindings_consistent(manager: &MemManager, areas: &[usize]) {
    for &id in areas {
        let area = manager.area(id).expect("area should exist");
        if let Some(slot) = area.slot() {
            let slot = manager.slot(slot).expect("slot should exist");
            assert_eq!(slot.bound_area(), Some(id), "Slot does not point back at area {}", id);
            assert_eq!(area.word_addr(), Some(slot.word_addr()));
        }
    }
}
