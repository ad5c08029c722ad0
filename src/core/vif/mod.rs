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

//! VIF code encoding
//!
//! A VIF code is one little-endian word:
//!
//! ```text
//!  31  30..24   23..16   15..0
//! IRQ   CMD      NUM    IMMEDIATE
//! ```
//!
//! UNPACK codes carry the unpack mode in the low nibble of CMD (with bit 4
//! selecting masked writes and bits 5-6 set), and the VU destination address
//! plus the unsigned / double-buffered flags in IMMEDIATE.

use bitflags::bitflags;

use crate::core::packet::PacketRecord;

#[cfg(test)]
mod tests;

/// Command field bits marking an UNPACK code
pub const UNPACK_CMD_BITS: u8 = 0x60;

/// VIF command opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Nop = 0,
    Stcycl = 1,
    Offset = 2,
    Base = 3,
    Itop = 4,
    Stmod = 5,
    Mskpath3 = 6,
    Mark = 7,
    Flushe = 16,
    Flush = 17,
    Flusha = 18,
    Mscal = 20,
    Mscalf = 21,
    Mscnt = 23,
    Stmask = 32,
    Strow = 48,
    Stcol = 49,
    Direct = 80,
    DirectHl = 81,
}

impl Opcode {
    /// Decode a command byte (IRQ bit ignored)
    ///
    /// Returns `None` for UNPACK commands and unknown values.
    pub fn from_cmd(cmd: u8) -> Option<Self> {
        let op = match cmd & 0x7F {
            0 => Opcode::Nop,
            1 => Opcode::Stcycl,
            2 => Opcode::Offset,
            3 => Opcode::Base,
            4 => Opcode::Itop,
            5 => Opcode::Stmod,
            6 => Opcode::Mskpath3,
            7 => Opcode::Mark,
            16 => Opcode::Flushe,
            17 => Opcode::Flush,
            18 => Opcode::Flusha,
            20 => Opcode::Mscal,
            21 => Opcode::Mscalf,
            23 => Opcode::Mscnt,
            32 => Opcode::Stmask,
            48 => Opcode::Strow,
            49 => Opcode::Stcol,
            80 => Opcode::Direct,
            81 => Opcode::DirectHl,
            _ => return None,
        };
        Some(op)
    }
}

/// UNPACK data layouts
///
/// The code is `vn << 2 | vl`, where `vn + 1` is the element count per
/// vector and `vl` selects 32/16/8-bit elements. `V4_5` packs a whole RGBA
/// 5:5:5:1 vector into 16 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum UnpackMode {
    S32 = 0,
    S16 = 1,
    S8 = 2,
    V2_32 = 4,
    V2_16 = 5,
    V2_8 = 6,
    V3_32 = 8,
    V3_16 = 9,
    V3_8 = 10,
    V4_32 = 12,
    V4_16 = 13,
    V4_8 = 14,
    V4_5 = 15,
}

impl UnpackMode {
    pub const ALL: [UnpackMode; 13] = [
        UnpackMode::S32,
        UnpackMode::S16,
        UnpackMode::S8,
        UnpackMode::V2_32,
        UnpackMode::V2_16,
        UnpackMode::V2_8,
        UnpackMode::V3_32,
        UnpackMode::V3_16,
        UnpackMode::V3_8,
        UnpackMode::V4_32,
        UnpackMode::V4_16,
        UnpackMode::V4_8,
        UnpackMode::V4_5,
    ];

    pub fn from_bits(bits: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| *mode as u8 == bits & 0xF)
    }

    /// Elements per vector minus one
    #[inline(always)]
    pub fn vn(self) -> u8 {
        (self as u8 & 0xC) >> 2
    }

    /// Element width selector (0 = 32, 1 = 16, 2 = 8 bits)
    #[inline(always)]
    pub fn vl(self) -> u8 {
        self as u8 & 0x3
    }

    /// Source bytes per unpacked quadword
    pub fn bytes_per_qword(self) -> usize {
        match self {
            UnpackMode::V4_5 => 2,
            _ => (4usize >> self.vl()) * (self.vn() as usize + 1),
        }
    }

    /// Source bytes per element (the alignment unpack data must keep)
    pub fn element_bytes(self) -> usize {
        match self {
            UnpackMode::V4_5 => 2,
            _ => 4usize >> self.vl(),
        }
    }
}

/// STMOD addition modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum AddMode {
    #[default]
    None = 0,
    Offset = 1,
    Accumulate = 2,
}

bitflags! {
    /// UNPACK variant flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct UnpackFlags: u8 {
        /// Apply the STMASK write mask
        const MASKED = 1 << 0;
        /// Zero-extend narrow elements instead of sign-extending
        const UNSIGNED = 1 << 1;
        /// Offset the destination by TOPS (double buffering)
        const DOUBLE_BUFFERED = 1 << 2;
    }
}

impl Default for UnpackFlags {
    fn default() -> Self {
        UnpackFlags::UNSIGNED
    }
}

/// A single VIF code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VifCode {
    pub immediate: u16,
    pub num: u8,
    /// Command byte without the IRQ bit
    pub cmd: u8,
    pub irq: bool,
}

impl VifCode {
    pub fn new(op: Opcode, immediate: u16, num: u8, irq: bool) -> Self {
        Self {
            immediate,
            num,
            cmd: op as u8,
            irq,
        }
    }

    /// UNPACK code with a zero count
    pub fn unpack(mode: UnpackMode, vu_addr: u16, flags: UnpackFlags, irq: bool) -> Self {
        let immediate = (vu_addr & 0x3FFF)
            | ((flags.contains(UnpackFlags::UNSIGNED) as u16) << 14)
            | ((flags.contains(UnpackFlags::DOUBLE_BUFFERED) as u16) << 15);
        let cmd = mode as u8 | ((flags.contains(UnpackFlags::MASKED) as u8) << 4) | UNPACK_CMD_BITS;
        Self {
            immediate,
            num: 0,
            cmd,
            irq,
        }
    }

    #[inline(always)]
    pub fn encode(&self) -> u32 {
        (self.immediate as u32)
            | ((self.num as u32) << 16)
            | (((self.cmd & 0x7F) as u32) << 24)
            | ((self.irq as u32) << 31)
    }

    #[inline(always)]
    pub fn decode(word: u32) -> Self {
        Self {
            immediate: (word & 0xFFFF) as u16,
            num: ((word >> 16) & 0xFF) as u8,
            cmd: ((word >> 24) & 0x7F) as u8,
            irq: (word >> 31) != 0,
        }
    }

    pub fn is_unpack(&self) -> bool {
        self.cmd & UNPACK_CMD_BITS == UNPACK_CMD_BITS
    }

    /// Unpack mode, for UNPACK codes
    pub fn unpack_mode(&self) -> Option<UnpackMode> {
        if self.is_unpack() {
            UnpackMode::from_bits(self.cmd)
        } else {
            None
        }
    }

    /// Opcode, for non-UNPACK codes
    pub fn opcode(&self) -> Option<Opcode> {
        if self.is_unpack() {
            None
        } else {
            Opcode::from_cmd(self.cmd)
        }
    }
}

impl PacketRecord for VifCode {
    const SIZE: usize = 4;

    fn write_to(&self, out: &mut [u8]) {
        out.copy_from_slice(&self.encode().to_le_bytes());
    }
}

/// STMASK write-mask table
///
/// Sixteen 2-bit fields, one per (row, element) of a 4x4 write block:
/// 0 writes data, 1 writes the row register, 2 the column register, 3 masks
/// the write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VifMask(pub u32);

impl VifMask {
    pub fn from_fields(fields: [u8; 16]) -> Self {
        let bits = fields
            .iter()
            .enumerate()
            .fold(0u32, |acc, (i, m)| acc | (((*m & 0x3) as u32) << (i * 2)));
        VifMask(bits)
    }

    /// Field `index` (0..16)
    pub fn field(&self, index: usize) -> u8 {
        ((self.0 >> ((index & 0xF) * 2)) & 0x3) as u8
    }
}

impl PacketRecord for VifMask {
    const SIZE: usize = 4;

    fn write_to(&self, out: &mut [u8]) {
        out.copy_from_slice(&self.0.to_le_bytes());
    }
}
