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

//! Graphics Synthesizer definitions
//!
//! Pixel storage formats, local memory geometry, and the fixed-size register
//! records (GIF tag, A+D writes) that packet builders copy verbatim.
//!
//! # Local Memory
//!
//! | Unit  | Size       | 32-bit pixels |
//! |-------|------------|---------------|
//! | Block | 256 bytes  | 8x8           |
//! | Page  | 8 KB       | 64x32         |
//! | Total | 4 MB       | 512 pages     |
//!
//! GS addresses are expressed in 32-bit words; a page is 2048 words.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::packet::PacketRecord;

/// Size of a GS page in bytes
pub const PAGE_BYTES: u32 = 8192;

/// Size of a GS page in 32-bit words
pub const PAGE_WORDS: u32 = PAGE_BYTES / 4;

/// Width of a page in 32-bit pixels
pub const PAGE_WIDTH_32: u32 = 64;

/// Height of a page in 32-bit pixels
pub const PAGE_HEIGHT_32: u32 = 32;

/// Number of pages in GS local memory (4 MB)
pub const TOTAL_PAGES: u32 = 512;

/// Pixel storage mode (PSM)
///
/// Discriminants are the hardware encodings used in TEX0/FRAME/ZBUF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum PixelFormat {
    Psm32 = 0,
    Psm24 = 1,
    Psm16 = 2,
    Psm16s = 10,
    Psm8 = 19,
    Psm8h = 27,
    Psm4 = 20,
    Psm4hh = 44,
    Psm4hl = 36,
    Psmz32 = 48,
    Psmz24 = 49,
    Psmz16 = 50,
    Psmz16s = 58,
}

impl PixelFormat {
    /// All pixel formats, in hardware table order
    pub const ALL: [PixelFormat; 13] = [
        PixelFormat::Psm32,
        PixelFormat::Psm24,
        PixelFormat::Psm16,
        PixelFormat::Psm16s,
        PixelFormat::Psm8,
        PixelFormat::Psm8h,
        PixelFormat::Psm4,
        PixelFormat::Psm4hh,
        PixelFormat::Psm4hl,
        PixelFormat::Psmz32,
        PixelFormat::Psmz24,
        PixelFormat::Psmz16,
        PixelFormat::Psmz16s,
    ];

    /// Hardware encoding of this format
    #[inline(always)]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode a hardware PSM value
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|psm| psm.code() == code)
    }

    /// Bits of storage per pixel
    ///
    /// The "high" aliasing formats report their logical depth (8 or 4),
    /// even though they live inside 32-bit words.
    pub fn bits_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Psm32 | PixelFormat::Psmz32 => 32,
            PixelFormat::Psm24 | PixelFormat::Psmz24 => 24,
            PixelFormat::Psm16
            | PixelFormat::Psm16s
            | PixelFormat::Psmz16
            | PixelFormat::Psmz16s => 16,
            PixelFormat::Psm8 | PixelFormat::Psm8h => 8,
            PixelFormat::Psm4 | PixelFormat::Psm4hh | PixelFormat::Psm4hl => 4,
        }
    }

    /// Whether this is a depth buffer format
    pub fn is_depth(self) -> bool {
        matches!(
            self,
            PixelFormat::Psmz32 | PixelFormat::Psmz24 | PixelFormat::Psmz16 | PixelFormat::Psmz16s
        )
    }

    /// Short lowercase name (`psm32`, `psm4hh`, ...)
    pub fn name(self) -> &'static str {
        match self {
            PixelFormat::Psm32 => "psm32",
            PixelFormat::Psm24 => "psm24",
            PixelFormat::Psm16 => "psm16",
            PixelFormat::Psm16s => "psm16s",
            PixelFormat::Psm8 => "psm8",
            PixelFormat::Psm8h => "psm8h",
            PixelFormat::Psm4 => "psm4",
            PixelFormat::Psm4hh => "psm4hh",
            PixelFormat::Psm4hl => "psm4hl",
            PixelFormat::Psmz32 => "psmz32",
            PixelFormat::Psmz24 => "psmz24",
            PixelFormat::Psmz16 => "psmz16",
            PixelFormat::Psmz16s => "psmz16s",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PixelFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|psm| psm.name() == lower)
            .ok_or_else(|| format!("unknown pixel format '{}'", s))
    }
}

/// Integer division rounding up
#[inline(always)]
pub fn div_up(value: u32, divisor: u32) -> u32 {
    value.div_ceil(divisor)
}

/// Convert a page index to a GS word address
#[inline(always)]
pub fn page_to_word_addr(page: u32) -> u32 {
    page * PAGE_WORDS
}

/// GIF data format (FLG field)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GifFormat {
    Packed = 0,
    RegList = 1,
    Image = 2,
}

/// GIF register descriptor used in PACKED mode
pub mod gif_regs {
    pub const PRIM: u8 = 0x0;
    pub const RGBAQ: u8 = 0x1;
    pub const ST: u8 = 0x2;
    pub const UV: u8 = 0x3;
    pub const XYZF2: u8 = 0x4;
    pub const XYZ2: u8 = 0x5;
    pub const TEX0_1: u8 = 0x6;
    pub const TEX0_2: u8 = 0x7;
    pub const CLAMP_1: u8 = 0x8;
    pub const CLAMP_2: u8 = 0x9;
    pub const FOG: u8 = 0xA;
    pub const XYZF3: u8 = 0xC;
    pub const XYZ3: u8 = 0xD;
    pub const AD: u8 = 0xE;
    pub const NOP: u8 = 0xF;
}

/// GIF tag (128 bits)
///
/// Layout of the low doubleword:
/// - Bits 0-14: NLOOP
/// - Bit 15: EOP
/// - Bit 46: PRE
/// - Bits 47-57: PRIM
/// - Bits 58-59: FLG
/// - Bits 60-63: NREG
///
/// The high doubleword holds sixteen 4-bit register descriptors.
///
/// The packet builders never interpret these fields; the tag is payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GifTag {
    pub nloop: u16,
    pub eop: bool,
    pub pre: bool,
    pub prim: u16,
    pub flg: GifFormat,
    pub nreg: u8,
    pub regs: [u8; 16],
}

impl GifTag {
    /// Tag carrying `nloop` A+D register writes in PACKED mode
    pub fn ad(nloop: u16, eop: bool) -> Self {
        let mut regs = [0u8; 16];
        regs[0] = gif_regs::AD;
        Self {
            nloop,
            eop,
            pre: false,
            prim: 0,
            flg: GifFormat::Packed,
            nreg: 1,
            regs,
        }
    }

    /// Tag announcing `nloop` quadwords of IMAGE data
    pub fn image(nloop: u16, eop: bool) -> Self {
        Self {
            nloop,
            eop,
            pre: false,
            prim: 0,
            flg: GifFormat::Image,
            nreg: 0,
            regs: [0; 16],
        }
    }

    /// Encode the low doubleword
    pub fn low(&self) -> u64 {
        (self.nloop as u64 & 0x7FFF)
            | ((self.eop as u64) << 15)
            | ((self.pre as u64) << 46)
            | ((self.prim as u64 & 0x7FF) << 47)
            | ((self.flg as u64 & 0x3) << 58)
            | ((self.nreg as u64 & 0xF) << 60)
    }

    /// Encode the high doubleword
    pub fn high(&self) -> u64 {
        self.regs
            .iter()
            .enumerate()
            .fold(0u64, |acc, (i, &reg)| acc | ((reg as u64 & 0xF) << (i * 4)))
    }
}

impl PacketRecord for GifTag {
    const SIZE: usize = 16;

    fn write_to(&self, out: &mut [u8]) {
        out[0..8].copy_from_slice(&self.low().to_le_bytes());
        out[8..16].copy_from_slice(&self.high().to_le_bytes());
    }
}

/// A+D register write (data doubleword followed by the register address)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdWrite {
    pub data: u64,
    pub addr: u8,
}

impl AdWrite {
    pub fn new(addr: u8, data: u64) -> Self {
        Self { data, addr }
    }
}

impl PacketRecord for AdWrite {
    const SIZE: usize = 16;

    fn write_to(&self, out: &mut [u8]) {
        out[0..8].copy_from_slice(&self.data.to_le_bytes());
        out[8..16].copy_from_slice(&(self.addr as u64).to_le_bytes());
    }
}

/// GS register addresses used in A+D writes
pub mod reg_addrs {
    pub const PRIM: u8 = 0x00;
    pub const RGBAQ: u8 = 0x01;
    pub const TEX0_1: u8 = 0x06;
    pub const TEX0_2: u8 = 0x07;
    pub const FRAME_1: u8 = 0x4C;
    pub const FRAME_2: u8 = 0x4D;
    pub const ZBUF_1: u8 = 0x4E;
    pub const ZBUF_2: u8 = 0x4F;
    pub const BITBLTBUF: u8 = 0x50;
    pub const TRXPOS: u8 = 0x51;
    pub const TRXREG: u8 = 0x52;
    pub const TRXDIR: u8 = 0x53;
    pub const FINISH: u8 = 0x61;
}
