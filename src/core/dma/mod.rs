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

//! DMA (Direct Memory Access) Controller definitions
//!
//! This module describes the parts of the Emotion Engine DMAC that packet
//! builders need: channel ids, memory mappings, the source-chain tag format,
//! and the transport seam through which finished packets leave the library.
//!
//! # DMA Channels
//!
//! | Channel | Device      | Base Address |
//! |---------|-------------|--------------|
//! | 0       | VIF0        | 0x10008000   |
//! | 1       | VIF1        | 0x10009000   |
//! | 2       | GIF         | 0x1000A000   |
//! | 3       | fromIPU     | 0x1000B000   |
//! | 4       | toIPU       | 0x1000B400   |
//! | 5       | SIF0        | 0x1000C000   |
//! | 6       | SIF1        | 0x1000C400   |
//! | 7       | SIF2        | 0x1000C800   |
//! | 8       | fromSPR     | 0x1000D000   |
//! | 9       | toSPR       | 0x1000D400   |
//!
//! # Source Chain Tags
//!
//! In source-chain mode the DMAC follows a linked list of 128-bit tags:
//!
//! | Bits   | Field | Meaning                                   |
//! |--------|-------|-------------------------------------------|
//! | 0-15   | QWC   | Quadwords of data following/referenced    |
//! | 26-27  | PCE   | Priority control                          |
//! | 28-30  | ID    | Tag kind (refe, cnt, next, ref, ...)      |
//! | 31     | IRQ   | Interrupt on completion                   |
//! | 32-62  | ADDR  | Target address                            |
//! | 63     | SPR   | Address is in scratchpad                  |
//! | 64-127 | -     | Payload; transferred when TTE is set      |

use std::fmt;
use std::ops::Range;

use crate::core::error::{PacketError, PacketResult};
use crate::core::packet::PacketRecord;

#[cfg(test)]
mod tests;

/// DMA channel identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DmaChannel {
    Vif0 = 0,
    Vif1 = 1,
    Gif = 2,
    FromIpu = 3,
    ToIpu = 4,
    Sif0 = 5,
    Sif1 = 6,
    Sif2 = 7,
    FromSpr = 8,
    ToSpr = 9,
}

impl DmaChannel {
    /// Base address of the channel's register block
    pub fn register_base(self) -> u32 {
        match self {
            DmaChannel::Vif0 => 0x1000_8000,
            DmaChannel::Vif1 => 0x1000_9000,
            DmaChannel::Gif => 0x1000_A000,
            DmaChannel::FromIpu => 0x1000_B000,
            DmaChannel::ToIpu => 0x1000_B400,
            DmaChannel::Sif0 => 0x1000_C000,
            DmaChannel::Sif1 => 0x1000_C400,
            DmaChannel::Sif2 => 0x1000_C800,
            DmaChannel::FromSpr => 0x1000_D000,
            DmaChannel::ToSpr => 0x1000_D400,
        }
    }
}

impl fmt::Display for DmaChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DmaChannel::Vif0 => "vif0",
            DmaChannel::Vif1 => "vif1",
            DmaChannel::Gif => "gif",
            DmaChannel::FromIpu => "fromIPU",
            DmaChannel::ToIpu => "toIPU",
            DmaChannel::Sif0 => "sif0",
            DmaChannel::Sif1 => "sif1",
            DmaChannel::Sif2 => "sif2",
            DmaChannel::FromSpr => "fromSPR",
            DmaChannel::ToSpr => "toSPR",
        };
        f.write_str(name)
    }
}

/// EE memory mapping a packet buffer is accessed through
///
/// The mapping is OR'd into the upper address bits by the CPU; the DMAC always
/// sees the physical address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemMapping {
    #[default]
    Normal,
    Uncached,
    UncachedAccelerated,
    Scratchpad,
}

impl MemMapping {
    /// Segment bits for this mapping
    pub fn segment_bits(self) -> u32 {
        match self {
            MemMapping::Normal => 0x0000_0000,
            MemMapping::Uncached => 0x2000_0000,
            MemMapping::UncachedAccelerated => 0x3000_0000,
            MemMapping::Scratchpad => 0x7000_0000,
        }
    }

    /// Whether buffers in this mapping bypass the data cache
    pub fn is_uncached(self) -> bool {
        matches!(self, MemMapping::Uncached | MemMapping::UncachedAccelerated)
    }

    /// Strip any mapping bits from an address
    #[inline(always)]
    pub fn physical(address: u32) -> u32 {
        address & 0x0FFF_FFFF
    }
}

/// Source-chain tag kind (ID field)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TagId {
    /// Transfer QWC quadwords from ADDR, then end
    Refe = 0,
    /// Transfer QWC quadwords following the tag, continue after them
    Cnt = 1,
    /// Transfer QWC quadwords following the tag, continue at ADDR
    Next = 2,
    /// Transfer QWC quadwords from ADDR, continue after the tag
    Ref = 3,
    /// Like `Ref`, with stall control
    Refs = 4,
    /// Transfer following data, push return address, continue at ADDR
    Call = 5,
    /// Transfer following data, pop return address
    Ret = 6,
    /// Transfer following data, then end
    End = 7,
}

impl TagId {
    /// Decode the 3-bit ID field
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x7 {
            0 => TagId::Refe,
            1 => TagId::Cnt,
            2 => TagId::Next,
            3 => TagId::Ref,
            4 => TagId::Refs,
            5 => TagId::Call,
            6 => TagId::Ret,
            _ => TagId::End,
        }
    }

    /// Whether the tag's data follows it in the chain
    ///
    /// Reference tags point at data elsewhere in memory.
    pub fn carries_payload(self) -> bool {
        !matches!(self, TagId::Refe | TagId::Ref | TagId::Refs)
    }

    /// Whether the DMAC stops after this tag (absent a call stack)
    pub fn terminates(self) -> bool {
        matches!(self, TagId::Refe | TagId::End | TagId::Ret)
    }
}

/// Optional fields of a source-chain tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TagOptions {
    /// Raise an interrupt when this tag completes
    pub irq: bool,
    /// Priority control (2 bits)
    pub pce: u8,
    /// ADDR refers to scratchpad memory
    pub from_scratchpad: bool,
}

impl TagOptions {
    pub fn irq() -> Self {
        Self {
            irq: true,
            ..Self::default()
        }
    }
}

/// Source-chain DMA tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaTag {
    pub qwc: u16,
    pub pce: u8,
    pub id: TagId,
    pub irq: bool,
    pub addr: u32,
    pub spr: bool,
    /// Upper 64 bits (payload words, transferred only with TTE)
    pub opt: [u32; 2],
}

impl DmaTag {
    /// Build a tag with no payload words
    pub fn new(id: TagId, qwc: u16, addr: u32, options: TagOptions) -> Self {
        Self {
            qwc,
            pce: options.pce,
            id,
            irq: options.irq,
            addr,
            spr: options.from_scratchpad,
            opt: [0; 2],
        }
    }

    /// Encode the low doubleword (the tag proper)
    pub fn low(&self) -> u64 {
        (self.qwc as u64)
            | ((self.pce as u64 & 0x3) << 26)
            | ((self.id as u64) << 28)
            | ((self.irq as u64) << 31)
            | ((self.addr as u64 & 0x7FFF_FFFF) << 32)
            | ((self.spr as u64) << 63)
    }

    /// Decode a tag from its low doubleword and payload words
    pub fn from_parts(low: u64, opt: [u32; 2]) -> Self {
        Self {
            qwc: (low & 0xFFFF) as u16,
            pce: ((low >> 26) & 0x3) as u8,
            id: TagId::from_bits(((low >> 28) & 0x7) as u8),
            irq: (low >> 31) & 1 != 0,
            addr: ((low >> 32) & 0x7FFF_FFFF) as u32,
            spr: (low >> 63) != 0,
            opt,
        }
    }

    /// Decode a tag from 16 little-endian bytes
    ///
    /// Returns `None` if fewer than 16 bytes are supplied.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let quad: &[u8; 16] = bytes.get(..16)?.try_into().ok()?;
        let low = u64::from_le_bytes(quad[0..8].try_into().ok()?);
        let opt0 = u32::from_le_bytes(quad[8..12].try_into().ok()?);
        let opt1 = u32::from_le_bytes(quad[12..16].try_into().ok()?);
        Some(Self::from_parts(low, [opt0, opt1]))
    }
}

impl PacketRecord for DmaTag {
    const SIZE: usize = 16;

    fn write_to(&self, out: &mut [u8]) {
        out[0..8].copy_from_slice(&self.low().to_le_bytes());
        out[8..12].copy_from_slice(&self.opt[0].to_le_bytes());
        out[12..16].copy_from_slice(&self.opt[1].to_le_bytes());
    }
}

/// How a packet is handed to the DMAC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Normal mode: a flat run of quadwords
    Normal,
    /// Source-chain mode, optionally transferring the tags themselves
    Chain { tte: bool },
}

/// Transport collaborator that moves finished packets to the hardware
///
/// Implementations own whatever device access is needed (kernel driver,
/// emulator bus, or a recorder for tests). `wait` asks the call to block until
/// the channel reports completion.
pub trait DmaTransport {
    /// Send a normal-mode packet
    fn send_normal(&mut self, channel: DmaChannel, data: &[u8], wait: bool) -> PacketResult<()>;

    /// Send a source-chain packet
    fn send_chain(
        &mut self,
        channel: DmaChannel,
        data: &[u8],
        tte: bool,
        wait: bool,
        flush_cache: bool,
    ) -> PacketResult<()>;
}

/// A packet captured by [`RecordingTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPacket {
    pub channel: DmaChannel,
    pub mode: TransferMode,
    pub data: Vec<u8>,
    pub wait: bool,
    pub flush_cache: bool,
}

/// Host transport that records every packet it is given
///
/// # Examples
///
/// ```
/// use ps2rx::core::dma::{DmaChannel, DmaTransport, RecordingTransport};
///
/// let mut transport = RecordingTransport::new();
/// transport.send_normal(DmaChannel::Gif, &[0u8; 16], true).unwrap();
/// assert_eq!(transport.sent().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Vec<SentPacket>,
    rejected_channel: Option<DmaChannel>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every packet sent on `channel`
    pub fn reject_channel(&mut self, channel: DmaChannel) {
        self.rejected_channel = Some(channel);
    }

    /// Packets sent so far, oldest first
    pub fn sent(&self) -> &[SentPacket] {
        &self.sent
    }

    /// Most recently sent packet
    pub fn last(&self) -> Option<&SentPacket> {
        self.sent.last()
    }

    pub fn clear(&mut self) {
        self.sent.clear();
    }

    fn record(
        &mut self,
        channel: DmaChannel,
        mode: TransferMode,
        data: &[u8],
        wait: bool,
        flush_cache: bool,
    ) -> PacketResult<()> {
        if self.rejected_channel == Some(channel) {
            return Err(PacketError::Transport(format!(
                "channel {} is not available",
                channel
            )));
        }

        log::debug!(
            "DMA {} {:?} transfer: {} qwords (wait={})",
            channel,
            mode,
            data.len() / 16,
            wait
        );

        self.sent.push(SentPacket {
            channel,
            mode,
            data: data.to_vec(),
            wait,
            flush_cache,
        });
        Ok(())
    }
}

impl DmaTransport for RecordingTransport {
    fn send_normal(&mut self, channel: DmaChannel, data: &[u8], wait: bool) -> PacketResult<()> {
        self.record(channel, TransferMode::Normal, data, wait, false)
    }

    fn send_chain(
        &mut self,
        channel: DmaChannel,
        data: &[u8],
        tte: bool,
        wait: bool,
        flush_cache: bool,
    ) -> PacketResult<()> {
        self.record(channel, TransferMode::Chain { tte }, data, wait, flush_cache)
    }
}

/// One tag visited by [`walk_chain`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSegment {
    /// Byte offset of the tag in the buffer
    pub offset: usize,
    /// Decoded tag
    pub tag: DmaTag,
    /// Bytes of in-buffer data that travel with this tag
    ///
    /// Empty for reference tags. With TTE the range starts 8 bytes into the
    /// tag's own quadword.
    pub payload: Range<usize>,
}

/// Walk the tags of a source chain in buffer order
///
/// This is a layout walk, not a DMAC emulation: `next` and `call` targets are
/// not followed, each tag's in-buffer data is skipped using its QWC. The walk
/// stops after a terminating tag (`refe`, `ret`, `end`) or at the end of the
/// buffer.
///
/// # Errors
///
/// Returns [`PacketError::Overflow`] if a tag or its declared data runs past
/// the end of `bytes`.
pub fn walk_chain(bytes: &[u8], tte: bool) -> PacketResult<Vec<ChainSegment>> {
    let mut segments = Vec::new();
    let mut offset = 0usize;

    while offset < bytes.len() {
        let tag = DmaTag::from_bytes(&bytes[offset..]).ok_or(PacketError::Overflow {
            requested: 16,
            available: bytes.len() - offset,
        })?;

        let data_start = offset + 16;
        let payload = if tag.id.carries_payload() {
            let end = data_start + tag.qwc as usize * 16;
            if end > bytes.len() {
                return Err(PacketError::Overflow {
                    requested: end - data_start,
                    available: bytes.len() - data_start,
                });
            }
            let start = if tte { offset + 8 } else { data_start };
            start..end
        } else if tte {
            offset + 8..data_start
        } else {
            data_start..data_start
        };

        log::trace!(
            "chain tag at {:#06x}: {:?} qwc={} addr={:#010x}",
            offset,
            tag.id,
            tag.qwc,
            tag.addr
        );

        let tag_offset = offset;
        offset = payload.end.max(data_start);
        let terminates = tag.id.terminates();
        segments.push(ChainSegment {
            offset: tag_offset,
            tag,
            payload,
        });

        if terminates {
            break;
        }
    }

    Ok(segments)
}
