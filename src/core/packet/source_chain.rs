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

//! Source-chain packets
//!
//! A source chain is a sequence of DMA tags, each optionally followed by
//! data. Tags whose data follows them (`cnt`, `next`, `call`, `ret`, `end`)
//! are opened with a zero count and back-patched when the next tag is due:
//!
//! ```text
//! [tag qwc=?] [data ...] <- close_tag() writes qwc = data quads
//! ```
//!
//! With tag transfer (TTE) enabled the upper 64 bits of each tag are sent to
//! the peripheral, so the cursor only skips the lower half and the caller
//! fills the remaining 8 bytes.

use crate::core::config::CheckMode;
use crate::core::dma::{DmaChannel, DmaTag, DmaTransport, MemMapping, TagId, TagOptions};
use crate::core::error::{PacketError, PacketResult};

use super::{DmaPacket, PacketRecord, QWORD_BYTES};

/// Bytes of a tag the cursor always skips
const TAG_HALF_BYTES: usize = 8;

/// Quadword count written into a new tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagQwc {
    /// Open the tag; the count is patched in by `close_tag`
    Count,
    /// Fixed count, the tag is complete when written
    Fixed(u16),
}

/// Open/closed state of the most recent tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum TagState {
    #[default]
    Closed,
    Open {
        offset: usize,
    },
}

/// Command buffer with the source-chain tag protocol
#[derive(Debug)]
pub struct SourceChainPacket {
    packet: DmaPacket,
    tte: bool,
    tag: TagState,

    /// Bytes of a TTE tag's upper half that may still be filled without an
    /// open tag
    tte_bytes_left: usize,
}

impl SourceChainPacket {
    pub fn new(qwords: usize, channel: DmaChannel, tte: bool) -> Self {
        Self::from_packet(DmaPacket::new(qwords, channel), tte)
    }

    /// Wrap an existing command buffer
    pub fn from_packet(packet: DmaPacket, tte: bool) -> Self {
        Self {
            packet,
            tte,
            tag: TagState::Closed,
            tte_bytes_left: 0,
        }
    }

    /// Set the check mode (builder style)
    pub fn with_check_mode(mut self, mode: CheckMode) -> Self {
        self.packet.set_check_mode(mode);
        self
    }

    pub fn packet(&self) -> &DmaPacket {
        &self.packet
    }

    pub fn packet_mut(&mut self) -> &mut DmaPacket {
        &mut self.packet
    }

    pub fn into_packet(self) -> DmaPacket {
        self.packet
    }

    fn checked(&self) -> bool {
        self.packet.check_mode().is_checked()
    }

    /// Offset of the open tag, if any
    pub fn open_tag_offset(&self) -> Option<usize> {
        match self.tag {
            TagState::Open { offset } => Some(offset),
            TagState::Closed => None,
        }
    }

    fn write_tag(&mut self, id: TagId, qwc: TagQwc, addr: u32, options: TagOptions) -> PacketResult<()> {
        let offset = self.packet.offset();
        if self.checked() {
            if offset % QWORD_BYTES != 0 {
                return Err(PacketError::Misaligned {
                    offset,
                    required: QWORD_BYTES,
                });
            }
            if let TagState::Open { offset: open } = self.tag {
                return Err(PacketError::TagAlreadyOpen { offset: open });
            }
            if addr % QWORD_BYTES as u32 != 0 {
                return Err(PacketError::UnalignedAddress { address: addr });
            }
        }

        let count = match qwc {
            TagQwc::Count => 0,
            TagQwc::Fixed(n) => n,
        };
        let tag = DmaTag::new(id, count, addr, options);

        if self.tte {
            // Upper half is left for the caller (VIF codes etc.)
            let out = self.packet.claim(TAG_HALF_BYTES)?;
            out.copy_from_slice(&tag.low().to_le_bytes());
            self.tte_bytes_left = TAG_HALF_BYTES;
        } else {
            let out = self.packet.claim(QWORD_BYTES)?;
            tag.write_to(out);
        }

        self.tag = match qwc {
            TagQwc::Count => TagState::Open { offset },
            TagQwc::Fixed(_) => TagState::Closed,
        };
        log::trace!("{:?} tag at {:#x} (qwc {:?}, addr {:#010x})", id, offset, qwc, addr);
        Ok(())
    }

    fn close(&mut self) -> PacketResult<()> {
        let tag_offset = match self.tag {
            TagState::Open { offset } => offset,
            TagState::Closed => {
                if self.checked() {
                    return Err(PacketError::NoOpenTag);
                }
                return Ok(());
            }
        };

        let cursor = self.packet.offset();
        // The buffer was rewound under the open tag
        if cursor < tag_offset + TAG_HALF_BYTES {
            self.tag = TagState::Closed;
            return Err(PacketError::CursorBeforeOpen {
                open: tag_offset,
                cursor,
            });
        }
        if self.checked() && cursor % QWORD_BYTES != 0 {
            return Err(PacketError::Misaligned {
                offset: cursor,
                required: QWORD_BYTES,
            });
        }

        let qwords = ((cursor - tag_offset) / QWORD_BYTES).saturating_sub(1);
        let qwc = u16::try_from(qwords).map_err(|_| PacketError::TagLengthOverflow { qwords })?;
        self.packet
            .written_mut(tag_offset, 2)
            .copy_from_slice(&qwc.to_le_bytes());
        self.tag = TagState::Closed;
        log::trace!("Closed tag at {:#x} with {} qwords", tag_offset, qwords);
        Ok(())
    }

    fn check_data_allowed(&self, size: usize) -> PacketResult<()> {
        if self.checked() && self.tag == TagState::Closed && self.tte_bytes_left < size {
            return Err(PacketError::DataOutsideTag {
                offset: self.packet.offset(),
            });
        }
        Ok(())
    }

    fn add_record<T: PacketRecord>(&mut self, data: &T) -> PacketResult<()> {
        self.check_data_allowed(T::SIZE)?;
        self.packet.add(data)?;
        Ok(())
    }

    fn add_records<T: PacketRecord>(&mut self, data: &[T]) -> PacketResult<()> {
        self.check_data_allowed(T::SIZE * data.len())?;
        self.packet.add_slice(data)?;
        Ok(())
    }

    fn pad_until(&mut self, word: u32, target: usize) -> PacketResult<()> {
        let cursor = self.packet.offset();
        // Word padding can only reach the target from a word boundary
        if cursor % 4 != 0 {
            return Err(PacketError::Misaligned {
                offset: cursor,
                required: 4,
            });
        }
        while (self.packet.offset() + target) % QWORD_BYTES != 0 {
            self.add_record(&word)?;
        }
        Ok(())
    }

    fn reset_chain(&mut self) {
        self.packet.reset();
        self.tag = TagState::Closed;
        self.tte_bytes_left = 0;
    }
}

/// Fluent source-chain operations
///
/// Implemented by every packet built on a [`SourceChainPacket`]; each
/// operation returns the packet so calls can be chained with `?`.
pub trait ChainPacket: Sized {
    fn chain(&self) -> &SourceChainPacket;
    fn chain_mut(&mut self) -> &mut SourceChainPacket;

    /// Underlying command buffer
    fn packet(&self) -> &DmaPacket {
        &self.chain().packet
    }

    /// Append a record inside the open tag
    fn add<T: PacketRecord>(&mut self, data: &T) -> PacketResult<&mut Self> {
        self.chain_mut().add_record(data)?;
        Ok(self)
    }

    /// Append a run of records inside the open tag
    fn add_slice<T: PacketRecord>(&mut self, data: &[T]) -> PacketResult<&mut Self> {
        self.chain_mut().add_records(data)?;
        Ok(self)
    }

    /// Append the contents of another packet inside the open tag
    fn add_packet(&mut self, other: &DmaPacket) -> PacketResult<&mut Self> {
        let chain = self.chain_mut();
        chain.check_data_allowed(other.byte_len())?;
        chain.packet.add_packet(other)?;
        Ok(self)
    }

    /// Write an arbitrary tag
    fn tag(&mut self, id: TagId, qwc: TagQwc, addr: u32, options: TagOptions) -> PacketResult<&mut Self> {
        self.chain_mut().write_tag(id, qwc, addr, options)?;
        Ok(self)
    }

    /// Open a CNT tag: data follows, continue after it
    fn cnt(&mut self) -> PacketResult<&mut Self> {
        self.tag(TagId::Cnt, TagQwc::Count, 0, TagOptions::default())
    }

    /// Open a NEXT tag: data follows, continue at `addr`
    fn next(&mut self, addr: u32) -> PacketResult<&mut Self> {
        self.tag(TagId::Next, TagQwc::Count, addr, TagOptions::default())
    }

    /// REF tag: transfer `qwc` quads from `addr`
    fn reference(&mut self, addr: u32, qwc: u16) -> PacketResult<&mut Self> {
        self.tag(TagId::Ref, TagQwc::Fixed(qwc), addr, TagOptions::default())
    }

    /// REFS tag: transfer `qwc` quads from `addr` with stall control
    fn refs(&mut self, addr: u32, qwc: u16) -> PacketResult<&mut Self> {
        self.tag(TagId::Refs, TagQwc::Fixed(qwc), addr, TagOptions::default())
    }

    /// REFE tag: transfer `qwc` quads from `addr`, then end the chain
    fn refe(&mut self, addr: u32, qwc: u16) -> PacketResult<&mut Self> {
        self.tag(TagId::Refe, TagQwc::Fixed(qwc), addr, TagOptions::default())
    }

    /// Open a CALL tag to `addr`
    fn call(&mut self, addr: u32) -> PacketResult<&mut Self> {
        self.tag(TagId::Call, TagQwc::Count, addr, TagOptions::default())
    }

    /// Open a CALL tag to another chain packet's buffer
    fn call_packet<P: ChainPacket>(&mut self, target: &P) -> PacketResult<&mut Self> {
        let addr = MemMapping::physical(target.packet().dma_addr());
        self.call(addr)
    }

    /// Open a RET tag
    fn ret(&mut self) -> PacketResult<&mut Self> {
        self.tag(TagId::Ret, TagQwc::Count, 0, TagOptions::default())
    }

    /// Open an END tag
    fn end(&mut self) -> PacketResult<&mut Self> {
        self.tag(TagId::End, TagQwc::Count, 0, TagOptions::default())
    }

    /// Close the open tag, writing its quadword count
    fn close_tag(&mut self) -> PacketResult<&mut Self> {
        self.chain_mut().close()?;
        Ok(self)
    }

    /// Pad with `word` until the cursor is 12 bytes into a quadword
    fn pad96_with(&mut self, word: u32) -> PacketResult<&mut Self> {
        self.chain_mut().pad_until(word, 4)?;
        Ok(self)
    }

    /// Pad with `word` until the cursor is quadword aligned
    fn pad128_with(&mut self, word: u32) -> PacketResult<&mut Self> {
        self.chain_mut().pad_until(word, 0)?;
        Ok(self)
    }

    fn has_open_tag(&self) -> bool {
        self.chain().tag != TagState::Closed
    }

    fn tte(&self) -> bool {
        self.chain().tte
    }

    fn set_tte(&mut self, tte: bool) {
        self.chain_mut().tte = tte;
    }

    fn set_check_mode(&mut self, mode: CheckMode) {
        self.chain_mut().packet.set_check_mode(mode);
    }

    /// Rewind to an empty chain
    fn reset(&mut self) {
        self.chain_mut().reset_chain();
    }

    /// Send the chain
    ///
    /// # Errors
    ///
    /// In checked mode the chain must be non-empty, quadword sized, and
    /// have no open tag.
    fn send<T: DmaTransport + ?Sized>(&self, transport: &mut T, wait: bool, flush_cache: bool) -> PacketResult<()> {
        let chain = self.chain();
        if chain.checked() {
            if let TagState::Open { offset } = chain.tag {
                return Err(PacketError::OpenTagOnSend { offset });
            }
            chain.packet.check_sendable()?;
        }
        log::debug!(
            "Sending {} qword chain on {} (tte {})",
            chain.packet.qword_len(),
            chain.packet.channel(),
            chain.tte
        );
        transport.send_chain(
            chain.packet.channel(),
            chain.packet.as_bytes(),
            chain.tte,
            wait,
            flush_cache,
        )
    }
}

impl ChainPacket for SourceChainPacket {
    fn chain(&self) -> &SourceChainPacket {
        self
    }

    fn chain_mut(&mut self) -> &mut SourceChainPacket {
        self
    }
}
