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

//! DMA packet builders
//!
//! Packets are fixed-capacity byte buffers, sized in quadwords, that are
//! filled front to back and handed to a [`DmaTransport`].
//!
//! Three layers build on each other:
//!
//! - [`DmaPacket`]: the command buffer (append records, reset, send)
//! - [`SourceChainPacket`]: adds the source-chain tag open/close protocol
//! - [`VifPacket`]: adds VIF codes, including UNPACK/DIRECT containers
//!
//! # Example
//!
//! ```
//! use ps2rx::core::dma::{DmaChannel, RecordingTransport};
//! use ps2rx::core::packet::{ChainPacket, SourceChainPacket};
//!
//! let mut packet = SourceChainPacket::new(8, DmaChannel::Vif1, false);
//! packet.cnt()?.add(&[1u32, 2, 3, 4])?.close_tag()?;
//! packet.end()?.close_tag()?;
//!
//! let mut transport = RecordingTransport::new();
//! packet.send(&mut transport, true, true)?;
//! assert_eq!(transport.sent()[0].data.len(), 48);
//! # Ok::<(), ps2rx::core::error::PacketError>(())
//! ```

use std::fmt;

use crate::core::config::CheckMode;
use crate::core::dma::{DmaChannel, DmaTransport, MemMapping};
use crate::core::error::{PacketError, PacketResult};

pub mod source_chain;
pub mod vif;

pub use source_chain::{ChainPacket, SourceChainPacket, TagQwc};
pub use vif::VifPacket;

#[cfg(test)]
mod tests;

/// Size of a quadword in bytes
pub const QWORD_BYTES: usize = 16;

/// A fixed-size record that can be copied into a packet
///
/// Implementors declare their exact byte size and write themselves in
/// little-endian order. Records of [`QWORD_BYTES`] are expected to start on
/// a quadword boundary.
pub trait PacketRecord {
    /// Encoded size in bytes
    const SIZE: usize;

    /// Write exactly `SIZE` bytes into `out`
    fn write_to(&self, out: &mut [u8]);
}

macro_rules! impl_record_le {
    ($($ty:ty),*) => {
        $(
            impl PacketRecord for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                #[inline(always)]
                fn write_to(&self, out: &mut [u8]) {
                    out.copy_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_record_le!(u8, u16, u32, u64, u128, i16, i32, i64, f32);

impl<T: PacketRecord, const N: usize> PacketRecord for [T; N] {
    const SIZE: usize = T::SIZE * N;

    fn write_to(&self, out: &mut [u8]) {
        for (item, chunk) in self.iter().zip(out.chunks_exact_mut(T::SIZE)) {
            item.write_to(chunk);
        }
    }
}

/// DMA command buffer
///
/// A buffer of `capacity` quadwords with a write cursor. Every append either
/// fits entirely or fails with [`PacketError::Overflow`]; the cursor never
/// leaves `[0, capacity * 16]`.
///
/// # Examples
///
/// ```
/// use ps2rx::core::dma::DmaChannel;
/// use ps2rx::core::packet::DmaPacket;
///
/// let mut packet = DmaPacket::new(2, DmaChannel::Gif);
/// packet.add(&0x1234_5678u32).unwrap();
/// assert_eq!(packet.byte_len(), 4);
///
/// packet.reset();
/// assert_eq!(packet.byte_len(), 0);
/// ```
pub struct DmaPacket {
    /// Backing storage, always a whole number of quadwords
    buffer: Vec<u8>,

    /// Write cursor (byte offset of the next append)
    cursor: usize,

    /// Channel the packet is sent on
    channel: DmaChannel,

    /// Memory mapping the buffer is accessed through
    mapping: MemMapping,

    /// EE address of the buffer's first byte, used as a tag target
    dma_addr: u32,

    check_mode: CheckMode,
}

impl DmaPacket {
    /// Create a packet with its own zeroed storage of `qwords` quadwords
    pub fn new(qwords: usize, channel: DmaChannel) -> Self {
        Self {
            buffer: vec![0u8; qwords * QWORD_BYTES],
            cursor: 0,
            channel,
            mapping: MemMapping::Normal,
            dma_addr: 0,
            check_mode: CheckMode::default(),
        }
    }

    /// Create a packet accessed through a specific memory mapping
    ///
    /// # Errors
    ///
    /// Uncached mappings require whole 64-byte cache lines; any other size
    /// fails with [`PacketError::CacheLineSize`].
    pub fn with_mapping(qwords: usize, channel: DmaChannel, mapping: MemMapping) -> PacketResult<Self> {
        Self::check_cache_lines(qwords, mapping)?;
        let mut packet = Self::new(qwords, channel);
        packet.mapping = mapping;
        Ok(packet)
    }

    /// Adopt caller-supplied storage
    ///
    /// With `is_full` the cursor starts at the end of the buffer, so the
    /// existing contents are sent as-is.
    ///
    /// # Errors
    ///
    /// The buffer must be a whole number of quadwords (and cache lines for
    /// uncached mappings).
    pub fn from_buffer(
        buffer: Vec<u8>,
        channel: DmaChannel,
        mapping: MemMapping,
        is_full: bool,
    ) -> PacketResult<Self> {
        if buffer.len() % QWORD_BYTES != 0 {
            return Err(PacketError::PartialQuadwords {
                bytes: buffer.len(),
            });
        }
        Self::check_cache_lines(buffer.len() / QWORD_BYTES, mapping)?;

        let cursor = if is_full { buffer.len() } else { 0 };
        Ok(Self {
            buffer,
            cursor,
            channel,
            mapping,
            dma_addr: 0,
            check_mode: CheckMode::default(),
        })
    }

    fn check_cache_lines(qwords: usize, mapping: MemMapping) -> PacketResult<()> {
        if mapping.is_uncached() && qwords % 4 != 0 {
            return Err(PacketError::CacheLineSize { qwords });
        }
        Ok(())
    }

    /// Append one record
    ///
    /// Returns the byte offset the record was written at.
    ///
    /// # Errors
    ///
    /// [`PacketError::Overflow`] if the record does not fit.
    pub fn add<T: PacketRecord>(&mut self, data: &T) -> PacketResult<usize> {
        self.warn_if_misaligned(T::SIZE);
        let offset = self.cursor;
        data.write_to(self.claim(T::SIZE)?);
        Ok(offset)
    }

    /// Append a run of records
    pub fn add_slice<T: PacketRecord>(&mut self, data: &[T]) -> PacketResult<usize> {
        self.warn_if_misaligned(T::SIZE);
        let offset = self.cursor;
        let out = self.claim(T::SIZE * data.len())?;
        for (item, chunk) in data.iter().zip(out.chunks_exact_mut(T::SIZE)) {
            item.write_to(chunk);
        }
        Ok(offset)
    }

    /// Append raw bytes
    pub fn add_bytes(&mut self, bytes: &[u8]) -> PacketResult<usize> {
        let offset = self.cursor;
        self.claim(bytes.len())?.copy_from_slice(bytes);
        Ok(offset)
    }

    /// Append the written contents of another packet
    ///
    /// # Errors
    ///
    /// In checked mode the source must hold a whole number of quadwords
    /// ([`PacketError::PartialQuadwords`]). Unchecked, a trailing partial
    /// quadword is dropped.
    pub fn add_packet(&mut self, other: &DmaPacket) -> PacketResult<usize> {
        let bytes = other.byte_len();
        if bytes % QWORD_BYTES != 0 {
            if self.check_mode.is_checked() {
                return Err(PacketError::PartialQuadwords { bytes });
            }
            log::warn!("Dropping {} trailing bytes of appended packet", bytes % QWORD_BYTES);
        }
        let whole = bytes - bytes % QWORD_BYTES;
        self.add_bytes(&other.buffer[..whole])
    }

    /// Overwrite a record at an earlier offset
    ///
    /// # Errors
    ///
    /// [`PacketError::Overflow`] if the record would extend past the cursor.
    pub fn patch<T: PacketRecord>(&mut self, offset: usize, data: &T) -> PacketResult<()> {
        let end = offset + T::SIZE;
        if end > self.cursor {
            return Err(PacketError::Overflow {
                requested: T::SIZE,
                available: self.cursor.saturating_sub(offset),
            });
        }
        data.write_to(&mut self.buffer[offset..end]);
        Ok(())
    }

    /// Reserve `len` bytes at the cursor and advance past them
    pub(crate) fn claim(&mut self, len: usize) -> PacketResult<&mut [u8]> {
        let available = self.buffer.len() - self.cursor;
        if len > available {
            return Err(PacketError::Overflow {
                requested: len,
                available,
            });
        }
        let start = self.cursor;
        self.cursor += len;
        Ok(&mut self.buffer[start..start + len])
    }

    /// Mutable view of already-written bytes, for back-patching
    pub(crate) fn written_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        &mut self.buffer[offset..offset + len]
    }

    fn warn_if_misaligned(&self, size: usize) {
        if size == QWORD_BYTES && self.check_mode.is_checked() && self.cursor % QWORD_BYTES != 0 {
            log::warn!(
                "Adding 16-byte data at offset {:#x}, which is not on a 16-byte boundary",
                self.cursor
            );
        }
    }

    /// Read a little-endian word of written data
    pub fn read_u32(&self, offset: usize) -> Option<u32> {
        let bytes = self.as_bytes().get(offset..offset + 4)?;
        Some(u32::from_le_bytes(bytes.try_into().ok()?))
    }

    /// Read a little-endian doubleword of written data
    pub fn read_u64(&self, offset: usize) -> Option<u64> {
        let bytes = self.as_bytes().get(offset..offset + 8)?;
        Some(u64::from_le_bytes(bytes.try_into().ok()?))
    }

    /// Move the cursor back to the start (contents are not cleared)
    #[inline(always)]
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Written bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..self.cursor]
    }

    /// Number of bytes written
    #[inline(always)]
    pub fn byte_len(&self) -> usize {
        self.cursor
    }

    /// Number of whole quadwords written
    #[inline(always)]
    pub fn qword_len(&self) -> usize {
        self.cursor / QWORD_BYTES
    }

    /// Current cursor position
    #[inline(always)]
    pub fn offset(&self) -> usize {
        self.cursor
    }

    /// Capacity in quadwords
    pub fn capacity_qwords(&self) -> usize {
        self.buffer.len() / QWORD_BYTES
    }

    /// Bytes still free
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.cursor
    }

    pub fn channel(&self) -> DmaChannel {
        self.channel
    }

    pub fn set_channel(&mut self, channel: DmaChannel) {
        self.channel = channel;
    }

    pub fn mapping(&self) -> MemMapping {
        self.mapping
    }

    /// EE address the buffer is mapped at
    pub fn dma_addr(&self) -> u32 {
        self.dma_addr
    }

    /// Set the EE address of the buffer (used when other chains call it)
    pub fn set_dma_addr(&mut self, addr: u32) {
        self.dma_addr = addr;
    }

    pub fn check_mode(&self) -> CheckMode {
        self.check_mode
    }

    pub fn set_check_mode(&mut self, mode: CheckMode) {
        self.check_mode = mode;
    }

    /// Replace the backing storage, returning the old one
    ///
    /// The cursor is kept, so the new buffer must be at least as large as
    /// the data written so far.
    ///
    /// # Errors
    ///
    /// [`PacketError::PartialQuadwords`] for a non-quadword buffer,
    /// [`PacketError::Overflow`] if it cannot hold the written data.
    pub fn swap_buffer(&mut self, buffer: Vec<u8>) -> PacketResult<Vec<u8>> {
        if buffer.len() % QWORD_BYTES != 0 {
            return Err(PacketError::PartialQuadwords {
                bytes: buffer.len(),
            });
        }
        if buffer.len() < self.cursor {
            return Err(PacketError::Overflow {
                requested: self.cursor,
                available: buffer.len(),
            });
        }
        Ok(std::mem::replace(&mut self.buffer, buffer))
    }

    /// Release the backing storage
    pub fn into_buffer(self) -> Vec<u8> {
        self.buffer
    }

    /// Send the packet in normal (non-chain) mode
    ///
    /// # Errors
    ///
    /// In checked mode the packet must be non-empty and a whole number of
    /// quadwords. Transport failures are passed through.
    pub fn send<T: DmaTransport + ?Sized>(&self, transport: &mut T, wait: bool) -> PacketResult<()> {
        if self.check_mode.is_checked() {
            self.check_sendable()?;
        }
        log::debug!(
            "Sending {} qword packet on {} (normal)",
            self.qword_len(),
            self.channel
        );
        transport.send_normal(self.channel, self.as_bytes(), wait)
    }

    pub(crate) fn check_sendable(&self) -> PacketResult<()> {
        if self.cursor % QWORD_BYTES != 0 {
            return Err(PacketError::Misaligned {
                offset: self.cursor,
                required: QWORD_BYTES,
            });
        }
        if self.cursor == 0 {
            return Err(PacketError::EmptyPacket);
        }
        Ok(())
    }

    /// Format the written contents as words, four per line
    ///
    /// `qwords == 0` dumps everything.
    pub fn hex_dump(&self, qwords: usize) -> String {
        let limit = if qwords == 0 {
            self.cursor
        } else {
            (qwords * QWORD_BYTES).min(self.cursor)
        };

        let mut out = format!("dumping {} words\n", self.cursor / 4);
        for (i, word) in self.buffer[..limit].chunks_exact(4).enumerate() {
            if i % 4 == 0 {
                out.push_str(&format!(
                    "\n0x{:08x}:  ",
                    self.dma_addr as usize + i * 4
                ));
            }
            let value = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
            out.push_str(&format!("0x{:08x} ", value));
        }
        out.push_str("\n\n");
        out
    }
}

impl fmt::Display for DmaPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex_dump(0))
    }
}

impl fmt::Debug for DmaPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DmaPacket")
            .field("channel", &self.channel)
            .field("mapping", &self.mapping)
            .field("dma_addr", &format_args!("{:#010x}", self.dma_addr))
            .field("byte_len", &self.cursor)
            .field("capacity_qwords", &self.capacity_qwords())
            .field("check_mode", &self.check_mode)
            .finish()
    }
}
