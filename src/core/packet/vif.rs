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

//! VIF source-chain packets
//!
//! Adds VIF codes on top of the source-chain protocol. UNPACK and DIRECT
//! codes open a container whose length is back-patched on close; only one
//! container may be open at a time.
//!
//! # Example
//!
//! ```
//! use ps2rx::core::dma::DmaChannel;
//! use ps2rx::core::packet::{ChainPacket, VifPacket};
//! use ps2rx::core::vif::{UnpackFlags, UnpackMode};
//!
//! let mut packet = VifPacket::new(16, DmaChannel::Vif1, true);
//! packet.cnt()?;
//! packet.set_cycle(1, 1, false)?.nop(false)?;
//! packet.open_unpack(UnpackMode::V4_32, 0, UnpackFlags::default(), false)?;
//! packet.add(&[1.0f32, 2.0, 3.0, 4.0])?;
//! packet.close_unpack()?.pad128()?;
//! packet.close_tag()?;
//! # Ok::<(), ps2rx::core::error::PacketError>(())
//! ```

use crate::core::config::{FillPolicy, PacketConfig};
use crate::core::dma::DmaChannel;
use crate::core::error::{PacketError, PacketResult};
use crate::core::vif::{AddMode, Opcode, UnpackFlags, UnpackMode, VifCode, VifMask};

use super::source_chain::{ChainPacket, SourceChainPacket};
use super::{DmaPacket, QWORD_BYTES};

/// Largest UNPACK count (encoded as 0)
pub const MAX_UNPACK_NUM: usize = 256;

/// Largest DIRECT/DIRECTHL quadword count (encoded as 0)
pub const MAX_DIRECT_QWORDS: usize = 65536;

/// Open VIF container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum VifState {
    #[default]
    Idle,
    Unpack {
        offset: usize,
        mode: UnpackMode,
    },
    Direct {
        offset: usize,
        hl: bool,
    },
}

impl VifState {
    fn name(&self) -> &'static str {
        match self {
            VifState::Idle => "none",
            VifState::Unpack { .. } => "UNPACK",
            VifState::Direct { hl: false, .. } => "DIRECT",
            VifState::Direct { hl: true, .. } => "DIRECTHL",
        }
    }
}

/// Source-chain packet carrying VIF codes
#[derive(Debug)]
pub struct VifPacket {
    chain: SourceChainPacket,
    open_code: VifState,
    wl: u8,
    cl: u8,
    fill_policy: FillPolicy,
}

impl VifPacket {
    pub fn new(qwords: usize, channel: DmaChannel, tte: bool) -> Self {
        Self::from_chain(SourceChainPacket::new(qwords, channel, tte))
    }

    /// Build from configuration (capacity, TTE, check mode, fill policy)
    pub fn with_config(channel: DmaChannel, config: &PacketConfig) -> Self {
        let chain = SourceChainPacket::new(config.default_qwords, channel, config.tte)
            .with_check_mode(config.check_mode);
        let mut packet = Self::from_chain(chain);
        packet.fill_policy = config.unpack_fill_policy;
        packet
    }

    /// Wrap an existing command buffer
    pub fn from_packet(packet: DmaPacket, tte: bool) -> Self {
        Self::from_chain(SourceChainPacket::from_packet(packet, tte))
    }

    fn from_chain(chain: SourceChainPacket) -> Self {
        Self {
            chain,
            open_code: VifState::Idle,
            wl: 1,
            cl: 1,
            fill_policy: FillPolicy::default(),
        }
    }

    pub fn into_packet(self) -> DmaPacket {
        self.chain.into_packet()
    }

    pub fn fill_policy(&self) -> FillPolicy {
        self.fill_policy
    }

    pub fn set_fill_policy(&mut self, policy: FillPolicy) {
        self.fill_policy = policy;
    }

    /// Write cycle (WL, CL) used to count UNPACK data
    pub fn cycle(&self) -> (u8, u8) {
        (self.wl, self.cl)
    }

    pub fn has_open_code(&self) -> bool {
        self.open_code != VifState::Idle
    }

    fn checked(&self) -> bool {
        self.chain.packet().check_mode().is_checked()
    }

    fn code(&mut self, code: VifCode) -> PacketResult<&mut Self> {
        log::trace!("VIF code {:#010x} at {:#x}", code.encode(), self.chain.packet().offset());
        self.add(&code)
    }

    fn simple(&mut self, op: Opcode, immediate: u16, irq: bool) -> PacketResult<&mut Self> {
        self.code(VifCode::new(op, immediate, 0, irq))
    }

    pub fn nop(&mut self, irq: bool) -> PacketResult<&mut Self> {
        self.simple(Opcode::Nop, 0, irq)
    }

    /// STCYCL: set write length and cycle length
    #[doc(alias = "STCYCL")]
    pub fn set_cycle(&mut self, wl: u8, cl: u8, irq: bool) -> PacketResult<&mut Self> {
        self.wl = wl;
        self.cl = cl;
        self.simple(Opcode::Stcycl, cl as u16 | ((wl as u16) << 8), irq)
    }

    #[doc(alias = "OFFSET")]
    pub fn set_offset(&mut self, offset: u16, irq: bool) -> PacketResult<&mut Self> {
        self.simple(Opcode::Offset, offset, irq)
    }

    #[doc(alias = "BASE")]
    pub fn set_base(&mut self, base: u16, irq: bool) -> PacketResult<&mut Self> {
        self.simple(Opcode::Base, base, irq)
    }

    #[doc(alias = "ITOP")]
    pub fn set_itop(&mut self, itop: u16, irq: bool) -> PacketResult<&mut Self> {
        self.simple(Opcode::Itop, itop, irq)
    }

    #[doc(alias = "STMOD")]
    pub fn set_mode(&mut self, mode: AddMode, irq: bool) -> PacketResult<&mut Self> {
        self.simple(Opcode::Stmod, mode as u16, irq)
    }

    #[doc(alias = "MSKPATH3")]
    pub fn mask_path3(&mut self, masked: bool, irq: bool) -> PacketResult<&mut Self> {
        self.simple(Opcode::Mskpath3, (masked as u16) << 15, irq)
    }

    #[doc(alias = "MARK")]
    pub fn mark(&mut self, value: u16, irq: bool) -> PacketResult<&mut Self> {
        self.simple(Opcode::Mark, value, irq)
    }

    /// FLUSHE: wait for the current microprogram to end
    #[doc(alias = "FLUSHE")]
    pub fn flush_exec(&mut self, irq: bool) -> PacketResult<&mut Self> {
        self.simple(Opcode::Flushe, 0, irq)
    }

    /// FLUSH: wait for the microprogram and GIF paths 1/2
    pub fn flush(&mut self, irq: bool) -> PacketResult<&mut Self> {
        self.simple(Opcode::Flush, 0, irq)
    }

    /// FLUSHA: wait for the microprogram and all GIF paths
    #[doc(alias = "FLUSHA")]
    pub fn flush_all(&mut self, irq: bool) -> PacketResult<&mut Self> {
        self.simple(Opcode::Flusha, 0, irq)
    }

    /// MSCAL: start the microprogram at `addr`
    #[doc(alias = "MSCAL")]
    pub fn call_micro(&mut self, addr: u16, irq: bool) -> PacketResult<&mut Self> {
        self.simple(Opcode::Mscal, addr, irq)
    }

    /// MSCNT: continue the microprogram at the address it stopped at
    #[doc(alias = "MSCNT")]
    pub fn continue_micro(&mut self, irq: bool) -> PacketResult<&mut Self> {
        self.simple(Opcode::Mscnt, 0, irq)
    }

    /// MSCALF: start the microprogram at `addr` once GIF paths are idle
    #[doc(alias = "MSCALF")]
    pub fn call_micro_flushed(&mut self, addr: u16, irq: bool) -> PacketResult<&mut Self> {
        self.simple(Opcode::Mscalf, addr, irq)
    }

    #[doc(alias = "STMASK")]
    pub fn set_mask(&mut self, mask: VifMask, irq: bool) -> PacketResult<&mut Self> {
        self.simple(Opcode::Stmask, 0, irq)?.add(&mask)
    }

    #[doc(alias = "STROW")]
    pub fn set_row(&mut self, row: [u32; 4], irq: bool) -> PacketResult<&mut Self> {
        self.simple(Opcode::Strow, 0, irq)?.add(&row)
    }

    #[doc(alias = "STCOL")]
    pub fn set_col(&mut self, col: [u32; 4], irq: bool) -> PacketResult<&mut Self> {
        self.simple(Opcode::Stcol, 0, irq)?.add(&col)
    }

    fn check_idle(&self) -> PacketResult<()> {
        if self.checked() {
            match self.open_code {
                VifState::Idle => {}
                VifState::Unpack { offset, .. } | VifState::Direct { offset, .. } => {
                    return Err(PacketError::VifCodeAlreadyOpen { offset });
                }
            }
        }
        Ok(())
    }

    /// Open an UNPACK to VU memory address `vu_addr`
    ///
    /// Data appended until [`close_unpack`](Self::close_unpack) is counted
    /// into the code's NUM field.
    pub fn open_unpack(
        &mut self,
        mode: UnpackMode,
        vu_addr: u16,
        flags: UnpackFlags,
        irq: bool,
    ) -> PacketResult<&mut Self> {
        self.check_idle()?;
        let offset = self.chain.packet().offset();
        self.code(VifCode::unpack(mode, vu_addr, flags, irq))?;
        self.open_code = VifState::Unpack { offset, mode };
        Ok(self)
    }

    /// Open UNPACK offset and mode, or `None` when unchecked and nothing
    /// usable is open
    fn open_unpack_state(&self) -> PacketResult<Option<(usize, UnpackMode)>> {
        match self.open_code {
            VifState::Unpack { offset, mode } => Ok(Some((offset, mode))),
            _ if !self.checked() => Ok(None),
            VifState::Idle => Err(PacketError::NoOpenVifCode),
            other => Err(PacketError::VifCodeMismatch {
                expected: "UNPACK",
                found: other.name(),
            }),
        }
    }

    /// Fail if the buffer was rewound past the open code
    fn check_open_offset(&mut self, offset: usize) -> PacketResult<()> {
        let cursor = self.chain.packet().offset();
        if cursor < offset + 4 {
            self.open_code = VifState::Idle;
            return Err(PacketError::CursorBeforeOpen {
                open: offset,
                cursor,
            });
        }
        Ok(())
    }

    /// Close the open UNPACK, counting the data written since it opened
    ///
    /// With a filling-write cycle (CL < WL) the count is in written
    /// quadwords: every CL data quads become a WL-quad block. When the data
    /// ends exactly on a block boundary the [`FillPolicy`] decides whether
    /// the final block is written out in full.
    pub fn close_unpack(&mut self) -> PacketResult<&mut Self> {
        let Some((offset, mode)) = self.open_unpack_state()? else {
            return Ok(self);
        };

        let cursor = self.chain.packet().offset();
        let data_bytes = cursor.saturating_sub(offset + 4);
        let element_bytes = mode.element_bytes();
        if self.checked() && data_bytes % element_bytes != 0 {
            return Err(PacketError::Misaligned {
                offset: cursor,
                required: element_bytes,
            });
        }

        let data_qwords = data_bytes / mode.bytes_per_qword();
        let num = self.written_qwords(data_qwords);
        self.close_unpack_num(num)
    }

    fn written_qwords(&self, data_qwords: usize) -> usize {
        let (wl, cl) = (self.wl as usize, self.cl as usize);
        if cl == 0 || cl >= wl {
            return data_qwords;
        }

        let blocks = data_qwords / cl;
        let last = data_qwords % cl;
        let num = blocks * wl + last;
        match self.fill_policy {
            FillPolicy::StopAfterData if last == 0 && blocks > 0 => num - (wl - cl),
            _ => num,
        }
    }

    /// Close the open UNPACK with an explicit NUM
    pub fn close_unpack_num(&mut self, num: usize) -> PacketResult<&mut Self> {
        let Some((offset, _)) = self.open_unpack_state()? else {
            return Ok(self);
        };
        self.check_open_offset(offset)?;
        let cursor = self.chain.packet().offset();
        if self.checked() && cursor % 4 != 0 {
            return Err(PacketError::Misaligned {
                offset: cursor,
                required: 4,
            });
        }
        if num > MAX_UNPACK_NUM {
            return Err(PacketError::VifCountTooLarge {
                count: num,
                max: MAX_UNPACK_NUM,
            });
        }

        // NUM lives in bits 16..24 of the code
        self.chain.packet_mut().written_mut(offset + 2, 1)[0] = (num % MAX_UNPACK_NUM) as u8;
        self.open_code = VifState::Idle;
        log::debug!("Closed UNPACK at {:#x} with num {}", offset, num);
        Ok(self)
    }

    /// Set the write cycle, then close the open UNPACK
    pub fn close_unpack_with_cycle(&mut self, wl: u8, cl: u8) -> PacketResult<&mut Self> {
        self.wl = wl;
        self.cl = cl;
        self.close_unpack()
    }

    /// Open a DIRECT (GIF path 2) container
    pub fn open_direct(&mut self, irq: bool) -> PacketResult<&mut Self> {
        self.open_direct_kind(false, irq)
    }

    /// Open a DIRECTHL container
    pub fn open_direct_hl(&mut self, irq: bool) -> PacketResult<&mut Self> {
        self.open_direct_kind(true, irq)
    }

    fn open_direct_kind(&mut self, hl: bool, irq: bool) -> PacketResult<&mut Self> {
        self.check_idle()?;
        let offset = self.chain.packet().offset();
        let op = if hl { Opcode::DirectHl } else { Opcode::Direct };
        self.simple(op, 0, irq)?;
        self.open_code = VifState::Direct { offset, hl };
        Ok(self)
    }

    fn open_direct_state(&self) -> PacketResult<Option<usize>> {
        match self.open_code {
            VifState::Direct { offset, .. } => Ok(Some(offset)),
            _ if !self.checked() => Ok(None),
            VifState::Idle => Err(PacketError::NoOpenVifCode),
            other => Err(PacketError::VifCodeMismatch {
                expected: "DIRECT",
                found: other.name(),
            }),
        }
    }

    /// Close the open DIRECT, counting the quadwords written since it opened
    pub fn close_direct(&mut self) -> PacketResult<&mut Self> {
        let Some(offset) = self.open_direct_state()? else {
            return Ok(self);
        };
        let cursor = self.chain.packet().offset();
        let bytes = cursor.saturating_sub(offset + 4);
        if self.checked() && bytes % QWORD_BYTES != 0 {
            return Err(PacketError::Misaligned {
                offset: cursor,
                required: QWORD_BYTES,
            });
        }
        self.close_direct_quads(bytes / QWORD_BYTES)
    }

    /// Close the open DIRECT with an explicit quadword count
    pub fn close_direct_quads(&mut self, qwords: usize) -> PacketResult<&mut Self> {
        let Some(offset) = self.open_direct_state()? else {
            return Ok(self);
        };
        self.check_open_offset(offset)?;
        if self.checked() {
            let bytes = self.chain.packet().offset().saturating_sub(offset + 4);
            if bytes % QWORD_BYTES != 0 {
                return Err(PacketError::Misaligned {
                    offset: self.chain.packet().offset(),
                    required: QWORD_BYTES,
                });
            }
        }
        if qwords > MAX_DIRECT_QWORDS {
            return Err(PacketError::VifCountTooLarge {
                count: qwords,
                max: MAX_DIRECT_QWORDS,
            });
        }

        let immediate = (qwords % MAX_DIRECT_QWORDS) as u16;
        self.chain
            .packet_mut()
            .written_mut(offset, 2)
            .copy_from_slice(&immediate.to_le_bytes());
        self.open_code = VifState::Idle;
        log::debug!("Closed DIRECT at {:#x} with {} qwords", offset, qwords);
        Ok(self)
    }

    /// Pad with NOPs until the cursor is 12 bytes into a quadword
    pub fn pad96(&mut self) -> PacketResult<&mut Self> {
        self.pad96_with(VifCode::new(Opcode::Nop, 0, 0, false).encode())
    }

    /// Pad with NOPs until the cursor is quadword aligned
    pub fn pad128(&mut self) -> PacketResult<&mut Self> {
        self.pad128_with(VifCode::new(Opcode::Nop, 0, 0, false).encode())
    }
}

impl ChainPacket for VifPacket {
    fn chain(&self) -> &SourceChainPacket {
        &self.chain
    }

    fn chain_mut(&mut self) -> &mut SourceChainPacket {
        &mut self.chain
    }

    fn reset(&mut self) {
        self.chain.reset();
        self.open_code = VifState::Idle;
    }
}
