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

//! PlayStation 2 DMA packet builders and GS memory manager
//!
//! This library builds the command buffers the Emotion Engine hands to its
//! DMA controller (plain packets, source-chain packets and VIF packets) and
//! manages the Graphics Synthesizer's 4 MB of local memory as a set of
//! reusable slots.
//!
//! # Example
//!
//! ```
//! use ps2rx::core::dma::DmaChannel;
//! use ps2rx::core::gs::{reg_addrs, AdWrite, GifTag, PixelFormat};
//! use ps2rx::core::gsmem::{Alignment, MemManager};
//! use ps2rx::core::packet::{ChainPacket, VifPacket};
//!
//! let mut gs_mem = MemManager::new();
//! gs_mem.add_slot(0, 64, PixelFormat::Psm32)?;
//! let texture = gs_mem.add_area(256, 256, PixelFormat::Psm8, Alignment::Page);
//! let tbp = gs_mem.alloc(texture)?.word_addr / 64;
//!
//! let mut packet = VifPacket::new(16, DmaChannel::Vif1, false);
//! packet.cnt()?.pad96()?.open_direct(false)?;
//! packet.add(&GifTag::ad(1, true))?;
//! packet.add(&AdWrite::new(reg_addrs::TEX0_1, tbp as u64))?;
//! packet.close_direct()?.close_tag()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod core;
