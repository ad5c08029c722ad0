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

//! Core components
//!
//! This module contains the Emotion Engine side of the PS2 graphics path:
//! - DMA tags, channels and the transport seam
//! - Packet builders (plain, source chain, VIF)
//! - VIF code encoding
//! - GS definitions and the GS local memory manager
//! - Configuration and error types

pub mod config;
pub mod dma;
pub mod error;
pub mod gs;
pub mod gsmem;
pub mod packet;
pub mod vif;

// Re-export commonly used types
pub use config::{CheckMode, Config, FillPolicy};
pub use dma::{DmaChannel, DmaTag, DmaTransport, MemMapping, TagId};
pub use error::{GsMemError, PacketError, Ps2Error, Result};
pub use gs::PixelFormat;
pub use gsmem::{Alignment, MemManager};
pub use packet::{ChainPacket, DmaPacket, SourceChainPacket, VifPacket};
