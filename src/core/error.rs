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

/// Library error types
use thiserror::Error;

use crate::core::gs::PixelFormat;

/// Result type for library operations
pub type Result<T> = std::result::Result<T, Ps2Error>;

/// Result type for packet builder operations
pub type PacketResult<T> = std::result::Result<T, PacketError>;

/// Result type for GS memory manager operations
pub type GsMemResult<T> = std::result::Result<T, GsMemError>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Ps2Error {
    #[error("Packet error: {0}")]
    Packet(#[from] PacketError),

    #[error("GS memory error: {0}")]
    GsMem(#[from] GsMemError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Broad classification of packet failures
///
/// Every [`PacketError`] falls in exactly one of these classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Open/close mismatch (closing without opening, opening while open,
    /// sending with an open tag)
    Protocol,
    /// Buffer capacity exceeded
    Overflow,
    /// Required alignment violated
    Alignment,
    /// The transport collaborator refused the packet
    Transport,
}

/// Packet-builder error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("Not enough space in packet: {requested} bytes requested, {available} available")]
    Overflow { requested: usize, available: usize },

    #[error("Packet cursor at offset {offset:#x} is not {required}-byte aligned")]
    Misaligned { offset: usize, required: usize },

    #[error("Can only append packets that are a whole number of quadwords (got {bytes} bytes)")]
    PartialQuadwords { bytes: usize },

    #[error("Transfer address {address:#010x} is not quadword aligned")]
    UnalignedAddress { address: u32 },

    #[error("Uncached packet buffers must be a whole number of cache lines (got {qwords} qwords)")]
    CacheLineSize { qwords: usize },

    #[error("A DMA tag is still open at offset {offset:#x}; close it before opening another")]
    TagAlreadyOpen { offset: usize },

    #[error("CloseTag called but no DMA tag is open")]
    NoOpenTag,

    #[error("Packet sent with an open DMA tag at offset {offset:#x}")]
    OpenTagOnSend { offset: usize },

    #[error("Data added at offset {offset:#x} without an open DMA tag")]
    DataOutsideTag { offset: usize },

    #[error("DMA tag length of {qwords} qwords does not fit in 16 bits")]
    TagLengthOverflow { qwords: usize },

    #[error("A VIF code is still open at offset {offset:#x}")]
    VifCodeAlreadyOpen { offset: usize },

    #[error("No VIF code is open")]
    NoOpenVifCode,

    #[error("Open VIF code is {found}, expected {expected}")]
    VifCodeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("VIF count {count} exceeds maximum {max}")]
    VifCountTooLarge { count: usize, max: usize },

    #[error("Open tag or VIF code at {open:#x} is past the packet cursor {cursor:#x}")]
    CursorBeforeOpen { open: usize, cursor: usize },

    #[error("Cannot send an empty packet")]
    EmptyPacket,

    #[error("Transport error: {0}")]
    Transport(String),
}

impl PacketError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            PacketError::Overflow { .. }
            | PacketError::TagLengthOverflow { .. }
            | PacketError::VifCountTooLarge { .. } => ErrorKind::Overflow,
            PacketError::Misaligned { .. }
            | PacketError::PartialQuadwords { .. }
            | PacketError::UnalignedAddress { .. }
            | PacketError::CacheLineSize { .. }
            | PacketError::EmptyPacket => ErrorKind::Alignment,
            PacketError::TagAlreadyOpen { .. }
            | PacketError::NoOpenTag
            | PacketError::OpenTagOnSend { .. }
            | PacketError::DataOutsideTag { .. }
            | PacketError::VifCodeAlreadyOpen { .. }
            | PacketError::NoOpenVifCode
            | PacketError::VifCodeMismatch { .. }
            | PacketError::CursorBeforeOpen { .. } => ErrorKind::Protocol,
            PacketError::Transport(_) => ErrorKind::Transport,
        }
    }
}

/// GS memory manager error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GsMemError {
    #[error("Failed to allocate a {pages} page GS mem slot for {format}")]
    Exhausted { format: PixelFormat, pages: u32 },

    #[error("Can't allocate memory areas of pixel format {0}")]
    UnsupportedFormat(PixelFormat),

    #[error("Memory area {0} is not allocated")]
    NotAllocated(usize),

    #[error("Slot {0} is already locked")]
    AlreadyLocked(usize),

    #[error("Slot {0} is not locked")]
    NotLocked(usize),

    #[error("Unknown memory area {0}")]
    UnknownArea(usize),

    #[error("Unknown slot {0}")]
    UnknownSlot(usize),

    #[error("Slot pages [{first}, {end}) exceed GS memory ({total} pages)")]
    SlotOutOfRange { first: u32, end: u32, total: u32 },

    #[error("Slot list does not contain slot {0}")]
    SlotNotInList(usize),
}
