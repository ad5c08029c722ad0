// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

//! Command buffer tests (append, capacity, buffers, send, dump)

use super::super::*;
use crate::core::dma::{RecordingTransport, TransferMode};
use crate::core::error::ErrorKind;

#[test]
fn test_new_packet_is_empty() {
    let packet = DmaPacket::new(4, DmaChannel::Gif);

    assert_eq!(packet.byte_len(), 0);
    assert_eq!(packet.qword_len(), 0);
    assert_eq!(packet.capacity_qwords(), 4);
    assert_eq!(packet.remaining(), 64);
    assert_eq!(packet.channel(), DmaChannel::Gif);
    assert_eq!(packet.mapping(), MemMapping::Normal);
    assert_eq!(packet.check_mode(), CheckMode::Checked);
}

#[test]
fn test_add_returns_offset_and_writes_le() {
    let mut packet = DmaPacket::new(2, DmaChannel::Gif);

    assert_eq!(packet.add(&0x1122_3344u32).unwrap(), 0);
    assert_eq!(packet.add(&0xAABBu16).unwrap(), 4);
    assert_eq!(packet.add(&0x7Fu8).unwrap(), 6);

    assert_eq!(packet.as_bytes(), &[0x44, 0x33, 0x22, 0x11, 0xBB, 0xAA, 0x7F]);
    assert_eq!(packet.byte_len(), 7);
}

#[test]
fn test_add_slice_and_arrays() {
    let mut packet = DmaPacket::new(2, DmaChannel::Gif);

    packet.add_slice(&[1u32, 2, 3, 4]).unwrap();
    packet.add(&[1.0f32, 0.0, 0.0, 0.0]).unwrap();

    assert_eq!(packet.read_u32(0), Some(1));
    assert_eq!(packet.read_u32(12), Some(4));
    assert_eq!(packet.read_u32(16), Some(1.0f32.to_bits()));
    assert_eq!(packet.qword_len(), 2);
}

#[test]
fn test_u128_record() {
    let mut packet = DmaPacket::new(1, DmaChannel::Gif);
    packet.add(&0x0102_0304_0506_0708_090A_0B0C_0D0E_0F10u128).unwrap();

    assert_eq!(packet.read_u64(0), Some(0x090A_0B0C_0D0E_0F10));
    assert_eq!(packet.read_u64(8), Some(0x0102_0304_0506_0708));
}

#[test]
fn test_overflow_leaves_packet_unchanged() {
    let mut packet = DmaPacket::new(1, DmaChannel::Gif);
    packet.add_slice(&[0u32; 3]).unwrap();

    let err = packet.add(&0u64).unwrap_err();
    assert_eq!(
        err,
        PacketError::Overflow {
            requested: 8,
            available: 4
        }
    );
    assert_eq!(err.kind(), ErrorKind::Overflow);
    assert_eq!(packet.byte_len(), 12);

    packet.add(&0u32).unwrap();
    assert_eq!(packet.remaining(), 0);
    assert!(packet.add(&0u8).is_err());
}

#[test]
fn test_add_packet_whole_quads() {
    let mut source = DmaPacket::new(2, DmaChannel::Gif);
    source.add(&[5u32, 6, 7, 8]).unwrap();

    let mut packet = DmaPacket::new(2, DmaChannel::Gif);
    packet.add(&[1u32, 2, 3, 4]).unwrap();
    assert_eq!(packet.add_packet(&source).unwrap(), 16);
    assert_eq!(packet.read_u32(16), Some(5));
}

#[test]
fn test_add_packet_partial_quad() {
    let mut source = DmaPacket::new(2, DmaChannel::Gif);
    source.add(&[1u32; 5]).unwrap();

    let mut packet = DmaPacket::new(4, DmaChannel::Gif);
    let err = packet.add_packet(&source).unwrap_err();
    assert_eq!(err, PacketError::PartialQuadwords { bytes: 20 });
    assert_eq!(err.kind(), ErrorKind::Alignment);

    // Unchecked copies only the whole quadwords
    packet.set_check_mode(CheckMode::Unchecked);
    packet.add_packet(&source).unwrap();
    assert_eq!(packet.byte_len(), 16);
}

#[test]
fn test_patch() {
    let mut packet = DmaPacket::new(1, DmaChannel::Gif);
    packet.add_slice(&[0u32; 2]).unwrap();

    packet.patch(4, &0xDEAD_BEEFu32).unwrap();
    assert_eq!(packet.read_u32(4), Some(0xDEAD_BEEF));

    // Past the written data
    assert!(packet.patch(6, &0u32).is_err());
}

#[test]
fn test_reset() {
    let mut packet = DmaPacket::new(1, DmaChannel::Gif);
    packet.add(&[9u32; 4]).unwrap();
    packet.reset();

    assert_eq!(packet.byte_len(), 0);
    assert_eq!(packet.remaining(), 16);
    assert!(packet.as_bytes().is_empty());
}

#[test]
fn test_uncached_mapping_requires_cache_lines() {
    let err = DmaPacket::with_mapping(6, DmaChannel::Vif1, MemMapping::Uncached).unwrap_err();
    assert_eq!(err, PacketError::CacheLineSize { qwords: 6 });

    let packet = DmaPacket::with_mapping(8, DmaChannel::Vif1, MemMapping::UncachedAccelerated).unwrap();
    assert_eq!(packet.mapping(), MemMapping::UncachedAccelerated);

    // Cached mappings accept any size
    assert!(DmaPacket::with_mapping(3, DmaChannel::Vif1, MemMapping::Scratchpad).is_ok());
}

#[test]
fn test_from_buffer() {
    let err = DmaPacket::from_buffer(vec![0u8; 20], DmaChannel::Gif, MemMapping::Normal, false).unwrap_err();
    assert_eq!(err, PacketError::PartialQuadwords { bytes: 20 });

    let full = DmaPacket::from_buffer(vec![0xAAu8; 32], DmaChannel::Gif, MemMapping::Normal, true).unwrap();
    assert_eq!(full.byte_len(), 32);
    assert_eq!(full.remaining(), 0);

    let empty = DmaPacket::from_buffer(vec![0u8; 32], DmaChannel::Gif, MemMapping::Normal, false).unwrap();
    assert_eq!(empty.byte_len(), 0);
    assert_eq!(empty.capacity_qwords(), 2);
}

#[test]
fn test_swap_and_into_buffer() {
    let mut packet = DmaPacket::new(2, DmaChannel::Gif);
    packet.add(&[1u32; 4]).unwrap();

    assert!(matches!(
        packet.swap_buffer(vec![0u8; 8]),
        Err(PacketError::PartialQuadwords { bytes: 8 })
    ));

    let old = packet.swap_buffer(vec![0u8; 64]).unwrap();
    assert_eq!(old.len(), 32);
    assert_eq!(old[0], 1);
    assert_eq!(packet.byte_len(), 16);
    assert_eq!(packet.capacity_qwords(), 4);

    // New buffer too small for the data already written
    packet.add(&[0u32; 4]).unwrap();
    assert!(matches!(
        packet.swap_buffer(vec![0u8; 16]),
        Err(PacketError::Overflow { .. })
    ));

    assert_eq!(packet.into_buffer().len(), 64);
}

#[test]
fn test_send_normal() {
    let mut transport = RecordingTransport::new();
    let mut packet = DmaPacket::new(2, DmaChannel::Gif);

    assert_eq!(packet.send(&mut transport, true), Err(PacketError::EmptyPacket));

    packet.add(&0u32).unwrap();
    assert_eq!(
        packet.send(&mut transport, true),
        Err(PacketError::Misaligned {
            offset: 4,
            required: 16
        })
    );

    packet.add_slice(&[0u32; 3]).unwrap();
    packet.send(&mut transport, false).unwrap();

    let sent = transport.last().unwrap();
    assert_eq!(sent.mode, TransferMode::Normal);
    assert_eq!(sent.channel, DmaChannel::Gif);
    assert_eq!(sent.data.len(), 16);
    assert!(!sent.wait);
}

#[test]
fn test_send_uses_current_channel() {
    let mut transport = RecordingTransport::new();
    let mut packet = DmaPacket::new(1, DmaChannel::Gif);
    packet.add(&[0u32; 4]).unwrap();
    packet.set_channel(DmaChannel::Vif0);

    packet.send(&mut transport, true).unwrap();
    assert_eq!(transport.last().unwrap().channel, DmaChannel::Vif0);
}

#[test]
fn test_hex_dump() {
    let mut packet = DmaPacket::new(2, DmaChannel::Gif);
    packet.set_dma_addr(0x1000);
    packet.add(&[1u32, 2, 3, 4]).unwrap();

    assert_eq!(
        packet.hex_dump(0),
        "dumping 4 words\n\n0x00001000:  0x00000001 0x00000002 0x00000003 0x00000004 \n\n"
    );
    assert_eq!(packet.to_string(), packet.hex_dump(0));
}

#[test]
fn test_hex_dump_limit() {
    let mut packet = DmaPacket::new(2, DmaChannel::Gif);
    packet.add(&[0u32; 8]).unwrap();

    let dump = packet.hex_dump(1);
    assert_eq!(dump.lines().filter(|l| l.starts_with("0x")).count(), 1);
    assert!(dump.starts_with("dumping 8 words"));
}
