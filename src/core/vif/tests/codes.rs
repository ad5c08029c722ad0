// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

use super::super::*;

#[test]
fn test_encode_fields() {
    let code = VifCode::new(Opcode::Mark, 0xBEEF, 0x12, true);
    assert_eq!(code.encode(), 0x8712_BEEF);
}

#[test]
fn test_decode_roundtrip() {
    let code = VifCode::decode(0x8712_BEEF);

    assert_eq!(code.immediate, 0xBEEF);
    assert_eq!(code.num, 0x12);
    assert_eq!(code.cmd, 0x07);
    assert!(code.irq);
    assert_eq!(code.opcode(), Some(Opcode::Mark));
    assert_eq!(VifCode::decode(code.encode()), code);
}

#[test]
fn test_cmd_masked_to_seven_bits() {
    let code = VifCode {
        immediate: 0,
        num: 0,
        cmd: 0xFF,
        irq: false,
    };
    assert_eq!(code.encode(), 0x7F00_0000);
}

#[test]
fn test_opcode_from_cmd() {
    assert_eq!(Opcode::from_cmd(0x11), Some(Opcode::Flush));
    assert_eq!(Opcode::from_cmd(0x91), Some(Opcode::Flush));
    // MPG is not part of the table
    assert_eq!(Opcode::from_cmd(0x4A), None);
    assert_eq!(Opcode::from_cmd(0x51), Some(Opcode::DirectHl));
    assert_eq!(Opcode::from_cmd(0x08), None);
    assert_eq!(Opcode::from_cmd(0x6C), None);
}

#[test]
fn test_unpack_code() {
    let code = VifCode::unpack(UnpackMode::V3_16, 0x3FF, UnpackFlags::default(), false);

    assert_eq!(code.encode(), 0x6900_43FF);
    assert!(code.is_unpack());
    assert_eq!(code.unpack_mode(), Some(UnpackMode::V3_16));
    assert_eq!(code.opcode(), None);
}

#[test]
fn test_unpack_flags_and_address_mask() {
    let code = VifCode::unpack(
        UnpackMode::S8,
        0xFFFF,
        UnpackFlags::MASKED | UnpackFlags::DOUBLE_BUFFERED,
        false,
    );

    // Address keeps 14 bits; bit 14 (unsigned) is clear
    assert_eq!(code.immediate, 0xBFFF);
    assert_eq!(code.cmd, 0x72);
    assert_eq!(code.unpack_mode(), Some(UnpackMode::S8));
}

#[test]
fn test_non_unpack_has_no_mode() {
    let code = VifCode::new(Opcode::Direct, 4, 0, false);
    assert!(!code.is_unpack());
    assert_eq!(code.unpack_mode(), None);
}

#[test]
fn test_default_flags_unsigned() {
    assert_eq!(UnpackFlags::default(), UnpackFlags::UNSIGNED);
}

#[test]
fn test_record_bytes() {
    let mut out = [0u8; 4];
    VifCode::new(Opcode::Stcycl, 0x0401, 0, false).write_to(&mut out);
    assert_eq!(out, [0x01, 0x04, 0x00, 0x01]);
}

#[test]
fn test_mask_fields() {
    let mut fields = [0u8; 16];
    fields[0] = 1;
    fields[5] = 2;
    fields[15] = 3;
    let mask = VifMask::from_fields(fields);

    assert_eq!(mask.0, 0xC000_0801);
    assert_eq!(mask.field(0), 1);
    assert_eq!(mask.field(5), 2);
    assert_eq!(mask.field(15), 3);
    assert_eq!(mask.field(1), 0);
}

#[test]
fn test_mask_fields_truncated() {
    let mask = VifMask::from_fields([0xFF; 16]);
    assert_eq!(mask, VifMask(u32::MAX));
}
