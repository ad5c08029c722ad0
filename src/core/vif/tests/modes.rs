// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

use super::super::*;

#[test]
fn test_vn_vl() {
    assert_eq!((UnpackMode::S32.vn(), UnpackMode::S32.vl()), (0, 0));
    assert_eq!((UnpackMode::V2_8.vn(), UnpackMode::V2_8.vl()), (1, 2));
    assert_eq!((UnpackMode::V3_16.vn(), UnpackMode::V3_16.vl()), (2, 1));
    assert_eq!((UnpackMode::V4_5.vn(), UnpackMode::V4_5.vl()), (3, 3));
}

#[test]
fn test_bytes_per_qword() {
    let expected = [
        (UnpackMode::S32, 4),
        (UnpackMode::S16, 2),
        (UnpackMode::S8, 1),
        (UnpackMode::V2_32, 8),
        (UnpackMode::V2_16, 4),
        (UnpackMode::V2_8, 2),
        (UnpackMode::V3_32, 12),
        (UnpackMode::V3_16, 6),
        (UnpackMode::V3_8, 3),
        (UnpackMode::V4_32, 16),
        (UnpackMode::V4_16, 8),
        (UnpackMode::V4_8, 4),
        (UnpackMode::V4_5, 2),
    ];

    for (mode, bytes) in expected {
        assert_eq!(mode.bytes_per_qword(), bytes, "{:?}", mode);
    }
}

#[test]
fn test_element_bytes() {
    assert_eq!(UnpackMode::V4_32.element_bytes(), 4);
    assert_eq!(UnpackMode::V3_16.element_bytes(), 2);
    assert_eq!(UnpackMode::S8.element_bytes(), 1);
    assert_eq!(UnpackMode::V4_5.element_bytes(), 2);
}

#[test]
fn test_from_bits() {
    for mode in UnpackMode::ALL {
        assert_eq!(UnpackMode::from_bits(mode as u8 | UNPACK_CMD_BITS), Some(mode));
    }
    assert_eq!(UnpackMode::from_bits(3), None);
    assert_eq!(UnpackMode::from_bits(7), None);
    assert_eq!(UnpackMode::from_bits(11), None);
}
