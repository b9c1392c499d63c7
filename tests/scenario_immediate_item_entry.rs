// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Concrete scenario 1: an immediate u40 item entry's exact wire bytes.

use spead::codec::packet::{pack_packet, unpack_packet, ItemEntry, Mode};
use spead::dialect::{reserved, AddrWidth, Dialect};

#[test]
fn immediate_u40_entry_matches_expected_header_bytes_and_round_trips() {
    let dialect = Dialect::new(AddrWidth::Bits40);
    let items = vec![
        ItemEntry::immediate(0x1234, 0),
        ItemEntry::immediate(reserved::HEAP_CNT, 1),
        ItemEntry::immediate(reserved::PAYLOAD_LENGTH, 0),
    ];
    let packet = pack_packet(dialect, &items, &[]);

    // header: magic, version, item_bits=0x40, addr_bits=0x28 (40), reserved(2), item_count(2)
    assert_eq!(&packet[0..8], &[0x53, 0x04, 0x40, 0x28, 0x00, 0x00, 0x00, 0x03]);

    let (decoded, _, _) = unpack_packet(dialect, &packet).unwrap();
    let entry = decoded.iter().find(|e| e.id == 0x1234).unwrap();
    assert_eq!(entry.mode, Mode::Immediate);
    assert_eq!(entry.value, 0);
}
