// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Concrete scenario 3: a large direct item fragmented across packets
//! under a small MAX_PACKET_LEN, reassembling byte-equal to the source.

use std::collections::BTreeMap;

use spead::dialect::Dialect;
use spead::heap::multiplexer::HeapMultiplexer;
use spead::heap::{Heap, ItemSlot};
use spead::transmitter;

#[test]
fn thirty_two_kb_item_splits_under_small_max_packet_len_and_reassembles() {
    let mut dialect = Dialect::default();
    dialect.max_packet_len = 9200;

    let blob: Vec<u8> = (0..32_000u32).map(|i| (i % 256) as u8).collect();
    let mut items = BTreeMap::new();
    items.insert(0x4000, ItemSlot::Direct { offset: 0, length: blob.len() });
    let heap = Heap {
        heap_cnt: 11,
        heap_len: blob.len(),
        blob: blob.clone(),
        items,
        descriptors: Vec::new(),
        valid: true,
    };

    let packets: Vec<Vec<u8>> = transmitter::iter_genpackets(&heap, dialect).collect();
    assert_eq!(packets.len(), 4);

    let mux = HeapMultiplexer::new(dialect);
    let heaps: Vec<Heap> = mux.into_heaps(packets).collect();
    assert_eq!(heaps.len(), 1);
    assert!(heaps[0].is_valid());
    assert_eq!(heaps[0].blob, blob);
}
