// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Concrete scenario 5: 17 never-completed heaps under
//! MAX_CONCURRENT_HEAPS=16 evict exactly the oldest one.

use spead::codec::packet::{pack_packet, ItemEntry};
use spead::dialect::{reserved, Dialect};
use spead::heap::multiplexer::HeapMultiplexer;
use spead::heap::Heap;

fn first_fragment_only(dialect: Dialect, heap_cnt: u64) -> Vec<u8> {
    let items = vec![
        ItemEntry::immediate(reserved::HEAP_CNT, heap_cnt),
        ItemEntry::immediate(reserved::HEAP_LEN, 8),
        ItemEntry::immediate(reserved::PAYLOAD_OFFSET, 0),
        ItemEntry::immediate(reserved::PAYLOAD_LENGTH, 4),
    ];
    pack_packet(dialect, &items, &[0; 4])
}

#[test]
fn seventeenth_heap_evicts_the_oldest_and_only_the_oldest() {
    let mut dialect = Dialect::default();
    dialect.max_concurrent_heaps = 16;
    let mut mux = HeapMultiplexer::new(dialect);

    let mut evicted: Vec<Heap> = Vec::new();
    for heap_cnt in 1..=17u64 {
        evicted.extend(mux.ingest(&first_fragment_only(dialect, heap_cnt)));
    }

    assert_eq!(evicted.len(), 1);
    assert_eq!(evicted[0].heap_cnt, 1);
    assert!(!evicted[0].is_valid());

    let remaining = mux.finish();
    assert_eq!(remaining.len(), 16);
}
