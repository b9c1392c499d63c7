// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Concrete scenario 4: three interleaved two-fragment heaps arrive
//! out of order and complete in completion order, not arrival order.

use spead::codec::packet::{pack_packet, ItemEntry};
use spead::dialect::{reserved, Dialect};
use spead::heap::multiplexer::HeapMultiplexer;
use spead::heap::Heap;

fn fragment(dialect: Dialect, heap_cnt: u64, off: usize, data: &[u8]) -> Vec<u8> {
    let items = vec![
        ItemEntry::immediate(reserved::HEAP_CNT, heap_cnt),
        ItemEntry::immediate(reserved::HEAP_LEN, 8),
        ItemEntry::immediate(reserved::PAYLOAD_OFFSET, off as u64),
        ItemEntry::immediate(reserved::PAYLOAD_LENGTH, data.len() as u64),
    ];
    pack_packet(dialect, &items, data)
}

#[test]
fn heaps_3_4_5_interleaved_complete_as_3_5_4() {
    let dialect = Dialect::default();
    let mut mux = HeapMultiplexer::new(dialect);

    let arrivals = [
        fragment(dialect, 3, 0, &[0; 4]), // 3a
        fragment(dialect, 4, 0, &[0; 4]), // 4a
        fragment(dialect, 3, 4, &[0; 4]), // 3b -> heap 3 completes
        fragment(dialect, 5, 0, &[0; 4]), // 5a
        fragment(dialect, 5, 4, &[0; 4]), // 5b -> heap 5 completes
        fragment(dialect, 4, 4, &[0; 4]), // 4b -> heap 4 completes
    ];

    let mut completed: Vec<Heap> = Vec::new();
    for packet in &arrivals {
        completed.extend(mux.ingest(packet));
    }

    let order: Vec<u64> = completed.iter().map(|h| h.heap_cnt).collect();
    assert_eq!(order, vec![3, 5, 4]);
    assert!(completed.iter().all(Heap::is_valid));
}
