// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transmitter: splits a built heap into maximum-sized wire packets.

use crate::codec::packet::{pack_packet, ItemEntry};
use crate::dialect::{reserved, Dialect};
use crate::error::{Error, Result};
use crate::heap::{Heap, ItemSlot};
use crate::transport::PacketSink;

const CONTROL_ITEM_COUNT_FIRST: usize = 4; // HEAP_CNT, HEAP_LEN, PAYLOAD_LEN, PAYLOAD_OFF
const CONTROL_ITEM_COUNT_CONT: usize = 4;

/// Splits `heap` into a finite sequence of packet byte strings, each
/// no larger than `dialect.max_packet_len`. The first packet carries
/// the full item table (descriptor entries, then item entries); every
/// later packet carries only the four control entries.
pub fn iter_genpackets(heap: &Heap, dialect: Dialect) -> GenPackets {
    let mut blob = Vec::new();
    let mut entries = Vec::new();

    for raw in &heap.descriptors {
        entries.push(ItemEntry::direct(reserved::DESCRIPTOR, blob.len() as u64));
        blob.extend_from_slice(raw);
    }
    let descriptor_len = blob.len();

    for (&id, slot) in &heap.items {
        match slot {
            ItemSlot::Immediate(v) => entries.push(ItemEntry::immediate(id, *v)),
            ItemSlot::Direct { offset, .. } => {
                entries.push(ItemEntry::direct(id, (descriptor_len + offset) as u64));
            }
        }
    }
    blob.extend_from_slice(&heap.blob);

    GenPackets {
        dialect,
        heap_cnt: heap.heap_cnt,
        heap_len: blob.len(),
        blob,
        cursor: 0,
        first_table_entries: entries,
        emitted_first: false,
        done: false,
    }
}

/// Builds the stream terminator packet: HEAP_CNT set to all-ones,
/// STREAM_CTRL carrying the TERM marker.
pub fn end_packet(dialect: Dialect) -> Vec<u8> {
    let all_ones = (1u64 << dialect.addr_bits.bits()) - 1;
    let items = vec![
        ItemEntry::immediate(reserved::HEAP_CNT, all_ones),
        ItemEntry::immediate(reserved::STREAM_CTRL, reserved::STREAM_CTRL_TERM_MARKER),
    ];
    pack_packet(dialect, &items, &[])
}

/// Lazy iterator over one heap's wire packets.
pub struct GenPackets {
    dialect: Dialect,
    heap_cnt: u64,
    heap_len: usize,
    blob: Vec<u8>,
    cursor: usize,
    first_table_entries: Vec<ItemEntry>,
    emitted_first: bool,
    done: bool,
}

impl Iterator for GenPackets {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        if self.done {
            return None;
        }

        if !self.emitted_first {
            self.emitted_first = true;
            let mut items = vec![ItemEntry::immediate(reserved::HEAP_CNT, self.heap_cnt)];
            items.extend(self.first_table_entries.iter().copied());
            let header_item_count = items.len() + 3;
            let overhead = 8 + header_item_count * 8;
            let max_payload = self.dialect.max_packet_len.saturating_sub(overhead);
            let payload_len = max_payload.min(self.blob.len() - self.cursor);

            items.push(ItemEntry::immediate(reserved::HEAP_LEN, self.heap_len as u64));
            items.push(ItemEntry::immediate(reserved::PAYLOAD_LENGTH, payload_len as u64));
            items.push(ItemEntry::immediate(reserved::PAYLOAD_OFFSET, self.cursor as u64));

            let payload = self.blob[self.cursor..self.cursor + payload_len].to_vec();
            self.cursor += payload_len;
            if self.cursor >= self.blob.len() {
                self.done = true;
            }
            return Some(pack_packet(self.dialect, &items, &payload));
        }

        if self.cursor >= self.blob.len() {
            self.done = true;
            return None;
        }

        let overhead = 8 + CONTROL_ITEM_COUNT_CONT * 8;
        let max_payload = self.dialect.max_packet_len.saturating_sub(overhead);
        let payload_len = max_payload.min(self.blob.len() - self.cursor);
        let items = vec![
            ItemEntry::immediate(reserved::HEAP_CNT, self.heap_cnt),
            ItemEntry::immediate(reserved::HEAP_LEN, self.heap_len as u64),
            ItemEntry::immediate(reserved::PAYLOAD_LENGTH, payload_len as u64),
            ItemEntry::immediate(reserved::PAYLOAD_OFFSET, self.cursor as u64),
        ];
        let payload = self.blob[self.cursor..self.cursor + payload_len].to_vec();
        self.cursor += payload_len;
        if self.cursor >= self.blob.len() {
            self.done = true;
        }
        Some(pack_packet(self.dialect, &items, &payload))
    }
}

/// Stateful sender pairing a dialect with an owned transport sink.
///
/// `end()` sends the stream terminator packet and drops the sink,
/// tearing down the sender's transport reference: any later
/// `send_heap`/`end` call fails with [`Error::TransportClosed`]
/// instead of writing to a transport that's already been told the
/// stream is over.
pub struct Sender<S: PacketSink> {
    dialect: Dialect,
    sink: Option<S>,
}

impl<S: PacketSink> Sender<S> {
    pub fn new(dialect: Dialect, sink: S) -> Self {
        Sender { dialect, sink: Some(sink) }
    }

    /// Sends every packet of `heap` through the transport.
    pub fn send_heap(&mut self, heap: &Heap) -> Result<()> {
        let sink = self.sink.as_mut().ok_or(Error::TransportClosed)?;
        for packet in iter_genpackets(heap, self.dialect) {
            sink.send(&packet)?;
        }
        Ok(())
    }

    /// Sends the stream terminator and tears down the transport
    /// reference, making this sender unusable for further sends.
    pub fn end(&mut self) -> Result<()> {
        let sink = self.sink.as_mut().ok_or(Error::TransportClosed)?;
        sink.send(&end_packet(self.dialect))?;
        self.sink = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::heap::multiplexer::HeapMultiplexer;
    use crate::transport::bytes::BytesSink;
    use std::collections::BTreeMap;

    #[test]
    fn large_direct_item_splits_into_expected_packet_count() {
        let dialect = Dialect::default();
        let blob = vec![7u8; 32_000];
        let mut items = BTreeMap::new();
        items.insert(0x1000, ItemSlot::Direct { offset: 0, length: blob.len() });
        let heap = Heap {
            heap_cnt: 3,
            heap_len: blob.len(),
            blob,
            items,
            descriptors: Vec::new(),
            valid: true,
        };
        let packets: Vec<Vec<u8>> = iter_genpackets(&heap, dialect).collect();
        assert_eq!(packets.len(), 4);

        let mux = HeapMultiplexer::new(dialect);
        let heaps: Vec<Heap> = mux.into_heaps(packets).collect();
        assert_eq!(heaps.len(), 1);
        assert!(heaps[0].is_valid());
        assert_eq!(heaps[0].blob.len(), 32_000);
    }

    #[test]
    fn end_packet_is_recognized_as_terminal() {
        let dialect = Dialect::default();
        let packet = end_packet(dialect);
        let (items, _, _) = crate::codec::packet::unpack_packet(dialect, &packet).unwrap();
        assert!(items.iter().any(crate::codec::packet::ItemEntry::is_stream_term));
    }

    #[test]
    fn sender_rejects_sends_after_end() {
        let dialect = Dialect::default();
        let mut items = BTreeMap::new();
        items.insert(0x1000, ItemSlot::Immediate(7));
        let heap = Heap {
            heap_cnt: 1,
            heap_len: 0,
            blob: Vec::new(),
            items,
            descriptors: Vec::new(),
            valid: true,
        };

        let mut sender = Sender::new(dialect, BytesSink::new());
        sender.send_heap(&heap).unwrap();
        sender.end().unwrap();

        assert!(matches!(sender.send_heap(&heap), Err(Error::TransportClosed)));
        assert!(matches!(sender.end(), Err(Error::TransportClosed)));
    }
}
