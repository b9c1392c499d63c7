// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Single-heap assembler: accumulates packets belonging to one
//! `heap_cnt` and finalizes them into a [`super::Heap`].

use std::collections::BTreeMap;

use crate::codec::packet::{self, ItemEntry, Mode};
use crate::dialect::reserved;
use crate::error::{Error, Result};

use super::{Heap, ItemSlot};

/// State of one heap being reassembled from packets.
#[derive(Debug, Default)]
pub struct HeapAssembler {
    heap_cnt: Option<u64>,
    heap_len: Option<usize>,
    /// Every non-control item entry seen across all packets of this
    /// heap, in arrival order. DESCRIPTOR may repeat.
    entries: Vec<ItemEntry>,
    /// `(payload_offset, bytes)` per packet, in arrival order.
    fragments: Vec<(usize, Vec<u8>)>,
    inconsistent: bool,
}

const CONTROL_IDS: [u16; 4] = [
    reserved::HEAP_CNT,
    reserved::HEAP_LEN,
    reserved::PAYLOAD_OFFSET,
    reserved::PAYLOAD_LENGTH,
];

impl HeapAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn heap_cnt(&self) -> Option<u64> {
        self.heap_cnt
    }

    /// Feeds one packet's item table and payload into the assembler.
    /// Returns `true` if the heap is now complete.
    pub fn add_packet(&mut self, items: &[ItemEntry], payload: Vec<u8>) -> Result<bool> {
        let pkt_heap_cnt = items
            .iter()
            .find(|e| e.id == reserved::HEAP_CNT)
            .map(|e| e.value)
            .ok_or(Error::PacketMalformed("packet missing HEAP_CNT"))?;

        match self.heap_cnt {
            None => self.heap_cnt = Some(pkt_heap_cnt),
            Some(existing) if existing != pkt_heap_cnt => {
                return Err(Error::HeapCntMismatch { expected: existing, found: pkt_heap_cnt })
            }
            Some(_) => {}
        }

        if let Some(entry) = items.iter().find(|e| e.id == reserved::HEAP_LEN) {
            self.heap_len = Some(entry.value as usize);
        }

        let payload_offset = items
            .iter()
            .find(|e| e.id == reserved::PAYLOAD_OFFSET)
            .map(|e| e.value as usize)
            .unwrap_or(0);

        for entry in items {
            if !CONTROL_IDS.contains(&entry.id) {
                self.entries.push(*entry);
            }
        }

        self.fragments.push((payload_offset, payload));

        Ok(self.is_complete())
    }

    fn is_complete(&self) -> bool {
        let Some(heap_len) = self.heap_len else { return false };
        covers_fully(&self.fragments, heap_len)
    }

    /// Consumes the assembler, producing its finalized heap.
    pub fn finalize(self) -> Heap {
        let heap_len = self.heap_len.unwrap_or_else(|| {
            self.fragments
                .iter()
                .map(|(off, bytes)| off + bytes.len())
                .max()
                .unwrap_or(0)
        });

        let mut blob = vec![0u8; heap_len.max(
            self.fragments
                .iter()
                .map(|(off, bytes)| off + bytes.len())
                .max()
                .unwrap_or(0),
        )];
        let mut inconsistent = self.inconsistent;
        let mut written = vec![false; blob.len()];
        for (offset, bytes) in &self.fragments {
            for (i, &b) in bytes.iter().enumerate() {
                let pos = offset + i;
                if pos >= blob.len() {
                    continue;
                }
                if written[pos] && blob[pos] != b {
                    inconsistent = true;
                }
                blob[pos] = b;
                written[pos] = true;
            }
        }
        blob.truncate(heap_len);

        let direct_ids_out_of_range = self.entries.iter().any(|e| {
            e.mode == Mode::Direct && (e.value as usize) >= heap_len
        });

        let slices = packet::resolve_direct_slices(&self.entries, heap_len);
        let mut items = BTreeMap::new();
        let mut descriptors = Vec::new();
        for (id, offset, length) in &slices {
            if *id == reserved::DESCRIPTOR {
                let end = (*offset + *length).min(blob.len());
                let start = (*offset).min(end);
                descriptors.push(blob[start..end].to_vec());
            } else {
                items.insert(*id, ItemSlot::Direct { offset: *offset, length: *length });
            }
        }
        for entry in &self.entries {
            if entry.mode == Mode::Immediate && entry.id != reserved::DESCRIPTOR {
                items.insert(entry.id, ItemSlot::Immediate(entry.value));
            }
        }

        let covered = self.heap_len.map(|len| covers_fully(&self.fragments, len)).unwrap_or(false);
        let valid = self.heap_len.is_some() && covered && !direct_ids_out_of_range && !inconsistent;

        Heap { heap_cnt: self.heap_cnt.unwrap_or(0), heap_len, blob, items, descriptors, valid }
    }
}

/// True if the union of `(offset, bytes.len())` fragments covers
/// `[0, heap_len)` with no gaps.
fn covers_fully(fragments: &[(usize, Vec<u8>)], heap_len: usize) -> bool {
    if heap_len == 0 {
        return true;
    }
    let mut ranges: Vec<(usize, usize)> =
        fragments.iter().map(|(off, bytes)| (*off, *off + bytes.len())).collect();
    ranges.sort_unstable();
    let mut cursor = 0usize;
    for (start, end) in ranges {
        if start > cursor {
            return false;
        }
        cursor = cursor.max(end);
        if cursor >= heap_len {
            return true;
        }
    }
    cursor >= heap_len
}
