// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ItemGroup: a keyed collection of items that builds outgoing heaps
//! and updates itself from incoming ones.

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::codec::bits;
use crate::descriptor::Descriptor;
use crate::dialect::{reserved, Dialect};
use crate::error::Result;
use crate::heap::{Heap, ItemSlot};
use crate::item::Item;
use crate::trace::{NullSink, TraceEvent, TraceSink};
use crate::value::Value;

/// A mutable collection of items, synchronized to and from heaps.
pub struct ItemGroup {
    dialect: Dialect,
    items: BTreeMap<u16, Item>,
    names: HashMap<String, u16>,
    pending_descriptors: VecDeque<u16>,
    heap_cnt: u64,
    sink: Box<dyn TraceSink>,
}

impl ItemGroup {
    pub fn new(dialect: Dialect) -> Self {
        Self::with_sink(dialect, Box::new(NullSink))
    }

    pub fn with_sink(dialect: Dialect, sink: Box<dyn TraceSink>) -> Self {
        ItemGroup {
            dialect,
            items: BTreeMap::new(),
            names: HashMap::new(),
            pending_descriptors: VecDeque::new(),
            heap_cnt: 1,
            sink,
        }
    }

    pub fn heap_cnt(&self) -> u64 {
        self.heap_cnt
    }

    pub fn item(&self, id: u16) -> Option<&Item> {
        self.items.get(&id)
    }

    pub fn item_by_name(&self, name: &str) -> Option<&Item> {
        self.names.get(name).and_then(|id| self.items.get(id))
    }

    /// Declares a new item, queuing its descriptor to ride in the
    /// next outgoing heap.
    pub fn declare_item(&mut self, descriptor: Descriptor) {
        let id = descriptor.id;
        let name = descriptor.name.clone();
        self.items.insert(id, Item::new(descriptor));
        self.names.insert(name, id);
        self.pending_descriptors.push_back(id);
    }

    /// Sets an item's value by id, marking it changed.
    pub fn set_value(&mut self, id: u16, value: Value) -> Result<()> {
        if let Some(item) = self.items.get_mut(&id) {
            item.set_value(value)?;
        }
        Ok(())
    }

    /// Builds an outgoing heap from pending descriptors and changed
    /// items, then advances the heap counter.
    pub fn build_heap(&mut self) -> Result<Heap> {
        let addr_bits = self.dialect.addr_bits.bits();
        let addr_bytes = (addr_bits / 8) as usize;
        let mut items = BTreeMap::new();
        items.insert(reserved::HEAP_CNT, ItemSlot::Immediate(self.heap_cnt));

        let mut descriptors = Vec::new();
        while let Some(id) = self.pending_descriptors.pop_back() {
            if let Some(item) = self.items.get(&id) {
                descriptors.push(item.descriptor.encode(self.dialect));
            }
        }

        let mut blob = Vec::new();
        for (&id, item) in self.items.iter_mut() {
            if !item.changed() {
                continue;
            }
            let encoded = item.encode_value()?;
            let size = item.descriptor.shape.size();
            if size >= 0 && encoded.len() <= addr_bytes {
                let nbits = item.descriptor.nbits().unwrap_or(0) as u32;
                let placed = bits::shift_into_field(&encoded, nbits, addr_bits);
                let mut value = 0u64;
                for &b in &placed {
                    value = (value << 8) | b as u64;
                }
                items.insert(id, ItemSlot::Immediate(value));
            } else {
                items.insert(id, ItemSlot::Direct { offset: blob.len(), length: encoded.len() });
                blob.extend(encoded);
            }
            item.clear_changed();
        }

        let heap_len = blob.len();
        let heap = Heap {
            heap_cnt: self.heap_cnt,
            heap_len,
            blob,
            items,
            descriptors,
            valid: true,
        };
        self.heap_cnt += 1;
        Ok(heap)
    }

    /// Updates this group from an incoming heap: new descriptors add
    /// items, known item ids update values, unknown ids are ignored.
    pub fn apply_heap(&mut self, heap: &Heap) -> Result<()> {
        self.heap_cnt = heap.heap_cnt;

        for raw in &heap.descriptors {
            let descriptor = Descriptor::decode(self.dialect, raw)?;
            let id = descriptor.id;
            let name = descriptor.name.clone();
            if let Some(existing) = self.items.get(&id) {
                if existing.value().is_none() {
                    self.sink.record(TraceEvent::DescriptorReplaced { id });
                }
            }
            self.items.insert(id, Item::new(descriptor));
            self.names.insert(name, id);
        }

        let addr_bits = self.dialect.addr_bits.bits();
        for (&id, slot) in &heap.items {
            let Some(item) = self.items.get_mut(&id) else { continue };
            match slot {
                ItemSlot::Immediate(value) => {
                    let bit_offset = item.descriptor.bit_offset(addr_bits) as usize;
                    let addr_bytes = (addr_bits / 8) as usize;
                    let bytes = value.to_be_bytes();
                    let field = &bytes[8 - addr_bytes..];
                    let byte_offset = bit_offset / 8;
                    let sub_bit_offset = (bit_offset % 8) as u8;
                    item.decode_value(&field[byte_offset..], sub_bit_offset)?;
                }
                ItemSlot::Direct { offset, length } => {
                    let bytes = heap.blob.get(*offset..*offset + *length).unwrap_or(&[]);
                    item.decode_value(bytes, 0)?;
                }
            }
        }
        Ok(())
    }
}
