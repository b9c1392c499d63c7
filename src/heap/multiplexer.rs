// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Heap multiplexer: turns a stream of packets from many interleaved,
//! possibly out-of-order, possibly lossy heaps into a lazy sequence
//! of finalized heaps.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use crate::codec::packet;
use crate::dialect::{reserved, Dialect};
use crate::trace::{NullSink, TraceEvent, TraceSink};

use super::assembler::HeapAssembler;
use super::Heap;

/// Bounded table of in-flight heaps, keyed by heap counter, with
/// oldest-first-seen eviction.
pub struct HeapMultiplexer {
    dialect: Dialect,
    sink: Box<dyn TraceSink>,
    table: HashMap<u64, HeapAssembler>,
    first_seen: HashMap<u64, Instant>,
    insertion_order: Vec<u64>,
    terminated: bool,
}

impl HeapMultiplexer {
    pub fn new(dialect: Dialect) -> Self {
        Self::with_sink(dialect, Box::new(NullSink))
    }

    pub fn with_sink(dialect: Dialect, sink: Box<dyn TraceSink>) -> Self {
        HeapMultiplexer {
            dialect,
            sink,
            table: HashMap::new(),
            first_seen: HashMap::new(),
            insertion_order: Vec::new(),
            terminated: false,
        }
    }

    /// Whether a STREAM_CTRL=TERM packet has been observed.
    pub fn terminated(&self) -> bool {
        self.terminated
    }

    /// Feeds one packet's raw bytes into the multiplexer. Returns any
    /// heaps that just completed or were evicted as a result — usually
    /// zero or one, occasionally two (an eviction followed immediately
    /// by this packet completing the newly inserted heap).
    pub fn ingest(&mut self, packet: &[u8]) -> Vec<Heap> {
        let mut out = Vec::new();

        let (items, payload, _consumed) = match packet::unpack_packet(self.dialect, packet) {
            Ok(v) => v,
            Err(_) => {
                self.sink.record(TraceEvent::PacketDropped { reason: "malformed packet" });
                return out;
            }
        };

        if items.iter().any(packet::ItemEntry::is_stream_term) {
            self.terminated = true;
            return out;
        }

        let heap_cnt = match items.iter().find(|e| e.id == reserved::HEAP_CNT) {
            Some(e) => e.value,
            None => {
                self.sink.record(TraceEvent::PacketDropped { reason: "missing HEAP_CNT" });
                return out;
            }
        };

        if !self.table.contains_key(&heap_cnt) {
            if self.table.len() >= self.dialect.max_concurrent_heaps {
                if let Some(victim) = self.pick_eviction_victim() {
                    out.extend(self.remove_and_finalize(victim, true));
                }
            }
            self.table.insert(heap_cnt, HeapAssembler::new());
            self.first_seen.insert(heap_cnt, Instant::now());
            self.insertion_order.push(heap_cnt);
        }

        let complete = match self.table.get_mut(&heap_cnt).unwrap().add_packet(&items, payload) {
            Ok(complete) => complete,
            Err(_) => {
                self.sink.record(TraceEvent::PacketDropped { reason: "heap_cnt mismatch" });
                return out;
            }
        };

        if complete {
            out.extend(self.remove_and_finalize(heap_cnt, false));
        }

        out
    }

    /// Finalizes and emits every remaining in-flight heap, in the
    /// order their heap counters were first seen. Call at end of
    /// stream.
    pub fn finish(&mut self) -> Vec<Heap> {
        let order = std::mem::take(&mut self.insertion_order);
        let mut out = Vec::with_capacity(order.len());
        for heap_cnt in order {
            out.extend(self.remove_and_finalize(heap_cnt, false));
        }
        out
    }

    /// Wraps a packet iterator into a lazy iterator of finalized
    /// heaps, consuming `self`.
    pub fn into_heaps<I>(self, packets: I) -> HeapIter<I::IntoIter>
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        HeapIter { packets: packets.into_iter(), mux: self, pending: VecDeque::new(), done: false }
    }

    fn pick_eviction_victim(&self) -> Option<u64> {
        self.first_seen
            .iter()
            .min_by(|a, b| a.1.cmp(b.1).then(a.0.cmp(b.0)))
            .map(|(heap_cnt, _)| *heap_cnt)
    }

    fn remove_and_finalize(&mut self, heap_cnt: u64, evicted: bool) -> Option<Heap> {
        let asm = self.table.remove(&heap_cnt)?;
        self.first_seen.remove(&heap_cnt);
        self.insertion_order.retain(|&h| h != heap_cnt);
        let heap = asm.finalize();
        if evicted {
            self.sink.record(TraceEvent::HeapEvicted { heap_cnt });
        }
        if !heap.is_valid() {
            self.sink.record(TraceEvent::HeapInvalid { heap_cnt });
        }
        Some(heap)
    }
}

/// Lazily drives a packet iterator through a [`HeapMultiplexer`].
pub struct HeapIter<I> {
    packets: I,
    mux: HeapMultiplexer,
    pending: VecDeque<Heap>,
    done: bool,
}

impl<I: Iterator<Item = Vec<u8>>> Iterator for HeapIter<I> {
    type Item = Heap;

    fn next(&mut self) -> Option<Heap> {
        loop {
            if let Some(heap) = self.pending.pop_front() {
                return Some(heap);
            }
            if self.done {
                return None;
            }
            match self.packets.next() {
                Some(packet) => {
                    self.pending.extend(self.mux.ingest(&packet));
                    if self.mux.terminated() {
                        self.done = true;
                        self.pending.extend(self.mux.finish());
                    }
                }
                None => {
                    self.done = true;
                    self.pending.extend(self.mux.finish());
                }
            }
        }
    }
}
