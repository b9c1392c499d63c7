// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Structured observability for the heap multiplexer.
//!
//! The multiplexer never reaches into a process-wide logger for the
//! events a caller might want to count (dropped packets, evicted
//! heaps, invalid heaps); instead it reports them through a
//! constructor-injected `TraceSink`, the same way the reference
//! middleware's listener/reassembly components hand a caller-owned
//! metrics struct into the component rather than writing to a global.
//! Implement the trait to wire events into your own counters; use
//! [`LogSink`] to get the old "just log it" behavior back, or
//! [`NullSink`] to discard them.

/// One observable event from the heap multiplexer.
#[derive(Debug, Clone)]
pub enum TraceEvent {
    /// A packet was rejected before it could be attributed to any heap
    /// (malformed header, unknown dialect mismatch, and so on).
    PacketDropped { reason: &'static str },
    /// A heap was evicted from the bounded table before it completed,
    /// to make room for a newer one.
    HeapEvicted { heap_cnt: u64 },
    /// A heap completed but failed its consistency check.
    HeapInvalid { heap_cnt: u64 },
    /// A descriptor for an id was replaced by a later descriptor for
    /// the same id before the first was ever used.
    DescriptorReplaced { id: u16 },
}

/// Receives [`TraceEvent`]s from a [`crate::heap::multiplexer::HeapMultiplexer`].
pub trait TraceSink: Send {
    fn record(&mut self, event: TraceEvent);
}

/// Discards every event. The default when no sink is supplied.
#[derive(Debug, Default)]
pub struct NullSink;

impl TraceSink for NullSink {
    fn record(&mut self, _event: TraceEvent) {}
}

/// Forwards every event to the `log` crate at a level appropriate to
/// its severity.
#[derive(Debug, Default)]
pub struct LogSink;

impl TraceSink for LogSink {
    fn record(&mut self, event: TraceEvent) {
        match event {
            TraceEvent::PacketDropped { reason } => {
                log::debug!("[spead] packet dropped: {reason}");
            }
            TraceEvent::HeapEvicted { heap_cnt } => {
                log::warn!("[spead] heap {heap_cnt} evicted before completion");
            }
            TraceEvent::HeapInvalid { heap_cnt } => {
                log::warn!("[spead] heap {heap_cnt} completed but is inconsistent");
            }
            TraceEvent::DescriptorReplaced { id } => {
                log::debug!("[spead] descriptor 0x{id:04x} replaced before use");
            }
        }
    }
}
