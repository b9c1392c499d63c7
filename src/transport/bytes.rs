// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory byte-string source and sink.

use crate::dialect::Dialect;
use crate::error::Result;

use super::{scan_next_packet, PacketSink, PacketSource};

/// Appends every sent packet to a growable in-memory buffer.
#[derive(Debug, Default)]
pub struct BytesSink {
    buf: Vec<u8>,
}

impl BytesSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

impl PacketSink for BytesSink {
    fn send(&mut self, packet: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(packet);
        Ok(())
    }
}

/// Scans an in-memory buffer for packets.
pub struct BytesSource {
    dialect: Dialect,
    buf: Vec<u8>,
    pos: usize,
    allow_junk: bool,
    stopped: bool,
}

impl BytesSource {
    pub fn new(dialect: Dialect, buf: Vec<u8>, allow_junk: bool) -> Self {
        BytesSource { dialect, buf, pos: 0, allow_junk, stopped: false }
    }
}

impl PacketSource for BytesSource {
    fn recv_packet(&mut self) -> Result<Option<Vec<u8>>> {
        if self.stopped {
            return Ok(None);
        }
        match scan_next_packet(self.dialect, &self.buf, self.pos, self.allow_junk) {
            Some((packet, new_pos)) => {
                self.pos = new_pos;
                if crate::codec::packet::unpack_packet(self.dialect, &packet)
                    .map(|(items, _, _)| items.iter().any(crate::codec::packet::ItemEntry::is_stream_term))
                    .unwrap_or(false)
                {
                    self.stopped = true;
                }
                Ok(Some(packet))
            }
            None => {
                self.stopped = true;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::packet::{pack_packet, ItemEntry};
    use crate::dialect::reserved;

    #[test]
    fn round_trips_two_packets_through_a_buffer() {
        let dialect = Dialect::default();
        let mut sink = BytesSink::new();
        let p1 = pack_packet(
            dialect,
            &[
                ItemEntry::immediate(reserved::HEAP_CNT, 1),
                ItemEntry::immediate(reserved::PAYLOAD_LENGTH, 2),
            ],
            &[9, 9],
        );
        let p2 = pack_packet(
            dialect,
            &[
                ItemEntry::immediate(reserved::HEAP_CNT, 2),
                ItemEntry::immediate(reserved::PAYLOAD_LENGTH, 1),
            ],
            &[1],
        );
        sink.send(&p1).unwrap();
        sink.send(&p2).unwrap();

        let mut source = BytesSource::new(dialect, sink.into_bytes(), false);
        assert_eq!(source.recv_packet().unwrap(), Some(p1));
        assert_eq!(source.recv_packet().unwrap(), Some(p2));
        assert_eq!(source.recv_packet().unwrap(), None);
    }

    #[test]
    fn allow_junk_skips_garbage_between_packets() {
        let dialect = Dialect::default();
        let p1 = pack_packet(
            dialect,
            &[
                ItemEntry::immediate(reserved::HEAP_CNT, 1),
                ItemEntry::immediate(reserved::PAYLOAD_LENGTH, 0),
            ],
            &[],
        );
        let mut buf = vec![0xffu8; 3];
        buf.extend_from_slice(&p1);
        let mut source = BytesSource::new(dialect, buf, true);
        assert_eq!(source.recv_packet().unwrap(), Some(p1));
    }

    #[test]
    fn stops_after_term_packet() {
        let dialect = Dialect::default();
        let term = pack_packet(
            dialect,
            &[ItemEntry::immediate(reserved::STREAM_CTRL, reserved::STREAM_CTRL_TERM_MARKER)],
            &[],
        );
        let mut source = BytesSource::new(dialect, term, false);
        assert!(source.recv_packet().unwrap().is_some());
        assert_eq!(source.recv_packet().unwrap(), None);
    }
}
