// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! File-backed packet source and sink.
//!
//! The source reads the whole file up front rather than streaming it
//! in `max_packet_size` chunks — simpler, and for this protocol's
//! typical file sizes (recorded heap captures, not live multi-gigabyte
//! feeds) the read-ahead buffering the wire description calls for
//! buys nothing a single `fs::read` doesn't already give for free.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::dialect::Dialect;
use crate::error::Result;

use super::bytes::BytesSource;
use super::{PacketSink, PacketSource};

/// Appends every sent packet to a file, buffered.
pub struct FileSink {
    writer: BufWriter<File>,
}

impl FileSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path)?;
        Ok(FileSink { writer: BufWriter::new(file) })
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl PacketSink for FileSink {
    fn send(&mut self, packet: &[u8]) -> Result<()> {
        self.writer.write_all(packet)?;
        Ok(())
    }
}

/// Reads packets back out of a file written by [`FileSink`].
pub struct FileSource {
    inner: BytesSource,
}

impl FileSource {
    pub fn open(dialect: Dialect, path: impl AsRef<Path>, allow_junk: bool) -> Result<Self> {
        let buf = std::fs::read(path)?;
        Ok(FileSource { inner: BytesSource::new(dialect, buf, allow_junk) })
    }
}

impl PacketSource for FileSource {
    fn recv_packet(&mut self) -> Result<Option<Vec<u8>>> {
        self.inner.recv_packet()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::packet::{pack_packet, ItemEntry};
    use crate::dialect::reserved;
    use crate::heap::multiplexer::HeapMultiplexer;

    #[test]
    fn five_thousand_packets_plus_term_yield_five_thousand_heaps() {
        let dialect = Dialect::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.spead");

        let mut sink = FileSink::create(&path).unwrap();
        for heap_cnt in 1..=5000u64 {
            let packet = pack_packet(
                dialect,
                &[
                    ItemEntry::immediate(reserved::HEAP_CNT, heap_cnt),
                    ItemEntry::immediate(reserved::HEAP_LEN, 2),
                    ItemEntry::immediate(reserved::PAYLOAD_OFFSET, 0),
                    ItemEntry::immediate(reserved::PAYLOAD_LENGTH, 2),
                ],
                &[1, 2],
            );
            sink.send(&packet).unwrap();
        }
        sink.send(&crate::transmitter::end_packet(dialect)).unwrap();
        sink.flush().unwrap();

        let mut source = FileSource::open(dialect, &path, false).unwrap();
        let mut packets = Vec::new();
        while let Some(p) = source.recv_packet().unwrap() {
            packets.push(p);
        }

        let mux = HeapMultiplexer::new(dialect);
        let heaps: Vec<_> = mux.into_heaps(packets).collect();
        assert_eq!(heaps.len(), 5000);
        assert!(heaps.iter().all(|h| h.is_valid()));
    }
}
