// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Packet transports: a transport is a byte-oriented sink (`write`) or
//! a finite/infinite source of packets. Each transport variant is a
//! simple byte-string, file, or UDP socket collaborator; none of them
//! know anything about heaps or items.

pub mod bytes;
pub mod file;
pub mod udp;

use crate::dialect::Dialect;
use crate::error::Result;

/// Writes whole packets to an underlying byte sink.
pub trait PacketSink {
    fn send(&mut self, packet: &[u8]) -> Result<()>;
}

/// Produces packets one at a time. Returns `Ok(None)` at a clean end
/// of stream (buffer exhausted, file EOF, or the source was halted).
pub trait PacketSource {
    fn recv_packet(&mut self) -> Result<Option<Vec<u8>>>;
}

/// Scans forward from `buf[pos..]` for the next well-formed packet.
///
/// Shared by the byte-string and file sources, which differ only in
/// where their buffer comes from. On a parse failure, advances by one
/// byte and retries when `allow_junk` is set (tolerating interleaved
/// garbage); otherwise treats the failure as end of stream.
///
/// Returns `(packet_bytes, new_pos)`.
pub fn scan_next_packet(
    dialect: Dialect,
    buf: &[u8],
    mut pos: usize,
    allow_junk: bool,
) -> Option<(Vec<u8>, usize)> {
    loop {
        if pos >= buf.len() {
            return None;
        }
        match crate::codec::packet::unpack_packet(dialect, &buf[pos..]) {
            Ok((_, _, consumed)) => {
                let packet = buf[pos..pos + consumed].to_vec();
                return Some((packet, pos + consumed));
            }
            Err(_) if allow_junk => {
                pos += 1;
            }
            Err(_) => return None,
        }
    }
}
