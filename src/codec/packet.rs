// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire packet codec: header, item table, payload.
//!
//! One packet is an 8-byte header, followed by one 8-byte item entry
//! per declared item (in insertion order), followed by payload bytes.
//! This module only knows about whole 64-bit item entries; the
//! sub-byte bit packing of item *values* lives in [`crate::codec::bits`].

use crate::dialect::{reserved, AddrWidth, Dialect};
use crate::error::{Error, Result};

const MAGIC: u8 = 0x53;
const VERSION: u8 = 0x04;
const HEADER_LEN: usize = 8;

/// Addressing mode of one item header entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// The entry's value field carries the item's payload directly.
    Immediate,
    /// The entry's value field carries a byte offset into the heap blob.
    Direct,
}

/// One 64-bit item header entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemEntry {
    pub mode: Mode,
    pub id: u16,
    /// Immediate payload (left-padded big-endian) or direct byte offset.
    pub value: u64,
}

impl ItemEntry {
    pub fn immediate(id: u16, value: u64) -> Self {
        ItemEntry { mode: Mode::Immediate, id, value }
    }

    pub fn direct(id: u16, offset: u64) -> Self {
        ItemEntry { mode: Mode::Direct, id, value: offset }
    }

    pub fn is_stream_term(&self) -> bool {
        self.mode == Mode::Immediate
            && self.id == reserved::STREAM_CTRL
            && self.value == reserved::STREAM_CTRL_TERM_MARKER
    }
}

fn encode_entry(dialect: Dialect, entry: &ItemEntry) -> [u8; 8] {
    let addr_bits = dialect.addr_bits.bits();
    let id_bits = dialect.addr_bits.id_bits();
    let mode_bit: u64 = if entry.mode == Mode::Direct { 1 } else { 0 };
    let addr_mask: u64 = if addr_bits == 64 { u64::MAX } else { (1u64 << addr_bits) - 1 };
    let id_mask: u64 = if id_bits == 64 { u64::MAX } else { (1u64 << id_bits) - 1 };
    let word = (mode_bit << 63)
        | ((entry.id as u64 & id_mask) << addr_bits)
        | (entry.value & addr_mask);
    word.to_be_bytes()
}

fn decode_entry(dialect: Dialect, bytes: &[u8; 8]) -> ItemEntry {
    let addr_bits = dialect.addr_bits.bits();
    let id_bits = dialect.addr_bits.id_bits();
    let word = u64::from_be_bytes(*bytes);
    let mode_bit = (word >> 63) & 1;
    let id_mask: u64 = if id_bits == 64 { u64::MAX } else { (1u64 << id_bits) - 1 };
    let id = (word >> addr_bits) & id_mask;
    let addr_mask: u64 = if addr_bits == 64 { u64::MAX } else { (1u64 << addr_bits) - 1 };
    let value = word & addr_mask;
    ItemEntry {
        mode: if mode_bit == 1 { Mode::Direct } else { Mode::Immediate },
        id: id as u16,
        value,
    }
}

fn addr_bits_code(width: AddrWidth) -> u8 {
    width.bits() as u8
}

fn addr_width_from_code(code: u8) -> Result<AddrWidth> {
    match code {
        40 => Ok(AddrWidth::Bits40),
        48 => Ok(AddrWidth::Bits48),
        _ => Err(Error::PacketMalformed("unsupported addr_bits code")),
    }
}

/// Serializes a header, item table, and payload into one packet.
pub fn pack_packet(dialect: Dialect, items: &[ItemEntry], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + items.len() * 8 + payload.len());
    out.push(MAGIC);
    out.push(VERSION);
    out.push(crate::dialect::ITEM_BITS as u8);
    out.push(addr_bits_code(dialect.addr_bits));
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&(items.len() as u16).to_be_bytes());
    for entry in items {
        out.extend_from_slice(&encode_entry(dialect, entry));
    }
    out.extend_from_slice(payload);
    out
}

/// Parses one packet: its item table, its payload (sliced to
/// PAYLOAD_LEN when that item is present, empty otherwise), and the
/// number of bytes consumed from `bytes`.
pub fn unpack_packet(dialect: Dialect, bytes: &[u8]) -> Result<(Vec<ItemEntry>, Vec<u8>, usize)> {
    if bytes.len() < HEADER_LEN {
        return Err(Error::PacketMalformed("buffer shorter than header"));
    }
    if bytes[0] != MAGIC {
        return Err(Error::PacketMalformed("magic mismatch"));
    }
    if bytes[1] != VERSION {
        return Err(Error::PacketMalformed("version mismatch"));
    }
    if bytes[2] != crate::dialect::ITEM_BITS as u8 {
        return Err(Error::PacketMalformed("item_bits mismatch"));
    }
    let addr_bits = addr_width_from_code(bytes[3])?;
    if addr_bits != dialect.addr_bits {
        return Err(Error::PacketMalformed("addr_bits does not match configured dialect"));
    }
    let item_count = u16::from_be_bytes([bytes[6], bytes[7]]) as usize;
    let table_end = HEADER_LEN + item_count * 8;
    if bytes.len() < table_end {
        return Err(Error::PacketMalformed("buffer shorter than item table"));
    }

    let mut items = Vec::with_capacity(item_count);
    for i in 0..item_count {
        let start = HEADER_LEN + i * 8;
        let mut entry_bytes = [0u8; 8];
        entry_bytes.copy_from_slice(&bytes[start..start + 8]);
        items.push(decode_entry(dialect, &entry_bytes));
    }

    let is_term = items.iter().any(ItemEntry::is_stream_term);
    let payload_len_item = items
        .iter()
        .find(|e| e.mode == Mode::Immediate && e.id == reserved::PAYLOAD_LENGTH)
        .map(|e| e.value as usize);
    let heap_cnt_present = items.iter().any(|e| e.id == reserved::HEAP_CNT);

    if !is_term {
        if !heap_cnt_present {
            return Err(Error::PacketMalformed("missing HEAP_CNT"));
        }
        if payload_len_item.is_none() {
            return Err(Error::PacketMalformed("missing PAYLOAD_LEN"));
        }
    }

    let payload_len = payload_len_item.unwrap_or(0);
    let payload_end = table_end + payload_len;
    if bytes.len() < payload_end {
        return Err(Error::PacketMalformed("payload shorter than PAYLOAD_LEN"));
    }

    Ok((items, bytes[table_end..payload_end].to_vec(), payload_end))
}

/// Resolves each direct-mode entry's offset into a `(id, offset, length)`
/// slice of a blob of `blob_len` bytes: a direct item's length is the
/// distance to the next direct item's offset (in sorted order) or to
/// the end of the blob. Shared by the heap assembler and the
/// descriptor's miniature-heap decode.
pub fn resolve_direct_slices(items: &[ItemEntry], blob_len: usize) -> Vec<(u16, usize, usize)> {
    let mut direct: Vec<(u16, usize)> = items
        .iter()
        .filter(|e| e.mode == Mode::Direct)
        .map(|e| (e.id, e.value as usize))
        .collect();
    direct.sort_by_key(|(_, offset)| *offset);
    let mut out = Vec::with_capacity(direct.len());
    for i in 0..direct.len() {
        let (id, offset) = direct[i];
        let end = direct.get(i + 1).map(|(_, next)| *next).unwrap_or(blob_len);
        out.push((id, offset, end.saturating_sub(offset)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip_immediate_item() {
        let dialect = Dialect::default();
        let items = vec![
            ItemEntry::immediate(reserved::HEAP_CNT, 1),
            ItemEntry::immediate(reserved::PAYLOAD_LENGTH, 4),
        ];
        let payload = vec![1, 2, 3, 4];
        let packet = pack_packet(dialect, &items, &payload);
        let (decoded_items, decoded_payload, consumed) =
            unpack_packet(dialect, &packet).unwrap();
        assert_eq!(decoded_items, items);
        assert_eq!(decoded_payload, payload);
        assert_eq!(consumed, packet.len());
    }

    #[test]
    fn rejects_bad_magic() {
        let dialect = Dialect::default();
        let mut packet = pack_packet(dialect, &[], &[]);
        packet[0] = 0xff;
        assert!(unpack_packet(dialect, &packet).is_err());
    }

    #[test]
    fn term_packet_needs_no_heap_cnt() {
        let dialect = Dialect::default();
        let items = vec![ItemEntry::immediate(
            reserved::STREAM_CTRL,
            reserved::STREAM_CTRL_TERM_MARKER,
        )];
        let packet = pack_packet(dialect, &items, &[]);
        let (decoded, payload, _) = unpack_packet(dialect, &packet).unwrap();
        assert!(decoded[0].is_stream_term());
        assert!(payload.is_empty());
    }

    #[test]
    fn direct_entry_round_trips_offset() {
        let dialect = Dialect::new(AddrWidth::Bits48);
        let items = vec![
            ItemEntry::immediate(reserved::HEAP_CNT, 1),
            ItemEntry::immediate(reserved::PAYLOAD_LENGTH, 20),
            ItemEntry::direct(0x1234, 17),
        ];
        let packet = pack_packet(dialect, &items, &[0u8; 20]);
        let (decoded, _, _) = unpack_packet(dialect, &packet).unwrap();
        let direct_entry = decoded.iter().find(|e| e.id == 0x1234).unwrap();
        assert_eq!(direct_entry.mode, Mode::Direct);
        assert_eq!(direct_entry.value, 17);
    }
}
