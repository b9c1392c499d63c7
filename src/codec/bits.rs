// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bit-level pack/unpack kernel.
//!
//! Values are packed MSB-first, big-endian, with no byte alignment
//! between fields — exactly the wire format's item *value* encoding
//! (as opposed to the item *header entries*, which are whole 64-bit
//! words; see [`crate::codec::packet`]). Everything here goes through
//! a single [`BitCursor`] so every caller gets the same shift-and-mask
//! behavior instead of each call site hand-rolling it.

use crate::error::{CodecError, Result};
use crate::value::Scalar;

/// The five value kinds a format component may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    Signed,
    Unsigned,
    Float,
    /// Raw bytes (a run of 8-bit-aligned char data).
    Char,
    /// A single flag bit.
    Bit,
}

/// One `(kind, bit_width)` component of an item's format tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatComponent {
    kind: FormatKind,
    bits: u8,
}

impl FormatComponent {
    /// Validates `kind`/`bits` at construction so an invalid format
    /// tuple can never be built in the first place.
    pub fn new(kind: FormatKind, bits: u8) -> Result<Self> {
        if bits == 0 || bits > 64 {
            return Err(CodecError::FormatError(format!(
                "bit width {bits} out of range 1..=64"
            ))
            .into());
        }
        match kind {
            FormatKind::Float if bits != 32 && bits != 64 => {
                return Err(CodecError::FormatError(
                    "float format must be 32 or 64 bits".into(),
                )
                .into());
            }
            FormatKind::Char if bits % 8 != 0 => {
                return Err(CodecError::FormatError(
                    "char format must be a multiple of 8 bits".into(),
                )
                .into());
            }
            FormatKind::Bit if bits != 1 => {
                return Err(CodecError::FormatError("bit format must be exactly 1 bit".into())
                    .into());
            }
            _ => {}
        }
        Ok(FormatComponent { kind, bits })
    }

    pub fn kind(self) -> FormatKind {
        self.kind
    }

    pub fn bits(self) -> u8 {
        self.bits
    }
}

/// Total bit width of one row under `fmt` (the sum of its components).
pub fn row_bit_width(fmt: &[FormatComponent]) -> usize {
    fmt.iter().map(|c| c.bits as usize).sum()
}

/// A write cursor over a growing byte buffer, positioned to the bit.
struct BitWriter {
    buf: Vec<u8>,
    bit_pos: usize,
}

impl BitWriter {
    fn new() -> Self {
        BitWriter { buf: Vec::new(), bit_pos: 0 }
    }

    /// Writes the low `bits` bits of `value`, MSB first.
    fn write_bits(&mut self, value: u64, bits: u8) {
        for i in (0..bits).rev() {
            let bit = (value >> i) & 1;
            let byte_idx = self.bit_pos / 8;
            if byte_idx == self.buf.len() {
                self.buf.push(0);
            }
            if bit != 0 {
                self.buf[byte_idx] |= 1 << (7 - (self.bit_pos % 8));
            }
            self.bit_pos += 1;
        }
    }

    fn write_bytes_unaligned(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.write_bits(b as u64, 8);
        }
    }

    fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// A read cursor over a borrowed byte slice, positioned to the bit.
struct BitReader<'a> {
    buf: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(buf: &'a [u8], start_bit_offset: u8) -> Self {
        BitReader { buf, bit_pos: start_bit_offset as usize }
    }

    fn remaining_bits(&self) -> usize {
        self.buf.len() * 8 - self.bit_pos.min(self.buf.len() * 8)
    }

    fn read_bits(&mut self, bits: u8) -> Result<u64> {
        if self.bit_pos + bits as usize > self.buf.len() * 8 {
            return Err(CodecError::OutOfRange {
                start_bit_offset: (self.bit_pos % 8) as u8,
            }
            .into());
        }
        let mut value = 0u64;
        for _ in 0..bits {
            let byte_idx = self.bit_pos / 8;
            let bit = (self.buf[byte_idx] >> (7 - (self.bit_pos % 8))) & 1;
            value = (value << 1) | bit as u64;
            self.bit_pos += 1;
        }
        Ok(value)
    }

    fn read_bytes_unaligned(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.read_bits(8)? as u8);
        }
        Ok(out)
    }
}

fn encode_scalar(w: &mut BitWriter, comp: FormatComponent, scalar: &Scalar) -> Result<()> {
    match (comp.kind, scalar) {
        (FormatKind::Unsigned, Scalar::Unsigned(v)) => {
            if comp.bits < 64 && *v >= (1u64 << comp.bits) {
                return Err(CodecError::EncodingOverflow { bits: comp.bits }.into());
            }
            w.write_bits(*v, comp.bits);
            Ok(())
        }
        (FormatKind::Signed, Scalar::Signed(v)) => {
            let bits = comp.bits;
            let (lo, hi) = signed_range(bits);
            if *v < lo || *v > hi {
                return Err(CodecError::EncodingOverflow { bits }.into());
            }
            let mask = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
            w.write_bits((*v as u64) & mask, bits);
            Ok(())
        }
        (FormatKind::Float, Scalar::Float(v)) => {
            if comp.bits == 32 {
                w.write_bits((*v as f32).to_bits() as u64, 32);
            } else {
                w.write_bits(v.to_bits(), 64);
            }
            Ok(())
        }
        (FormatKind::Char, Scalar::Bytes(bytes)) => {
            let expected = comp.bits as usize / 8;
            if bytes.len() != expected {
                return Err(CodecError::FormatError(format!(
                    "char component expects {expected} bytes, got {}",
                    bytes.len()
                ))
                .into());
            }
            w.write_bytes_unaligned(bytes);
            Ok(())
        }
        (FormatKind::Bit, Scalar::Bit(b)) => {
            w.write_bits(if *b { 1 } else { 0 }, 1);
            Ok(())
        }
        _ => Err(CodecError::FormatError("scalar does not match format kind".into()).into()),
    }
}

fn decode_scalar(r: &mut BitReader<'_>, comp: FormatComponent) -> Result<Scalar> {
    match comp.kind {
        FormatKind::Unsigned => Ok(Scalar::Unsigned(r.read_bits(comp.bits)?)),
        FormatKind::Signed => {
            let raw = r.read_bits(comp.bits)?;
            Ok(Scalar::Signed(sign_extend(raw, comp.bits)))
        }
        FormatKind::Float => {
            let raw = r.read_bits(comp.bits)?;
            if comp.bits == 32 {
                Ok(Scalar::Float(f32::from_bits(raw as u32) as f64))
            } else {
                Ok(Scalar::Float(f64::from_bits(raw)))
            }
        }
        FormatKind::Char => {
            let bytes = r.read_bytes_unaligned(comp.bits as usize / 8)?;
            Ok(Scalar::Bytes(bytes))
        }
        FormatKind::Bit => Ok(Scalar::Bit(r.read_bits(1)? != 0)),
    }
}

fn signed_range(bits: u8) -> (i64, i64) {
    if bits >= 64 {
        (i64::MIN, i64::MAX)
    } else {
        (-(1i64 << (bits - 1)), (1i64 << (bits - 1)) - 1)
    }
}

fn sign_extend(raw: u64, bits: u8) -> i64 {
    if bits >= 64 {
        return raw as i64;
    }
    let sign_bit = 1u64 << (bits - 1);
    if raw & sign_bit != 0 {
        (raw as i64) - (1i64 << bits)
    } else {
        raw as i64
    }
}

/// Packs `rows` (each a tuple matching `fmt`) into a flat, bit-packed
/// byte buffer, zero-padding the final byte.
pub fn pack(fmt: &[FormatComponent], rows: &[Vec<Scalar>]) -> Result<Vec<u8>> {
    let mut w = BitWriter::new();
    for row in rows {
        if row.len() != fmt.len() {
            return Err(CodecError::FormatError(format!(
                "row has {} fields, format declares {}",
                row.len(),
                fmt.len()
            ))
            .into());
        }
        for (comp, scalar) in fmt.iter().zip(row.iter()) {
            encode_scalar(&mut w, *comp, scalar)?;
        }
    }
    Ok(w.into_bytes())
}

/// Repositions the low `nbits` significant bits of `encoded` (as
/// produced by [`pack`] or a dense dtype encoding — packed MSB-first
/// starting at bit 0, with any padding in the trailing bits of the
/// last byte) so they occupy the *low* `nbits` bits of a
/// `field_bits`-wide buffer, zero-filling the bits above them.
///
/// Used to place a value that doesn't fill a whole item header
/// field (an immediate value narrower than `ADDR_BITS`) so that
/// reading it back with `start_bit_offset = field_bits - nbits`
/// against the *byte* it starts in recovers the original bits —
/// instead of the byte-right-aligned value landing at the top of its
/// last byte, which only happens to agree with the low-bit placement
/// when `nbits` is a multiple of 8.
pub fn shift_into_field(encoded: &[u8], nbits: u32, field_bits: u32) -> Vec<u8> {
    debug_assert!(nbits <= field_bits);
    let mut reader = BitReader::new(encoded, 0);
    let mut writer = BitWriter::new();
    let pad = field_bits - nbits;
    if pad > 0 {
        writer.write_bits(0, pad as u8);
    }
    if nbits > 0 {
        let value = reader.read_bits(nbits as u8).unwrap_or(0);
        writer.write_bits(value, nbits as u8);
    }
    let mut bytes = writer.into_bytes();
    bytes.resize((field_bits as usize + 7) / 8, 0);
    bytes
}

/// Unpacks `bytes` into rows matching `fmt`.
///
/// `count == -1` means "decode as many full rows as fit" (a streaming
/// or variable-length item); `count == 0` returns an empty sequence
/// immediately without touching `bytes`; any `count > 0` decodes
/// exactly that many rows, erroring if the buffer runs out first.
/// `start_bit_offset` is a sub-byte offset into `bytes[0]`; offsets of
/// 8 or more are rejected since they'd really mean "start at a later
/// byte", which callers should express by slicing `bytes` instead.
pub fn unpack(
    fmt: &[FormatComponent],
    bytes: &[u8],
    count: i64,
    start_bit_offset: u8,
) -> Result<Vec<Vec<Scalar>>> {
    if start_bit_offset >= 8 {
        return Err(CodecError::OutOfRange { start_bit_offset }.into());
    }
    if fmt.is_empty() {
        return Ok(Vec::new());
    }
    if count == 0 {
        return Ok(Vec::new());
    }
    let row_bits = row_bit_width(fmt);
    let mut r = BitReader::new(bytes, start_bit_offset);
    let mut rows = Vec::new();

    if count < 0 {
        while r.remaining_bits() >= row_bits {
            rows.push(decode_row(&mut r, fmt)?);
        }
        return Ok(rows);
    }

    for _ in 0..count {
        rows.push(decode_row(&mut r, fmt)?);
    }
    Ok(rows)
}

fn decode_row(r: &mut BitReader<'_>, fmt: &[FormatComponent]) -> Result<Vec<Scalar>> {
    let mut row = Vec::with_capacity(fmt.len());
    for comp in fmt {
        row.push(decode_scalar(r, *comp)?);
    }
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(bits: u8) -> FormatComponent {
        FormatComponent::new(FormatKind::Unsigned, bits).unwrap()
    }

    fn i(bits: u8) -> FormatComponent {
        FormatComponent::new(FormatKind::Signed, bits).unwrap()
    }

    #[test]
    fn round_trip_unaligned_unsigned() {
        let fmt = vec![u(3), u(5), u(8)];
        let rows = vec![vec![Scalar::Unsigned(5), Scalar::Unsigned(17), Scalar::Unsigned(200)]];
        let packed = pack(&fmt, &rows).unwrap();
        let unpacked = unpack(&fmt, &packed, 1, 0).unwrap();
        assert_eq!(unpacked, rows);
    }

    #[test]
    fn signed_round_trip_negative() {
        let fmt = vec![i(8)];
        let rows = vec![vec![Scalar::Signed(-1)]];
        let packed = pack(&fmt, &rows).unwrap();
        assert_eq!(packed, vec![0xff]);
        let unpacked = unpack(&fmt, &packed, 1, 0).unwrap();
        assert_eq!(unpacked, rows);
    }

    #[test]
    fn float64_round_trip() {
        let fmt = vec![FormatComponent::new(FormatKind::Float, 64).unwrap()];
        let rows = vec![vec![Scalar::Float(3.5)]];
        let packed = pack(&fmt, &rows).unwrap();
        let unpacked = unpack(&fmt, &packed, 1, 0).unwrap();
        assert_eq!(unpacked, rows);
    }

    #[test]
    fn count_negative_one_consumes_all_full_rows() {
        let fmt = vec![u(8)];
        let bytes = vec![1, 2, 3];
        let rows = unpack(&fmt, &bytes, -1, 0).unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn count_zero_returns_empty() {
        let fmt = vec![u(8)];
        let rows = unpack(&fmt, &[], 0, 0).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn overflow_is_rejected() {
        let fmt = vec![u(3)];
        let rows = vec![vec![Scalar::Unsigned(8)]];
        assert!(pack(&fmt, &rows).is_err());
    }

    #[test]
    fn unpack_rejects_start_bit_offset_past_a_byte() {
        let fmt = vec![u(8)];
        assert!(unpack(&fmt, &[0xff], 1, 8).is_err());
    }

    #[test]
    fn shift_into_field_moves_a_single_bit_to_the_low_end() {
        // Mirrors item_group.rs's build_heap/apply_heap: a 1-bit value
        // placed in a 40-bit field lands at bit_offset = 40 - 1 = 39,
        // i.e. byte 4, sub-bit offset 7 (the field's very last bit).
        let fmt = vec![FormatComponent::new(FormatKind::Bit, 1).unwrap()];
        let encoded = pack(&fmt, &[vec![Scalar::Bit(true)]]).unwrap();
        assert_eq!(encoded, vec![0x80]);

        let field = shift_into_field(&encoded, 1, 40);
        assert_eq!(field, vec![0, 0, 0, 0, 1]);

        let unpacked = unpack(&fmt, &field[4..], 1, 7).unwrap();
        assert_eq!(unpacked, vec![vec![Scalar::Bit(true)]]);
    }

    #[test]
    fn shift_into_field_moves_an_unaligned_width_to_the_low_end() {
        // A 3-bit value in a 40-bit field: bit_offset = 40 - 3 = 37,
        // i.e. byte 4, sub-bit offset 5.
        let fmt = vec![u(3)];
        let encoded = pack(&fmt, &[vec![Scalar::Unsigned(5)]]).unwrap();
        assert_eq!(encoded, vec![0xA0]);

        let field = shift_into_field(&encoded, 3, 40);
        assert_eq!(field, vec![0, 0, 0, 0, 5]);

        let unpacked = unpack(&fmt, &field[4..], 1, 5).unwrap();
        assert_eq!(unpacked, vec![vec![Scalar::Unsigned(5)]]);
    }

    #[test]
    fn invalid_float_width_rejected_at_construction() {
        assert!(FormatComponent::new(FormatKind::Float, 40).is_err());
    }
}
