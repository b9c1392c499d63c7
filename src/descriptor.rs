// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Item descriptors: static metadata that rides in its own miniature
//! heap, embedded under the DESCRIPTOR reserved item.

use crate::codec::bits::{FormatComponent, FormatKind};
use crate::codec::packet::{self, ItemEntry};
use crate::dialect::{reserved, Dialect};
use crate::error::{CodecError, Error, Result};

/// An item's shape: a fixed sequence of non-negative dimensions, or
/// the dynamic sentinel for variable-length items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    Fixed(Vec<u32>),
    Dynamic,
}

impl Shape {
    /// Product of dimensions, `-1` for dynamic, `1` for a scalar
    /// (an empty fixed shape).
    pub fn size(&self) -> i64 {
        match self {
            Shape::Dynamic => -1,
            Shape::Fixed(dims) => dims.iter().map(|&d| d as i64).product::<i64>().max(1),
        }
    }
}

/// Static metadata describing one item.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    pub id: u16,
    pub name: String,
    pub description: String,
    pub shape: Shape,
    pub format: Vec<FormatComponent>,
    pub dtype: Option<String>,
}

impl Descriptor {
    /// Total bits of this item's encoded value, or `None` when the
    /// shape is dynamic (size unknown ahead of decode). Accounts for
    /// both bit-packed formats and dense `dtype` items, whose width
    /// comes from the dtype string rather than `format`.
    pub fn nbits(&self) -> Option<i64> {
        let size = self.shape.size();
        if size < 0 {
            return None;
        }
        if let Some(dtype) = &self.dtype {
            let itemsize = crate::dtype::itemsize(dtype).ok()?;
            return Some(size * itemsize as i64 * 8);
        }
        let row_bits: i64 = self.format.iter().map(|c| c.bits() as i64).sum();
        Some(size * row_bits)
    }

    /// Bit offset within an `ADDR_BITS`-wide immediate field at which
    /// this descriptor's packed value begins, for items short enough
    /// to be carried inline.
    pub fn bit_offset(&self, addr_bits: u32) -> u32 {
        match self.nbits() {
            Some(nbits) if (nbits as u32) < addr_bits => addr_bits - nbits as u32,
            _ => 0,
        }
    }

    /// Builds the self-contained single-packet heap carrying this
    /// descriptor's fields.
    pub fn encode(&self, dialect: Dialect) -> Vec<u8> {
        let name_bytes = self.name.as_bytes().to_vec();
        let description_bytes = self.description.as_bytes().to_vec();
        let shape_bytes = encode_shape(&self.shape);
        let format_bytes = encode_format(&self.format);
        let dtype_bytes = self.dtype.as_ref().map(|s| s.as_bytes().to_vec());

        let mut payload = Vec::new();
        let mut items = vec![
            ItemEntry::immediate(reserved::HEAP_CNT, 0),
            ItemEntry::immediate(reserved::DESC_ID, self.id as u64),
        ];

        let mut push_direct = |items: &mut Vec<ItemEntry>, payload: &mut Vec<u8>, id: u16, bytes: &[u8]| {
            items.push(ItemEntry::direct(id, payload.len() as u64));
            payload.extend_from_slice(bytes);
        };
        push_direct(&mut items, &mut payload, reserved::DESC_NAME, &name_bytes);
        push_direct(&mut items, &mut payload, reserved::DESC_DESCRIPTION, &description_bytes);
        push_direct(&mut items, &mut payload, reserved::DESC_SHAPE, &shape_bytes);
        push_direct(&mut items, &mut payload, reserved::DESC_FORMAT, &format_bytes);
        if let Some(dtype_bytes) = &dtype_bytes {
            push_direct(&mut items, &mut payload, reserved::DESC_DTYPE, dtype_bytes);
        }

        items.push(ItemEntry::immediate(reserved::HEAP_LEN, payload.len() as u64));
        items.push(ItemEntry::immediate(reserved::PAYLOAD_OFFSET, 0));
        items.push(ItemEntry::immediate(reserved::PAYLOAD_LENGTH, payload.len() as u64));

        packet::pack_packet(dialect, &items, &payload)
    }

    /// Parses a descriptor back out of a packet built by [`Self::encode`].
    pub fn decode(dialect: Dialect, bytes: &[u8]) -> Result<Self> {
        let (items, payload, _consumed) = packet::unpack_packet(dialect, bytes)?;
        let id = items
            .iter()
            .find(|e| e.id == reserved::DESC_ID)
            .map(|e| e.value as u16)
            .ok_or(Error::PacketMalformed("descriptor missing ID"))?;

        let slices = packet::resolve_direct_slices(&items, payload.len());
        let slice_for = |wanted: u16| -> Option<&[u8]> {
            slices
                .iter()
                .find(|(id, _, _)| *id == wanted)
                .map(|(_, off, len)| &payload[*off..*off + *len])
        };

        let name = String::from_utf8(
            slice_for(reserved::DESC_NAME)
                .ok_or(Error::PacketMalformed("descriptor missing NAME"))?
                .to_vec(),
        )
        .map_err(|_| Error::PacketMalformed("descriptor NAME is not valid utf-8"))?;
        let description = String::from_utf8(
            slice_for(reserved::DESC_DESCRIPTION)
                .ok_or(Error::PacketMalformed("descriptor missing DESCRIPTION"))?
                .to_vec(),
        )
        .map_err(|_| Error::PacketMalformed("descriptor DESCRIPTION is not valid utf-8"))?;
        let shape = decode_shape(
            slice_for(reserved::DESC_SHAPE).ok_or(Error::PacketMalformed("descriptor missing SHAPE"))?,
        )?;
        let format = decode_format(
            slice_for(reserved::DESC_FORMAT)
                .ok_or(Error::PacketMalformed("descriptor missing FORMAT"))?,
        )?;
        let dtype = slice_for(reserved::DESC_DTYPE)
            .map(|bytes| String::from_utf8(bytes.to_vec()))
            .transpose()
            .map_err(|_| Error::PacketMalformed("descriptor DTYPE is not valid utf-8"))?;

        Ok(Descriptor { id, name, description, shape, format, dtype })
    }
}

fn encode_shape(shape: &Shape) -> Vec<u8> {
    let mut out = Vec::new();
    match shape {
        Shape::Fixed(dims) => {
            for &dim in dims {
                out.push(0);
                out.extend_from_slice(&dim.to_be_bytes());
            }
        }
        Shape::Dynamic => {
            out.push(2);
            out.extend_from_slice(&0u32.to_be_bytes());
        }
    }
    out
}

fn decode_shape(bytes: &[u8]) -> Result<Shape> {
    if bytes.len() % 5 != 0 {
        return Err(CodecError::FormatError("malformed SHAPE encoding".into()).into());
    }
    let mut dims = Vec::new();
    for chunk in bytes.chunks_exact(5) {
        let tag = chunk[0];
        let dim = u32::from_be_bytes([chunk[1], chunk[2], chunk[3], chunk[4]]);
        match tag {
            0 => dims.push(dim),
            2 => return Ok(Shape::Dynamic),
            _ => return Err(CodecError::FormatError(format!("unknown shape tag {tag}")).into()),
        }
    }
    Ok(Shape::Fixed(dims))
}

fn encode_format(format: &[FormatComponent]) -> Vec<u8> {
    let mut out = Vec::with_capacity(format.len() * 4);
    for comp in format {
        out.push(kind_char(comp.kind()));
        let width = comp.bits() as u32;
        out.extend_from_slice(&width.to_be_bytes()[1..]);
    }
    out
}

fn decode_format(bytes: &[u8]) -> Result<Vec<FormatComponent>> {
    if bytes.len() % 4 != 0 {
        return Err(CodecError::FormatError("malformed FORMAT encoding".into()).into());
    }
    let mut out = Vec::with_capacity(bytes.len() / 4);
    for chunk in bytes.chunks_exact(4) {
        let kind = kind_from_char(chunk[0])?;
        let width = u32::from_be_bytes([0, chunk[1], chunk[2], chunk[3]]);
        out.push(FormatComponent::new(kind, width as u8)?);
    }
    Ok(out)
}

fn kind_char(kind: FormatKind) -> u8 {
    match kind {
        FormatKind::Signed => b'i',
        FormatKind::Unsigned => b'u',
        FormatKind::Float => b'f',
        FormatKind::Char => b'c',
        FormatKind::Bit => b'b',
    }
}

fn kind_from_char(c: u8) -> Result<FormatKind> {
    Ok(match c {
        b'i' => FormatKind::Signed,
        b'u' => FormatKind::Unsigned,
        b'f' => FormatKind::Float,
        b'c' => FormatKind::Char,
        b'b' => FormatKind::Bit,
        other => {
            return Err(CodecError::FormatError(format!("unknown format kind {:?}", other as char)).into())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_fixed_shape_descriptor() {
        let dialect = Dialect::default();
        let d = Descriptor {
            id: 0x1001,
            name: "timestamp".into(),
            description: "ADC sample count".into(),
            shape: Shape::Fixed(vec![1]),
            format: vec![FormatComponent::new(FormatKind::Unsigned, 48).unwrap()],
            dtype: None,
        };
        let encoded = d.encode(dialect);
        let decoded = Descriptor::decode(dialect, &encoded).unwrap();
        assert_eq!(decoded, d);
    }

    #[test]
    fn round_trip_dynamic_shape_with_dtype() {
        let dialect = Dialect::default();
        let d = Descriptor {
            id: 0x1002,
            name: "visibilities".into(),
            description: "complex correlator output".into(),
            shape: Shape::Dynamic,
            format: vec![],
            dtype: Some(">f4".into()),
        };
        let encoded = d.encode(dialect);
        let decoded = Descriptor::decode(dialect, &encoded).unwrap();
        assert_eq!(decoded, d);
    }
}
