// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dense-array dtype dialect.
//!
//! An item may optionally carry a dtype string instead of a bit-packed
//! format — a numeric-array header literal in the spirit of the numpy
//! array-interface typestring (`<f8`, `>u2`, `|u1`, ...): an optional
//! byte-order character, a kind character, and an element width in
//! bytes. This is the documented interop boundary spec.md calls out;
//! this crate does not depend on an array library, it only encodes
//! and decodes this string against the always-big-endian wire.

use crate::error::{CodecError, Result};
use crate::value::Scalar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Signed,
    Unsigned,
    Float,
}

struct Parsed {
    kind: Kind,
    itemsize: usize,
}

fn parse(dtype: &str) -> Result<Parsed> {
    let bytes = dtype.as_bytes();
    if bytes.is_empty() {
        return Err(CodecError::FormatError("empty dtype string".into()).into());
    }
    let mut idx = 0;
    if matches!(bytes[0], b'<' | b'>' | b'|' | b'=') {
        idx += 1;
    }
    if idx >= bytes.len() {
        return Err(CodecError::FormatError(format!("malformed dtype {dtype:?}")).into());
    }
    let kind = match bytes[idx] {
        b'f' => Kind::Float,
        b'i' => Kind::Signed,
        b'u' => Kind::Unsigned,
        other => {
            return Err(CodecError::FormatError(format!(
                "unsupported dtype kind {:?}",
                other as char
            ))
            .into())
        }
    };
    idx += 1;
    let itemsize: usize = dtype[idx..]
        .parse()
        .map_err(|_| CodecError::FormatError(format!("malformed dtype width in {dtype:?}")))?;
    if kind == Kind::Float && itemsize != 4 && itemsize != 8 {
        return Err(CodecError::FormatError("float dtype must be 4 or 8 bytes".into()).into());
    }
    if itemsize == 0 || itemsize > 8 {
        return Err(CodecError::FormatError("dtype width out of range".into()).into());
    }
    Ok(Parsed { kind, itemsize })
}

/// Width, in bytes, of one element under `dtype`.
pub fn itemsize(dtype: &str) -> Result<usize> {
    Ok(parse(dtype)?.itemsize)
}

/// Encodes a flat sequence of single-column rows as big-endian dense
/// bytes, per `dtype`.
pub fn encode_dense(dtype: &str, rows: &[Vec<Scalar>]) -> Result<Vec<u8>> {
    let parsed = parse(dtype)?;
    let mut out = Vec::with_capacity(rows.len() * parsed.itemsize);
    for row in rows {
        let scalar = row.first().ok_or_else(|| {
            CodecError::FormatError("dense row has no fields".to_string())
        })?;
        let raw: u64 = match (parsed.kind, scalar) {
            (Kind::Unsigned, Scalar::Unsigned(v)) => *v,
            (Kind::Signed, Scalar::Signed(v)) => *v as u64,
            (Kind::Float, Scalar::Float(v)) => {
                if parsed.itemsize == 4 {
                    (*v as f32).to_bits() as u64
                } else {
                    v.to_bits()
                }
            }
            _ => return Err(CodecError::FormatError("scalar does not match dtype kind".into()).into()),
        };
        let be = raw.to_be_bytes();
        out.extend_from_slice(&be[8 - parsed.itemsize..]);
    }
    Ok(out)
}

/// Decodes `count` dense elements (or as many as fit, if `count < 0`)
/// from big-endian `bytes`, per `dtype`.
pub fn decode_dense(dtype: &str, bytes: &[u8], count: i64) -> Result<Vec<Vec<Scalar>>> {
    let parsed = parse(dtype)?;
    if parsed.itemsize == 0 {
        return Ok(Vec::new());
    }
    let n = if count < 0 {
        bytes.len() / parsed.itemsize
    } else {
        count as usize
    };
    if bytes.len() < n * parsed.itemsize {
        return Err(CodecError::OutOfRange { start_bit_offset: 0 }.into());
    }
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let chunk = &bytes[i * parsed.itemsize..(i + 1) * parsed.itemsize];
        let mut padded = [0u8; 8];
        padded[8 - parsed.itemsize..].copy_from_slice(chunk);
        let raw = u64::from_be_bytes(padded);
        let scalar = match parsed.kind {
            Kind::Unsigned => Scalar::Unsigned(raw),
            Kind::Signed => {
                let shift = 64 - parsed.itemsize * 8;
                Scalar::Signed(((raw << shift) as i64) >> shift)
            }
            Kind::Float => {
                if parsed.itemsize == 4 {
                    Scalar::Float(f32::from_bits(raw as u32) as f64)
                } else {
                    Scalar::Float(f64::from_bits(raw))
                }
            }
        };
        out.push(vec![scalar]);
    }
    Ok(out)
}
