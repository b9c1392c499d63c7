// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! A described, valued item.

use crate::codec::bits;
use crate::descriptor::{Descriptor, Shape};
use crate::dtype;
use crate::error::{Error, Result};
use crate::value::Value;

/// A descriptor paired with its current value and a "has this changed
/// since it was last emitted" flag.
#[derive(Debug, Clone)]
pub struct Item {
    pub descriptor: Descriptor,
    value: Option<Value>,
    changed: bool,
}

impl Item {
    pub fn new(descriptor: Descriptor) -> Self {
        Item { descriptor, value: None, changed: false }
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn changed(&self) -> bool {
        self.changed
    }

    pub fn clear_changed(&mut self) {
        self.changed = false;
    }

    /// Stores `value`, marking the item changed. Validates row count
    /// against the descriptor's shape when the shape is fixed.
    pub fn set_value(&mut self, value: Value) -> Result<()> {
        if let Shape::Fixed(dims) = &self.descriptor.shape {
            let expected = dims.iter().map(|&d| d as usize).product::<usize>().max(1);
            if value.row_count() != expected {
                return Err(Error::ValueError(format!(
                    "item {:#x} expects {expected} rows, got {}",
                    self.descriptor.id,
                    value.row_count()
                )));
            }
        }
        for row in &value.rows {
            if row.len() != self.descriptor.format.len() && self.descriptor.dtype.is_none() {
                return Err(Error::ValueError(format!(
                    "item {:#x} row has {} fields, format declares {}",
                    self.descriptor.id,
                    row.len(),
                    self.descriptor.format.len()
                )));
            }
        }
        self.value = Some(value);
        self.changed = true;
        Ok(())
    }

    /// Encodes the current value to bytes, per the descriptor's dtype
    /// (dense array encoding) or bit-packed format.
    pub fn encode_value(&self) -> Result<Vec<u8>> {
        let value = self
            .value
            .as_ref()
            .ok_or(Error::UninitializedItem(self.descriptor.id))?;
        if let Some(dtype) = &self.descriptor.dtype {
            dtype::encode_dense(dtype, &value.rows)
        } else {
            bits::pack(&self.descriptor.format, &value.rows)
        }
    }

    /// Decodes `bytes` into this item's value, per its descriptor.
    /// `bytes` must already be sliced to the byte this item's value
    /// starts on. `start_bit_offset` is a sub-byte (0..7) offset into
    /// `bytes[0]` that applies only to bit-packed (non-dtype) items —
    /// dtype items are always byte-aligned, so callers pass `0` for
    /// them. Immediate-mode callers get both halves from
    /// [`Descriptor::bit_offset`]; direct-mode values pass `0`.
    pub fn decode_value(&mut self, bytes: &[u8], start_bit_offset: u8) -> Result<()> {
        let count = match &self.descriptor.shape {
            Shape::Dynamic => -1,
            Shape::Fixed(dims) => dims.iter().map(|&d| d as i64).product::<i64>().max(1),
        };
        let rows = if let Some(dtype) = &self.descriptor.dtype {
            dtype::decode_dense(dtype, bytes, count)?
        } else {
            bits::unpack(&self.descriptor.format, bytes, count, start_bit_offset)?
        };
        self.value = Some(Value::new(rows));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::bits::{FormatComponent, FormatKind};
    use crate::value::Scalar;

    fn scalar_descriptor() -> Descriptor {
        Descriptor {
            id: 0x1000,
            name: "count".into(),
            description: "a counter".into(),
            shape: Shape::Fixed(vec![]),
            format: vec![FormatComponent::new(FormatKind::Unsigned, 32).unwrap()],
            dtype: None,
        }
    }

    #[test]
    fn set_then_encode_decode_round_trips() {
        let mut item = Item::new(scalar_descriptor());
        item.set_value(Value::new(vec![vec![Scalar::Unsigned(42)]])).unwrap();
        let bytes = item.encode_value().unwrap();
        let mut decoded = Item::new(scalar_descriptor());
        decoded.decode_value(&bytes, 0).unwrap();
        assert_eq!(decoded.value(), item.value());
    }

    #[test]
    fn encode_without_value_is_error() {
        let item = Item::new(scalar_descriptor());
        assert!(matches!(item.encode_value(), Err(Error::UninitializedItem(_))));
    }

    #[test]
    fn wrong_row_count_is_rejected() {
        let mut item = Item::new(scalar_descriptor());
        let bad = Value::new(vec![
            vec![Scalar::Unsigned(1)],
            vec![Scalar::Unsigned(2)],
        ]);
        assert!(item.set_value(bad).is_err());
    }
}
